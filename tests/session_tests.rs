#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! End-to-end session tests over the worker task and channel notifier.
//!
//! Drives the session exactly the way a transport front end does: register
//! an outbox per connection, announce it through the [`SessionHandle`], and
//! observe what each connection receives.

mod common;

use common::{conn, mv, MockRules};
use gambit_server::protocol::{ConnectionId, ServerMessage, Side};
use gambit_server::rules::RulesEngine;
use gambit_server::{ChannelNotifier, GambitError, Session, SessionHandle};
use tokio::sync::mpsc;

// ── Helpers ─────────────────────────────────────────────────────────

type Outbox = mpsc::UnboundedReceiver<ServerMessage>;

fn start(rules: MockRules) -> (SessionHandle, ChannelNotifier) {
    let notifier = ChannelNotifier::new();
    let (session, _worker) = Session::new(rules, notifier.clone()).spawn();
    (session, notifier)
}

/// Register an outbox and announce the connection, returning its outbox.
fn join(session: &SessionHandle, notifier: &ChannelNotifier, id: ConnectionId) -> Outbox {
    let outbox = notifier.register(id);
    session.connect(id).unwrap();
    outbox
}

// ── Admission (Scenario A) ──────────────────────────────────────────

#[tokio::test]
async fn first_two_connections_are_players_third_is_spectator() {
    let (session, notifier) = start(MockRules::new());

    let mut c1 = join(&session, &notifier, conn(1));
    let mut c2 = join(&session, &notifier, conn(2));
    let mut c3 = join(&session, &notifier, conn(3));

    assert_eq!(c1.recv().await, Some(ServerMessage::PlayerRole(Side::White)));
    assert_eq!(c2.recv().await, Some(ServerMessage::PlayerRole(Side::Black)));
    assert_eq!(c3.recv().await, Some(ServerMessage::SpectatorRole));
}

// ── Move authority and acceptance (Scenario B) ──────────────────────

#[tokio::test]
async fn wrong_turn_submission_is_discarded_then_legal_move_is_broadcast() {
    let (session, notifier) = start(MockRules::new());

    let mut c1 = join(&session, &notifier, conn(1));
    let mut c2 = join(&session, &notifier, conn(2));
    let mut c3 = join(&session, &notifier, conn(3));
    let _ = c1.recv().await;
    let _ = c2.recv().await;
    let _ = c3.recv().await;

    // White to move; Black submits first — discarded with no reply at all.
    session.submit_move(conn(2), mv("e7e5")).unwrap();
    // White's legal opening move.
    let opening = mv("e2e4");
    session.submit_move(conn(1), opening.clone()).unwrap();

    // The discard produced nothing: the very next message every connection
    // sees is the accepted move, then the new board state.
    for outbox in [&mut c1, &mut c2, &mut c3] {
        assert_eq!(outbox.recv().await, Some(ServerMessage::Move(opening.clone())));
        assert_eq!(
            outbox.recv().await,
            Some(ServerMessage::BoardState("e2e4 b".into()))
        );
    }
}

#[tokio::test]
async fn broadcast_position_has_the_opposite_turn_after_acceptance() {
    let rules = MockRules::new();
    let before = rules.initial_position();
    let (session, notifier) = start(MockRules::new());

    let mut c1 = join(&session, &notifier, conn(1));
    let _ = c1.recv().await;

    session.submit_move(conn(1), mv("d2d4")).unwrap();
    let _ = c1.recv().await; // move broadcast

    let Some(ServerMessage::BoardState(board)) = c1.recv().await else {
        panic!("expected a boardState broadcast");
    };

    // Loading the broadcast position through the engine yields the side
    // opposite the one that just moved.
    let rules = MockRules::new();
    let loaded = rules.load(&board).unwrap();
    assert_eq!(rules.current_turn(&loaded), before.turn.opposite());
}

#[tokio::test]
async fn serialized_position_round_trips_byte_identically() {
    let (session, notifier) = start(MockRules::new());

    let mut c1 = join(&session, &notifier, conn(1));
    let mut c2 = join(&session, &notifier, conn(2));
    let _ = c1.recv().await;
    let _ = c2.recv().await;

    session.submit_move(conn(1), mv("e2e4")).unwrap();
    session.submit_move(conn(2), mv("e7e5")).unwrap();

    // Skip the two move broadcasts, keep the final board state.
    let _ = c1.recv().await;
    let _ = c1.recv().await;
    let _ = c1.recv().await;
    let Some(ServerMessage::BoardState(board)) = c1.recv().await else {
        panic!("expected a boardState broadcast");
    };

    let rules = MockRules::new();
    let reloaded = rules.load(&board).unwrap();
    assert_eq!(rules.serialize(&reloaded), board);
}

// ── Rejection (Scenario C) ──────────────────────────────────────────

#[tokio::test]
async fn illegal_move_reaches_the_submitter_and_nobody_else() {
    let bad = mv("b1b1");
    let (session, notifier) = start(MockRules::new().with_illegal(bad.clone()));

    let mut c1 = join(&session, &notifier, conn(1));
    let mut c2 = join(&session, &notifier, conn(2));
    let mut c3 = join(&session, &notifier, conn(3));
    let _ = c1.recv().await;
    let _ = c2.recv().await;
    let _ = c3.recv().await;

    session.submit_move(conn(1), bad.clone()).unwrap();
    assert_eq!(c1.recv().await, Some(ServerMessage::InvalidMove(bad)));

    // c2 and c3 saw nothing: their next message is the broadcast for a
    // subsequent legal move.
    let good = mv("e2e4");
    session.submit_move(conn(1), good.clone()).unwrap();
    assert_eq!(c2.recv().await, Some(ServerMessage::Move(good.clone())));
    assert_eq!(c3.recv().await, Some(ServerMessage::Move(good)));
}

#[tokio::test]
async fn engine_failure_reaches_the_submitter_as_a_generic_error() {
    let poisoned = mv("a1h8");
    let (session, notifier) = start(MockRules::new().with_failing(poisoned.clone()));

    let mut c1 = join(&session, &notifier, conn(1));
    let _ = c1.recv().await;

    session.submit_move(conn(1), poisoned).unwrap();
    assert!(matches!(c1.recv().await, Some(ServerMessage::Error(_))));

    // The worker survived: the same player can continue the game.
    let good = mv("e2e4");
    session.submit_move(conn(1), good.clone()).unwrap();
    assert_eq!(c1.recv().await, Some(ServerMessage::Move(good)));
}

// ── Disconnection (Scenario D) ──────────────────────────────────────

#[tokio::test]
async fn disconnect_reannounces_state_and_frees_the_seat() {
    let (session, notifier) = start(MockRules::new());

    let mut c1 = join(&session, &notifier, conn(1));
    let mut c2 = join(&session, &notifier, conn(2));
    let mut c3 = join(&session, &notifier, conn(3));
    let _ = c1.recv().await;
    let _ = c2.recv().await;
    let _ = c3.recv().await;

    // White disconnects mid-game.
    notifier.unregister(conn(1));
    session.disconnect(conn(1)).unwrap();

    // Remaining connections see the unchanged position re-announced.
    assert_eq!(
        c2.recv().await,
        Some(ServerMessage::BoardState("- w".into()))
    );
    assert_eq!(
        c3.recv().await,
        Some(ServerMessage::BoardState("- w".into()))
    );

    // A new connection takes the freed seat; the observer was not promoted.
    let mut c4 = join(&session, &notifier, conn(4));
    assert_eq!(c4.recv().await, Some(ServerMessage::PlayerRole(Side::White)));
}

#[tokio::test]
async fn repeated_disconnects_for_one_identity_are_harmless() {
    let (session, notifier) = start(MockRules::new());

    let _ = join(&session, &notifier, conn(1));
    let mut c2 = join(&session, &notifier, conn(2));
    let _ = c2.recv().await; // own role (Black)

    notifier.unregister(conn(1));
    session.disconnect(conn(1)).unwrap();
    session.disconnect(conn(1)).unwrap();

    // One re-announcement per disconnect event, nothing else.
    assert_eq!(
        c2.recv().await,
        Some(ServerMessage::BoardState("- w".into()))
    );
    assert_eq!(
        c2.recv().await,
        Some(ServerMessage::BoardState("- w".into()))
    );

    // Black still holds its seat: a new connection becomes White again.
    let mut c3 = join(&session, &notifier, conn(3));
    assert_eq!(c3.recv().await, Some(ServerMessage::PlayerRole(Side::White)));
}

// ── Worker lifecycle ────────────────────────────────────────────────

#[tokio::test]
async fn handle_errors_once_the_worker_is_gone() {
    let notifier = ChannelNotifier::new();
    let (session, worker) = Session::new(MockRules::new(), notifier).spawn();

    worker.abort();
    let _ = worker.await;

    assert!(matches!(
        session.connect(conn(1)),
        Err(GambitError::SessionClosed)
    ));
    assert!(matches!(
        session.submit_move(conn(1), mv("e2e4")),
        Err(GambitError::SessionClosed)
    ));
    assert!(matches!(
        session.disconnect(conn(1)),
        Err(GambitError::SessionClosed)
    ));
}

#[tokio::test]
async fn queued_events_are_processed_before_worker_exit() {
    let notifier = ChannelNotifier::new();
    let (session, worker) = Session::new(MockRules::new(), notifier.clone()).spawn();

    let mut c1 = notifier.register(conn(1));
    session.connect(conn(1)).unwrap();
    session.submit_move(conn(1), mv("g1f3")).unwrap();
    drop(session);

    // The worker drains the queue before exiting.
    worker.await.unwrap();
    assert_eq!(c1.recv().await, Some(ServerMessage::PlayerRole(Side::White)));
    assert_eq!(c1.recv().await, Some(ServerMessage::Move(mv("g1f3"))));
    assert_eq!(
        c1.recv().await,
        Some(ServerMessage::BoardState("g1f3 b".into()))
    );
}
