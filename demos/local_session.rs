//! # Local Session Example
//!
//! Demonstrates the session core without any network transport:
//!
//! 1. Implement the [`RulesEngine`] trait
//! 2. Spawn the session worker with a [`ChannelNotifier`]
//! 3. Play the roles of two players and an observer by hand, printing what
//!    each connection receives
//!
//! This is the same wiring a custom transport front end would do: register
//! an outbox, announce the connection, forward move submissions, and
//! announce the disconnect.
//!
//! ## Running
//!
//! ```sh
//! cargo run --example local_session
//! ```

use gambit_server::protocol::{ConnectionId, MoveRequest, ServerMessage, Side};
use gambit_server::rules::{RulesEngine, RulesError};
use gambit_server::{ChannelNotifier, Session};
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

// ── A minimal rules engine ──────────────────────────────────────────
// Tracks only whose turn it is and the move history; any move that leaves
// its starting square is legal.

struct TurnTakingRules;

#[derive(Debug, Clone)]
struct TurnTakingPosition {
    turn: Side,
    moves: Vec<String>,
}

impl RulesEngine for TurnTakingRules {
    type Position = TurnTakingPosition;

    fn initial_position(&self) -> TurnTakingPosition {
        TurnTakingPosition {
            turn: Side::White,
            moves: Vec::new(),
        }
    }

    fn current_turn(&self, position: &TurnTakingPosition) -> Side {
        position.turn
    }

    fn apply(
        &self,
        position: &TurnTakingPosition,
        request: &MoveRequest,
    ) -> Result<TurnTakingPosition, RulesError> {
        if request.from == request.to {
            return Err(RulesError::IllegalMove);
        }
        let mut next = position.clone();
        next.moves.push(request.to_string());
        next.turn = position.turn.opposite();
        Ok(next)
    }

    fn serialize(&self, position: &TurnTakingPosition) -> String {
        let moves = if position.moves.is_empty() {
            "-".to_string()
        } else {
            position.moves.join("/")
        };
        format!("{} {}", moves, position.turn)
    }

    fn load(&self, text: &str) -> Result<TurnTakingPosition, RulesError> {
        let (moves, turn) = text
            .rsplit_once(' ')
            .ok_or_else(|| RulesError::MalformedPosition(text.into()))?;
        let turn = match turn {
            "w" => Side::White,
            "b" => Side::Black,
            _ => return Err(RulesError::MalformedPosition(text.into())),
        };
        let moves = if moves == "-" {
            Vec::new()
        } else {
            moves.split('/').map(str::to_string).collect()
        };
        Ok(TurnTakingPosition { turn, moves })
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn parse_move(text: &str) -> Option<MoveRequest> {
    let from = text.get(0..2)?.parse().ok()?;
    let to = text.get(2..4)?.parse().ok()?;
    Some(MoveRequest {
        from,
        to,
        promotion: None,
    })
}

fn drain(name: &str, outbox: &mut UnboundedReceiver<ServerMessage>) {
    while let Ok(message) = outbox.try_recv() {
        println!("{name} received: {message:?}");
    }
}

// ── Main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let notifier = ChannelNotifier::new();
    let (session, worker) = Session::new(TurnTakingRules, notifier.clone()).spawn();

    // Three "connections", identities minted the way a transport would.
    let alice: ConnectionId = Uuid::new_v4();
    let bob: ConnectionId = Uuid::new_v4();
    let carol: ConnectionId = Uuid::new_v4();

    let mut alice_outbox = notifier.register(alice);
    let mut bob_outbox = notifier.register(bob);
    let mut carol_outbox = notifier.register(carol);

    // Admission order decides the roles: Alice is White, Bob is Black,
    // Carol observes.
    session.connect(alice)?;
    session.connect(bob)?;
    session.connect(carol)?;

    // An opening exchange. Carol's submission is silently discarded — she
    // holds no seat.
    let opening = parse_move("a2a4").ok_or("invalid move literal")?;
    session.submit_move(carol, opening)?;
    let opening = parse_move("e2e4").ok_or("invalid move literal")?;
    session.submit_move(alice, opening)?;
    let reply = parse_move("e7e5").ok_or("invalid move literal")?;
    session.submit_move(bob, reply)?;

    // Bob walks away; his seat opens up for a future connection.
    notifier.unregister(bob);
    session.disconnect(bob)?;

    // Let the worker drain the queue, then show what everyone saw.
    drop(session);
    worker.await?;

    drain("alice", &mut alice_outbox);
    drain("bob  ", &mut bob_outbox);
    drain("carol", &mut carol_outbox);

    Ok(())
}
