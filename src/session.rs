//! The authoritative game session: admission, move gateway, reclamation.
//!
//! [`Session`] owns the [`SessionRegistry`], the plugged-in
//! [`RulesEngine`], and the [`Notifier`]. It is driven exclusively through
//! [`SessionEvent`]s, processed strictly one at a time in arrival order —
//! [`Session::spawn`] moves the session into a single worker task fed by an
//! unbounded channel, and the returned [`SessionHandle`] is the only way to
//! submit events. That single-consumer queue is what makes the registry safe
//! without any internal locking: an event handler always runs to completion,
//! including its notification sends, before the next event is looked at.
//!
//! # Example
//!
//! ```rust,ignore
//! let notifier = ChannelNotifier::new();
//! let (session, worker) = Session::new(MyRules::new(), notifier.clone()).spawn();
//!
//! // Transport layer, per connection:
//! let outbox = notifier.register(id);
//! session.connect(id)?;
//! // … forward inbound frames …
//! session.submit_move(id, request)?;
//! // … on socket close …
//! notifier.unregister(id);
//! session.disconnect(id)?;
//! ```

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{GambitError, Result};
use crate::notifier::Notifier;
use crate::protocol::{ConnectionId, MoveRequest, ServerMessage};
use crate::registry::SessionRegistry;
use crate::rules::{RulesEngine, RulesError};

// ── Events ──────────────────────────────────────────────────────────

/// A transport-originated event for the session worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A new connection was accepted by the transport.
    Connected(ConnectionId),
    /// A connection submitted a move.
    Move {
        submitter: ConnectionId,
        request: MoveRequest,
    },
    /// A connection went away.
    Disconnected(ConnectionId),
}

// ── Session ─────────────────────────────────────────────────────────

/// One authoritative two-player game session.
///
/// Constructed once at process start and moved into its worker task via
/// [`spawn`](Session::spawn); there is no pooling and no per-game teardown.
pub struct Session<R: RulesEngine, N: Notifier> {
    rules: R,
    registry: SessionRegistry<R::Position>,
    notifier: N,
}

impl<R: RulesEngine, N: Notifier> Session<R, N> {
    /// Create a session at the engine's initial position with both seats
    /// open.
    pub fn new(rules: R, notifier: N) -> Self {
        let registry = SessionRegistry::new(rules.initial_position());
        Self {
            rules,
            registry,
            notifier,
        }
    }

    /// Read access to the seat map and position, mainly for inspection in
    /// tests.
    pub fn registry(&self) -> &SessionRegistry<R::Position> {
        &self.registry
    }

    /// Process one event to completion.
    pub async fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Connected(identity) => self.admit(identity).await,
            SessionEvent::Move { submitter, request } => {
                self.handle_move(submitter, request).await;
            }
            SessionEvent::Disconnected(identity) => self.reclaim(identity).await,
        }
    }

    /// Move the session into a single worker task.
    ///
    /// The worker processes events in arrival order and exits when every
    /// [`SessionHandle`] clone has been dropped. Handle methods return
    /// [`GambitError::SessionClosed`] once the worker is gone.
    #[must_use = "dropping the handle shuts the session worker down"]
    pub fn spawn(self) -> (SessionHandle, tokio::task::JoinHandle<()>) {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<SessionEvent>();

        let task = tokio::spawn(async move {
            let mut session = self;
            debug!("session worker started");
            while let Some(event) = event_rx.recv().await {
                session.handle(event).await;
            }
            debug!("session worker exited");
        });

        (SessionHandle { event_tx }, task)
    }

    // ── Connection admission ────────────────────────────────────────

    /// Seat the new connection, or make it an observer when both seats are
    /// taken.
    ///
    /// Deterministic in arrival order: the first open seat wins, White
    /// before Black. Observers stay observers — a seat freed later is only
    /// filled by a future admission, never by re-evaluating existing
    /// connections.
    async fn admit(&mut self, identity: ConnectionId) {
        match self.registry.open_seat() {
            Some(side) => match self.registry.assign(side, identity) {
                Ok(()) => {
                    info!(%identity, %side, "player admitted");
                    self.notifier
                        .notify(identity, ServerMessage::PlayerRole(side))
                        .await;
                }
                // Unreachable while events stay serialized; non-fatal.
                Err(err) => warn!(%identity, "seat assignment refused: {err}"),
            },
            None => {
                info!(%identity, "spectator admitted");
                self.notifier
                    .notify(identity, ServerMessage::SpectatorRole)
                    .await;
            }
        }
    }

    // ── Move gateway ────────────────────────────────────────────────

    /// Check turn authority, delegate validation to the rules engine, and
    /// fan out the result.
    ///
    /// A submitter that is not the current-turn occupant (observers, the
    /// idle player, or anyone while the seat is empty) is silently
    /// discarded: no reply, no state change, no broadcast.
    async fn handle_move(&mut self, submitter: ConnectionId, request: MoveRequest) {
        let side = self.rules.current_turn(self.registry.current_position());
        let expected = self.registry.occupant(side);
        if expected != Some(submitter) {
            debug!(%submitter, %side, mv = %request, "move from non-occupant discarded");
            return;
        }

        match self.rules.apply(self.registry.current_position(), &request) {
            Ok(next) => {
                self.registry.apply_move(next);
                let board = self.rules.serialize(self.registry.current_position());
                info!(%submitter, mv = %request, "move accepted");
                self.notifier
                    .broadcast(ServerMessage::Move(request))
                    .await;
                self.notifier
                    .broadcast(ServerMessage::BoardState(board))
                    .await;
            }
            Err(RulesError::IllegalMove) => {
                info!(%submitter, mv = %request, "move rejected");
                self.notifier
                    .notify(submitter, ServerMessage::InvalidMove(request))
                    .await;
            }
            Err(err) => {
                // Unexpected engine failure: contained here, reported to the
                // submitter only, never unwinds the worker.
                warn!(%submitter, mv = %request, "rules evaluation failed: {err}");
                self.notifier
                    .notify(
                        submitter,
                        ServerMessage::Error("move could not be processed".into()),
                    )
                    .await;
            }
        }
    }

    // ── Disconnection reclaimer ─────────────────────────────────────

    /// Free any seat held by the departed connection and re-announce the
    /// (unchanged) position so remaining clients stay in sync with the seat
    /// opening.
    async fn reclaim(&mut self, identity: ConnectionId) {
        match self.registry.vacate(identity) {
            Some(side) => info!(%identity, %side, "player disconnected, seat open"),
            None => debug!(%identity, "observer disconnected"),
        }
        let board = self.rules.serialize(self.registry.current_position());
        self.notifier
            .broadcast(ServerMessage::BoardState(board))
            .await;
    }
}

// ── Session handle ──────────────────────────────────────────────────

/// Clonable handle that enqueues [`SessionEvent`]s to the worker.
///
/// Methods return immediately once the event is queued; the worker applies
/// events in the order they were sent.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    event_tx: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionHandle {
    /// Announce a newly accepted connection.
    ///
    /// # Errors
    ///
    /// Returns [`GambitError::SessionClosed`] if the worker has exited.
    pub fn connect(&self, identity: ConnectionId) -> Result<()> {
        self.send(SessionEvent::Connected(identity))
    }

    /// Submit a move on behalf of `submitter`.
    ///
    /// # Errors
    ///
    /// Returns [`GambitError::SessionClosed`] if the worker has exited.
    pub fn submit_move(&self, submitter: ConnectionId, request: MoveRequest) -> Result<()> {
        self.send(SessionEvent::Move { submitter, request })
    }

    /// Announce that a connection has gone away.
    ///
    /// # Errors
    ///
    /// Returns [`GambitError::SessionClosed`] if the worker has exited.
    pub fn disconnect(&self, identity: ConnectionId) -> Result<()> {
        self.send(SessionEvent::Disconnected(identity))
    }

    fn send(&self, event: SessionEvent) -> Result<()> {
        self.event_tx
            .send(event)
            .map_err(|_| GambitError::SessionClosed)
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::protocol::Side;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex as StdMutex};
    use uuid::Uuid;

    // ── Scripted rules engine ───────────────────────────────────────

    /// A rules engine with no chess knowledge: any move is legal unless
    /// scripted otherwise, and each accepted move flips the turn.
    struct ScriptedRules {
        illegal: Vec<MoveRequest>,
        failing: Vec<MoveRequest>,
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct ScriptedPosition {
        turn: Side,
        moves: Vec<String>,
    }

    impl ScriptedRules {
        fn new() -> Self {
            Self {
                illegal: Vec::new(),
                failing: Vec::new(),
            }
        }

        fn with_illegal(mut self, request: MoveRequest) -> Self {
            self.illegal.push(request);
            self
        }

        fn with_failing(mut self, request: MoveRequest) -> Self {
            self.failing.push(request);
            self
        }
    }

    impl RulesEngine for ScriptedRules {
        type Position = ScriptedPosition;

        fn initial_position(&self) -> ScriptedPosition {
            ScriptedPosition {
                turn: Side::White,
                moves: Vec::new(),
            }
        }

        fn current_turn(&self, position: &ScriptedPosition) -> Side {
            position.turn
        }

        fn apply(
            &self,
            position: &ScriptedPosition,
            request: &MoveRequest,
        ) -> std::result::Result<ScriptedPosition, RulesError> {
            if self.failing.contains(request) {
                return Err(RulesError::Engine("scripted failure".into()));
            }
            if self.illegal.contains(request) {
                return Err(RulesError::IllegalMove);
            }
            let mut next = position.clone();
            next.moves.push(request.to_string());
            next.turn = position.turn.opposite();
            Ok(next)
        }

        fn serialize(&self, position: &ScriptedPosition) -> String {
            let moves = if position.moves.is_empty() {
                "-".to_string()
            } else {
                position.moves.join("/")
            };
            format!("{} {}", moves, position.turn)
        }

        fn load(&self, text: &str) -> std::result::Result<ScriptedPosition, RulesError> {
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
            Ok(ScriptedPosition { turn, moves })
        }
    }

    // ── Recording notifier ──────────────────────────────────────────

    /// Records every send; `None` as the recipient marks a broadcast.
    #[derive(Clone, Default)]
    struct RecordingNotifier {
        sent: Arc<StdMutex<Vec<(Option<ConnectionId>, ServerMessage)>>>,
    }

    impl RecordingNotifier {
        fn new() -> Self {
            Self::default()
        }

        fn sent(&self) -> Vec<(Option<ConnectionId>, ServerMessage)> {
            self.sent.lock().unwrap().clone()
        }

        fn clear(&self) {
            self.sent.lock().unwrap().clear();
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, recipient: ConnectionId, message: ServerMessage) {
            self.sent.lock().unwrap().push((Some(recipient), message));
        }

        async fn broadcast(&self, message: ServerMessage) {
            self.sent.lock().unwrap().push((None, message));
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn id(n: u128) -> ConnectionId {
        Uuid::from_u128(n)
    }

    fn mv(text: &str) -> MoveRequest {
        MoveRequest {
            from: text[0..2].parse().unwrap(),
            to: text[2..4].parse().unwrap(),
            promotion: None,
        }
    }

    fn session() -> (Session<ScriptedRules, RecordingNotifier>, RecordingNotifier) {
        let notifier = RecordingNotifier::new();
        (Session::new(ScriptedRules::new(), notifier.clone()), notifier)
    }

    async fn connect_three(
        session: &mut Session<ScriptedRules, RecordingNotifier>,
    ) -> (ConnectionId, ConnectionId, ConnectionId) {
        let (c1, c2, c3) = (id(1), id(2), id(3));
        for c in [c1, c2, c3] {
            session.handle(SessionEvent::Connected(c)).await;
        }
        (c1, c2, c3)
    }

    // ── Admission ───────────────────────────────────────────────────

    #[tokio::test]
    async fn first_two_connections_become_players_in_arrival_order() {
        let (mut session, notifier) = session();
        let (c1, c2, c3) = connect_three(&mut session).await;

        assert_eq!(
            notifier.sent(),
            vec![
                (Some(c1), ServerMessage::PlayerRole(Side::White)),
                (Some(c2), ServerMessage::PlayerRole(Side::Black)),
                (Some(c3), ServerMessage::SpectatorRole),
            ]
        );
        assert_eq!(session.registry().occupant(Side::White), Some(c1));
        assert_eq!(session.registry().occupant(Side::Black), Some(c2));
        assert_eq!(session.registry().seat_of(c3), None);
    }

    #[tokio::test]
    async fn every_connection_past_two_is_a_spectator() {
        let (mut session, notifier) = session();
        connect_three(&mut session).await;
        notifier.clear();

        session.handle(SessionEvent::Connected(id(4))).await;
        session.handle(SessionEvent::Connected(id(5))).await;

        assert_eq!(
            notifier.sent(),
            vec![
                (Some(id(4)), ServerMessage::SpectatorRole),
                (Some(id(5)), ServerMessage::SpectatorRole),
            ]
        );
    }

    // ── Move gateway ────────────────────────────────────────────────

    #[tokio::test]
    async fn move_from_the_idle_player_is_silently_discarded() {
        let (mut session, notifier) = session();
        let (_c1, c2, _c3) = connect_three(&mut session).await;
        notifier.clear();

        // White to move; Black submits.
        session
            .handle(SessionEvent::Move {
                submitter: c2,
                request: mv("e7e5"),
            })
            .await;

        assert!(notifier.sent().is_empty());
        assert!(session.registry().current_position().moves.is_empty());
    }

    #[tokio::test]
    async fn move_from_a_spectator_is_silently_discarded() {
        let (mut session, notifier) = session();
        let (_c1, _c2, c3) = connect_three(&mut session).await;
        notifier.clear();

        session
            .handle(SessionEvent::Move {
                submitter: c3,
                request: mv("e2e4"),
            })
            .await;

        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn move_while_the_turn_seat_is_empty_is_silently_discarded() {
        let (mut session, notifier) = session();
        // Nobody connected at all: the White seat has no occupant.
        session
            .handle(SessionEvent::Move {
                submitter: id(9),
                request: mv("e2e4"),
            })
            .await;

        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn accepted_move_broadcasts_move_then_board_state() {
        let (mut session, notifier) = session();
        let (c1, _c2, _c3) = connect_three(&mut session).await;
        notifier.clear();

        let request = mv("e2e4");
        session
            .handle(SessionEvent::Move {
                submitter: c1,
                request: request.clone(),
            })
            .await;

        assert_eq!(
            notifier.sent(),
            vec![
                (None, ServerMessage::Move(request)),
                (None, ServerMessage::BoardState("e2e4 b".into())),
            ]
        );
        // The turn flipped to the opposite side.
        assert_eq!(session.registry().current_position().turn, Side::Black);
    }

    #[tokio::test]
    async fn turn_authority_alternates_across_accepted_moves() {
        let (mut session, _notifier) = session();
        let (c1, c2, _c3) = connect_three(&mut session).await;

        session
            .handle(SessionEvent::Move {
                submitter: c1,
                request: mv("e2e4"),
            })
            .await;
        session
            .handle(SessionEvent::Move {
                submitter: c2,
                request: mv("e7e5"),
            })
            .await;

        let position = session.registry().current_position();
        assert_eq!(position.moves, vec!["e2e4".to_string(), "e7e5".to_string()]);
        assert_eq!(position.turn, Side::White);
    }

    #[tokio::test]
    async fn illegal_move_notifies_the_submitter_only() {
        let request = mv("e2e2");
        let notifier = RecordingNotifier::new();
        let mut session = Session::new(
            ScriptedRules::new().with_illegal(request.clone()),
            notifier.clone(),
        );
        let (c1, _c2, _c3) = connect_three(&mut session).await;
        notifier.clear();

        session
            .handle(SessionEvent::Move {
                submitter: c1,
                request: request.clone(),
            })
            .await;

        assert_eq!(
            notifier.sent(),
            vec![(Some(c1), ServerMessage::InvalidMove(request))]
        );
        assert!(session.registry().current_position().moves.is_empty());
    }

    #[tokio::test]
    async fn engine_failure_reports_a_generic_error_to_the_submitter_only() {
        let request = mv("a1h8");
        let notifier = RecordingNotifier::new();
        let mut session = Session::new(
            ScriptedRules::new().with_failing(request.clone()),
            notifier.clone(),
        );
        let (c1, _c2, _c3) = connect_three(&mut session).await;
        notifier.clear();

        session
            .handle(SessionEvent::Move {
                submitter: c1,
                request,
            })
            .await;

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, Some(c1));
        assert!(matches!(sent[0].1, ServerMessage::Error(_)));
        // The session is still alive and the position untouched.
        assert!(session.registry().current_position().moves.is_empty());
        assert_eq!(session.registry().current_position().turn, Side::White);
    }

    // ── Disconnection ───────────────────────────────────────────────

    #[tokio::test]
    async fn disconnect_frees_the_seat_and_reannounces_the_position() {
        let (mut session, notifier) = session();
        let (c1, _c2, _c3) = connect_three(&mut session).await;
        notifier.clear();

        session.handle(SessionEvent::Disconnected(c1)).await;

        assert_eq!(session.registry().occupant(Side::White), None);
        assert_eq!(
            notifier.sent(),
            vec![(None, ServerMessage::BoardState("- w".into()))]
        );
    }

    #[tokio::test]
    async fn observer_disconnect_still_reannounces_the_position() {
        let (mut session, notifier) = session();
        let (_c1, _c2, c3) = connect_three(&mut session).await;
        notifier.clear();

        session.handle(SessionEvent::Disconnected(c3)).await;

        assert_eq!(
            notifier.sent(),
            vec![(None, ServerMessage::BoardState("- w".into()))]
        );
    }

    #[tokio::test]
    async fn double_disconnect_is_idempotent() {
        let (mut session, notifier) = session();
        let (c1, c2, _c3) = connect_three(&mut session).await;
        notifier.clear();

        session.handle(SessionEvent::Disconnected(c1)).await;
        session.handle(SessionEvent::Disconnected(c1)).await;

        // Both handlers re-announce, neither touches the other seat.
        assert_eq!(
            notifier.sent(),
            vec![
                (None, ServerMessage::BoardState("- w".into())),
                (None, ServerMessage::BoardState("- w".into())),
            ]
        );
        assert_eq!(session.registry().occupant(Side::Black), Some(c2));
    }

    #[tokio::test]
    async fn freed_seat_goes_to_the_next_new_connection() {
        let (mut session, notifier) = session();
        let (c1, _c2, _c3) = connect_three(&mut session).await;

        session.handle(SessionEvent::Disconnected(c1)).await;
        notifier.clear();

        let c4 = id(4);
        session.handle(SessionEvent::Connected(c4)).await;

        assert_eq!(
            notifier.sent(),
            vec![(Some(c4), ServerMessage::PlayerRole(Side::White))]
        );
        assert_eq!(session.registry().occupant(Side::White), Some(c4));
    }

    #[tokio::test]
    async fn observer_is_not_promoted_when_a_seat_opens() {
        let (mut session, notifier) = session();
        let (c1, _c2, c3) = connect_three(&mut session).await;
        notifier.clear();

        session.handle(SessionEvent::Disconnected(c1)).await;

        // The observer received no role message and holds no seat.
        let role_messages: Vec<_> = notifier
            .sent()
            .into_iter()
            .filter(|(recipient, _)| *recipient == Some(c3))
            .collect();
        assert!(role_messages.is_empty());
        assert_eq!(session.registry().seat_of(c3), None);
        assert_eq!(session.registry().open_seat(), Some(Side::White));
    }

    // ── Worker & handle ─────────────────────────────────────────────

    #[tokio::test]
    async fn worker_processes_events_in_arrival_order() {
        let notifier = RecordingNotifier::new();
        let (handle, worker) =
            Session::new(ScriptedRules::new(), notifier.clone()).spawn();

        handle.connect(id(1)).unwrap();
        handle.connect(id(2)).unwrap();
        handle.submit_move(id(1), mv("e2e4")).unwrap();
        drop(handle);
        worker.await.unwrap();

        assert_eq!(
            notifier.sent(),
            vec![
                (Some(id(1)), ServerMessage::PlayerRole(Side::White)),
                (Some(id(2)), ServerMessage::PlayerRole(Side::Black)),
                (None, ServerMessage::Move(mv("e2e4"))),
                (None, ServerMessage::BoardState("e2e4 b".into())),
            ]
        );
    }

    #[tokio::test]
    async fn handle_reports_session_closed_after_worker_exit() {
        let notifier = RecordingNotifier::new();
        let (handle, worker) = Session::new(ScriptedRules::new(), notifier).spawn();

        worker.abort();
        let _ = worker.await;

        let result = handle.connect(id(1));
        assert!(matches!(result, Err(GambitError::SessionClosed)));
    }

    #[tokio::test]
    async fn worker_exits_when_every_handle_is_dropped() {
        let notifier = RecordingNotifier::new();
        let (handle, worker) = Session::new(ScriptedRules::new(), notifier).spawn();
        let clone = handle.clone();

        drop(handle);
        drop(clone);

        // Must complete rather than hang.
        worker.await.unwrap();
    }
}
