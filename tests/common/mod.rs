#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Shared test utilities for Gambit server integration tests.
//!
//! Provides a scripted [`MockRules`] engine (no chess knowledge: any move is
//! legal unless scripted otherwise, each accepted move flips the turn) and a
//! [`RecordingNotifier`] that captures every send for inspection.

use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use gambit_server::protocol::{ConnectionId, MoveRequest, ServerMessage, Side};
use gambit_server::rules::{RulesEngine, RulesError};
use gambit_server::Notifier;

// ── MockRules ───────────────────────────────────────────────────────

/// A scripted rules engine for driving the session without a chess engine.
pub struct MockRules {
    illegal: Vec<MoveRequest>,
    failing: Vec<MoveRequest>,
}

/// Position value of [`MockRules`]: the side to move plus the accepted move
/// history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockPosition {
    pub turn: Side,
    pub moves: Vec<String>,
}

impl MockRules {
    /// An engine that accepts every move.
    pub fn new() -> Self {
        Self {
            illegal: Vec::new(),
            failing: Vec::new(),
        }
    }

    /// Script `request` to be rejected as illegal.
    pub fn with_illegal(mut self, request: MoveRequest) -> Self {
        self.illegal.push(request);
        self
    }

    /// Script `request` to make the engine fail unexpectedly.
    pub fn with_failing(mut self, request: MoveRequest) -> Self {
        self.failing.push(request);
        self
    }
}

impl RulesEngine for MockRules {
    type Position = MockPosition;

    fn initial_position(&self) -> MockPosition {
        MockPosition {
            turn: Side::White,
            moves: Vec::new(),
        }
    }

    fn current_turn(&self, position: &MockPosition) -> Side {
        position.turn
    }

    fn apply(
        &self,
        position: &MockPosition,
        request: &MoveRequest,
    ) -> Result<MockPosition, RulesError> {
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

    fn serialize(&self, position: &MockPosition) -> String {
        let moves = if position.moves.is_empty() {
            "-".to_string()
        } else {
            position.moves.join("/")
        };
        format!("{} {}", moves, position.turn)
    }

    fn load(&self, text: &str) -> Result<MockPosition, RulesError> {
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
        Ok(MockPosition { turn, moves })
    }
}

// ── RecordingNotifier ───────────────────────────────────────────────

/// A [`Notifier`] that records every send.
///
/// A `None` recipient marks a broadcast.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<StdMutex<Vec<(Option<ConnectionId>, ServerMessage)>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything sent so far, in send order.
    pub fn sent(&self) -> Vec<(Option<ConnectionId>, ServerMessage)> {
        self.sent.lock().unwrap().clone()
    }

    /// Forget everything sent so far.
    pub fn clear(&self) {
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

// ── Helpers ─────────────────────────────────────────────────────────

/// A deterministic connection identity for tests.
pub fn conn(n: u128) -> ConnectionId {
    uuid::Uuid::from_u128(n)
}

/// Parse a move from compact text like `"e2e4"` or `"e7e8q"`.
pub fn mv(text: &str) -> MoveRequest {
    use gambit_server::protocol::Promotion;
    let promotion = match text.get(4..5) {
        Some("q") => Some(Promotion::Queen),
        Some("r") => Some(Promotion::Rook),
        Some("b") => Some(Promotion::Bishop),
        Some("n") => Some(Promotion::Knight),
        _ => None,
    };
    MoveRequest {
        from: text[0..2].parse().unwrap(),
        to: text[2..4].parse().unwrap(),
        promotion,
    }
}
