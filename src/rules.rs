//! Rules engine capability for the Gambit session protocol.
//!
//! The [`RulesEngine`] trait is the seam between the session core and the
//! game rules. The core never inspects a position: it asks the engine whose
//! turn it is, hands it move requests, and stores whatever position value
//! the engine produces. Plug in a real chess engine (anything that can
//! apply a move and emit FEN) or a scripted engine for tests.
//!
//! # Implementing an Engine
//!
//! ```rust,no_run
//! use gambit_server::protocol::{MoveRequest, Side};
//! use gambit_server::rules::{RulesEngine, RulesError};
//!
//! struct MyRules { /* ... */ }
//! #[derive(Clone)]
//! struct MyPosition { /* ... */ }
//!
//! impl RulesEngine for MyRules {
//!     type Position = MyPosition;
//!
//!     fn initial_position(&self) -> MyPosition {
//!         // The starting position of a fresh game
//!         todo!()
//!     }
//!
//!     fn current_turn(&self, position: &MyPosition) -> Side {
//!         // Which side moves next in `position`
//!         todo!()
//!     }
//!
//!     fn apply(
//!         &self,
//!         position: &MyPosition,
//!         request: &MoveRequest,
//!     ) -> Result<MyPosition, RulesError> {
//!         // The position after `request`, or `RulesError::IllegalMove`
//!         todo!()
//!     }
//!
//!     fn serialize(&self, position: &MyPosition) -> String {
//!         // Canonical string form (FEN for standard chess)
//!         todo!()
//!     }
//!
//!     fn load(&self, text: &str) -> Result<MyPosition, RulesError> {
//!         // Reconstruct a position from its canonical string form
//!         todo!()
//!     }
//! }
//! ```

use thiserror::Error;

use crate::protocol::{MoveRequest, Side};

/// Errors produced by a rules engine.
#[derive(Debug, Error)]
pub enum RulesError {
    /// The move is not legal in the given position.
    ///
    /// This is the clean-rejection outcome: the session reports it to the
    /// submitter as an `invalidMove` and changes nothing.
    #[error("illegal move")]
    IllegalMove,

    /// A serialized position string could not be parsed back into a position.
    #[error("malformed position: {0}")]
    MalformedPosition(String),

    /// The engine failed in a way that is not a clean rejection.
    ///
    /// Treated like a rejection by the session (no state change, no
    /// broadcast) but reported to the submitter as a generic `error`.
    #[error("rules engine failure: {0}")]
    Engine(String),
}

/// An external game-rules capability.
///
/// Implementations must behave as pure functions over the position value:
/// [`apply`](RulesEngine::apply) returns a *new* position and must not carry
/// hidden mutable state between calls, because the session registry owns the
/// single authoritative position and replaces it wholesale on acceptance.
///
/// # Canonical serialization
///
/// [`serialize`](RulesEngine::serialize) must emit a string that fully
/// describes the position (placement, side to move, and any auxiliary rules
/// state) such that [`load`](RulesEngine::load) reconstructs an equivalent
/// position and re-serializing it yields the byte-identical string.
pub trait RulesEngine: Send + 'static {
    /// Opaque position value owned by the engine.
    type Position: Send;

    /// The starting position of a fresh game.
    fn initial_position(&self) -> Self::Position;

    /// The side to move in `position`.
    fn current_turn(&self, position: &Self::Position) -> Side;

    /// Validate `request` against `position` and produce the resulting
    /// position.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::IllegalMove`] for a clean rejection, or
    /// [`RulesError::Engine`] when evaluation fails unexpectedly. Either way
    /// `position` is untouched.
    fn apply(
        &self,
        position: &Self::Position,
        request: &MoveRequest,
    ) -> Result<Self::Position, RulesError>;

    /// Canonical string form of `position`.
    fn serialize(&self, position: &Self::Position) -> String;

    /// Reconstruct a position from its canonical string form.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::MalformedPosition`] when `text` is not a
    /// serialization this engine produced.
    fn load(&self, text: &str) -> Result<Self::Position, RulesError>;
}
