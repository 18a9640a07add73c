//! Error types for the Gambit server.

use thiserror::Error;

use crate::protocol::Side;

/// Errors that can occur when using the Gambit server.
#[derive(Debug, Error)]
pub enum GambitError {
    /// A square string was not a valid algebraic square.
    #[error("invalid square {0:?}: expected file 'a'-'h' followed by rank '1'-'8'")]
    InvalidSquare(String),

    /// Attempted to assign a seat that already has an occupant.
    ///
    /// Admission only assigns to open seats, so this never surfaces in
    /// normal operation; callers treat it as a non-fatal no-op.
    #[error("seat {side} is already occupied")]
    SeatOccupied {
        /// The seat that was already taken.
        side: Side,
    },

    /// The session worker is no longer running.
    #[error("session is no longer running")]
    SessionClosed,

    /// Failed to serialize or deserialize a protocol message.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A transport handshake could not be completed.
    #[error("handshake error: {0}")]
    Handshake(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for Gambit server operations.
pub type Result<T> = std::result::Result<T, GambitError>;
