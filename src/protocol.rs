//! Wire types for the Gambit realtime chess session protocol.
//!
//! Every message is one JSON object per transport frame, adjacently tagged
//! with `"type"`/`"data"`. Payload shapes match the protocol's v1 wire
//! format:
//!
//! - sides travel as `"w"` / `"b"`
//! - squares travel as two-character algebraic strings (`"e2"`)
//! - the board state travels as the engine's canonical position string
//!   (FEN for a standard chess engine)

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GambitError;

// ── Type aliases ────────────────────────────────────────────────────

/// Unique identifier for a live connection.
///
/// Minted by the transport layer at accept time; the session core only
/// stores and compares it.
pub type ConnectionId = Uuid;

// ── Enums ───────────────────────────────────────────────────────────

/// One of the two move-authority seats in a session.
///
/// `White` moves first. Serializes to the single letters `"w"` / `"b"`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Side {
    #[serde(rename = "w")]
    White,
    #[serde(rename = "b")]
    Black,
}

impl Side {
    /// The seat that moves after this one.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }

    /// The wire letter for this side.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::White => "w",
            Self::Black => "b",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Piece kind a pawn promotes to, as hinted by the client.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Promotion {
    #[serde(rename = "q")]
    Queen,
    #[serde(rename = "r")]
    Rook,
    #[serde(rename = "b")]
    Bishop,
    #[serde(rename = "n")]
    Knight,
}

impl Promotion {
    /// The wire letter for this promotion piece.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queen => "q",
            Self::Rook => "r",
            Self::Bishop => "b",
            Self::Knight => "n",
        }
    }
}

// ── Structs ─────────────────────────────────────────────────────────

/// A board square in algebraic notation.
///
/// Validated at construction: file `'a'..='h'`, rank `'1'..='8'`. Serde goes
/// through the string form, so a malformed square fails deserialization of
/// the whole message instead of reaching the session core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Square {
    file: u8,
    rank: u8,
}

impl Square {
    /// Zero-based file index (`0` = file a).
    #[must_use]
    pub fn file(self) -> u8 {
        self.file
    }

    /// Zero-based rank index (`0` = rank 1).
    #[must_use]
    pub fn rank(self) -> u8 {
        self.rank
    }
}

impl FromStr for Square {
    type Err = GambitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next(), chars.next()) {
            (Some(file @ 'a'..='h'), Some(rank @ '1'..='8'), None) => Ok(Self {
                file: file as u8 - b'a',
                rank: rank as u8 - b'1',
            }),
            _ => Err(GambitError::InvalidSquare(s.to_string())),
        }
    }
}

impl TryFrom<String> for Square {
    type Error = GambitError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Square> for String {
    fn from(square: Square) -> Self {
        square.to_string()
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            (b'a' + self.file) as char,
            (b'1' + self.rank) as char
        )
    }
}

/// A move as submitted by a client, passed through to the rules engine and
/// rebroadcast unmodified on acceptance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MoveRequest {
    pub from: Square,
    pub to: Square,
    /// Promotion hint; only meaningful for pawn moves onto the last rank.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<Promotion>,
}

impl fmt::Display for MoveRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(promotion) = self.promotion {
            f.write_str(promotion.as_str())?;
        }
        Ok(())
    }
}

// ── Messages ────────────────────────────────────────────────────────

/// Message types sent from a client to the server.
///
/// Connection and disconnection are implicit transport lifecycle events, so
/// the only explicit inbound message is a move submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Submit a move for the current position.
    Move(MoveRequest),
}

/// Message types sent from the server to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    /// The connection holds a player seat (sent once, at admission).
    PlayerRole(Side),
    /// The connection is a read-only observer (sent once, at admission).
    SpectatorRole,
    /// An accepted move, exactly as submitted.
    Move(MoveRequest),
    /// The canonical serialized position after a mutation (or a
    /// re-announcement after a disconnect).
    BoardState(String),
    /// The submitted move was rejected by the rules engine.
    InvalidMove(MoveRequest),
    /// A request could not be processed; human-readable diagnostic.
    Error(String),
}
