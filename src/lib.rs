//! # Gambit Server
//!
//! Transport-agnostic Rust server for the Gambit realtime chess session
//! protocol: one authoritative game, two player seats, any number of
//! observers.
//!
//! The server admits connections in arrival order (first two become players,
//! the rest observe), enforces per-turn move authority, delegates move
//! validation to a pluggable rules engine, and fans resulting state out to
//! every connection as JSON text messages.
//!
//! ## Features
//!
//! - **Transport-agnostic** — the core depends only on the [`Notifier`]
//!   capability and a [`SessionHandle`]; implement them for any backend
//! - **Pluggable rules** — implement the [`RulesEngine`] trait for any game
//!   engine that can apply a move and serialize a position
//! - **Single authoritative state** — all events flow through one worker
//!   task, processed strictly in arrival order
//! - **WebSocket built-in** — default `transport-websocket` feature provides
//!   [`WebSocketServer`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! let notifier = ChannelNotifier::new();
//! let (session, _worker) = Session::new(MyRules::new(), notifier.clone()).spawn();
//!
//! let server = WebSocketServer::bind("127.0.0.1:3000").await?;
//! server.serve(session, notifier).await?;
//! ```

pub mod error;
pub mod notifier;
pub mod protocol;
pub mod registry;
pub mod rules;
pub mod session;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use error::GambitError;
pub use notifier::{ChannelNotifier, Notifier};
pub use protocol::{ClientMessage, ConnectionId, MoveRequest, Promotion, ServerMessage, Side, Square};
pub use registry::{SeatMap, SessionRegistry};
pub use rules::{RulesEngine, RulesError};
pub use session::{Session, SessionEvent, SessionHandle};

#[cfg(feature = "transport-websocket")]
pub use transports::websocket::WebSocketServer;
