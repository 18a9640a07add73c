//! Transport front ends for the Gambit session protocol.
//!
//! The session core only speaks [`SessionHandle`](crate::session::SessionHandle)
//! and [`Notifier`](crate::notifier::Notifier); a transport front end accepts
//! connections, mints identities, and shuttles JSON text messages. Concrete
//! front ends live behind feature gates:
//!
//! | Feature                | Front end            |
//! |------------------------|----------------------|
//! | `transport-websocket`  | [`WebSocketServer`]  |

#[cfg(feature = "transport-websocket")]
pub mod websocket;

#[cfg(feature = "transport-websocket")]
pub use websocket::WebSocketServer;
