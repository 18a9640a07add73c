//! Notification fanout for the Gambit session protocol.
//!
//! The session core pushes [`ServerMessage`]s through the [`Notifier`]
//! capability and never touches transport internals. Sends are
//! fire-and-forget: no acknowledgment, no ordering guarantee between
//! recipients, and a recipient whose channel has closed is silently skipped.
//!
//! [`ChannelNotifier`] is the in-process implementation used by the shipped
//! WebSocket transport and by tests: one unbounded mpsc sender per
//! connection, registered by the transport when the connection is accepted
//! and removed when it goes away.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::protocol::{ConnectionId, ServerMessage};

/// Fire-and-forget delivery of server messages to connections.
///
/// Implementations must not block on delivery and must not fail: a message
/// to a vanished connection is simply dropped. This trait is object-safe so
/// `Box<dyn Notifier>` works, though the session is generic over it for the
/// common case.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    /// Deliver `message` to the single connection `recipient`.
    async fn notify(&self, recipient: ConnectionId, message: ServerMessage);

    /// Deliver `message` to every currently-connected identity.
    async fn broadcast(&self, message: ServerMessage);
}

// ── ChannelNotifier ─────────────────────────────────────────────────

/// A [`Notifier`] over per-connection unbounded mpsc channels.
///
/// Cloning is cheap and every clone shares the same connection table. The
/// transport layer calls [`register`](ChannelNotifier::register) before it
/// announces the connection to the session (so the admission notification
/// cannot be lost) and [`unregister`](ChannelNotifier::unregister) when the
/// connection closes.
#[derive(Debug, Clone, Default)]
pub struct ChannelNotifier {
    connections: Arc<Mutex<HashMap<ConnectionId, mpsc::UnboundedSender<ServerMessage>>>>,
}

impl ChannelNotifier {
    /// Create a notifier with no registered connections.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `id` and return the receiving half of its outbox.
    ///
    /// Re-registering an id replaces its previous outbox; the old receiver
    /// sees its channel close.
    pub fn register(&self, id: ConnectionId) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut connections) = self.connections.lock() {
            connections.insert(id, tx);
        }
        rx
    }

    /// Remove `id` from the connection table.
    ///
    /// Its outbox receiver drains any queued messages and then closes.
    pub fn unregister(&self, id: ConnectionId) {
        if let Ok(mut connections) = self.connections.lock() {
            connections.remove(&id);
        }
    }

    /// Number of currently-registered connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.lock().map(|c| c.len()).unwrap_or(0)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, recipient: ConnectionId, message: ServerMessage) {
        let Ok(connections) = self.connections.lock() else {
            return;
        };
        if let Some(tx) = connections.get(&recipient) {
            // Best-effort: a closed outbox means the connection is already
            // being torn down.
            if tx.send(message).is_err() {
                debug!(%recipient, "outbox closed, dropping message");
            }
        } else {
            debug!(%recipient, "no such connection, dropping message");
        }
    }

    async fn broadcast(&self, message: ServerMessage) {
        let Ok(connections) = self.connections.lock() else {
            return;
        };
        for (id, tx) in connections.iter() {
            if tx.send(message.clone()).is_err() {
                debug!(recipient = %id, "outbox closed, dropping broadcast copy");
            }
        }
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
    use uuid::Uuid;

    fn id(n: u128) -> ConnectionId {
        Uuid::from_u128(n)
    }

    #[tokio::test]
    async fn notify_reaches_only_the_recipient() {
        let notifier = ChannelNotifier::new();
        let mut rx1 = notifier.register(id(1));
        let mut rx2 = notifier.register(id(2));

        notifier
            .notify(id(1), ServerMessage::PlayerRole(Side::White))
            .await;

        assert_eq!(
            rx1.recv().await,
            Some(ServerMessage::PlayerRole(Side::White))
        );
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_reaches_every_connection() {
        let notifier = ChannelNotifier::new();
        let mut rx1 = notifier.register(id(1));
        let mut rx2 = notifier.register(id(2));
        let mut rx3 = notifier.register(id(3));

        notifier
            .broadcast(ServerMessage::BoardState("fen".into()))
            .await;

        for rx in [&mut rx1, &mut rx2, &mut rx3] {
            assert_eq!(
                rx.recv().await,
                Some(ServerMessage::BoardState("fen".into()))
            );
        }
    }

    #[tokio::test]
    async fn unregister_closes_the_outbox() {
        let notifier = ChannelNotifier::new();
        let mut rx = notifier.register(id(1));
        assert_eq!(notifier.connection_count(), 1);

        notifier.unregister(id(1));
        assert_eq!(notifier.connection_count(), 0);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn notify_unknown_connection_is_a_noop() {
        let notifier = ChannelNotifier::new();
        // Nothing registered — must not panic or error.
        notifier.notify(id(9), ServerMessage::SpectatorRole).await;
    }

    #[tokio::test]
    async fn broadcast_skips_dropped_receivers() {
        let notifier = ChannelNotifier::new();
        let rx1 = notifier.register(id(1));
        let mut rx2 = notifier.register(id(2));
        drop(rx1);

        notifier
            .broadcast(ServerMessage::Error("diag".into()))
            .await;

        // The live receiver still gets its copy.
        assert_eq!(rx2.recv().await, Some(ServerMessage::Error("diag".into())));
    }

    #[tokio::test]
    async fn reregistering_replaces_the_outbox() {
        let notifier = ChannelNotifier::new();
        let mut old_rx = notifier.register(id(1));
        let mut new_rx = notifier.register(id(1));

        notifier.notify(id(1), ServerMessage::SpectatorRole).await;

        assert_eq!(old_rx.recv().await, None);
        assert_eq!(new_rx.recv().await, Some(ServerMessage::SpectatorRole));
    }
}
