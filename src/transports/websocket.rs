//! WebSocket front end using `tokio-tungstenite`.
//!
//! [`WebSocketServer`] accepts WebSocket connections, mints a
//! [`ConnectionId`] per connection, and wires each one to the session: a
//! reader loop feeds inbound frames to the [`SessionHandle`], and a writer
//! task drains the connection's [`ChannelNotifier`] outbox back into the
//! socket. One JSON message per text frame.
//!
//! # Feature gate
//!
//! This module is only available when the `transport-websocket` feature is
//! enabled (it is enabled by default).
//!
//! # Example
//!
//! ```rust,ignore
//! use gambit_server::{ChannelNotifier, Session, WebSocketServer};
//!
//! let notifier = ChannelNotifier::new();
//! let (session, _worker) = Session::new(MyRules::new(), notifier.clone()).spawn();
//!
//! let server = WebSocketServer::bind("127.0.0.1:3000").await?;
//! server.serve(session, notifier).await?;
//! ```

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{GambitError, Result};
use crate::notifier::{ChannelNotifier, Notifier};
use crate::protocol::{ClientMessage, ConnectionId, ServerMessage};
use crate::session::SessionHandle;

/// A WebSocket listener that feeds connections into a session.
///
/// # Construction
///
/// Use [`WebSocketServer::bind`] to listen on an address, or
/// [`WebSocketServer::from_listener`] when you need to configure the
/// [`TcpListener`] yourself (e.g. port 0 in tests, socket options).
#[derive(Debug)]
pub struct WebSocketServer {
    listener: TcpListener,
}

impl WebSocketServer {
    /// Bind a listener on `addr` (e.g. `"127.0.0.1:3000"`).
    ///
    /// # Errors
    ///
    /// Returns [`GambitError::Io`] when the address cannot be bound.
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "listening for WebSocket connections");
        Ok(Self { listener })
    }

    /// Wrap an already-bound [`TcpListener`].
    #[must_use]
    pub fn from_listener(listener: TcpListener) -> Self {
        Self { listener }
    }

    /// The local address the server is listening on.
    ///
    /// Useful after binding port 0.
    ///
    /// # Errors
    ///
    /// Returns [`GambitError::Io`] when the underlying socket refuses to
    /// report its address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever, spawning one task per connection.
    ///
    /// Every accepted connection is registered with `notifier`, announced to
    /// `session`, and torn down (seat reclaimed, outbox removed) when its
    /// socket closes.
    ///
    /// # Errors
    ///
    /// Returns [`GambitError::Io`] when the accept loop itself fails;
    /// per-connection failures are logged and do not stop the server.
    pub async fn serve(self, session: SessionHandle, notifier: ChannelNotifier) -> Result<()> {
        loop {
            let (stream, peer) = self.listener.accept().await?;
            let session = session.clone();
            let notifier = notifier.clone();
            tokio::spawn(async move {
                if let Err(err) = handle_connection(stream, peer, session, notifier).await {
                    warn!(%peer, "connection ended with error: {err}");
                }
            });
        }
    }
}

/// Drive one WebSocket connection from handshake to teardown.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    session: SessionHandle,
    notifier: ChannelNotifier,
) -> Result<()> {
    let ws = tokio_tungstenite::accept_async(stream)
        .await
        .map_err(|e| GambitError::Handshake(e.to_string()))?;

    let identity: ConnectionId = Uuid::new_v4();
    info!(%peer, %identity, "connection accepted");

    // Register the outbox before announcing the connection so the admission
    // notification cannot be lost.
    let mut outbox = notifier.register(identity);
    if let Err(err) = session.connect(identity) {
        notifier.unregister(identity);
        return Err(err);
    }

    let (mut sink, mut frames) = ws.split();

    // Writer half: drains the outbox into the socket. Exits when the outbox
    // is unregistered or the peer stops accepting frames.
    let writer = tokio::spawn(async move {
        while let Some(message) = outbox.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(err) => {
                    // Serialization errors are programming bugs; don't kill the writer.
                    error!("failed to serialize server message: {err}");
                    continue;
                }
            };
            if sink.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    // Reader half: forward inbound frames to the session.
    while let Some(frame) = frames.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(err) => {
                debug!(%identity, "transport receive error: {err}");
                break;
            }
        };

        match frame {
            Message::Text(text) => {
                match serde_json::from_str::<ClientMessage>(text.as_str()) {
                    Ok(ClientMessage::Move(request)) => {
                        if session.submit_move(identity, request).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(%identity, "failed to deserialize client message: {err}");
                        notifier
                            .notify(identity, ServerMessage::Error("malformed message".into()))
                            .await;
                    }
                }
            }
            Message::Close(frame) => {
                debug!(%identity, ?frame, "received close frame");
                break;
            }
            Message::Ping(_) => {
                // tungstenite auto-queues a Pong reply; no manual response needed.
            }
            Message::Pong(_) => {}
            Message::Binary(_) => {
                warn!(%identity, "received unexpected binary frame, skipping");
            }
            Message::Frame(_) => {
                // Never produced by the read half; kept for exhaustiveness.
                debug!(%identity, "received raw frame, skipping");
            }
        }
    }

    notifier.unregister(identity);
    writer.abort();
    session.disconnect(identity)?;
    info!(%identity, "connection closed");
    Ok(())
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
    use crate::protocol::{MoveRequest, Side};
    use crate::rules::{RulesEngine, RulesError};
    use crate::session::Session;

    type WsClient = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    // ── Permissive rules engine ─────────────────────────────────────

    /// Accepts any move except one that stays on its own square; flips the
    /// turn on acceptance.
    struct AnyRules;

    #[derive(Debug, Clone)]
    struct AnyPosition {
        turn: Side,
        moves: Vec<String>,
    }

    impl RulesEngine for AnyRules {
        type Position = AnyPosition;

        fn initial_position(&self) -> AnyPosition {
            AnyPosition {
                turn: Side::White,
                moves: Vec::new(),
            }
        }

        fn current_turn(&self, position: &AnyPosition) -> Side {
            position.turn
        }

        fn apply(
            &self,
            position: &AnyPosition,
            request: &MoveRequest,
        ) -> std::result::Result<AnyPosition, RulesError> {
            if request.from == request.to {
                return Err(RulesError::IllegalMove);
            }
            let mut next = position.clone();
            next.moves.push(request.to_string());
            next.turn = position.turn.opposite();
            Ok(next)
        }

        fn serialize(&self, position: &AnyPosition) -> String {
            let moves = if position.moves.is_empty() {
                "-".to_string()
            } else {
                position.moves.join("/")
            };
            format!("{} {}", moves, position.turn)
        }

        fn load(&self, text: &str) -> std::result::Result<AnyPosition, RulesError> {
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
            Ok(AnyPosition { turn, moves })
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────

    /// Start a full server (session worker + WebSocket accept loop) on an
    /// ephemeral port and return its URL.
    async fn start_server() -> String {
        let notifier = ChannelNotifier::new();
        let (session, _worker) = Session::new(AnyRules, notifier.clone()).spawn();

        let server = WebSocketServer::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.serve(session, notifier));

        format!("ws://{addr}")
    }

    async fn connect(url: &str) -> WsClient {
        let (ws, _response) = tokio_tungstenite::connect_async(url).await.unwrap();
        ws
    }

    /// Read frames until the next JSON server message.
    async fn next_message(ws: &mut WsClient) -> ServerMessage {
        loop {
            match ws.next().await.expect("stream ended").expect("frame error") {
                Message::Text(text) => {
                    return serde_json::from_str(text.as_str()).expect("server message")
                }
                _ => continue,
            }
        }
    }

    async fn send(ws: &mut WsClient, message: &ClientMessage) {
        let json = serde_json::to_string(message).unwrap();
        ws.send(Message::Text(json.into())).await.unwrap();
    }

    fn mv(text: &str) -> MoveRequest {
        MoveRequest {
            from: text[0..2].parse().unwrap(),
            to: text[2..4].parse().unwrap(),
            promotion: None,
        }
    }

    // ── Tests ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn bind_fails_on_invalid_address() {
        let result = WebSocketServer::bind("definitely-not-an-address").await;
        assert!(matches!(result, Err(GambitError::Io(_))));
    }

    #[tokio::test]
    async fn roles_are_assigned_in_connection_order() {
        let url = start_server().await;

        let mut c1 = connect(&url).await;
        assert_eq!(
            next_message(&mut c1).await,
            ServerMessage::PlayerRole(Side::White)
        );

        let mut c2 = connect(&url).await;
        assert_eq!(
            next_message(&mut c2).await,
            ServerMessage::PlayerRole(Side::Black)
        );

        let mut c3 = connect(&url).await;
        assert_eq!(next_message(&mut c3).await, ServerMessage::SpectatorRole);
    }

    #[tokio::test]
    async fn accepted_move_reaches_every_connection() {
        let url = start_server().await;

        let mut c1 = connect(&url).await;
        let _ = next_message(&mut c1).await;
        let mut c2 = connect(&url).await;
        let _ = next_message(&mut c2).await;
        let mut c3 = connect(&url).await;
        let _ = next_message(&mut c3).await;

        let request = mv("e2e4");
        send(&mut c1, &ClientMessage::Move(request.clone())).await;

        for client in [&mut c1, &mut c2, &mut c3] {
            assert_eq!(
                next_message(client).await,
                ServerMessage::Move(request.clone())
            );
            assert_eq!(
                next_message(client).await,
                ServerMessage::BoardState("e2e4 b".into())
            );
        }
    }

    #[tokio::test]
    async fn rejected_move_answers_the_submitter_only() {
        let url = start_server().await;

        let mut c1 = connect(&url).await;
        let _ = next_message(&mut c1).await;
        let mut c2 = connect(&url).await;
        let _ = next_message(&mut c2).await;

        // Staying on the same square is AnyRules' one illegal move.
        let bad = mv("e2e2");
        send(&mut c1, &ClientMessage::Move(bad.clone())).await;
        assert_eq!(
            next_message(&mut c1).await,
            ServerMessage::InvalidMove(bad)
        );

        // c2 saw nothing: the very next message it receives is the broadcast
        // for a subsequent legal move.
        let good = mv("e2e4");
        send(&mut c1, &ClientMessage::Move(good.clone())).await;
        assert_eq!(next_message(&mut c2).await, ServerMessage::Move(good));
    }

    #[tokio::test]
    async fn malformed_frame_answers_with_an_error_message() {
        let url = start_server().await;

        let mut c1 = connect(&url).await;
        let _ = next_message(&mut c1).await;

        c1.send(Message::Text("this is not a move".into()))
            .await
            .unwrap();

        assert!(matches!(
            next_message(&mut c1).await,
            ServerMessage::Error(_)
        ));
    }

    #[tokio::test]
    async fn disconnect_frees_the_seat_for_the_next_connection() {
        let url = start_server().await;

        let mut c1 = connect(&url).await;
        let _ = next_message(&mut c1).await;
        let mut c2 = connect(&url).await;
        let _ = next_message(&mut c2).await;

        c1.close(None).await.unwrap();

        // The remaining client sees the position re-announced, unchanged.
        assert_eq!(
            next_message(&mut c2).await,
            ServerMessage::BoardState("- w".into())
        );

        // A fresh connection takes the freed seat.
        let mut c4 = connect(&url).await;
        assert_eq!(
            next_message(&mut c4).await,
            ServerMessage::PlayerRole(Side::White)
        );
    }

    #[tokio::test]
    async fn wrong_turn_submission_is_silently_discarded() {
        let url = start_server().await;

        let mut c1 = connect(&url).await;
        let _ = next_message(&mut c1).await;
        let mut c2 = connect(&url).await;
        let _ = next_message(&mut c2).await;

        // White to move; Black submits and must hear nothing back.
        send(&mut c2, &ClientMessage::Move(mv("e7e5"))).await;

        // Give the server a moment to process (and discard) it.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        // A legal White move afterwards is the next thing anyone sees.
        let good = mv("e2e4");
        send(&mut c1, &ClientMessage::Move(good.clone())).await;
        assert_eq!(next_message(&mut c2).await, ServerMessage::Move(good));
    }
}
