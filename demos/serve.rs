//! # WebSocket Server Demo
//!
//! Runs a complete Gambit session server:
//!
//! 1. Build a rules engine (a permissive turn-taking engine here — plug in
//!    a real chess engine for a real deployment)
//! 2. Spawn the session worker
//! 3. Serve WebSocket connections until Ctrl+C
//!
//! ## Running
//!
//! ```sh
//! cargo run --example serve
//!
//! # Override the bind address:
//! GAMBIT_ADDR=0.0.0.0:3000 cargo run --example serve
//! ```
//!
//! Connect clients with any WebSocket tool and send
//! `{"type":"move","data":{"from":"e2","to":"e4"}}`.

use gambit_server::protocol::{MoveRequest, Side};
use gambit_server::rules::{RulesEngine, RulesError};
use gambit_server::{ChannelNotifier, Session, WebSocketServer};

/// Default bind address when `GAMBIT_ADDR` is not set.
const DEFAULT_ADDR: &str = "127.0.0.1:3000";

// ── Demo rules engine ───────────────────────────────────────────────
// Alternates turns and accepts every move that leaves its square. A real
// deployment implements `RulesEngine` over an actual chess engine.

struct CasualRules;

#[derive(Debug, Clone)]
struct CasualPosition {
    turn: Side,
    moves: Vec<String>,
}

impl RulesEngine for CasualRules {
    type Position = CasualPosition;

    fn initial_position(&self) -> CasualPosition {
        CasualPosition {
            turn: Side::White,
            moves: Vec::new(),
        }
    }

    fn current_turn(&self, position: &CasualPosition) -> Side {
        position.turn
    }

    fn apply(
        &self,
        position: &CasualPosition,
        request: &MoveRequest,
    ) -> Result<CasualPosition, RulesError> {
        if request.from == request.to {
            return Err(RulesError::IllegalMove);
        }
        let mut next = position.clone();
        next.moves.push(request.to_string());
        next.turn = position.turn.opposite();
        Ok(next)
    }

    fn serialize(&self, position: &CasualPosition) -> String {
        let moves = if position.moves.is_empty() {
            "-".to_string()
        } else {
            position.moves.join("/")
        };
        format!("{} {}", moves, position.turn)
    }

    fn load(&self, text: &str) -> Result<CasualPosition, RulesError> {
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
        Ok(CasualPosition { turn, moves })
    }
}

// ── Main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Initialize tracing. Set `RUST_LOG=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let addr = std::env::var("GAMBIT_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());

    // ── Session ─────────────────────────────────────────────────────
    // One authoritative session for the process lifetime.
    let notifier = ChannelNotifier::new();
    let (session, _worker) = Session::new(CasualRules, notifier.clone()).spawn();

    // ── Serve ───────────────────────────────────────────────────────
    let server = WebSocketServer::bind(&addr).await?;
    tracing::info!("Gambit server listening on ws://{addr}");

    tokio::select! {
        result = server.serve(session, notifier) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl+C received, shutting down");
        }
    }

    Ok(())
}
