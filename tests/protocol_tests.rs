#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Wire-format tests for the Gambit session protocol.
//!
//! Verifies round-trip serialization of every message variant, the exact
//! JSON fixtures clients see on the wire, and square/promotion parsing edge
//! cases.

use gambit_server::protocol::{
    ClientMessage, MoveRequest, Promotion, ServerMessage, Side, Square,
};

// ── Helpers ─────────────────────────────────────────────────────────

/// Serialize `val` to JSON, then deserialize back to `T` and return it.
fn round_trip<T: serde::Serialize + serde::de::DeserializeOwned>(val: &T) -> T {
    let json = serde_json::to_string(val).expect("serialize");
    serde_json::from_str(&json).expect("deserialize")
}

fn square(text: &str) -> Square {
    text.parse().expect("square")
}

fn e2e4() -> MoveRequest {
    MoveRequest {
        from: square("e2"),
        to: square("e4"),
        promotion: None,
    }
}

// ── Square parsing ──────────────────────────────────────────────────

#[test]
fn square_parses_the_board_corners() {
    for text in ["a1", "a8", "h1", "h8"] {
        let sq = square(text);
        assert_eq!(sq.to_string(), text);
    }
}

#[test]
fn square_exposes_zero_based_indices() {
    let sq = square("e2");
    assert_eq!(sq.file(), 4);
    assert_eq!(sq.rank(), 1);
}

#[test]
fn square_rejects_malformed_text() {
    for text in ["", "e", "e22", "i1", "a9", "a0", "E2", "e 2", "22", "ee"] {
        assert!(
            text.parse::<Square>().is_err(),
            "expected {text:?} to be rejected"
        );
    }
}

#[test]
fn square_deserialization_rejects_malformed_json() {
    let result = serde_json::from_str::<Square>("\"z9\"");
    assert!(result.is_err());
}

#[test]
fn square_serializes_as_a_plain_string() {
    let json = serde_json::to_string(&square("c7")).unwrap();
    assert_eq!(json, "\"c7\"");
}

// ── Side & Promotion ────────────────────────────────────────────────

#[test]
fn side_serializes_as_single_letters() {
    assert_eq!(serde_json::to_string(&Side::White).unwrap(), "\"w\"");
    assert_eq!(serde_json::to_string(&Side::Black).unwrap(), "\"b\"");
}

#[test]
fn side_opposite_flips_both_ways() {
    assert_eq!(Side::White.opposite(), Side::Black);
    assert_eq!(Side::Black.opposite(), Side::White);
}

#[test]
fn promotion_serializes_as_piece_letters() {
    let cases = [
        (Promotion::Queen, "\"q\""),
        (Promotion::Rook, "\"r\""),
        (Promotion::Bishop, "\"b\""),
        (Promotion::Knight, "\"n\""),
    ];
    for (piece, expected) in cases {
        assert_eq!(serde_json::to_string(&piece).unwrap(), expected);
    }
}

// ── MoveRequest ─────────────────────────────────────────────────────

#[test]
fn move_request_round_trip() {
    let request = e2e4();
    assert_eq!(round_trip(&request), request);
}

#[test]
fn move_request_omits_absent_promotion() {
    let json = serde_json::to_string(&e2e4()).unwrap();
    assert_eq!(json, r#"{"from":"e2","to":"e4"}"#);
}

#[test]
fn move_request_carries_a_promotion_hint() {
    let request = MoveRequest {
        from: square("e7"),
        to: square("e8"),
        promotion: Some(Promotion::Queen),
    };
    let json = serde_json::to_string(&request).unwrap();
    assert_eq!(json, r#"{"from":"e7","to":"e8","promotion":"q"}"#);
    assert_eq!(round_trip(&request), request);
}

#[test]
fn move_request_display_is_compact_algebraic() {
    assert_eq!(e2e4().to_string(), "e2e4");
    let promoting = MoveRequest {
        from: square("a7"),
        to: square("a8"),
        promotion: Some(Promotion::Knight),
    };
    assert_eq!(promoting.to_string(), "a7a8n");
}

// ── ClientMessage ───────────────────────────────────────────────────

#[test]
fn client_move_wire_fixture() {
    let msg = ClientMessage::Move(e2e4());
    let json = serde_json::to_string(&msg).unwrap();
    assert_eq!(json, r#"{"type":"move","data":{"from":"e2","to":"e4"}}"#);
    assert_eq!(round_trip(&msg), msg);
}

#[test]
fn client_message_rejects_unknown_type() {
    let result = serde_json::from_str::<ClientMessage>(r#"{"type":"teleport","data":{}}"#);
    assert!(result.is_err());
}

#[test]
fn client_message_rejects_malformed_square() {
    let result =
        serde_json::from_str::<ClientMessage>(r#"{"type":"move","data":{"from":"zz","to":"e4"}}"#);
    assert!(result.is_err());
}

// ── ServerMessage wire fixtures ─────────────────────────────────────

#[test]
fn player_role_wire_fixture() {
    let msg = ServerMessage::PlayerRole(Side::White);
    let json = serde_json::to_string(&msg).unwrap();
    assert_eq!(json, r#"{"type":"playerRole","data":"w"}"#);
    assert_eq!(round_trip(&msg), msg);
}

#[test]
fn spectator_role_wire_fixture() {
    let msg = ServerMessage::SpectatorRole;
    let json = serde_json::to_string(&msg).unwrap();
    assert_eq!(json, r#"{"type":"spectatorRole"}"#);
    assert_eq!(round_trip(&msg), msg);
}

#[test]
fn move_broadcast_wire_fixture() {
    let msg = ServerMessage::Move(e2e4());
    let json = serde_json::to_string(&msg).unwrap();
    assert_eq!(json, r#"{"type":"move","data":{"from":"e2","to":"e4"}}"#);
    assert_eq!(round_trip(&msg), msg);
}

#[test]
fn board_state_wire_fixture() {
    let fen = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
    let msg = ServerMessage::BoardState(fen.to_string());
    let json = serde_json::to_string(&msg).unwrap();
    assert_eq!(json, format!(r#"{{"type":"boardState","data":"{fen}"}}"#));
    assert_eq!(round_trip(&msg), msg);
}

#[test]
fn invalid_move_wire_fixture() {
    let msg = ServerMessage::InvalidMove(e2e4());
    let json = serde_json::to_string(&msg).unwrap();
    assert_eq!(
        json,
        r#"{"type":"invalidMove","data":{"from":"e2","to":"e4"}}"#
    );
    assert_eq!(round_trip(&msg), msg);
}

#[test]
fn error_wire_fixture() {
    let msg = ServerMessage::Error("move could not be processed".into());
    let json = serde_json::to_string(&msg).unwrap();
    assert_eq!(
        json,
        r#"{"type":"error","data":"move could not be processed"}"#
    );
    assert_eq!(round_trip(&msg), msg);
}

#[test]
fn server_message_rejects_unknown_type() {
    let result = serde_json::from_str::<ServerMessage>(r#"{"type":"checkmate"}"#);
    assert!(result.is_err());
}
