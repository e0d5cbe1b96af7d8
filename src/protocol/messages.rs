use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::b64;

/// Wire envelope for peer-to-peer traffic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub from: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub body: MessageBody,
}

impl Message {
    pub fn new(from: impl Into<String>, body: MessageBody) -> Self {
        Self {
            from: from.into(),
            timestamp: Utc::now(),
            body,
        }
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MessageBody {
    Handshake(HandshakePayload),
    PlayerReady(PlayerReadyPayload),
    PlayerAction(PlayerActionPayload),
    EncDeck(DeckPayload),
    ShuffleStatus(DeckPayload),
    GetRpc(GetRpcPayload),
    RpcResponse(RpcResponsePayload),
    RevealKeys(RevealKeysPayload),
    ShowdownResult(ShowdownResultPayload),
    GameState(GameStatePayload),
    Ping(PingPayload),
    Pong(PongPayload),
    Error(ErrorPayload),
}

impl MessageBody {
    /// Wire tag, mostly for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            MessageBody::Handshake(_) => "handshake",
            MessageBody::PlayerReady(_) => "player_ready",
            MessageBody::PlayerAction(_) => "player_action",
            MessageBody::EncDeck(_) => "enc_deck",
            MessageBody::ShuffleStatus(_) => "shuffle_status",
            MessageBody::GetRpc(_) => "get_rpc",
            MessageBody::RpcResponse(_) => "rpc_response",
            MessageBody::RevealKeys(_) => "reveal_keys",
            MessageBody::ShowdownResult(_) => "showdown_result",
            MessageBody::GameState(_) => "game_state",
            MessageBody::Ping(_) => "ping",
            MessageBody::Pong(_) => "pong",
            MessageBody::Error(_) => "error",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakePayload {
    pub version: String,
    pub game_variant: String,
    pub listen_addr: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerReadyPayload {
    pub player_id: String,
}

/// The sender claims this action at the status they believe is current; the
/// receiver validates both against local state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerActionPayload {
    pub action: String,
    #[serde(default)]
    pub value: u64,
    pub current_game_status: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckPayload {
    #[serde(with = "b64")]
    pub deck: Vec<Vec<u8>>,
}

/// Request for partial decryption of specific deck slots.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetRpcPayload {
    pub card_indices: Vec<usize>,
    #[serde(with = "b64")]
    pub encrypted_data: Vec<Vec<u8>>,
    pub original_owner: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcResponsePayload {
    pub card_indices: Vec<usize>,
    #[serde(with = "b64")]
    pub decrypted_data: Vec<Vec<u8>>,
}

/// Broadcast on fold and at showdown. Components are hex big-integers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealKeysPayload {
    pub encryption_key: String,
    pub decryption_key: String,
    pub prime: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowdownResultPayload {
    pub player_addr: String,
    pub hand_rank: i32,
    pub hand_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cards: Vec<String>,
}

/// On-change snapshot for peer resynchronization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStatePayload {
    pub status: String,
    pub current_pot: u64,
    pub highest_bet: u64,
    pub current_turn: usize,
    pub dealer_id: usize,
    pub community_cards: Vec<CardView>,
    pub players: Vec<SeatView>,
}

/// One card rendered for clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardView {
    pub suit: String,
    pub value: u8,
    pub display: String,
}

/// Public per-seat view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatView {
    pub player_id: String,
    pub rotation_id: usize,
    pub stack: u64,
    pub current_bet: u64,
    pub is_active: bool,
    pub is_folded: bool,
    pub is_all_in: bool,
    pub is_ready: bool,
    pub is_dealer: bool,
    pub is_current_turn: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingPayload {
    pub timestamp: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PongPayload {
    pub timestamp: i64,
    pub ping_timestamp: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidMessage,
    InvalidAction,
    NotYourTurn,
    InsufficientFunds,
    GameNotStarted,
    PlayerNotFound,
    AlreadyInGame,
    GameFull,
    InternalError,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub details: String,
}

impl ErrorPayload {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_round_trips_with_exact_field_names() {
        let msg = Message::new(
            "127.0.0.1:3000",
            MessageBody::PlayerAction(PlayerActionPayload {
                action: "raise".into(),
                value: 60,
                current_game_status: "PRE_FLOP".into(),
            }),
        );
        let json = serde_json::to_value(&msg).expect("serialize");
        assert_eq!(json["type"], "player_action");
        assert_eq!(json["from"], "127.0.0.1:3000");
        assert_eq!(json["payload"]["action"], "raise");
        assert_eq!(json["payload"]["value"], 60);
        assert!(json["timestamp"].is_string());

        let back = Message::from_bytes(&msg.to_bytes().expect("bytes")).expect("parse");
        assert_eq!(back.body, msg.body);
    }

    #[test]
    fn deck_payload_is_base64() {
        let msg = Message::new(
            "peer-a",
            MessageBody::EncDeck(DeckPayload {
                deck: vec![vec![0x00, 0xFF], vec![0x2A]],
            }),
        );
        let json = serde_json::to_value(&msg).expect("serialize");
        assert_eq!(json["payload"]["deck"][0], "AP8=");
        assert_eq!(json["payload"]["deck"][1], "Kg==");

        let back = Message::from_bytes(&msg.to_bytes().expect("bytes")).expect("parse");
        assert_eq!(back.body, msg.body);
    }

    #[test]
    fn error_codes_serialize_screaming() {
        let payload = ErrorPayload::new(ErrorCode::NotYourTurn, "wait");
        let json = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(json["code"], "NOT_YOUR_TURN");
    }

    #[test]
    fn timestamp_parses_rfc3339() {
        let raw = r#"{
            "type": "ping",
            "from": "peer-b",
            "payload": {"timestamp": 1700000000},
            "timestamp": "2026-01-02T03:04:05Z"
        }"#;
        let msg: Message = serde_json::from_str(raw).expect("parse");
        assert_eq!(msg.body.kind(), "ping");
        assert_eq!(msg.timestamp.timestamp(), 1767323045);
    }
}
