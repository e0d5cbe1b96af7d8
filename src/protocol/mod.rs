//! Peer-to-peer wire messages and outbound client events.
//!
//! Both directions share one envelope shape: `{type, from, payload,
//! timestamp}` with an RFC3339 timestamp. Deck payloads are base64 strings;
//! key material travels as hex big-integers.

mod events;
mod messages;

pub use events::{
    BlindsPostedEvent, CommunityCardEvent, Event, EventBody, GameAbortedEvent, NewHandEvent,
    PenaltyAppliedEvent, PlayerAbandonedEvent, PlayerActionEvent, PlayerDisconnectedEvent,
    PlayerJoinedEvent, PlayerLeftEvent, PlayerReconnectedEvent, ShowdownEvent,
    ShowdownSeatResult, TurnChangeEvent, WinnerData, WinnerEvent,
};
pub use messages::{
    CardView, DeckPayload, ErrorCode, ErrorPayload, GameStatePayload, GetRpcPayload,
    HandshakePayload, Message, MessageBody, PingPayload, PlayerActionPayload, PlayerReadyPayload,
    PongPayload, RevealKeysPayload, RpcResponsePayload, SeatView, ShowdownResultPayload,
};

pub(crate) mod b64 {
    //! Serde adapter: `Vec<Vec<u8>>` as a JSON array of base64 strings.

    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(payloads: &[Vec<u8>], ser: S) -> Result<S::Ok, S::Error> {
        let encoded: Vec<String> = payloads.iter().map(|p| STANDARD.encode(p)).collect();
        ser.collect_seq(encoded)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<Vec<u8>>, D::Error> {
        let encoded = Vec::<String>::deserialize(de)?;
        encoded
            .into_iter()
            .map(|s| STANDARD.decode(s).map_err(D::Error::custom))
            .collect()
    }
}
