use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::messages::{CardView, ErrorPayload, GameStatePayload};

/// Outbound event envelope, same shape as the wire message envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub from: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub body: EventBody,
}

impl Event {
    pub fn new(from: impl Into<String>, body: EventBody) -> Self {
        Self {
            from: from.into(),
            timestamp: Utc::now(),
            body,
        }
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum EventBody {
    GameStateUpdate(GameStatePayload),
    PlayerJoined(PlayerJoinedEvent),
    PlayerLeft(PlayerLeftEvent),
    PlayerAction(PlayerActionEvent),
    NewHand(NewHandEvent),
    CommunityCard(CommunityCardEvent),
    Showdown(ShowdownEvent),
    Winner(WinnerEvent),
    TurnChange(TurnChangeEvent),
    BlindsPosted(BlindsPostedEvent),
    PlayerDisconnected(PlayerDisconnectedEvent),
    PlayerReconnected(PlayerReconnectedEvent),
    PlayerAbandoned(PlayerAbandonedEvent),
    GameAborted(GameAbortedEvent),
    PenaltyApplied(PenaltyAppliedEvent),
    Error(ErrorPayload),
}

impl EventBody {
    pub fn kind(&self) -> &'static str {
        match self {
            EventBody::GameStateUpdate(_) => "game_state_update",
            EventBody::PlayerJoined(_) => "player_joined",
            EventBody::PlayerLeft(_) => "player_left",
            EventBody::PlayerAction(_) => "player_action",
            EventBody::NewHand(_) => "new_hand",
            EventBody::CommunityCard(_) => "community_card",
            EventBody::Showdown(_) => "showdown",
            EventBody::Winner(_) => "winner",
            EventBody::TurnChange(_) => "turn_change",
            EventBody::BlindsPosted(_) => "blinds_posted",
            EventBody::PlayerDisconnected(_) => "player_disconnected",
            EventBody::PlayerReconnected(_) => "player_reconnected",
            EventBody::PlayerAbandoned(_) => "player_abandoned",
            EventBody::GameAborted(_) => "game_aborted",
            EventBody::PenaltyApplied(_) => "penalty_applied",
            EventBody::Error(_) => "error",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerJoinedEvent {
    pub player_id: String,
    pub stack: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerLeftEvent {
    pub player_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerActionEvent {
    pub player_id: String,
    pub action: String,
    #[serde(default)]
    pub amount: u64,
    pub new_pot: u64,
    pub new_stack: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewHandEvent {
    pub dealer_id: usize,
    pub small_blind: u64,
    pub big_blind: u64,
    pub player_count: usize,
    pub players: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityCardEvent {
    /// "flop", "turn", or "river".
    pub stage: String,
    pub cards: Vec<CardView>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowdownEvent {
    pub results: Vec<ShowdownSeatResult>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowdownSeatResult {
    pub player_id: String,
    pub hand: Vec<CardView>,
    pub hand_rank: String,
    pub rank: i32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinnerEvent {
    pub winners: Vec<WinnerData>,
    pub pot: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinnerData {
    pub player_id: String,
    pub amount: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hand_name: String,
    pub new_stack: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnChangeEvent {
    pub player_id: String,
    pub rotation_id: usize,
    pub valid_actions: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindsPostedEvent {
    pub small_blind_player: String,
    pub big_blind_player: String,
    pub small_blind_amount: u64,
    pub big_blind_amount: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerDisconnectedEvent {
    pub player_id: String,
    /// Grace interval rendered for clients, e.g. "300s".
    pub timeout: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerReconnectedEvent {
    pub player_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerAbandonedEvent {
    pub player_id: String,
    pub penalty_amount: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameAbortedEvent {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub abandoned_player: String,
    pub remaining_players: Vec<String>,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenaltyAppliedEvent {
    pub abandoned_player: String,
    pub penalty_amount: u64,
    /// player id → amount credited.
    pub distribution: Vec<(String, u64)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_envelope_carries_snake_case_tags() {
        let event = Event::new(
            "table-0",
            EventBody::BlindsPosted(BlindsPostedEvent {
                small_blind_player: "p0".into(),
                big_blind_player: "p1".into(),
                small_blind_amount: 10,
                big_blind_amount: 20,
            }),
        );
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["type"], "blinds_posted");
        assert_eq!(json["payload"]["big_blind_amount"], 20);
    }

    #[test]
    fn aborted_event_round_trips() {
        let event = Event::new(
            "table-0",
            EventBody::GameAborted(GameAbortedEvent {
                abandoned_player: "p1".into(),
                remaining_players: vec!["p0".into()],
                reason: "abandonment".into(),
            }),
        );
        let bytes = event.to_bytes().expect("bytes");
        let back: Event = serde_json::from_slice(&bytes).expect("parse");
        assert_eq!(back.body, event.body);
        assert_eq!(back.body.kind(), "game_aborted");
    }
}
