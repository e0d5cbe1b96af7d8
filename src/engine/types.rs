use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{Chips, PlayerId, RotationId};

/// Hand progression. `Waiting` is the between-hands rest state; `Dealing`
/// covers the whole mental-poker shuffle-and-deal exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GameStatus {
    Waiting,
    Dealing,
    PreFlop,
    Flop,
    Turn,
    River,
    Showdown,
}

impl GameStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            GameStatus::Waiting => "WAITING",
            GameStatus::Dealing => "DEALING",
            GameStatus::PreFlop => "PRE_FLOP",
            GameStatus::Flop => "FLOP",
            GameStatus::Turn => "TURN",
            GameStatus::River => "RIVER",
            GameStatus::Showdown => "SHOWDOWN",
        }
    }

    /// True during the four betting streets.
    pub fn is_betting(self) -> bool {
        matches!(
            self,
            GameStatus::PreFlop | GameStatus::Flop | GameStatus::Turn | GameStatus::River
        )
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WAITING" => Ok(GameStatus::Waiting),
            "DEALING" => Ok(GameStatus::Dealing),
            "PRE_FLOP" => Ok(GameStatus::PreFlop),
            "FLOP" => Ok(GameStatus::Flop),
            "TURN" => Ok(GameStatus::Turn),
            "RIVER" => Ok(GameStatus::River),
            "SHOWDOWN" => Ok(GameStatus::Showdown),
            _ => Err(()),
        }
    }
}

/// Blind sizes and table limits; the engine's slice of the table config.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableRules {
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub starting_stack: Chips,
    pub max_players: usize,
}

impl Default for TableRules {
    fn default() -> Self {
        Self {
            small_blind: 10,
            big_blind: 20,
            starting_stack: 1000,
            max_players: 6,
        }
    }
}

/// One seat. Persists across hands; per-hand fields are reset on hand start.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerState {
    pub id: PlayerId,
    pub rotation_id: RotationId,
    pub stack: Chips,
    pub current_round_bet: Chips,
    pub total_bet_this_hand: Chips,
    /// Stack as of the latest hand start; the refund and penalty base.
    pub stack_at_hand_start: Chips,
    pub is_ready: bool,
    pub is_active: bool,
    pub is_folded: bool,
    pub is_all_in: bool,
    /// Voluntary action taken on the current street. Blind posts do not
    /// count, which is what gives the big blind its pre-flop option.
    pub has_acted_this_round: bool,
}

impl PlayerState {
    pub fn new(id: PlayerId, stack: Chips) -> Self {
        Self {
            id,
            rotation_id: 0,
            stack,
            current_round_bet: 0,
            total_bet_this_hand: 0,
            stack_at_hand_start: stack,
            is_ready: false,
            is_active: true,
            is_folded: false,
            is_all_in: false,
            has_acted_this_round: false,
        }
    }

    /// Seated, connected, and still contesting the hand.
    pub fn in_hand(&self) -> bool {
        self.is_active && !self.is_folded
    }

    /// Allowed to take a betting action right now.
    pub fn can_act(&self) -> bool {
        self.in_hand() && !self.is_all_in
    }
}

/// A partitioned pot created by all-in play. `cap` is the per-player
/// contribution level the pot covers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidePot {
    pub amount: Chips,
    pub cap: Chips,
    pub eligible: Vec<PlayerId>,
}
