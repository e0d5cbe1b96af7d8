use std::collections::BTreeMap;

use tracing::info;

use crate::domain::{Card, Chips, PlayerId, RotationId};
use crate::protocol::{CardView, GameStatePayload, SeatView};

use super::errors::StateError;
use super::types::{GameStatus, PlayerState, SidePot, TableRules};

const LOG_TARGET: &str = "engine::state";

/// Blind postings reported when a hand starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandStart {
    pub dealer: RotationId,
    pub small_blind_player: PlayerId,
    pub small_blind_posted: Chips,
    pub big_blind_player: PlayerId,
    pub big_blind_posted: Chips,
    /// Players in rotation order.
    pub players: Vec<PlayerId>,
}

/// The per-table game aggregate: seats, rotation, and the live hand.
///
/// Pure and synchronous; the table coordinator serializes access under its
/// lock and performs all I/O. Stacks are mutated only here.
#[derive(Clone, Debug)]
pub struct GameEngine {
    pub(super) rules: TableRules,
    pub(super) players: BTreeMap<PlayerId, PlayerState>,
    /// Dense seat order for the current hand; index is the rotation id.
    pub(super) rotation: Vec<PlayerId>,
    pub(super) status: GameStatus,
    pub(super) dealer: RotationId,
    pub(super) current_turn: RotationId,
    pub(super) last_raiser: RotationId,
    pub(super) current_pot: Chips,
    pub(super) highest_bet: Chips,
    pub(super) last_raise_amount: Chips,
    pub(super) community_cards: Vec<Card>,
    pub(super) side_pots: Vec<SidePot>,
    pub(super) hands_played: u64,
}

impl GameEngine {
    pub fn new(rules: TableRules) -> Self {
        Self {
            rules,
            players: BTreeMap::new(),
            rotation: Vec::new(),
            status: GameStatus::Waiting,
            dealer: 0,
            current_turn: 0,
            last_raiser: 0,
            current_pot: 0,
            highest_bet: 0,
            last_raise_amount: rules.big_blind,
            community_cards: Vec::new(),
            side_pots: Vec::new(),
            hands_played: 0,
        }
    }

    pub fn rules(&self) -> &TableRules {
        &self.rules
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub(super) fn set_status(&mut self, status: GameStatus) {
        if self.status != status {
            info!(target = LOG_TARGET, status = %status, "game status changed");
            self.status = status;
        }
    }

    pub fn current_pot(&self) -> Chips {
        self.current_pot
    }

    pub fn highest_bet(&self) -> Chips {
        self.highest_bet
    }

    pub fn dealer(&self) -> RotationId {
        self.dealer
    }

    pub fn current_turn(&self) -> RotationId {
        self.current_turn
    }

    /// Seat of the last aggressor this street (the big blind right after
    /// posting).
    pub fn last_raiser(&self) -> RotationId {
        self.last_raiser
    }

    pub fn community_cards(&self) -> &[Card] {
        &self.community_cards
    }

    pub fn side_pots(&self) -> &[SidePot] {
        &self.side_pots
    }

    pub fn player(&self, id: &str) -> Option<&PlayerState> {
        self.players.get(id)
    }

    pub(super) fn player_mut(&mut self, id: &str) -> Option<&mut PlayerState> {
        self.players.get_mut(id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Seat order of the current hand.
    pub fn rotation(&self) -> &[PlayerId] {
        &self.rotation
    }

    pub fn id_at(&self, rotation_id: RotationId) -> Option<&PlayerId> {
        self.rotation.get(rotation_id)
    }

    pub(super) fn seat(&self, rotation_id: RotationId) -> Option<&PlayerState> {
        self.id_at(rotation_id).and_then(|id| self.players.get(id))
    }

    // ------------------------------------------------------------------
    // Seating
    // ------------------------------------------------------------------

    /// Seat a new player, or reactivate a returning one.
    pub fn add_player(&mut self, id: &str) -> Result<(), StateError> {
        if let Some(existing) = self.players.get_mut(id) {
            if existing.is_active {
                return Err(StateError::AlreadyInGame(id.to_string()));
            }
            existing.is_active = true;
            info!(target = LOG_TARGET, player = %id, "player rejoined");
            return Ok(());
        }
        if self.players.len() >= self.rules.max_players {
            return Err(StateError::TableFull(self.rules.max_players));
        }
        self.players.insert(
            id.to_string(),
            PlayerState::new(id.to_string(), self.rules.starting_stack),
        );
        info!(target = LOG_TARGET, player = %id, stack = self.rules.starting_stack, "player seated");
        Ok(())
    }

    /// Drop a player from play. Keeps the seat record so stacks survive a
    /// rejoin between hands.
    pub fn remove_player(&mut self, id: &str) {
        if let Some(p) = self.players.get_mut(id) {
            p.is_active = false;
            p.is_folded = true;
            p.is_ready = false;
            info!(target = LOG_TARGET, player = %id, "player removed");
        }
    }

    pub fn set_ready(&mut self, id: &str) -> bool {
        match self.players.get_mut(id) {
            Some(p) => {
                p.is_ready = true;
                true
            }
            None => false,
        }
    }

    pub fn set_active(&mut self, id: &str, active: bool) {
        if let Some(p) = self.players.get_mut(id) {
            p.is_active = active;
        }
    }

    /// Ready and connected players, in sorted-id order.
    pub fn ready_active_players(&self) -> Vec<PlayerId> {
        // BTreeMap iteration is already id-sorted.
        self.players
            .values()
            .filter(|p| p.is_ready && p.is_active)
            .map(|p| p.id.clone())
            .collect()
    }

    pub fn can_start_hand(&self) -> bool {
        self.status == GameStatus::Waiting && self.ready_active_players().len() >= 2
    }

    // ------------------------------------------------------------------
    // Hand lifecycle
    // ------------------------------------------------------------------

    /// Begin a new hand: rebuild the rotation, advance the dealer, post
    /// blinds, and enter `Dealing`. The shuffle-and-deal exchange runs while
    /// the status is `Dealing`; betting starts with [`Self::begin_preflop`].
    pub fn start_hand(&mut self) -> Result<HandStart, StateError> {
        if self.status != GameStatus::Waiting {
            return Err(StateError::WrongPhase(self.status));
        }
        let seated = self.ready_active_players();
        if seated.len() < 2 {
            return Err(StateError::InsufficientPlayers {
                needed: 2,
                have: seated.len(),
            });
        }

        self.current_pot = 0;
        self.highest_bet = 0;
        self.last_raise_amount = self.rules.big_blind;
        self.community_cards.clear();
        self.side_pots.clear();

        self.rotation = seated;
        for (rotation_id, id) in self.rotation.clone().into_iter().enumerate() {
            let p = self.players.get_mut(&id).expect("rotation member seated");
            p.rotation_id = rotation_id;
            p.current_round_bet = 0;
            p.total_bet_this_hand = 0;
            p.is_folded = false;
            p.is_all_in = false;
            p.has_acted_this_round = false;
            p.stack_at_hand_start = p.stack;
        }

        // The button stays on seat 0 for the opening hand, then rotates.
        if self.hands_played > 0 {
            self.dealer = (self.dealer + 1) % self.rotation.len();
        } else {
            self.dealer = 0;
        }
        self.hands_played += 1;
        let start = self.post_blinds();
        self.set_status(GameStatus::Dealing);
        Ok(start)
    }

    /// Heads-up: dealer posts the small blind and acts first pre-flop.
    /// Three-handed and up: blinds sit left of the dealer and the seat after
    /// the big blind opens.
    fn post_blinds(&mut self) -> HandStart {
        let k = self.rotation.len();
        let (sb_seat, bb_seat, first_to_act) = if k == 2 {
            let sb = self.dealer;
            let bb = (self.dealer + 1) % k;
            (sb, bb, sb)
        } else {
            let sb = (self.dealer + 1) % k;
            let bb = (sb + 1) % k;
            (sb, bb, (bb + 1) % k)
        };

        let sb_posted = self.post_blind(sb_seat, self.rules.small_blind);
        let bb_posted = self.post_blind(bb_seat, self.rules.big_blind);

        self.highest_bet = self.rules.big_blind;
        self.last_raise_amount = self.rules.big_blind;
        self.last_raiser = bb_seat;
        self.current_turn = first_to_act;

        let sb_id = self.rotation[sb_seat].clone();
        let bb_id = self.rotation[bb_seat].clone();
        info!(
            target = LOG_TARGET,
            small_blind = %sb_id,
            big_blind = %bb_id,
            sb_posted,
            bb_posted,
            "blinds posted"
        );

        HandStart {
            dealer: self.dealer,
            small_blind_player: sb_id,
            small_blind_posted: sb_posted,
            big_blind_player: bb_id,
            big_blind_posted: bb_posted,
            players: self.rotation.clone(),
        }
    }

    /// A short stack posts what it can and is all-in for it.
    fn post_blind(&mut self, seat: RotationId, amount: Chips) -> Chips {
        let id = self.rotation[seat].clone();
        let p = self.players.get_mut(&id).expect("blind seat occupied");
        let posted = amount.min(p.stack);
        p.stack -= posted;
        p.current_round_bet += posted;
        p.total_bet_this_hand += posted;
        if p.stack == 0 {
            p.is_all_in = true;
        }
        self.current_pot += posted;
        posted
    }

    /// Dealing is complete; open pre-flop betting.
    pub fn begin_preflop(&mut self) -> Result<RotationId, StateError> {
        if self.status != GameStatus::Dealing {
            return Err(StateError::WrongPhase(self.status));
        }
        self.set_status(GameStatus::PreFlop);
        Ok(self.current_turn)
    }

    /// Append decrypted community cards as a street is dealt.
    pub fn push_community_cards(&mut self, cards: &[Card]) {
        self.community_cards.extend_from_slice(cards);
    }

    /// Players still contesting the hand.
    pub(super) fn in_hand_count(&self) -> usize {
        self.rotation
            .iter()
            .filter_map(|id| self.players.get(id))
            .filter(|p| p.in_hand())
            .count()
    }

    /// Players who may still take a betting action.
    pub(super) fn can_act_count(&self) -> usize {
        self.rotation
            .iter()
            .filter_map(|id| self.players.get(id))
            .filter(|p| p.can_act())
            .count()
    }

    /// True when no further betting is possible this hand and remaining
    /// streets run out without action.
    pub fn betting_skipped(&self) -> bool {
        self.can_act_count() < 2
    }

    /// Next seat after `from` that may act, wrapping; `None` when nobody can.
    pub(super) fn next_can_act_after(&self, from: RotationId) -> Option<RotationId> {
        let k = self.rotation.len();
        (1..=k)
            .map(|step| (from + step) % k)
            .find(|&seat| self.seat(seat).is_some_and(|p| p.can_act()))
    }

    /// Close the hand: eliminate busted players and return to `Waiting`.
    /// Returns the ids eliminated.
    pub fn finish_hand(&mut self) -> Vec<PlayerId> {
        let mut eliminated = Vec::new();
        for p in self.players.values_mut() {
            if p.stack == 0 && p.is_active {
                p.is_active = false;
                p.is_ready = false;
                eliminated.push(p.id.clone());
                info!(target = LOG_TARGET, player = %p.id, "player eliminated");
            }
        }
        self.current_pot = 0;
        self.highest_bet = 0;
        self.side_pots.clear();
        self.set_status(GameStatus::Waiting);
        eliminated
    }

    /// Fatal recovery: undo the hand entirely, restoring every rotation
    /// member to their stack at hand start, and return to `Waiting`.
    pub fn abort_with_refund(&mut self) {
        for id in self.rotation.clone() {
            if let Some(p) = self.players.get_mut(&id) {
                p.stack = p.stack_at_hand_start;
                p.current_round_bet = 0;
                p.total_bet_this_hand = 0;
                p.is_all_in = false;
            }
        }
        self.current_pot = 0;
        self.highest_bet = 0;
        self.side_pots.clear();
        self.community_cards.clear();
        self.set_status(GameStatus::Waiting);
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    pub fn seat_views(&self) -> Vec<SeatView> {
        self.rotation
            .iter()
            .filter_map(|id| self.players.get(id))
            .map(|p| SeatView {
                player_id: p.id.clone(),
                rotation_id: p.rotation_id,
                stack: p.stack,
                current_bet: p.current_round_bet,
                is_active: p.is_active,
                is_folded: p.is_folded,
                is_all_in: p.is_all_in,
                is_ready: p.is_ready,
                is_dealer: p.rotation_id == self.dealer,
                is_current_turn: p.rotation_id == self.current_turn,
            })
            .collect()
    }

    pub fn game_state_payload(&self) -> GameStatePayload {
        GameStatePayload {
            status: self.status.as_str().to_string(),
            current_pot: self.current_pot,
            highest_bet: self.highest_bet,
            current_turn: self.current_turn,
            dealer_id: self.dealer,
            community_cards: self.community_cards.iter().map(card_view).collect(),
            players: self.seat_views(),
        }
    }
}

pub fn card_view(card: &Card) -> CardView {
    CardView {
        suit: card.suit.name().to_string(),
        value: card.rank,
        display: card.to_string(),
    }
}
