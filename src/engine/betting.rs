use tracing::info;

use crate::domain::{Chips, PlayerId, RotationId};

use super::actions::PlayerAction;
use super::errors::ActionError;
use super::state::GameEngine;
use super::types::GameStatus;

const LOG_TARGET: &str = "engine::betting";

/// Result of one applied action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionOutcome {
    pub player_id: PlayerId,
    pub action: PlayerAction,
    /// Chips actually moved into the pot by this action.
    pub chips_paid: Chips,
    pub is_all_in: bool,
    pub folded: bool,
    pub transition: RoundTransition,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoundTransition {
    /// Betting continues on this street.
    Continued { next_turn: RotationId },
    /// The street closed; community cards (or showdown) come next.
    RoundEnded { new_status: GameStatus },
    /// Everyone else folded; the survivor takes the whole pot, no showdown.
    HandEndedByFold { winner: PlayerId, pot: Chips },
}

impl GameEngine {
    /// Wire-facing list of actions the player may take right now.
    pub fn valid_actions(&self, id: &str) -> Vec<&'static str> {
        let Some(p) = self.player(id) else {
            return Vec::new();
        };
        if !self.status().is_betting() || !p.can_act() || p.rotation_id != self.current_turn() {
            return Vec::new();
        }

        let mut actions = vec!["fold"];
        if p.current_round_bet == self.highest_bet() {
            actions.push("check");
        }
        if self.highest_bet() > p.current_round_bet && p.stack > 0 {
            actions.push("call");
        }
        if self.highest_bet() == 0 {
            if p.stack >= self.rules().big_blind {
                actions.push("bet");
            }
        } else {
            // A stack at or below the shortfall cannot raise, only call all-in.
            let min_raise_total = self.highest_bet() + self.last_raise_amount;
            if p.stack > min_raise_total - p.current_round_bet {
                actions.push("raise");
            }
        }
        actions
    }

    /// Smallest legal raise-to total, or the minimum opening bet when the
    /// street is unopened.
    pub fn min_raise_total(&self) -> Chips {
        if self.highest_bet() == 0 {
            self.rules().big_blind
        } else {
            self.highest_bet() + self.last_raise_amount
        }
    }

    /// Validate and apply one action for the player whose turn it is.
    ///
    /// On error, nothing is mutated. On success the pot, bets, and turn are
    /// updated and the street/hand transition is reported.
    pub fn apply_action(
        &mut self,
        id: &str,
        action: PlayerAction,
    ) -> Result<ActionOutcome, ActionError> {
        if !self.status().is_betting() {
            return Err(ActionError::WrongPhase(self.status()));
        }
        let p = self
            .player(id)
            .ok_or_else(|| ActionError::UnknownPlayer(id.to_string()))?;
        if p.rotation_id != self.current_turn() || !p.can_act() {
            return Err(ActionError::NotYourTurn(id.to_string()));
        }

        let seat = p.rotation_id;
        let (stack, current_bet) = (p.stack, p.current_round_bet);
        let highest = self.highest_bet();

        // Validation first; mutation only after every check passes.
        match action {
            PlayerAction::Fold => {}
            PlayerAction::Check => {
                if current_bet != highest {
                    return Err(ActionError::InvalidAction {
                        action: "check".into(),
                    });
                }
            }
            PlayerAction::Call => {
                if highest <= current_bet || stack == 0 {
                    return Err(ActionError::InvalidAction {
                        action: "call".into(),
                    });
                }
            }
            PlayerAction::Bet(v) => {
                if highest != 0 {
                    return Err(ActionError::InvalidAction {
                        action: "bet".into(),
                    });
                }
                if v < self.rules().big_blind || v > stack {
                    return Err(ActionError::AmountOutOfRange {
                        got: v,
                        min: self.rules().big_blind,
                        max: stack,
                    });
                }
            }
            PlayerAction::Raise(v) => {
                if highest == 0 {
                    return Err(ActionError::InvalidAction {
                        action: "raise".into(),
                    });
                }
                let min_total = highest + self.last_raise_amount;
                let max_total = stack + current_bet;
                if v < min_total || v > max_total {
                    return Err(ActionError::AmountOutOfRange {
                        got: v,
                        min: min_total,
                        max: max_total,
                    });
                }
            }
        }

        let mut chips_paid = 0;
        let mut folded = false;

        match action {
            PlayerAction::Fold => {
                let p = self.player_mut(id).expect("validated");
                p.is_folded = true;
                p.has_acted_this_round = true;
                folded = true;
            }
            PlayerAction::Check => {
                let p = self.player_mut(id).expect("validated");
                p.has_acted_this_round = true;
            }
            PlayerAction::Call => {
                chips_paid = (highest - current_bet).min(stack);
                let p = self.player_mut(id).expect("validated");
                p.stack -= chips_paid;
                p.current_round_bet += chips_paid;
                p.total_bet_this_hand += chips_paid;
                p.has_acted_this_round = true;
                if p.stack == 0 {
                    p.is_all_in = true;
                }
                self.current_pot += chips_paid;
            }
            PlayerAction::Bet(v) | PlayerAction::Raise(v) => {
                chips_paid = v - current_bet;
                let p = self.player_mut(id).expect("validated");
                p.stack -= chips_paid;
                p.current_round_bet = v;
                p.total_bet_this_hand += chips_paid;
                p.has_acted_this_round = true;
                if p.stack == 0 {
                    p.is_all_in = true;
                }
                self.current_pot += chips_paid;
                self.last_raise_amount = v - highest;
                self.highest_bet = v;
                self.last_raiser = seat;
            }
        }

        let acted = self.player(id).expect("validated");
        let is_all_in = acted.is_all_in;
        if is_all_in {
            info!(target = LOG_TARGET, player = %id, "player is all-in");
        }
        info!(
            target = LOG_TARGET,
            player = %id,
            action = action.name(),
            chips_paid,
            pot = self.current_pot,
            "action applied"
        );

        let transition = self.advance_turn_and_check_round_end(seat);
        Ok(ActionOutcome {
            player_id: id.to_string(),
            action,
            chips_paid,
            is_all_in,
            folded,
            transition,
        })
    }

    /// Turn and round bookkeeping after a legal action by `seat`.
    fn advance_turn_and_check_round_end(&mut self, seat: RotationId) -> RoundTransition {
        // Everyone else folded: the hand ends at once, no showdown.
        if self.in_hand_count() <= 1 {
            let winner = self
                .rotation()
                .iter()
                .find(|id| self.player(id.as_str()).is_some_and(|p| p.in_hand()))
                .cloned()
                .expect("one survivor");
            let pot = self.current_pot();
            let w = self.player_mut(&winner).expect("survivor seated");
            w.stack += pot;
            info!(
                target = LOG_TARGET,
                winner = %winner,
                pot,
                "hand won by fold-out"
            );
            return RoundTransition::HandEndedByFold { winner, pot };
        }

        // All-in lock: nobody left to act, streets run out without betting.
        if self.can_act_count() == 0 {
            return RoundTransition::RoundEnded {
                new_status: self.advance_street(),
            };
        }

        let actors: Vec<_> = self
            .rotation()
            .iter()
            .filter_map(|id| self.player(id))
            .filter(|p| p.can_act())
            .collect();
        let all_matched = actors
            .iter()
            .all(|p| p.current_round_bet == self.highest_bet());
        let all_acted = actors.iter().all(|p| p.has_acted_this_round);
        let lone_actor = actors.len() < 2;

        // The round closes once every player who can still act has matched
        // the highest bet and had their turn. Blind posts are not turns,
        // which preserves the big blind's pre-flop option.
        if all_matched && (all_acted || lone_actor) {
            return RoundTransition::RoundEnded {
                new_status: self.advance_street(),
            };
        }

        let next = self
            .next_can_act_after(seat)
            .expect("at least one player can act");
        self.current_turn = next;
        RoundTransition::Continued { next_turn: next }
    }

    /// Close the current street and open the next. Per-round bets reset; the
    /// first seat after the dealer that can act opens the new street.
    pub(super) fn advance_street(&mut self) -> GameStatus {
        for id in self.rotation().to_vec() {
            if let Some(p) = self.player_mut(&id) {
                p.current_round_bet = 0;
                p.has_acted_this_round = false;
            }
        }
        self.highest_bet = 0;
        self.last_raise_amount = self.rules().big_blind;
        self.last_raiser = self.dealer();

        let next_status = match self.status() {
            GameStatus::PreFlop => GameStatus::Flop,
            GameStatus::Flop => GameStatus::Turn,
            GameStatus::Turn => GameStatus::River,
            GameStatus::River => GameStatus::Showdown,
            other => other,
        };
        self.set_status(next_status);

        if let Some(first) = self.next_can_act_after(self.dealer()) {
            self.current_turn = first;
        }
        next_status
    }

    /// Run a street out with no betting (all-in lock). Returns the new
    /// status.
    pub fn advance_street_forced(&mut self) -> GameStatus {
        self.advance_street()
    }
}
