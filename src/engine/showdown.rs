use tracing::{info, warn};

use crate::domain::{evaluate_best_hand, Card, Chips, HandRank, PlayerId};

use super::errors::StateError;
use super::pots::compute_side_pots;
use super::state::GameEngine;
use super::types::{GameStatus, SidePot};

const LOG_TARGET: &str = "engine::showdown";

/// One revealed hand at showdown.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerShowdown {
    pub player_id: PlayerId,
    pub hole_cards: [Card; 2],
    pub rank: HandRank,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShowdownOutcome {
    pub results: Vec<PlayerShowdown>,
    /// Aggregated winnings per player across all pots, in rotation order.
    pub payouts: Vec<(PlayerId, Chips)>,
    pub pots: Vec<SidePot>,
    pub pot_total: Chips,
}

/// Outcome of the abandonment penalty pathway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PenaltyOutcome {
    pub abandoned: PlayerId,
    pub penalty_amount: Chips,
    pub distribution: Vec<(PlayerId, Chips)>,
}

impl GameEngine {
    /// Rank every revealed hand and distribute the pot(s).
    ///
    /// `hands` carries the reconstructed hole cards of the non-folded
    /// players, supplied by the deal protocol once showdown keys are in.
    /// Pots are settled in creation order; ties split evenly with the odd
    /// chip going to the winner with the smallest rotation id.
    pub fn resolve_showdown(
        &mut self,
        hands: &[(PlayerId, [Card; 2])],
    ) -> Result<ShowdownOutcome, StateError> {
        if self.status() != GameStatus::Showdown {
            return Err(StateError::WrongPhase(self.status()));
        }

        let community: Vec<Card> = self.community_cards().to_vec();
        if community.len() != 5 {
            return Err(StateError::WrongPhase(self.status()));
        }

        let mut results = Vec::with_capacity(hands.len());
        for (id, hole) in hands {
            let Some(p) = self.player(id) else {
                continue;
            };
            if !p.in_hand() {
                continue;
            }
            let rank = evaluate_best_hand(hole, &community);
            info!(
                target = LOG_TARGET,
                player = %id,
                hand = %rank,
                key = rank.ordering_key(),
                "hand ranked"
            );
            results.push(PlayerShowdown {
                player_id: id.clone(),
                hole_cards: *hole,
                rank,
            });
        }

        // Side pots exist only once someone is all-in; otherwise the whole
        // pot is a single tier open to every non-folded player.
        let rotation_players: Vec<_> = self
            .rotation()
            .iter()
            .filter_map(|id| self.player(id))
            .cloned()
            .collect();
        let pots = if rotation_players.iter().any(|p| p.in_hand() && p.is_all_in) {
            compute_side_pots(&rotation_players)
        } else {
            vec![SidePot {
                amount: self.current_pot(),
                cap: rotation_players
                    .iter()
                    .map(|p| p.total_bet_this_hand)
                    .max()
                    .unwrap_or(0),
                eligible: rotation_players
                    .iter()
                    .filter(|p| p.in_hand())
                    .map(|p| p.id.clone())
                    .collect(),
            }]
        };

        let pot_total: Chips = pots.iter().map(|p| p.amount).sum();
        let mut payouts: Vec<(PlayerId, Chips)> = Vec::new();

        for (pot_index, pot) in pots.iter().enumerate() {
            let contenders: Vec<&PlayerShowdown> = results
                .iter()
                .filter(|r| pot.eligible.contains(&r.player_id))
                .collect();
            let Some(best) = contenders.iter().map(|r| r.rank).min() else {
                warn!(
                    target = LOG_TARGET,
                    pot_index, "no eligible hands for pot; chips stay unawarded"
                );
                continue;
            };
            let mut winners: Vec<&PlayerShowdown> =
                contenders.into_iter().filter(|r| r.rank == best).collect();
            winners.sort_by_key(|r| {
                self.player(&r.player_id)
                    .map(|p| p.rotation_id)
                    .unwrap_or(usize::MAX)
            });

            let share = pot.amount / winners.len() as Chips;
            let remainder = pot.amount % winners.len() as Chips;
            for (i, winner) in winners.iter().enumerate() {
                let amount = if i == 0 { share + remainder } else { share };
                let p = self.player_mut(&winner.player_id).expect("winner seated");
                p.stack += amount;
                info!(
                    target = LOG_TARGET,
                    pot_index,
                    player = %winner.player_id,
                    hand = %winner.rank,
                    amount,
                    new_stack = p.stack,
                    "pot distributed"
                );
                match payouts.iter_mut().find(|(id, _)| id == &winner.player_id) {
                    Some((_, total)) => *total += amount,
                    None => payouts.push((winner.player_id.clone(), amount)),
                }
            }
        }

        self.side_pots = pots.clone();

        Ok(ShowdownOutcome {
            results,
            payouts,
            pots,
            pot_total,
        })
    }

    /// Abandonment penalty: the deserter forfeits everything they brought to
    /// the hand, split evenly among the remaining players with the odd chips
    /// going to the smallest rotation id. The hand is aborted; no pot is
    /// distributed.
    pub fn apply_abandonment(&mut self, abandoned_id: &str) -> Result<PenaltyOutcome, StateError> {
        if self.status() == GameStatus::Waiting {
            return Err(StateError::WrongPhase(self.status()));
        }
        if !self.rotation().iter().any(|id| id.as_str() == abandoned_id) {
            return Err(StateError::WrongPhase(self.status()));
        }

        let penalty_amount = {
            let p = self
                .player_mut(abandoned_id)
                .expect("rotation member seated");
            let forfeited = p.total_bet_this_hand + p.stack;
            p.stack = 0;
            p.is_active = false;
            p.is_ready = false;
            p.is_folded = true;
            forfeited
        };

        let mut recipients: Vec<PlayerId> = self
            .rotation()
            .iter()
            .filter(|id| id.as_str() != abandoned_id)
            .cloned()
            .collect();
        recipients.sort_by_key(|id| self.player(id).map(|p| p.rotation_id).unwrap_or(usize::MAX));

        let share = penalty_amount / recipients.len() as Chips;
        let remainder = penalty_amount % recipients.len() as Chips;
        let mut distribution = Vec::with_capacity(recipients.len());
        for (i, id) in recipients.iter().enumerate() {
            let amount = if i == 0 { share + remainder } else { share };
            let p = self.player_mut(id).expect("recipient seated");
            p.stack += amount;
            distribution.push((id.clone(), amount));
            info!(
                target = LOG_TARGET,
                player = %id,
                amount,
                new_stack = p.stack,
                "penalty share credited"
            );
        }

        warn!(
            target = LOG_TARGET,
            abandoned = %abandoned_id,
            penalty_amount,
            "hand aborted with penalty"
        );
        self.set_status(GameStatus::Waiting);

        Ok(PenaltyOutcome {
            abandoned: abandoned_id.to_string(),
            penalty_amount,
            distribution,
        })
    }
}
