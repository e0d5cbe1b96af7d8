use crate::domain::Chips;

use super::types::{PlayerState, SidePot};

/// Partition the pot by all-in contribution levels.
///
/// Levels are the distinct `total_bet_this_hand` values of non-folded active
/// contributors, ascending; each level's pot takes `(L - L_prev)` from every
/// player at or above `L` and is winnable only by them. Chips contributed by
/// folded players are absorbed into the lowest-cap pot.
pub fn compute_side_pots(players: &[PlayerState]) -> Vec<SidePot> {
    let mut contributors: Vec<(&PlayerState, Chips)> = players
        .iter()
        .filter(|p| p.in_hand() && p.total_bet_this_hand > 0)
        .map(|p| (p, p.total_bet_this_hand))
        .collect();
    contributors.sort_by_key(|(p, amount)| (*amount, p.rotation_id));

    let mut levels: Vec<Chips> = contributors.iter().map(|(_, amount)| *amount).collect();
    levels.dedup();

    let mut pots = Vec::with_capacity(levels.len());
    let mut prev = 0;
    for level in levels {
        let at_or_above: Vec<&PlayerState> = contributors
            .iter()
            .filter(|(_, amount)| *amount >= level)
            .map(|(p, _)| *p)
            .collect();
        pots.push(SidePot {
            amount: (level - prev) * at_or_above.len() as Chips,
            cap: level,
            eligible: at_or_above.iter().map(|p| p.id.clone()).collect(),
        });
        prev = level;
    }

    let folded_chips: Chips = players
        .iter()
        .filter(|p| !p.in_hand())
        .map(|p| p.total_bet_this_hand)
        .sum();
    if folded_chips > 0 {
        if let Some(first) = pots.first_mut() {
            first.amount += folded_chips;
        }
    }

    pots
}
