use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Hold'em hand categories, weakest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HandCategory {
    HighCard,
    OnePair,
    TwoPair,
    ThreeOfAKind,
    Straight,
    Flush,
    FullHouse,
    FourOfAKind,
    StraightFlush,
    RoyalFlush,
}

impl HandCategory {
    fn strength(self) -> i32 {
        match self {
            HandCategory::HighCard => 0,
            HandCategory::OnePair => 1,
            HandCategory::TwoPair => 2,
            HandCategory::ThreeOfAKind => 3,
            HandCategory::Straight => 4,
            HandCategory::Flush => 5,
            HandCategory::FullHouse => 6,
            HandCategory::FourOfAKind => 7,
            HandCategory::StraightFlush => 8,
            HandCategory::RoyalFlush => 9,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            HandCategory::HighCard => "High Card",
            HandCategory::OnePair => "One Pair",
            HandCategory::TwoPair => "Two Pair",
            HandCategory::ThreeOfAKind => "Three of a Kind",
            HandCategory::Straight => "Straight",
            HandCategory::Flush => "Flush",
            HandCategory::FullHouse => "Full House",
            HandCategory::FourOfAKind => "Four of a Kind",
            HandCategory::StraightFlush => "Straight Flush",
            HandCategory::RoyalFlush => "Royal Flush",
        }
    }
}

/// Evaluated strength of a 5-card hand.
///
/// `ordering_key` collapses category and kickers into a single `i32` where a
/// SMALLER key means a STRONGER hand, matching the wire `hand_rank` field and
/// the minimum-wins pot distribution. Equal-strength hands always produce
/// equal keys, so a split pot is a plain equality check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandRank {
    category: HandCategory,
    /// Significant ranks in canonical order (e.g. quad rank then kicker);
    /// unused trailing slots are zero.
    tiebreaks: [u8; 5],
}

impl HandRank {
    pub(crate) fn new(category: HandCategory, tiebreaks: [u8; 5]) -> Self {
        Self {
            category,
            tiebreaks,
        }
    }

    pub fn category(&self) -> HandCategory {
        self.category
    }

    /// Single comparison key; lower is stronger.
    ///
    /// Layout: bits 20.. hold the inverted category, then one 4-bit nibble
    /// per tiebreak rank (inverted, ace ⇒ 0). Distinct strengths never
    /// collide because every field is strictly bounded by its width.
    pub fn ordering_key(&self) -> i32 {
        let mut key = (9 - self.category.strength()) << 20;
        for (i, &rank) in self.tiebreaks.iter().enumerate() {
            key |= i32::from(14 - rank) << (16 - 4 * i);
        }
        key
    }

    pub fn name(&self) -> &'static str {
        self.category.name()
    }
}

impl PartialOrd for HandRank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HandRank {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ordering_key().cmp(&other.ordering_key())
    }
}

impl fmt::Display for HandRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stronger_category_has_smaller_key() {
        let pair = HandRank::new(HandCategory::OnePair, [14, 13, 12, 11, 0]);
        let flush = HandRank::new(HandCategory::Flush, [9, 8, 7, 5, 3]);
        assert!(flush.ordering_key() < pair.ordering_key());
        assert!(flush < pair);
    }

    #[test]
    fn kickers_break_ties_within_category() {
        let ace_kicker = HandRank::new(HandCategory::OnePair, [10, 14, 8, 5, 0]);
        let king_kicker = HandRank::new(HandCategory::OnePair, [10, 13, 8, 5, 0]);
        assert!(ace_kicker < king_kicker);
    }

    #[test]
    fn equal_hands_share_a_key() {
        let a = HandRank::new(HandCategory::TwoPair, [12, 9, 14, 0, 0]);
        let b = HandRank::new(HandCategory::TwoPair, [12, 9, 14, 0, 0]);
        assert_eq!(a.ordering_key(), b.ordering_key());
    }

    #[test]
    fn royal_flush_is_the_global_minimum() {
        let royal = HandRank::new(HandCategory::RoyalFlush, [14, 0, 0, 0, 0]);
        let quads = HandRank::new(HandCategory::FourOfAKind, [14, 13, 0, 0, 0]);
        assert!(royal.ordering_key() < quads.ordering_key());
        assert!(royal.ordering_key() >= 0);
    }
}
