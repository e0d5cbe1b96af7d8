use std::fmt;

use serde::{Deserialize, Serialize};

const ALL_SUITS: [Suit; 4] = [Suit::Hearts, Suit::Diamonds, Suit::Clubs, Suit::Spades];

/// Card suit. The wire byte encoding depends on this declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Suit {
    Hearts,
    Diamonds,
    Clubs,
    Spades,
}

impl Suit {
    pub fn index(self) -> u8 {
        match self {
            Suit::Hearts => 0,
            Suit::Diamonds => 1,
            Suit::Clubs => 2,
            Suit::Spades => 3,
        }
    }

    pub fn from_index(idx: u8) -> Option<Self> {
        match idx {
            0 => Some(Suit::Hearts),
            1 => Some(Suit::Diamonds),
            2 => Some(Suit::Clubs),
            3 => Some(Suit::Spades),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Suit::Hearts => "♥",
            Suit::Diamonds => "♦",
            Suit::Clubs => "♣",
            Suit::Spades => "♠",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Suit::Hearts => "Hearts",
            Suit::Diamonds => "Diamonds",
            Suit::Clubs => "Clubs",
            Suit::Spades => "Spades",
        }
    }
}

/// A playing card. `rank` runs 2..=14 with 11=Jack, 12=Queen, 13=King, 14=Ace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    pub suit: Suit,
    pub rank: u8,
}

impl Card {
    pub const MIN_RANK: u8 = 2;
    pub const MAX_RANK: u8 = 14;

    pub fn new(suit: Suit, rank: u8) -> Self {
        debug_assert!((Self::MIN_RANK..=Self::MAX_RANK).contains(&rank));
        Self { suit, rank }
    }

    /// Byte encoding: `(rank - 2) * 4 + suit`, yielding 52 distinct values.
    pub fn to_byte(self) -> u8 {
        (self.rank - 2) * 4 + self.suit.index()
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        if b >= 52 {
            return None;
        }
        let suit = Suit::from_index(b % 4)?;
        let rank = b / 4 + 2;
        Some(Self { suit, rank })
    }

    pub fn rank_symbol(self) -> &'static str {
        match self.rank {
            2 => "2",
            3 => "3",
            4 => "4",
            5 => "5",
            6 => "6",
            7 => "7",
            8 => "8",
            9 => "9",
            10 => "10",
            11 => "J",
            12 => "Q",
            13 => "K",
            14 => "A",
            _ => "?",
        }
    }

    /// Long form for logs, e.g. "Ace of Spades".
    pub fn full_name(self) -> String {
        let rank = match self.rank {
            11 => "Jack".to_string(),
            12 => "Queen".to_string(),
            13 => "King".to_string(),
            14 => "Ace".to_string(),
            v => v.to_string(),
        };
        format!("{} of {}", rank, self.suit.name())
    }

    /// All 52 cards in byte-encoding order.
    pub fn all() -> impl Iterator<Item = Card> {
        (Self::MIN_RANK..=Self::MAX_RANK)
            .flat_map(|rank| ALL_SUITS.iter().map(move |&suit| Card { suit, rank }))
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank_symbol(), self.suit.symbol())
    }
}
