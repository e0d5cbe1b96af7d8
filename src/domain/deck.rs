use super::card::{Card, Suit};

pub const DECK_SIZE: usize = 52;

/// An ordered 52-card deck in plaintext form. During a hand the deck
/// circulates as opaque encrypted payloads; this type is the endpoint of
/// that pipeline on creation and after full decryption.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    /// Standard deck in byte-encoding order.
    pub fn standard() -> Self {
        let cards: Vec<Card> = (0..DECK_SIZE as u8)
            .map(|b| Card::from_byte(b).expect("byte < 52"))
            .collect();
        Self { cards }
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn contains(&self, card: Card) -> bool {
        self.cards.contains(&card)
    }

    /// One single-byte payload per card, the plaintext input to the
    /// encrypt-and-shuffle phase.
    pub fn to_payloads(&self) -> Vec<Vec<u8>> {
        self.cards.iter().map(|c| vec![c.to_byte()]).collect()
    }

    /// Rebuild a deck from fully decrypted payloads. Fails on any payload
    /// that does not decode to a card byte.
    pub fn from_payloads(payloads: &[Vec<u8>]) -> Option<Self> {
        let cards = payloads
            .iter()
            .map(|p| p.last().and_then(|&b| Card::from_byte(b)))
            .collect::<Option<Vec<Card>>>()?;
        Some(Self { cards })
    }
}

impl Default for Deck {
    fn default() -> Self {
        Self::standard()
    }
}

impl FromIterator<Card> for Deck {
    fn from_iter<I: IntoIterator<Item = Card>>(iter: I) -> Self {
        Self {
            cards: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_deck_has_52_distinct_cards() {
        let deck = Deck::standard();
        assert_eq!(deck.len(), DECK_SIZE);
        for card in Card::all() {
            assert!(deck.contains(card), "missing {card}");
        }
    }

    #[test]
    fn payload_round_trip() {
        let deck = Deck::standard();
        let payloads = deck.to_payloads();
        assert_eq!(Deck::from_payloads(&payloads), Some(deck));
    }

    #[test]
    fn bad_payload_rejected() {
        let mut payloads = Deck::standard().to_payloads();
        payloads[10] = vec![200];
        assert_eq!(Deck::from_payloads(&payloads), None);
    }

    #[test]
    fn hearts_two_is_byte_zero() {
        let deck = Deck::standard();
        assert_eq!(deck.cards()[0], Card::new(Suit::Hearts, 2));
    }
}
