use super::card::Card;
use super::hand_rank::{HandCategory, HandRank};

/// Best 5-card hand from 2 hole cards and 3..=5 community cards.
///
/// Total and deterministic; a malformed input (wrong counts, duplicate
/// cards) is a caller bug, not a runtime condition.
pub fn evaluate_best_hand(hole: &[Card], community: &[Card]) -> HandRank {
    assert_eq!(hole.len(), 2, "exactly two hole cards");
    assert!(
        (3..=5).contains(&community.len()),
        "community must hold 3 to 5 cards"
    );

    let mut all = Vec::with_capacity(7);
    all.extend_from_slice(hole);
    all.extend_from_slice(community);

    best_five_of(&all)
}

fn best_five_of(cards: &[Card]) -> HandRank {
    let n = cards.len();
    let mut best: Option<HandRank> = None;

    for a in 0..n - 4 {
        for b in a + 1..n - 3 {
            for c in b + 1..n - 2 {
                for d in c + 1..n - 1 {
                    for e in d + 1..n {
                        let five = [cards[a], cards[b], cards[c], cards[d], cards[e]];
                        let rank = evaluate_five(&five);
                        if best.map_or(true, |cur| rank < cur) {
                            best = Some(rank);
                        }
                    }
                }
            }
        }
    }

    best.expect("at least one 5-card combination")
}

fn evaluate_five(cards: &[Card; 5]) -> HandRank {
    let mut rank_counts = [0u8; 15]; // indices 2..=14 used
    let flush = cards.iter().all(|c| c.suit == cards[0].suit);
    for card in cards {
        rank_counts[card.rank as usize] += 1;
    }

    let straight_high = detect_straight(&rank_counts);

    if flush {
        if let Some(high) = straight_high {
            let category = if high == 14 {
                HandCategory::RoyalFlush
            } else {
                HandCategory::StraightFlush
            };
            return HandRank::new(category, [high, 0, 0, 0, 0]);
        }
    }

    // (rank, count) pairs sorted by count desc, then rank desc.
    let mut groups: Vec<(u8, u8)> = (2..=14u8)
        .rev()
        .filter(|&r| rank_counts[r as usize] > 0)
        .map(|r| (r, rank_counts[r as usize]))
        .collect();
    groups.sort_by(|a, b| b.1.cmp(&a.1).then(b.0.cmp(&a.0)));

    let counts: Vec<u8> = groups.iter().map(|g| g.1).collect();

    match counts.as_slice() {
        [4, 1] => HandRank::new(
            HandCategory::FourOfAKind,
            [groups[0].0, groups[1].0, 0, 0, 0],
        ),
        [3, 2] => HandRank::new(HandCategory::FullHouse, [groups[0].0, groups[1].0, 0, 0, 0]),
        _ if flush => {
            let mut ranks: Vec<u8> = cards.iter().map(|c| c.rank).collect();
            ranks.sort_unstable_by(|a, b| b.cmp(a));
            HandRank::new(
                HandCategory::Flush,
                [ranks[0], ranks[1], ranks[2], ranks[3], ranks[4]],
            )
        }
        _ if straight_high.is_some() => HandRank::new(
            HandCategory::Straight,
            [straight_high.expect("checked"), 0, 0, 0, 0],
        ),
        [3, 1, 1] => HandRank::new(
            HandCategory::ThreeOfAKind,
            [groups[0].0, groups[1].0, groups[2].0, 0, 0],
        ),
        [2, 2, 1] => HandRank::new(
            HandCategory::TwoPair,
            [groups[0].0, groups[1].0, groups[2].0, 0, 0],
        ),
        [2, 1, 1, 1] => HandRank::new(
            HandCategory::OnePair,
            [groups[0].0, groups[1].0, groups[2].0, groups[3].0, 0],
        ),
        _ => HandRank::new(
            HandCategory::HighCard,
            [
                groups[0].0,
                groups[1].0,
                groups[2].0,
                groups[3].0,
                groups[4].0,
            ],
        ),
    }
}

/// High card of a straight if the five ranks form one, recognizing the
/// wheel (A-2-3-4-5) as 5-high.
fn detect_straight(rank_counts: &[u8; 15]) -> Option<u8> {
    if rank_counts.iter().any(|&c| c > 1) {
        return None;
    }
    for high in (6..=14u8).rev() {
        if (high - 4..=high).all(|r| rank_counts[r as usize] == 1) {
            return Some(high);
        }
    }
    // wheel: A plays low
    if rank_counts[14] == 1 && (2..=5u8).all(|r| rank_counts[r as usize] == 1) {
        return Some(5);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::card::Suit;

    fn card(spec: &str) -> Card {
        let (rank_part, suit_part) = spec.split_at(spec.len() - 1);
        let rank = match rank_part {
            "A" => 14,
            "K" => 13,
            "Q" => 12,
            "J" => 11,
            "T" => 10,
            v => v.parse().expect("rank"),
        };
        let suit = match suit_part {
            "h" => Suit::Hearts,
            "d" => Suit::Diamonds,
            "c" => Suit::Clubs,
            "s" => Suit::Spades,
            _ => panic!("suit {suit_part}"),
        };
        Card::new(suit, rank)
    }

    fn cards(specs: &[&str]) -> Vec<Card> {
        specs.iter().map(|s| card(s)).collect()
    }

    fn eval(hole: &[&str], board: &[&str]) -> HandRank {
        evaluate_best_hand(&cards(hole), &cards(board))
    }

    #[test]
    fn category_ladder_orders_correctly() {
        let high_card = eval(&["As", "Kd"], &["2c", "7d", "9s", "4h", "3d"]);
        let pair = eval(&["As", "Ad"], &["2c", "7d", "9s", "4h", "3d"]);
        let two_pair = eval(&["As", "Ad"], &["7c", "7d", "9s", "4h", "3d"]);
        let trips = eval(&["As", "Ad"], &["Ac", "7d", "9s", "4h", "3d"]);
        let straight = eval(&["8s", "7d"], &["6c", "5d", "4s", "Kh", "2d"]);
        let flush = eval(&["As", "7s"], &["2s", "9s", "4s", "Kh", "3d"]);
        let full_house = eval(&["As", "Ad"], &["Ac", "7d", "7s", "4h", "3d"]);
        let quads = eval(&["As", "Ad"], &["Ac", "Ah", "9s", "4h", "3d"]);
        let straight_flush = eval(&["8s", "7s"], &["6s", "5s", "4s", "Kh", "2d"]);
        let royal = eval(&["As", "Ks"], &["Qs", "Js", "Ts", "4h", "3d"]);

        let ladder = [
            high_card,
            pair,
            two_pair,
            trips,
            straight,
            flush,
            full_house,
            quads,
            straight_flush,
            royal,
        ];
        for pair in ladder.windows(2) {
            assert!(
                pair[1] < pair[0],
                "{} should beat {}",
                pair[1].name(),
                pair[0].name()
            );
        }
        assert_eq!(royal.category(), HandCategory::RoyalFlush);
    }

    #[test]
    fn wheel_straight_is_five_high() {
        // (A♠, 2♦) on 3♣ 4♥ 5♠ 9♦ K♣ plays the wheel.
        let wheel = eval(&["As", "2d"], &["3c", "4h", "5s", "9d", "Kc"]);
        assert_eq!(wheel.category(), HandCategory::Straight);

        let two_pair = eval(&["9s", "Kd"], &["9c", "Kh", "5d", "2s", "3h"]);
        assert!(wheel < two_pair, "wheel beats any two pair");

        let six_high = eval(&["6s", "2d"], &["3c", "4h", "5s", "9d", "Kc"]);
        assert!(six_high < wheel, "6-high straight beats the wheel");
    }

    #[test]
    fn kickers_resolve_inside_category() {
        let ace_kick = eval(&["Th", "Ad"], &["Tc", "8h", "5s", "3d", "2c"]);
        let king_kick = eval(&["Th", "Kd"], &["Tc", "8h", "5s", "3d", "2c"]);
        assert!(ace_kick < king_kick);
    }

    #[test]
    fn equal_inputs_yield_equal_keys() {
        let a = eval(&["Qh", "Jd"], &["9c", "9h", "2s", "5d", "Kc"]);
        let b = eval(&["Qd", "Js"], &["9c", "9h", "2s", "5d", "Kc"]);
        assert_eq!(a.ordering_key(), b.ordering_key());
    }

    #[test]
    fn board_plays_when_hole_cards_are_dead() {
        // Both hole cards worse than the board's best five.
        let rank = eval(&["2h", "3d"], &["As", "Ks", "Qs", "Js", "Ts"]);
        assert_eq!(rank.category(), HandCategory::RoyalFlush);
    }

    #[test]
    fn three_card_board_is_accepted() {
        let rank = eval(&["Ah", "Ad"], &["Ac", "As", "2d"]);
        assert_eq!(rank.category(), HandCategory::FourOfAKind);
    }
}
