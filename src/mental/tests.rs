#![cfg(test)]

use std::collections::VecDeque;

use num_bigint::BigUint;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::domain::Card;
use crate::protocol::MessageBody;

use super::errors::DealError;
use super::protocol::{DealEvent, DealPhase, DealStep, MentalPokerHand, Outbound};

/// Largest 64-bit prime; keeps modexp cheap while exercising the contract.
fn prime() -> BigUint {
    BigUint::from(0xFFFF_FFFF_FFFF_FFC5u64)
}

fn ids(k: usize) -> Vec<String> {
    (0..k).map(|i| format!("p{i}")).collect()
}

fn nodes(k: usize) -> Vec<MentalPokerHand> {
    let roster = ids(k);
    (0..k)
        .map(|i| {
            MentalPokerHand::new(
                roster[i].clone(),
                roster.clone(),
                prime(),
                StdRng::seed_from_u64(1000 + i as u64),
            )
            .expect("keygen")
        })
        .collect()
}

fn dispatch(
    node: &mut MentalPokerHand,
    from: &str,
    body: &MessageBody,
) -> Result<DealStep, DealError> {
    match body {
        MessageBody::EncDeck(p) => node.handle_enc_deck(from, p.deck.clone()),
        MessageBody::ShuffleStatus(p) => node.handle_shuffle_status(from, p.deck.clone()),
        MessageBody::GetRpc(p) => node.handle_get_rpc(from, p),
        MessageBody::RpcResponse(p) => node.handle_rpc_response(from, p),
        MessageBody::RevealKeys(p) => node.handle_reveal_keys(from, p),
        other => panic!("unrouted message {}", other.kind()),
    }
}

/// Deliver a step's outbound messages until the network quiesces, recording
/// every event raised along the way as (node index, event).
fn route(
    sim: &mut Vec<MentalPokerHand>,
    roster: &[String],
    origin: usize,
    step: DealStep,
) -> Vec<(usize, DealEvent)> {
    let mut events = Vec::new();
    let mut queue: VecDeque<(usize, usize, MessageBody)> = VecDeque::new();
    let mut enqueue = |queue: &mut VecDeque<_>, from: usize, step: &DealStep| {
        for out in &step.outbound {
            match out {
                Outbound::Send { to, body } => {
                    let to_idx = roster.iter().position(|r| r == to).expect("known peer");
                    queue.push_back((from, to_idx, body.clone()));
                }
                Outbound::Broadcast { body } => {
                    for to_idx in 0..roster.len() {
                        if to_idx != from {
                            queue.push_back((from, to_idx, body.clone()));
                        }
                    }
                }
            }
        }
    };

    if let Some(event) = &step.event {
        events.push((origin, event.clone()));
    }
    enqueue(&mut queue, origin, &step);

    while let Some((from, to, body)) = queue.pop_front() {
        let out = dispatch(&mut sim[to], &roster[from], &body).expect("protocol step");
        if let Some(event) = &out.event {
            events.push((to, event.clone()));
        }
        enqueue(&mut queue, to, &out);
    }
    events
}

/// Run phase S to completion for every node.
fn shuffle_all(sim: &mut Vec<MentalPokerHand>, roster: &[String]) {
    let step = sim[0].start_shuffle().expect("start");
    let events = route(sim, roster, 0, step);
    assert!(
        events
            .iter()
            .any(|(_, e)| matches!(e, DealEvent::DeckFinalized)),
        "deck must finalize"
    );
    for node in sim.iter() {
        assert_eq!(node.phase(), DealPhase::Dealing);
    }
}

/// Reveal hole cards for every node, returning each node's pair.
fn deal_hole_cards(sim: &mut Vec<MentalPokerHand>, roster: &[String]) -> Vec<[Card; 2]> {
    for i in 0..sim.len() {
        let step = sim[i].request_hole_cards().expect("hole request");
        route(sim, roster, i, step);
    }
    sim.iter()
        .map(|n| n.my_hole_cards().expect("hole cards revealed"))
        .collect()
}

#[test]
fn three_player_shuffle_deals_distinct_hole_cards() {
    let roster = ids(3);
    let mut sim = nodes(3);
    shuffle_all(&mut sim, &roster);
    let hands = deal_hole_cards(&mut sim, &roster);

    let mut bytes: Vec<u8> = hands
        .iter()
        .flat_map(|h| h.iter().map(|c| c.to_byte()))
        .collect();
    bytes.sort_unstable();
    bytes.dedup();
    assert_eq!(bytes.len(), 6, "six distinct cards across three players");
}

#[test]
fn community_cards_agree_across_players() {
    let roster = ids(3);
    let mut sim = nodes(3);
    shuffle_all(&mut sim, &roster);
    let hands = deal_hole_cards(&mut sim, &roster);

    // Flop, turn, river; each node runs its own reveal chain.
    for _ in 0..3 {
        for i in 0..sim.len() {
            let step = sim[i].request_next_street().expect("street request");
            route(&mut sim, &roster, i, step);
        }
    }

    let board: Vec<Card> = sim[0].community().to_vec();
    assert_eq!(board.len(), 5);
    for node in &sim {
        assert_eq!(node.community(), &board[..], "all nodes see one board");
    }

    // The board never collides with anyone's hole cards.
    for hand in &hands {
        for card in hand {
            assert!(!board.contains(card));
        }
    }
}

#[test]
fn fold_reveal_lets_community_decryption_skip_the_folder() {
    let roster = ids(3);
    let mut sim = nodes(3);
    shuffle_all(&mut sim, &roster);
    deal_hole_cards(&mut sim, &roster);

    // p1 folds: marks propagate and p1's keys are broadcast.
    let reveal = sim[1].reveal_own_keys();
    for node in sim.iter_mut() {
        node.mark_folded("p1");
    }
    for i in [0usize, 2] {
        dispatch(&mut sim[i], "p1", &reveal).expect("reveal accepted");
    }

    // p0's flop chain now only ever asks p2.
    let step = sim[0].request_next_street().expect("street request");
    for out in &step.outbound {
        match out {
            Outbound::Send { to, .. } => assert_eq!(to, "p2", "folder must be skipped"),
            Outbound::Broadcast { .. } => panic!("chains are targeted"),
        }
    }
    let events = route(&mut sim, &roster, 0, step);
    assert!(events
        .iter()
        .any(|(i, e)| *i == 0 && matches!(e, DealEvent::Community { cards } if cards.len() == 3)));
}

#[test]
fn showdown_reconstructs_all_remaining_hands() {
    let roster = ids(3);
    let mut sim = nodes(3);
    shuffle_all(&mut sim, &roster);
    let hands = deal_hole_cards(&mut sim, &roster);

    for _ in 0..3 {
        for i in 0..sim.len() {
            let step = sim[i].request_next_street().expect("street request");
            route(&mut sim, &roster, i, step);
        }
    }

    // p1 folded along the way.
    let reveal = sim[1].reveal_own_keys();
    for node in sim.iter_mut() {
        node.mark_folded("p1");
    }
    for i in [0usize, 2] {
        dispatch(&mut sim[i], "p1", &reveal).expect("fold reveal");
    }

    // p0 and p2 enter showdown and exchange keys.
    let mut all_events = Vec::new();
    for i in [0usize, 2] {
        let step = sim[i].begin_showdown().expect("showdown");
        all_events.extend(route(&mut sim, &roster, i, step));
    }

    let reconstructed: Vec<_> = all_events
        .iter()
        .filter_map(|(i, e)| match e {
            DealEvent::ShowdownHands { hands } => Some((*i, hands.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(reconstructed.len(), 2, "both contenders reconstruct");

    for (node_idx, reconstructed_hands) in reconstructed {
        assert_eq!(reconstructed_hands.len(), 2, "p1's hand is excluded");
        for (peer, cards) in reconstructed_hands {
            let seat: usize = peer[1..].parse().expect("seat digit");
            let mut expected = hands[seat];
            let mut got = cards;
            expected.sort_by_key(|c| c.to_byte());
            got.sort_by_key(|c| c.to_byte());
            assert_eq!(got, expected, "node {node_idx} reconstructs {peer}");
        }
    }
}

#[test]
fn malformed_deck_aborts_with_the_offender() {
    let roster = ids(2);
    let mut sim = nodes(2);
    let step = sim[0].start_shuffle().expect("start");
    let deck = match &step.outbound[0] {
        Outbound::Send { body: MessageBody::EncDeck(p), .. } => p.deck.clone(),
        other => panic!("expected enc_deck, got {other:?}"),
    };

    let err = sim[1]
        .handle_enc_deck("p0", deck[..51].to_vec())
        .expect_err("short deck");
    assert_eq!(
        err,
        DealError::DeckMalformed {
            from: "p0".into(),
            len: 51,
        }
    );
    assert!(err.aborts_hand());
    assert_eq!(err.offender(), Some("p0"));
}

#[test]
fn deck_from_the_wrong_seat_is_rejected_without_abort() {
    let roster = ids(3);
    let mut sim = nodes(3);
    let step = sim[0].start_shuffle().expect("start");
    let deck = match &step.outbound[0] {
        Outbound::Send { body: MessageBody::EncDeck(p), .. } => p.deck.clone(),
        other => panic!("expected enc_deck, got {other:?}"),
    };

    // Seat 2 expects the deck from seat 1, not seat 0.
    let err = sim[2].handle_enc_deck("p0", deck).expect_err("wrong sender");
    assert!(matches!(err, DealError::UnexpectedMessage { .. }));
    assert!(!err.aborts_hand());
    let _ = roster;
}

#[test]
fn forged_reveal_keys_flag_a_dishonest_peer() {
    let roster = ids(2);
    let mut sim = nodes(2);
    shuffle_all(&mut sim, &roster);

    let mut reveal = match sim[1].reveal_own_keys() {
        MessageBody::RevealKeys(p) => p,
        other => panic!("expected reveal_keys, got {other:?}"),
    };
    // Tamper with the decryption exponent.
    reveal.decryption_key = "3".into();
    sim[0].mark_folded("p1");
    let err = sim[0]
        .handle_reveal_keys("p1", &reveal)
        .expect_err("forged keys");
    assert_eq!(err, DealError::DishonestPeer { peer: "p1".into() });
    assert!(err.aborts_hand());
}

#[test]
fn duplicate_slot_contents_surface_inconsistent_decryption() {
    let roster = ids(2);
    let mut sim = nodes(2);

    // Run the shuffle normally, but tamper with the final broadcast so
    // p0 sees slot 1 duplicated into slot 0.
    let step = sim[0].start_shuffle().expect("start");
    let enc_deck = match &step.outbound[0] {
        Outbound::Send { body: MessageBody::EncDeck(p), .. } => p.deck.clone(),
        other => panic!("expected enc_deck, got {other:?}"),
    };
    let out = sim[1].handle_enc_deck("p0", enc_deck).expect("pass two");
    let mut final_deck = match &out.outbound[0] {
        Outbound::Broadcast { body: MessageBody::ShuffleStatus(p) } => p.deck.clone(),
        other => panic!("expected shuffle_status, got {other:?}"),
    };
    final_deck[0] = final_deck[1].clone();
    sim[0]
        .handle_shuffle_status("p1", final_deck)
        .expect("tampered deck accepted until decryption");

    // p0's hole chain covers slots 0 and 1; the duplicate must surface.
    let step = sim[0].request_hole_cards().expect("hole request");
    let get_rpc = match &step.outbound[0] {
        Outbound::Send { body, .. } => body.clone(),
        other => panic!("expected get_rpc, got {other:?}"),
    };
    let response = dispatch(&mut sim[1], "p0", &get_rpc).expect("partial decryption");
    let response_body = match &response.outbound[0] {
        Outbound::Send { body, .. } => body.clone(),
        other => panic!("expected rpc_response, got {other:?}"),
    };
    let err = dispatch(&mut sim[0], "p1", &response_body).expect_err("duplicate card");
    assert!(matches!(err, DealError::InconsistentDecryption { .. }));
    assert!(err.aborts_hand());
}

#[test]
fn rpc_response_from_the_wrong_peer_is_rejected() {
    let roster = ids(3);
    let mut sim = nodes(3);
    shuffle_all(&mut sim, &roster);

    let step = sim[0].request_hole_cards().expect("hole request");
    // The chain asks p1 first; fabricate a reply from p2 instead.
    let get_rpc = match &step.outbound[0] {
        Outbound::Send { to, body } => {
            assert_eq!(to, "p1");
            body.clone()
        }
        other => panic!("expected get_rpc, got {other:?}"),
    };
    let reply = dispatch(&mut sim[2], "p0", &get_rpc).expect("p2 can decrypt");
    let reply_body = match &reply.outbound[0] {
        Outbound::Send { body, .. } => body.clone(),
        other => panic!("expected rpc_response, got {other:?}"),
    };
    let err = dispatch(&mut sim[0], "p2", &reply_body).expect_err("wrong responder");
    assert!(matches!(err, DealError::UnexpectedMessage { .. }));
    assert!(!err.aborts_hand());
}
