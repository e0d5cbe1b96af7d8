use std::collections::{BTreeMap, BTreeSet, VecDeque};

use num_bigint::BigUint;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use crate::crypto::{shuffle_payloads, CardKeys};
use crate::domain::{Card, PlayerId, RotationId};
use crate::protocol::{
    DeckPayload, GetRpcPayload, MessageBody, RevealKeysPayload, RpcResponsePayload,
};

use super::errors::DealError;

const LOG_TARGET: &str = "mental::deal";

const DECK_SIZE: usize = 52;

/// Card byte `b` travels as payload `b + 2`: the residues 0 and 1 are fixed
/// points of `m^e mod p` and would leak those two cards.
const PAYLOAD_OFFSET: u8 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DealPhase {
    /// The deck is circulating for encrypt-and-shuffle passes.
    Shuffling,
    /// Deck finalized; hole and community reveals interleave with betting.
    Dealing,
    /// Everyone's keys are being revealed for hand reconstruction.
    Showdown,
    Aborted,
}

/// A message the protocol wants on the wire.
#[derive(Clone, Debug, PartialEq)]
pub enum Outbound {
    Send { to: PlayerId, body: MessageBody },
    Broadcast { body: MessageBody },
}

/// What a protocol step produced locally.
#[derive(Clone, Debug, PartialEq)]
pub enum DealEvent {
    /// The last shuffler fixed the deck; hole-card reveals may begin.
    DeckFinalized,
    /// Our own hole cards are recovered.
    HoleCards { cards: [Card; 2] },
    /// A street's community cards are recovered.
    Community { cards: Vec<Card> },
    /// Every remaining hand is reconstructed for showdown verification.
    ShowdownHands { hands: Vec<(PlayerId, [Card; 2])> },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DealStep {
    pub outbound: Vec<Outbound>,
    pub event: Option<DealEvent>,
}

impl DealStep {
    fn send(to: PlayerId, body: MessageBody) -> Self {
        Self {
            outbound: vec![Outbound::Send { to, body }],
            event: None,
        }
    }

    fn broadcast(body: MessageBody) -> Self {
        Self {
            outbound: vec![Outbound::Broadcast { body }],
            event: None,
        }
    }

    fn event(event: DealEvent) -> Self {
        Self {
            outbound: Vec::new(),
            event: Some(event),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RevealPurpose {
    HoleCards,
    Community,
}

/// A slot-reveal chain in flight: partial decryptions are gathered from one
/// peer at a time, and our own key is applied last.
#[derive(Clone, Debug)]
struct PendingReveal {
    purpose: RevealPurpose,
    slots: Vec<usize>,
    data: Vec<Vec<u8>>,
    awaiting: Option<PlayerId>,
    remaining: VecDeque<PlayerId>,
}

/// One player's view of the shuffle-and-deal protocol for a single hand.
///
/// Pure message-in/messages-out state machine: the table coordinator feeds
/// it wire payloads under the table lock and ships whatever it returns. All
/// randomness comes from the owned RNG.
pub struct MentalPokerHand {
    my_id: PlayerId,
    my_seat: RotationId,
    players: Vec<PlayerId>,
    prime: BigUint,
    keys: CardKeys,
    rng: StdRng,

    phase: DealPhase,
    shuffle_passes: usize,
    deck: Vec<Vec<u8>>,
    pending: Option<PendingReveal>,

    my_hole_cards: Option<[Card; 2]>,
    community: Vec<Card>,
    /// Seats the betting engine has reported folded; routes incoming key
    /// reveals and excludes those hands from showdown reconstruction.
    folded: BTreeSet<PlayerId>,
    folded_keys: BTreeMap<PlayerId, CardKeys>,
    revealed_keys: BTreeMap<PlayerId, CardKeys>,
    /// Card bytes recovered so far this hand, for duplicate detection.
    seen_bytes: BTreeSet<u8>,
    hands_reconstructed: bool,
}

impl MentalPokerHand {
    /// Create the per-hand protocol state. `players` is the hand's rotation
    /// order and must contain `my_id`.
    pub fn new(
        my_id: PlayerId,
        players: Vec<PlayerId>,
        prime: BigUint,
        rng: StdRng,
    ) -> Result<Self, DealError> {
        let my_seat = players
            .iter()
            .position(|p| p == &my_id)
            .expect("local player must be in the rotation");
        let mut rng = rng;
        let keys = CardKeys::generate_with(prime.clone(), &mut rng)?;
        Ok(Self {
            my_id,
            my_seat,
            players,
            prime,
            keys,
            rng,
            phase: DealPhase::Shuffling,
            shuffle_passes: 0,
            deck: Vec::new(),
            pending: None,
            my_hole_cards: None,
            community: Vec::new(),
            folded: BTreeSet::new(),
            folded_keys: BTreeMap::new(),
            revealed_keys: BTreeMap::new(),
            seen_bytes: BTreeSet::new(),
            hands_reconstructed: false,
        })
    }

    pub fn phase(&self) -> DealPhase {
        self.phase
    }

    pub fn my_seat(&self) -> RotationId {
        self.my_seat
    }

    pub fn my_hole_cards(&self) -> Option<[Card; 2]> {
        self.my_hole_cards
    }

    pub fn community(&self) -> &[Card] {
        &self.community
    }

    pub fn abort(&mut self) {
        self.phase = DealPhase::Aborted;
        self.pending = None;
    }

    // ------------------------------------------------------------------
    // Slot map: 2i, 2i+1 are seat i's hole cards; the five slots after all
    // hole cards are flop, turn, river.
    // ------------------------------------------------------------------

    fn hole_slots(&self, seat: RotationId) -> [usize; 2] {
        [2 * seat, 2 * seat + 1]
    }

    fn community_base(&self) -> usize {
        2 * self.players.len()
    }

    /// Slots for the next undealt street.
    fn next_street_slots(&self) -> Option<Vec<usize>> {
        let base = self.community_base();
        match self.community.len() {
            0 => Some((base..base + 3).collect()),
            3 => Some(vec![base + 3]),
            4 => Some(vec![base + 4]),
            _ => None,
        }
    }

    fn plaintext_deck() -> Vec<Vec<u8>> {
        (0..DECK_SIZE as u8).map(|b| vec![b + PAYLOAD_OFFSET]).collect()
    }

    fn decode_card(&mut self, payload: &[u8], slot: usize) -> Result<Card, DealError> {
        let byte = match payload {
            [b] if *b >= PAYLOAD_OFFSET => b - PAYLOAD_OFFSET,
            _ => return Err(DealError::InconsistentDecryption { slot }),
        };
        let card =
            Card::from_byte(byte).ok_or(DealError::InconsistentDecryption { slot })?;
        if !self.seen_bytes.insert(byte) {
            return Err(DealError::InconsistentDecryption { slot });
        }
        Ok(card)
    }

    fn other_players(&self) -> impl Iterator<Item = &PlayerId> {
        self.players.iter().filter(move |p| **p != self.my_id)
    }

    fn peer_keys(&self, peer: &str) -> Option<&CardKeys> {
        self.folded_keys
            .get(peer)
            .or_else(|| self.revealed_keys.get(peer))
    }

    // ------------------------------------------------------------------
    // Phase S: encrypt-and-shuffle
    // ------------------------------------------------------------------

    /// Seat 0 opens the shuffle with the plaintext deck.
    pub fn start_shuffle(&mut self) -> Result<DealStep, DealError> {
        if self.phase != DealPhase::Shuffling || self.my_seat != 0 || self.shuffle_passes != 0 {
            return Err(DealError::UnexpectedMessage {
                from: self.my_id.clone(),
                kind: "start_shuffle",
            });
        }
        let deck = Self::plaintext_deck();
        self.pass_deck_on(deck)
    }

    /// A deck arriving from the previous seat for our encrypt-and-shuffle
    /// pass.
    pub fn handle_enc_deck(
        &mut self,
        from: &str,
        deck: Vec<Vec<u8>>,
    ) -> Result<DealStep, DealError> {
        if self.phase != DealPhase::Shuffling || self.my_seat == 0 {
            return Err(DealError::UnexpectedMessage {
                from: from.to_string(),
                kind: "enc_deck",
            });
        }
        let expected_sender = &self.players[self.my_seat - 1];
        if from != expected_sender || self.shuffle_passes != 0 {
            return Err(DealError::UnexpectedMessage {
                from: from.to_string(),
                kind: "enc_deck",
            });
        }
        if deck.len() != DECK_SIZE {
            return Err(DealError::DeckMalformed {
                from: from.to_string(),
                len: deck.len(),
            });
        }
        self.pass_deck_on(deck)
    }

    fn pass_deck_on(&mut self, deck: Vec<Vec<u8>>) -> Result<DealStep, DealError> {
        let encrypted = self.keys.encrypt_all(&deck);
        let shuffled = shuffle_payloads(&encrypted, &mut self.rng)?;
        self.shuffle_passes = self.my_seat + 1;

        let last_seat = self.players.len() - 1;
        if self.my_seat == last_seat {
            self.deck = shuffled.clone();
            self.phase = DealPhase::Dealing;
            info!(
                target = LOG_TARGET,
                passes = self.players.len(),
                "deck fully encrypted and shuffled"
            );
            let mut step = DealStep::broadcast(MessageBody::ShuffleStatus(DeckPayload {
                deck: shuffled,
            }));
            step.event = Some(DealEvent::DeckFinalized);
            Ok(step)
        } else {
            let next = self.players[self.my_seat + 1].clone();
            debug!(target = LOG_TARGET, to = %next, "passing encrypted deck on");
            Ok(DealStep::send(
                next,
                MessageBody::EncDeck(DeckPayload { deck: shuffled }),
            ))
        }
    }

    /// The final deck broadcast by the last shuffler.
    pub fn handle_shuffle_status(
        &mut self,
        from: &str,
        deck: Vec<Vec<u8>>,
    ) -> Result<DealStep, DealError> {
        let last = self.players.last().expect("non-empty rotation");
        if self.phase != DealPhase::Shuffling || from != last {
            return Err(DealError::UnexpectedMessage {
                from: from.to_string(),
                kind: "shuffle_status",
            });
        }
        if deck.len() != DECK_SIZE {
            return Err(DealError::DeckMalformed {
                from: from.to_string(),
                len: deck.len(),
            });
        }
        self.deck = deck;
        self.phase = DealPhase::Dealing;
        Ok(DealStep::event(DealEvent::DeckFinalized))
    }

    // ------------------------------------------------------------------
    // Phase D: distribution via partial-decryption chains
    // ------------------------------------------------------------------

    /// Open the reveal chain for our own hole cards.
    pub fn request_hole_cards(&mut self) -> Result<DealStep, DealError> {
        if self.phase != DealPhase::Dealing
            || self.pending.is_some()
            || self.my_hole_cards.is_some()
        {
            return Err(DealError::UnexpectedMessage {
                from: self.my_id.clone(),
                kind: "request_hole_cards",
            });
        }
        let slots = self.hole_slots(self.my_seat).to_vec();
        let data: Vec<Vec<u8>> = slots.iter().map(|&s| self.deck[s].clone()).collect();
        let remaining: VecDeque<PlayerId> = self.other_players().cloned().collect();
        self.advance_chain(PendingReveal {
            purpose: RevealPurpose::HoleCards,
            slots,
            data,
            awaiting: None,
            remaining,
        })
    }

    /// Open the reveal chain for the next street's community cards. Keys
    /// already revealed (by folders or at showdown) are applied locally, so
    /// those peers are never waited on.
    pub fn request_next_street(&mut self) -> Result<DealStep, DealError> {
        if self.phase != DealPhase::Dealing || self.pending.is_some() {
            return Err(DealError::UnexpectedMessage {
                from: self.my_id.clone(),
                kind: "request_next_street",
            });
        }
        let slots = self
            .next_street_slots()
            .ok_or_else(|| DealError::UnexpectedMessage {
                from: self.my_id.clone(),
                kind: "request_next_street",
            })?;
        let mut data: Vec<Vec<u8>> = slots.iter().map(|&s| self.deck[s].clone()).collect();

        let mut remaining = VecDeque::new();
        for peer in self.other_players().cloned().collect::<Vec<_>>() {
            match self.peer_keys(&peer) {
                Some(keys) => {
                    data = keys.decrypt_all(&data);
                }
                None => remaining.push_back(peer),
            }
        }
        self.advance_chain(PendingReveal {
            purpose: RevealPurpose::Community,
            slots,
            data,
            awaiting: None,
            remaining,
        })
    }

    /// Serve a peer's partial-decryption request. Served in any live phase:
    /// only our own key is involved, and a peer's chain may open before our
    /// copy of the final deck lands.
    pub fn handle_get_rpc(
        &mut self,
        from: &str,
        payload: &GetRpcPayload,
    ) -> Result<DealStep, DealError> {
        if self.phase == DealPhase::Aborted {
            return Err(DealError::UnexpectedMessage {
                from: from.to_string(),
                kind: "get_rpc",
            });
        }
        if payload.card_indices.len() != payload.encrypted_data.len()
            || payload.card_indices.iter().any(|&i| i >= DECK_SIZE)
        {
            return Err(DealError::UnexpectedMessage {
                from: from.to_string(),
                kind: "get_rpc",
            });
        }
        let decrypted = self.keys.decrypt_all(&payload.encrypted_data);
        debug!(
            target = LOG_TARGET,
            to = %from,
            slots = ?payload.card_indices,
            "served partial decryption"
        );
        Ok(DealStep::send(
            from.to_string(),
            MessageBody::RpcResponse(RpcResponsePayload {
                card_indices: payload.card_indices.clone(),
                decrypted_data: decrypted,
            }),
        ))
    }

    /// A partial decryption arriving for our pending chain.
    pub fn handle_rpc_response(
        &mut self,
        from: &str,
        payload: &RpcResponsePayload,
    ) -> Result<DealStep, DealError> {
        let pending = self.pending.take().ok_or_else(|| DealError::UnexpectedMessage {
            from: from.to_string(),
            kind: "rpc_response",
        })?;
        let expected = pending.awaiting.as_deref() == Some(from)
            && payload.card_indices == pending.slots
            && payload.decrypted_data.len() == pending.slots.len();
        if !expected {
            let kind = "rpc_response";
            self.pending = Some(pending);
            return Err(DealError::UnexpectedMessage {
                from: from.to_string(),
                kind,
            });
        }
        self.advance_chain(PendingReveal {
            data: payload.decrypted_data.clone(),
            awaiting: None,
            ..pending
        })
    }

    /// Ask the next peer in the chain, or finish the reveal with our own key.
    fn advance_chain(&mut self, mut pending: PendingReveal) -> Result<DealStep, DealError> {
        if let Some(next) = pending.remaining.pop_front() {
            let body = MessageBody::GetRpc(GetRpcPayload {
                card_indices: pending.slots.clone(),
                encrypted_data: pending.data.clone(),
                original_owner: self.my_id.clone(),
            });
            pending.awaiting = Some(next.clone());
            self.pending = Some(pending);
            return Ok(DealStep::send(next, body));
        }

        // Every peer has contributed; our key comes off last.
        let plain = self.keys.decrypt_all(&pending.data);
        let mut cards = Vec::with_capacity(plain.len());
        for (payload, &slot) in plain.iter().zip(&pending.slots) {
            cards.push(self.decode_card(payload, slot)?);
        }

        match pending.purpose {
            RevealPurpose::HoleCards => {
                let hole = [cards[0], cards[1]];
                self.my_hole_cards = Some(hole);
                info!(
                    target = LOG_TARGET,
                    cards = %format!("{} {}", hole[0], hole[1]),
                    "hole cards recovered"
                );
                Ok(DealStep::event(DealEvent::HoleCards { cards: hole }))
            }
            RevealPurpose::Community => {
                self.community.extend_from_slice(&cards);
                info!(
                    target = LOG_TARGET,
                    count = cards.len(),
                    total = self.community.len(),
                    "community cards recovered"
                );
                Ok(DealStep::event(DealEvent::Community { cards }))
            }
        }
    }

    // ------------------------------------------------------------------
    // Phases R and W: key reveals
    // ------------------------------------------------------------------

    /// Our own reveal, broadcast when we fold or at showdown.
    pub fn reveal_own_keys(&self) -> MessageBody {
        MessageBody::RevealKeys(RevealKeysPayload {
            encryption_key: self.keys.enc_hex(),
            decryption_key: self.keys.dec_hex(),
            prime: self.keys.prime_hex(),
        })
    }

    /// Record a fold reported by the betting engine. Keys that peer reveals
    /// are filed as fold keys and their hand is excluded at showdown.
    pub fn mark_folded(&mut self, peer: &str) {
        self.folded.insert(peer.to_string());
        if let Some(keys) = self.revealed_keys.remove(peer) {
            self.folded_keys.insert(peer.to_string(), keys);
        }
    }

    /// Keys revealed by a peer, on fold or at showdown. Inverse validation
    /// failures mark the peer dishonest and abort the hand.
    pub fn handle_reveal_keys(
        &mut self,
        from: &str,
        payload: &RevealKeysPayload,
    ) -> Result<DealStep, DealError> {
        if !matches!(self.phase, DealPhase::Dealing | DealPhase::Showdown) {
            return Err(DealError::UnexpectedMessage {
                from: from.to_string(),
                kind: "reveal_keys",
            });
        }
        if !self.players.iter().any(|p| p == from) {
            return Err(DealError::UnexpectedMessage {
                from: from.to_string(),
                kind: "reveal_keys",
            });
        }
        let keys = CardKeys::from_hex_parts(
            &payload.prime,
            &payload.encryption_key,
            &payload.decryption_key,
        )
        .map_err(|_| DealError::DishonestPeer {
            peer: from.to_string(),
        })?;
        if keys.prime() != &self.prime {
            return Err(DealError::DishonestPeer {
                peer: from.to_string(),
            });
        }

        if self.folded.contains(from) {
            info!(target = LOG_TARGET, peer = %from, "fold keys received");
            self.folded_keys.insert(from.to_string(), keys);
        } else {
            self.revealed_keys.insert(from.to_string(), keys);
        }
        if self.phase == DealPhase::Showdown {
            self.try_reconstruct_hands()
        } else {
            Ok(DealStep::default())
        }
    }

    /// Enter showdown: broadcast our own keys and wait for everyone else's.
    pub fn begin_showdown(&mut self) -> Result<DealStep, DealError> {
        if self.phase != DealPhase::Dealing {
            return Err(DealError::UnexpectedMessage {
                from: self.my_id.clone(),
                kind: "begin_showdown",
            });
        }
        self.phase = DealPhase::Showdown;
        let mut step = DealStep::broadcast(self.reveal_own_keys());
        // All other keys may already be on hand (everyone else folded or
        // revealed); reconstruction can then complete without waiting.
        let reconstruct = self.try_reconstruct_hands()?;
        step.event = reconstruct.event;
        Ok(step)
    }

    /// Once every peer's keys are known, rebuild all remaining hole cards
    /// so the declared hands can be verified.
    fn try_reconstruct_hands(&mut self) -> Result<DealStep, DealError> {
        if self.hands_reconstructed {
            return Ok(DealStep::default());
        }
        let all_known = self
            .other_players()
            .all(|p| self.folded_keys.contains_key(p) || self.revealed_keys.contains_key(p));
        if !all_known {
            return Ok(DealStep::default());
        }
        let my_hole = match self.my_hole_cards {
            Some(h) => h,
            None => {
                warn!(target = LOG_TARGET, "showdown before own hole cards known");
                return Ok(DealStep::default());
            }
        };

        let mut hands = vec![(self.my_id.clone(), my_hole)];
        let contenders: Vec<(PlayerId, RotationId)> = self
            .players
            .iter()
            .enumerate()
            .filter(|(_, p)| **p != self.my_id && !self.folded.contains(*p))
            .map(|(seat, p)| (p.clone(), seat))
            .collect();

        for (peer, seat) in contenders {
            let slots = self.hole_slots(seat);
            let mut cards = [Card::from_byte(0).expect("byte 0 valid"); 2];
            for (i, &slot) in slots.iter().enumerate() {
                let mut payload = self.deck[slot].clone();
                payload = self.keys.decrypt(&payload);
                for other in self.players.clone() {
                    if other == self.my_id {
                        continue;
                    }
                    let keys = self
                        .peer_keys(&other)
                        .expect("all peer keys known")
                        .clone();
                    payload = keys.decrypt(&payload);
                }
                cards[i] = self.decode_card(&payload, slot)?;
            }
            hands.push((peer, cards));
        }

        self.hands_reconstructed = true;
        info!(
            target = LOG_TARGET,
            hands = hands.len(),
            "showdown hands reconstructed"
        );
        Ok(DealStep::event(DealEvent::ShowdownHands { hands }))
    }
}
