use std::sync::Arc;

use chrono::Utc;
use num_bigint::BigUint;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::TableConfig;
use crate::domain::{Chips, PlayerId};
use crate::engine::{
    card_view, ActionOutcome, GameEngine, GameStatus, PlayerAction, RoundTransition,
};
use crate::mental::{DealError, DealEvent, DealStep, MentalPokerHand, Outbound};
use crate::protocol::{
    CommunityCardEvent, ErrorCode, ErrorPayload, Event, EventBody, GameAbortedEvent,
    HandshakePayload, Message, MessageBody, NewHandEvent, PenaltyAppliedEvent, PlayerAbandonedEvent,
    PlayerActionEvent, PlayerActionPayload, PlayerDisconnectedEvent, PlayerJoinedEvent,
    PlayerLeftEvent, PlayerReadyPayload, PlayerReconnectedEvent, PongPayload, ShowdownEvent,
    ShowdownResultPayload, ShowdownSeatResult, TurnChangeEvent, WinnerData, WinnerEvent,
};
use crate::settlement::{GameId, SettlementAdapter};
use crate::transport::{PeerSink, TableCommand};

use super::broadcast::EventSink;
use super::disconnect::DisconnectSupervisor;

const LOG_TARGET: &str = "table::coordinator";

const PROTOCOL_VERSION: &str = "1.0";
const GAME_VARIANT: &str = "texas-holdem";

/// Everything mutable about one table, guarded by a single lock. All state
/// transitions happen under it; the suspension points of the owning task
/// are the inbound queue, the grace timers, and spawned settlement calls.
struct TableState {
    engine: GameEngine,
    deal: Option<MentalPokerHand>,
    game_id: Option<GameId>,
    aborting: bool,
}

/// Handle to a running table.
pub struct Table {
    local_id: PlayerId,
    tx: mpsc::Sender<TableCommand>,
    state: Arc<Mutex<TableState>>,
    shutdown: CancellationToken,
    worker: JoinHandle<()>,
}

impl Table {
    pub async fn command(&self, command: TableCommand) {
        if self.tx.send(command).await.is_err() {
            warn!(target = LOG_TARGET, "table worker gone, command dropped");
        }
    }

    /// Signal the local player is ready for the next hand.
    pub async fn ready(&self) {
        self.command(TableCommand::LocalReady).await;
    }

    /// Take a betting action as the local player.
    pub async fn act(&self, action: &str, value: Chips) {
        self.command(TableCommand::LocalAction {
            action: action.to_string(),
            value,
        })
        .await;
    }

    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    /// Serializable view of the table, for resynchronization and the
    /// snapshot collaborator.
    pub fn snapshot(&self) -> crate::protocol::GameStatePayload {
        self.state.lock().engine.game_state_payload()
    }

    pub fn status(&self) -> GameStatus {
        self.state.lock().engine.status()
    }

    /// Cooperative shutdown: aborts any live hand, cancels grace timers,
    /// and joins the worker.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(err) = self.worker.await {
            warn!(target = LOG_TARGET, error = %err, "table worker join failed");
        }
    }
}

/// Spawns and runs one table's owner task.
pub struct TableCoordinator {
    local_id: PlayerId,
    config: TableConfig,
    prime: BigUint,
    state: Arc<Mutex<TableState>>,
    sink: Arc<dyn PeerSink>,
    events: EventSink,
    settlement: Arc<dyn SettlementAdapter>,
    supervisor: DisconnectSupervisor,
    tx: mpsc::Sender<TableCommand>,
}

impl TableCoordinator {
    /// Spawn the per-table worker. Returns the table handle and the
    /// outbound event stream.
    pub fn spawn(
        local_id: impl Into<PlayerId>,
        config: TableConfig,
        sink: Arc<dyn PeerSink>,
        settlement: Arc<dyn SettlementAdapter>,
    ) -> anyhow::Result<(Table, mpsc::Receiver<Event>)> {
        let local_id = local_id.into();
        let prime = config.shared_prime()?;
        let (tx, rx) = mpsc::channel(config.inbound_queue_capacity);
        let (events, events_rx) = EventSink::new(local_id.clone(), config.event_buffer_capacity);
        let state = Arc::new(Mutex::new(TableState {
            engine: GameEngine::new(config.rules()),
            deal: None,
            game_id: None,
            aborting: false,
        }));
        let shutdown = CancellationToken::new();

        let coordinator = TableCoordinator {
            local_id: local_id.clone(),
            supervisor: DisconnectSupervisor::new(config.grace_period(), tx.clone()),
            config,
            prime,
            state: Arc::clone(&state),
            sink,
            events,
            settlement,
            tx: tx.clone(),
        };
        let worker = tokio::spawn(coordinator.run(rx, shutdown.clone()));

        Ok((
            Table {
                local_id,
                tx,
                state,
                shutdown,
                worker,
            },
            events_rx,
        ))
    }

    async fn run(self, mut rx: mpsc::Receiver<TableCommand>, shutdown: CancellationToken) {
        info!(target = LOG_TARGET, local = %self.local_id, "table worker started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    self.handle_shutdown();
                    break;
                }
                command = rx.recv() => match command {
                    None => {
                        self.handle_shutdown();
                        break;
                    }
                    Some(TableCommand::Shutdown) => {
                        self.handle_shutdown();
                        break;
                    }
                    Some(command) => self.handle_command(command),
                },
            }
        }
        info!(target = LOG_TARGET, local = %self.local_id, "table worker stopped");
    }

    fn handle_command(&self, command: TableCommand) {
        let mut state = self.state.lock();
        match command {
            TableCommand::Message(inbound) => match Message::from_bytes(&inbound.bytes) {
                Ok(message) => {
                    if message.from != inbound.from {
                        self.send_error(
                            &inbound.from,
                            ErrorCode::InvalidMessage,
                            "envelope sender mismatch",
                        );
                        return;
                    }
                    self.handle_message(&mut state, &inbound.from, message.body);
                }
                Err(err) => {
                    debug!(target = LOG_TARGET, from = %inbound.from, error = %err, "unparseable message");
                    self.send_error(&inbound.from, ErrorCode::InvalidMessage, "malformed envelope");
                }
            },
            TableCommand::Joined(peer) => self.handle_joined(&mut state, &peer),
            TableCommand::Left(peer) => self.handle_left(&mut state, &peer),
            TableCommand::Disconnected(peer) => self.handle_disconnected(&mut state, &peer),
            TableCommand::Reconnected(peer) => self.handle_reconnected(&mut state, &peer),
            TableCommand::LocalReady => self.handle_local_ready(&mut state),
            TableCommand::LocalAction { action, value } => {
                self.handle_local_action(&mut state, &action, value)
            }
            TableCommand::GraceExpired(peer) => self.handle_grace_expired(&mut state, &peer),
            TableCommand::SettlementCreated(game_id) => {
                info!(target = LOG_TARGET, "settlement game recorded");
                state.game_id = Some(game_id);
            }
            TableCommand::Shutdown => unreachable!("handled by the run loop"),
        }
    }

    // ------------------------------------------------------------------
    // Wire dispatch
    // ------------------------------------------------------------------

    fn handle_message(&self, state: &mut TableState, from: &str, body: MessageBody) {
        debug!(target = LOG_TARGET, from = %from, kind = body.kind(), "inbound message");
        match body {
            MessageBody::Handshake(payload) => {
                if payload.game_variant != GAME_VARIANT {
                    self.send_error(from, ErrorCode::InvalidMessage, "unsupported game variant");
                    return;
                }
                self.send_msg(
                    from,
                    MessageBody::Handshake(HandshakePayload {
                        version: PROTOCOL_VERSION.to_string(),
                        game_variant: GAME_VARIANT.to_string(),
                        listen_addr: self.local_id.clone(),
                    }),
                );
            }
            MessageBody::PlayerReady(_) => {
                if state.engine.player(from).is_none() {
                    if let Err(err) = state.engine.add_player(from) {
                        self.send_error(from, err.wire_code(), err.to_string());
                        return;
                    }
                    self.emit_joined(state, from);
                }
                state.engine.set_ready(from);
                self.maybe_start_hand(state);
            }
            MessageBody::PlayerAction(payload) => self.handle_peer_action(state, from, payload),
            MessageBody::EncDeck(payload) => {
                self.deal_step(state, from, |deal| deal.handle_enc_deck(from, payload.deck));
            }
            MessageBody::ShuffleStatus(payload) => {
                self.deal_step(state, from, |deal| {
                    deal.handle_shuffle_status(from, payload.deck)
                });
            }
            MessageBody::GetRpc(payload) => {
                self.deal_step(state, from, |deal| deal.handle_get_rpc(from, &payload));
            }
            MessageBody::RpcResponse(payload) => {
                self.deal_step(state, from, |deal| deal.handle_rpc_response(from, &payload));
            }
            MessageBody::RevealKeys(payload) => {
                self.deal_step(state, from, |deal| deal.handle_reveal_keys(from, &payload));
            }
            MessageBody::ShowdownResult(payload) => {
                info!(
                    target = LOG_TARGET,
                    from = %from,
                    hand = %payload.hand_name,
                    rank = payload.hand_rank,
                    "peer declared showdown hand"
                );
            }
            MessageBody::GameState(_) => {
                debug!(target = LOG_TARGET, from = %from, "peer snapshot ignored");
            }
            MessageBody::Ping(payload) => {
                self.send_msg(
                    from,
                    MessageBody::Pong(PongPayload {
                        timestamp: Utc::now().timestamp(),
                        ping_timestamp: payload.timestamp,
                    }),
                );
            }
            MessageBody::Pong(_) => {}
            MessageBody::Error(payload) => {
                warn!(
                    target = LOG_TARGET,
                    from = %from,
                    code = ?payload.code,
                    message = %payload.message,
                    "peer reported error"
                );
            }
        }
    }

    fn handle_peer_action(&self, state: &mut TableState, from: &str, payload: PlayerActionPayload) {
        if payload.current_game_status != state.engine.status().as_str() {
            self.send_error(
                from,
                ErrorCode::InvalidAction,
                format!(
                    "action for {} but table is at {}",
                    payload.current_game_status,
                    state.engine.status()
                ),
            );
            return;
        }
        let action = match PlayerAction::parse(&payload.action, payload.value) {
            Ok(action) => action,
            Err(err) => {
                self.send_error(from, err.wire_code(), err.to_string());
                return;
            }
        };
        match state.engine.apply_action(from, action) {
            Ok(outcome) => {
                if outcome.folded {
                    if let Some(deal) = state.deal.as_mut() {
                        deal.mark_folded(from);
                    }
                }
                self.emit_action(state, &outcome);
                self.handle_transition(state, outcome.transition);
            }
            Err(err) => self.send_error(from, err.wire_code(), err.to_string()),
        }
    }

    // ------------------------------------------------------------------
    // Local player intents
    // ------------------------------------------------------------------

    fn handle_local_ready(&self, state: &mut TableState) {
        let local = self.local_id.clone();
        if state.engine.player(&local).is_none() {
            if let Err(err) = state.engine.add_player(&local) {
                self.emit_error(err.wire_code(), err.to_string());
                return;
            }
            self.emit_joined(state, &local);
        }
        state.engine.set_ready(&local);
        self.broadcast_msg(MessageBody::PlayerReady(PlayerReadyPayload {
            player_id: local,
        }));
        self.maybe_start_hand(state);
    }

    fn handle_local_action(&self, state: &mut TableState, action: &str, value: Chips) {
        let local = self.local_id.clone();
        let action = match PlayerAction::parse(action, value) {
            Ok(action) => action,
            Err(err) => {
                self.emit_error(err.wire_code(), err.to_string());
                return;
            }
        };

        // The key reveal must be on the wire before the fold is announced,
        // so peers can always finish the hand without us. A quick legality
        // probe avoids leaking keys on a rejected fold.
        let is_fold = matches!(action, PlayerAction::Fold);
        if is_fold && state.engine.valid_actions(&local).contains(&"fold") {
            if let Some(deal) = state.deal.as_ref() {
                self.broadcast_msg(deal.reveal_own_keys());
            }
        }

        let status = state.engine.status().as_str().to_string();
        match state.engine.apply_action(&local, action) {
            Ok(outcome) => {
                if outcome.folded {
                    if let Some(deal) = state.deal.as_mut() {
                        deal.mark_folded(&local);
                    }
                }
                self.broadcast_msg(MessageBody::PlayerAction(PlayerActionPayload {
                    action: outcome.action.name().to_string(),
                    value,
                    current_game_status: status,
                }));
                self.emit_action(state, &outcome);
                self.handle_transition(state, outcome.transition);
            }
            Err(err) => self.emit_error(err.wire_code(), err.to_string()),
        }
    }

    // ------------------------------------------------------------------
    // Liveness
    // ------------------------------------------------------------------

    fn handle_joined(&self, state: &mut TableState, peer: &str) {
        match state.engine.add_player(peer) {
            Ok(()) => self.emit_joined(state, peer),
            Err(err) => self.send_error(peer, err.wire_code(), err.to_string()),
        }
    }

    /// A clean goodbye. Mid-hand it is indistinguishable from a disconnect:
    /// the hand cannot reach showdown without the leaver's keys, so the
    /// grace/penalty pathway takes over. Between hands the seat is freed.
    fn handle_left(&self, state: &mut TableState, peer: &str) {
        self.events.emit(EventBody::PlayerLeft(PlayerLeftEvent {
            player_id: peer.to_string(),
            reason: "left".into(),
        }));
        let mid_hand = state.engine.status() != GameStatus::Waiting
            && state.engine.rotation().contains(&peer.to_string());
        if mid_hand {
            self.handle_disconnected(state, peer);
        } else {
            state.engine.remove_player(peer);
            self.supervisor.cancel(peer);
        }
    }

    fn handle_disconnected(&self, state: &mut TableState, peer: &str) {
        if state.engine.player(peer).is_none() {
            return;
        }
        state.engine.set_active(peer, false);
        let mid_hand =
            state.engine.status() != GameStatus::Waiting && state.engine.rotation().contains(&peer.to_string());
        if !mid_hand || state.aborting {
            return;
        }
        if self.supervisor.player_disconnected(peer) {
            self.events
                .emit(EventBody::PlayerDisconnected(PlayerDisconnectedEvent {
                    player_id: peer.to_string(),
                    timeout: format!("{}s", self.supervisor.grace().as_secs()),
                }));
        }
    }

    fn handle_reconnected(&self, state: &mut TableState, peer: &str) {
        if state.engine.player(peer).is_none() {
            return;
        }
        state.engine.set_active(peer, true);
        if self.supervisor.player_reconnected(peer) {
            self.events
                .emit(EventBody::PlayerReconnected(PlayerReconnectedEvent {
                    player_id: peer.to_string(),
                }));
        }
    }

    /// The penalty pathway. At most one abort is in flight per hand; once
    /// the hand is back at `Waiting`, later expiries are no-ops.
    fn handle_grace_expired(&self, state: &mut TableState, peer: &str) {
        if state.aborting {
            debug!(target = LOG_TARGET, player = %peer, "abort already in flight");
            return;
        }
        state.aborting = true;
        match state.engine.apply_abandonment(peer) {
            Ok(penalty) => {
                self.events
                    .emit(EventBody::PlayerAbandoned(PlayerAbandonedEvent {
                        player_id: penalty.abandoned.clone(),
                        penalty_amount: penalty.penalty_amount,
                    }));
                self.events
                    .emit(EventBody::PenaltyApplied(PenaltyAppliedEvent {
                        abandoned_player: penalty.abandoned.clone(),
                        penalty_amount: penalty.penalty_amount,
                        distribution: penalty.distribution.clone(),
                    }));
                self.events.emit(EventBody::GameAborted(GameAbortedEvent {
                    abandoned_player: penalty.abandoned.clone(),
                    remaining_players: penalty
                        .distribution
                        .iter()
                        .map(|(id, _)| id.clone())
                        .collect(),
                    reason: "abandonment".into(),
                }));

                if let Some(deal) = state.deal.as_mut() {
                    deal.abort();
                }
                state.deal = None;

                if let Some(game_id) = state.game_id {
                    let settlement = Arc::clone(&self.settlement);
                    let (winners, amounts): (Vec<_>, Vec<_>) =
                        penalty.distribution.iter().cloned().unzip();
                    let abandoned = penalty.abandoned.clone();
                    tokio::spawn(async move {
                        if let Err(err) = settlement
                            .end_with_penalty(game_id, abandoned, winners, amounts)
                            .await
                        {
                            warn!(target = LOG_TARGET, error = %err, "penalty settlement failed");
                        }
                    });
                }
            }
            Err(err) => {
                debug!(target = LOG_TARGET, player = %peer, error = %err, "abandonment dropped");
            }
        }
        state.aborting = false;
    }

    fn handle_shutdown(&self) {
        let state = self.state.lock();
        if state.engine.status() != GameStatus::Waiting {
            self.events.emit(EventBody::GameAborted(GameAbortedEvent {
                abandoned_player: String::new(),
                remaining_players: state.engine.rotation().to_vec(),
                reason: "shutdown".into(),
            }));
        }
        self.supervisor.cancel_all();
    }

    // ------------------------------------------------------------------
    // Hand lifecycle
    // ------------------------------------------------------------------

    fn maybe_start_hand(&self, state: &mut TableState) {
        let local_seated = state
            .engine
            .player(&self.local_id)
            .is_some_and(|p| p.is_ready && p.is_active);
        if !state.engine.can_start_hand() || !local_seated {
            return;
        }

        if state.game_id.is_none() {
            self.spawn_settlement_setup(state);
        }

        let start = match state.engine.start_hand() {
            Ok(start) => start,
            Err(err) => {
                warn!(target = LOG_TARGET, error = %err, "hand start failed");
                return;
            }
        };
        info!(
            target = LOG_TARGET,
            dealer = start.dealer,
            players = start.players.len(),
            "new hand started"
        );
        self.events.emit(EventBody::NewHand(NewHandEvent {
            dealer_id: start.dealer,
            small_blind: self.config.small_blind,
            big_blind: self.config.big_blind,
            player_count: start.players.len(),
            players: start.players.clone(),
        }));
        self.events.emit(EventBody::BlindsPosted(
            crate::protocol::BlindsPostedEvent {
                small_blind_player: start.small_blind_player.clone(),
                big_blind_player: start.big_blind_player.clone(),
                small_blind_amount: start.small_blind_posted,
                big_blind_amount: start.big_blind_posted,
            },
        ));

        let deal = MentalPokerHand::new(
            self.local_id.clone(),
            start.players,
            self.prime.clone(),
            StdRng::from_entropy(),
        );
        let mut deal = match deal {
            Ok(deal) => deal,
            Err(err) => {
                warn!(target = LOG_TARGET, error = %err, "key generation failed, aborting hand");
                self.abort_hand(state, "fatal");
                return;
            }
        };

        let opening = if deal.my_seat() == 0 {
            Some(deal.start_shuffle())
        } else {
            None
        };
        state.deal = Some(deal);
        if let Some(step) = opening {
            match step {
                Ok(step) => self.process_deal_step(state, step),
                Err(err) => {
                    warn!(target = LOG_TARGET, error = %err, "shuffle start failed");
                    self.abort_hand(state, "fatal");
                    return;
                }
            }
        }
        self.broadcast_snapshot(state);
    }

    fn handle_transition(&self, state: &mut TableState, transition: RoundTransition) {
        match transition {
            RoundTransition::Continued { next_turn } => self.emit_turn_change(state, next_turn),
            RoundTransition::RoundEnded { new_status } => match new_status {
                GameStatus::Showdown => self.begin_showdown(state),
                _ => self.request_street(state),
            },
            RoundTransition::HandEndedByFold { winner, pot } => {
                let new_stack = state.engine.player(&winner).map(|p| p.stack).unwrap_or(0);
                self.events.emit(EventBody::Winner(WinnerEvent {
                    winners: vec![WinnerData {
                        player_id: winner.clone(),
                        amount: pot,
                        hand_name: String::new(),
                        new_stack,
                    }],
                    pot,
                }));
                self.finish_hand(state, vec![(winner, pot)]);
            }
        }
    }

    fn request_street(&self, state: &mut TableState) {
        let step = match state.deal.as_mut() {
            Some(deal) => deal.request_next_street(),
            None => return,
        };
        match step {
            Ok(step) => self.process_deal_step(state, step),
            Err(err) => self.handle_deal_error(state, err),
        }
    }

    fn begin_showdown(&self, state: &mut TableState) {
        let step = match state.deal.as_mut() {
            Some(deal) => deal.begin_showdown(),
            None => return,
        };
        match step {
            Ok(step) => self.process_deal_step(state, step),
            Err(err) => self.handle_deal_error(state, err),
        }
    }

    /// Run one deal-protocol call, shipping its messages and folding its
    /// event back into the table.
    fn deal_step<F>(&self, state: &mut TableState, from: &str, op: F)
    where
        F: FnOnce(&mut MentalPokerHand) -> Result<DealStep, DealError>,
    {
        let result = match state.deal.as_mut() {
            Some(deal) => op(deal),
            None => {
                self.send_error(from, ErrorCode::GameNotStarted, "no deal in progress");
                return;
            }
        };
        match result {
            Ok(step) => self.process_deal_step(state, step),
            Err(err) => self.handle_deal_error(state, err),
        }
    }

    fn process_deal_step(&self, state: &mut TableState, step: DealStep) {
        self.ship(step.outbound);
        let Some(event) = step.event else {
            return;
        };
        match event {
            DealEvent::DeckFinalized => {
                let step = match state.deal.as_mut() {
                    Some(deal) => deal.request_hole_cards(),
                    None => return,
                };
                match step {
                    Ok(step) => self.process_deal_step(state, step),
                    Err(err) => self.handle_deal_error(state, err),
                }
            }
            DealEvent::HoleCards { .. } => {
                match state.engine.begin_preflop() {
                    Ok(first) => {
                        self.broadcast_snapshot(state);
                        self.emit_turn_change(state, first);
                    }
                    Err(err) => {
                        debug!(target = LOG_TARGET, error = %err, "preflop already open");
                    }
                }
            }
            DealEvent::Community { cards } => {
                state.engine.push_community_cards(&cards);
                let stage = match state.engine.community_cards().len() {
                    3 => "flop",
                    4 => "turn",
                    _ => "river",
                };
                self.events
                    .emit(EventBody::CommunityCard(CommunityCardEvent {
                        stage: stage.to_string(),
                        cards: cards.iter().map(card_view).collect(),
                    }));
                self.continue_after_street(state);
            }
            DealEvent::ShowdownHands { hands } => self.resolve_showdown(state, hands),
        }
    }

    /// After a street's cards land: either betting resumes, or (all-in
    /// lock) the remaining streets run out without action.
    fn continue_after_street(&self, state: &mut TableState) {
        if state.engine.status().is_betting() {
            if state.engine.betting_skipped() {
                let next = state.engine.advance_street_forced();
                if next == GameStatus::Showdown {
                    self.begin_showdown(state);
                } else {
                    self.request_street(state);
                }
            } else {
                self.emit_turn_change(state, state.engine.current_turn());
            }
        } else if state.engine.status() == GameStatus::Showdown {
            self.begin_showdown(state);
        }
    }

    fn resolve_showdown(&self, state: &mut TableState, hands: Vec<(PlayerId, [crate::domain::Card; 2])>) {
        let outcome = match state.engine.resolve_showdown(&hands) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(target = LOG_TARGET, error = %err, "showdown resolution failed");
                self.abort_hand(state, "fatal");
                return;
            }
        };

        let results: Vec<ShowdownSeatResult> = outcome
            .results
            .iter()
            .map(|r| ShowdownSeatResult {
                player_id: r.player_id.clone(),
                hand: r.hole_cards.iter().map(card_view).collect(),
                hand_rank: r.rank.name().to_string(),
                rank: r.rank.ordering_key(),
            })
            .collect();
        self.events
            .emit(EventBody::Showdown(ShowdownEvent { results }));

        if let Some(own) = outcome
            .results
            .iter()
            .find(|r| r.player_id == self.local_id)
        {
            self.broadcast_msg(MessageBody::ShowdownResult(ShowdownResultPayload {
                player_addr: self.local_id.clone(),
                hand_rank: own.rank.ordering_key(),
                hand_name: own.rank.name().to_string(),
                cards: own.hole_cards.iter().map(|c| c.to_string()).collect(),
            }));
        }

        let winners: Vec<WinnerData> = outcome
            .payouts
            .iter()
            .map(|(id, amount)| WinnerData {
                player_id: id.clone(),
                amount: *amount,
                hand_name: outcome
                    .results
                    .iter()
                    .find(|r| &r.player_id == id)
                    .map(|r| r.rank.name().to_string())
                    .unwrap_or_default(),
                new_stack: state.engine.player(id).map(|p| p.stack).unwrap_or(0),
            })
            .collect();
        self.events.emit(EventBody::Winner(WinnerEvent {
            winners,
            pot: outcome.pot_total,
        }));

        self.finish_hand(state, outcome.payouts);
    }

    fn finish_hand(&self, state: &mut TableState, payouts: Vec<(PlayerId, Chips)>) {
        if let Some(game_id) = state.game_id {
            let settlement = Arc::clone(&self.settlement);
            let (winners, amounts): (Vec<_>, Vec<_>) = payouts.into_iter().unzip();
            tokio::spawn(async move {
                if let Err(err) = settlement.end_game(game_id, winners, amounts).await {
                    warn!(target = LOG_TARGET, error = %err, "settlement end_game failed");
                }
            });
        }

        for eliminated in state.engine.finish_hand() {
            self.events.emit(EventBody::PlayerLeft(PlayerLeftEvent {
                player_id: eliminated,
                reason: "eliminated".into(),
            }));
        }
        state.deal = None;
        self.broadcast_snapshot(state);
        self.maybe_start_hand(state);
    }

    fn handle_deal_error(&self, state: &mut TableState, err: DealError) {
        if let Some(offender) = err.offender() {
            self.send_error(offender, err.wire_code(), err.to_string());
        }
        if err.aborts_hand() {
            warn!(target = LOG_TARGET, error = %err, "deal failure aborts the hand");
            self.abort_hand(state, "protocol-violation");
        } else {
            debug!(target = LOG_TARGET, error = %err, "deal message rejected");
        }
    }

    /// Abort the live hand with no pot distribution: refund to the stacks
    /// at hand start and return to `Waiting`.
    fn abort_hand(&self, state: &mut TableState, reason: &str) {
        if let Some(deal) = state.deal.as_mut() {
            deal.abort();
        }
        state.deal = None;
        let remaining = state.engine.rotation().to_vec();
        state.engine.abort_with_refund();
        self.events.emit(EventBody::GameAborted(GameAbortedEvent {
            abandoned_player: String::new(),
            remaining_players: remaining,
            reason: reason.to_string(),
        }));
        self.broadcast_snapshot(state);
    }

    // ------------------------------------------------------------------
    // Settlement bridging (always off-lock: spawned tasks)
    // ------------------------------------------------------------------

    fn spawn_settlement_setup(&self, state: &TableState) {
        let settlement = Arc::clone(&self.settlement);
        let players = state.engine.ready_active_players();
        let tx = self.tx.clone();
        let (buy_in, sb, bb, max_players) = (
            self.config.starting_stack,
            self.config.small_blind,
            self.config.big_blind,
            self.config.max_players,
        );
        tokio::spawn(async move {
            let game_id = match settlement.create_game(buy_in, sb, bb, max_players).await {
                Ok(game_id) => game_id,
                Err(err) => {
                    warn!(target = LOG_TARGET, error = %err, "settlement create_game failed");
                    return;
                }
            };
            for player in &players {
                match settlement.verify_buyin(game_id, player).await {
                    Ok(true) => {}
                    Ok(false) => {
                        warn!(target = LOG_TARGET, player = %player, "buy-in not verified, continuing")
                    }
                    Err(err) => {
                        warn!(target = LOG_TARGET, player = %player, error = %err, "buy-in check failed")
                    }
                }
            }
            if let Err(err) = settlement.start_game(game_id).await {
                warn!(target = LOG_TARGET, error = %err, "settlement start_game failed");
            }
            let _ = tx.send(TableCommand::SettlementCreated(game_id)).await;
        });
    }

    // ------------------------------------------------------------------
    // Outbound helpers
    // ------------------------------------------------------------------

    fn ship(&self, outbound: Vec<Outbound>) {
        for out in outbound {
            match out {
                Outbound::Send { to, body } => self.send_msg(&to, body),
                Outbound::Broadcast { body } => self.broadcast_msg(body),
            }
        }
    }

    fn send_msg(&self, to: &str, body: MessageBody) {
        match Message::new(self.local_id.clone(), body).to_bytes() {
            Ok(bytes) => self.sink.send(to, bytes),
            Err(err) => warn!(target = LOG_TARGET, error = %err, "message encode failed"),
        }
    }

    fn broadcast_msg(&self, body: MessageBody) {
        match Message::new(self.local_id.clone(), body).to_bytes() {
            Ok(bytes) => self.sink.broadcast(bytes),
            Err(err) => warn!(target = LOG_TARGET, error = %err, "message encode failed"),
        }
    }

    fn send_error(&self, to: &str, code: ErrorCode, message: impl Into<String>) {
        let payload = ErrorPayload::new(code, message);
        self.send_msg(to, MessageBody::Error(payload.clone()));
        self.events.emit(EventBody::Error(payload));
    }

    fn emit_error(&self, code: ErrorCode, message: impl Into<String>) {
        self.events
            .emit(EventBody::Error(ErrorPayload::new(code, message)));
    }

    fn emit_joined(&self, state: &TableState, player: &str) {
        let stack = state.engine.player(player).map(|p| p.stack).unwrap_or(0);
        self.events.emit(EventBody::PlayerJoined(PlayerJoinedEvent {
            player_id: player.to_string(),
            stack,
        }));
    }

    fn emit_action(&self, state: &TableState, outcome: &ActionOutcome) {
        let new_stack = state
            .engine
            .player(&outcome.player_id)
            .map(|p| p.stack)
            .unwrap_or(0);
        self.events.emit(EventBody::PlayerAction(PlayerActionEvent {
            player_id: outcome.player_id.clone(),
            action: outcome.action.name().to_string(),
            amount: outcome.chips_paid,
            new_pot: state.engine.current_pot(),
            new_stack,
        }));
    }

    fn emit_turn_change(&self, state: &TableState, seat: usize) {
        let Some(player_id) = state.engine.id_at(seat).cloned() else {
            return;
        };
        let valid_actions = state
            .engine
            .valid_actions(&player_id)
            .into_iter()
            .map(str::to_string)
            .collect();
        self.events.emit(EventBody::TurnChange(TurnChangeEvent {
            player_id,
            rotation_id: seat,
            valid_actions,
        }));
    }

    fn broadcast_snapshot(&self, state: &TableState) {
        self.broadcast_msg(MessageBody::GameState(state.engine.game_state_payload()));
        self.events
            .emit(EventBody::GameStateUpdate(state.engine.game_state_payload()));
    }
}
