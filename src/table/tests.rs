#![cfg(test)]

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::config::TableConfig;
use crate::protocol::{Event, EventBody};
use crate::settlement::NoopSettlement;
use crate::transport::{ChannelSink, Inbound, TableCommand};

use super::coordinator::{Table, TableCoordinator};
use super::disconnect::DisconnectSupervisor;

/// Largest 64-bit prime; keeps the deal protocol fast under test.
const TEST_PRIME_HEX: &str = "ffffffffffffffc5";

fn test_config(grace_secs: u64) -> TableConfig {
    TableConfig {
        shared_prime_hex: Some(TEST_PRIME_HEX.into()),
        grace_period_secs: grace_secs,
        ..TableConfig::default()
    }
}

struct Node {
    table: Arc<Table>,
    events: mpsc::Receiver<Event>,
}

/// Two live tables wired back-to-back: each table's sink output is routed
/// into the other's inbound queue, like the real transport would.
async fn spawn_pair(grace_secs: u64) -> (Node, Node) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let settlement = Arc::new(NoopSettlement::new());
    let (sink0, rx0) = ChannelSink::new();
    let (sink1, rx1) = ChannelSink::new();
    let (t0, e0) = TableCoordinator::spawn(
        "p0",
        test_config(grace_secs),
        Arc::new(sink0),
        settlement.clone(),
    )
    .expect("spawn p0");
    let (t1, e1) = TableCoordinator::spawn("p1", test_config(grace_secs), Arc::new(sink1), settlement)
        .expect("spawn p1");
    let t0 = Arc::new(t0);
    let t1 = Arc::new(t1);

    route("p0", rx0, vec![("p1", Arc::clone(&t1))]);
    route("p1", rx1, vec![("p0", Arc::clone(&t0))]);

    (
        Node {
            table: t0,
            events: e0,
        },
        Node {
            table: t1,
            events: e1,
        },
    )
}

fn route(
    from: &'static str,
    mut rx: mpsc::UnboundedReceiver<(Option<String>, Vec<u8>)>,
    peers: Vec<(&'static str, Arc<Table>)>,
) {
    tokio::spawn(async move {
        while let Some((target, bytes)) = rx.recv().await {
            for (peer_id, table) in &peers {
                let addressed_here = target.as_deref().map_or(true, |t| t == *peer_id);
                if addressed_here {
                    table
                        .command(TableCommand::Message(Inbound {
                            from: from.to_string(),
                            bytes: bytes.clone(),
                        }))
                        .await;
                }
            }
        }
    });
}

async fn wait_for<F>(events: &mut mpsc::Receiver<Event>, what: &str, pred: F) -> Event
where
    F: Fn(&EventBody) -> bool,
{
    tokio::time::timeout(Duration::from_secs(600), async {
        loop {
            let event = events.recv().await.unwrap_or_else(|| panic!("stream closed waiting for {what}"));
            if pred(&event.body) {
                return event;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
}

fn is_turn_of(body: &EventBody, player: &str) -> bool {
    matches!(body, EventBody::TurnChange(t) if t.player_id == player)
}

// ----------------------------------------------------------------------
// Full-table flows
// ----------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn two_ready_players_reach_preflop_via_the_deal_protocol() {
    let (mut n0, mut n1) = spawn_pair(300).await;
    n0.table.ready().await;
    n1.table.ready().await;

    wait_for(&mut n0.events, "new hand on p0", |b| {
        matches!(b, EventBody::NewHand(h) if h.players == ["p0", "p1"])
    })
    .await;
    wait_for(&mut n0.events, "blinds on p0", |b| {
        matches!(
            b,
            EventBody::BlindsPosted(bl)
                if bl.small_blind_player == "p0"
                    && bl.big_blind_player == "p1"
                    && bl.small_blind_amount == 10
                    && bl.big_blind_amount == 20
        )
    })
    .await;

    // Dealer acts first heads-up; both nodes agree once their own hole
    // cards are recovered.
    wait_for(&mut n0.events, "p0 to act on p0", |b| is_turn_of(b, "p0")).await;
    wait_for(&mut n1.events, "p0 to act on p1", |b| is_turn_of(b, "p0")).await;

    let snapshot = n0.table.snapshot();
    assert_eq!(snapshot.status, "PRE_FLOP");
    assert_eq!(snapshot.current_pot, 30);
}

#[tokio::test(start_paused = true)]
async fn preflop_fold_hands_the_blinds_to_the_survivor() {
    let (mut n0, mut n1) = spawn_pair(300).await;
    n0.table.ready().await;
    n1.table.ready().await;
    wait_for(&mut n0.events, "p0 to act", |b| is_turn_of(b, "p0")).await;

    n0.table.act("fold", 0).await;

    for (label, node) in [("p0", &mut n0), ("p1", &mut n1)] {
        let event = wait_for(&mut node.events, "winner", |b| {
            matches!(b, EventBody::Winner(_))
        })
        .await;
        let EventBody::Winner(winner) = event.body else {
            unreachable!()
        };
        assert_eq!(winner.pot, 30, "walkover pot on {label}");
        assert_eq!(winner.winners.len(), 1);
        assert_eq!(winner.winners[0].player_id, "p1");
        assert_eq!(winner.winners[0].amount, 30);
        assert_eq!(winner.winners[0].new_stack, 1010);
    }
}

#[tokio::test(start_paused = true)]
async fn checked_down_hand_reaches_showdown_and_conserves_chips() {
    let (mut n0, mut n1) = spawn_pair(300).await;
    n0.table.ready().await;
    n1.table.ready().await;

    // Pre-flop: p0 completes the small blind, p1 takes the option.
    wait_for(&mut n0.events, "p0 to act preflop", |b| is_turn_of(b, "p0")).await;
    n0.table.act("call", 0).await;
    wait_for(&mut n1.events, "p1 option", |b| is_turn_of(b, "p1")).await;
    n1.table.act("check", 0).await;

    // Flop, turn, river: the non-dealer acts first, both check through.
    for street in ["flop", "turn", "river"] {
        wait_for(&mut n1.events, street, |b| {
            matches!(b, EventBody::CommunityCard(c) if c.stage == street)
        })
        .await;
        wait_for(&mut n1.events, "p1 to act", |b| is_turn_of(b, "p1")).await;
        n1.table.act("check", 0).await;
        wait_for(&mut n0.events, "p0 to act", |b| is_turn_of(b, "p0")).await;
        n0.table.act("check", 0).await;
    }

    for (label, node) in [("p0", &mut n0), ("p1", &mut n1)] {
        let showdown = wait_for(&mut node.events, "showdown", |b| {
            matches!(b, EventBody::Showdown(_))
        })
        .await;
        let EventBody::Showdown(showdown) = showdown.body else {
            unreachable!()
        };
        assert_eq!(showdown.results.len(), 2, "both hands shown on {label}");

        let winner = wait_for(&mut node.events, "winner", |b| {
            matches!(b, EventBody::Winner(_))
        })
        .await;
        let EventBody::Winner(winner) = winner.body else {
            unreachable!()
        };
        assert_eq!(winner.pot, 40, "pot on {label}");
        let paid: u64 = winner.winners.iter().map(|w| w.amount).sum();
        assert_eq!(paid, 40, "every chip distributed on {label}");
    }
}

#[tokio::test(start_paused = true)]
async fn abandonment_mid_hand_awards_the_penalty_and_aborts() {
    let (mut n0, n1) = spawn_pair(5).await;
    n0.table.ready().await;
    n1.table.ready().await;
    wait_for(&mut n0.events, "preflop open", |b| is_turn_of(b, "p0")).await;

    // p1 vanishes mid-hand; the five-second grace elapses unanswered.
    n0.table.command(TableCommand::Disconnected("p1".into())).await;
    wait_for(&mut n0.events, "disconnect notice", |b| {
        matches!(b, EventBody::PlayerDisconnected(d) if d.player_id == "p1")
    })
    .await;

    let abandoned = wait_for(&mut n0.events, "abandonment", |b| {
        matches!(b, EventBody::PlayerAbandoned(_))
    })
    .await;
    let EventBody::PlayerAbandoned(abandoned) = abandoned.body else {
        unreachable!()
    };
    assert_eq!(abandoned.player_id, "p1");
    assert_eq!(abandoned.penalty_amount, 1000, "20 in the pot plus 980 behind");

    wait_for(&mut n0.events, "penalty distribution", |b| {
        matches!(
            b,
            EventBody::PenaltyApplied(p)
                if p.distribution == vec![("p0".to_string(), 1000)]
        )
    })
    .await;
    wait_for(&mut n0.events, "abort", |b| {
        matches!(b, EventBody::GameAborted(a) if a.reason == "abandonment")
    })
    .await;

    let snapshot = n0.table.snapshot();
    assert_eq!(snapshot.status, "WAITING");
    let p0 = snapshot
        .players
        .iter()
        .find(|p| p.player_id == "p0")
        .expect("p0 seated");
    assert_eq!(p0.stack, 1990, "990 behind plus the full 1000 penalty");
}

#[tokio::test(start_paused = true)]
async fn reconnect_within_grace_cancels_the_penalty() {
    let (mut n0, n1) = spawn_pair(300).await;
    n0.table.ready().await;
    n1.table.ready().await;
    wait_for(&mut n0.events, "preflop open", |b| is_turn_of(b, "p0")).await;

    n0.table.command(TableCommand::Disconnected("p1".into())).await;
    wait_for(&mut n0.events, "disconnect notice", |b| {
        matches!(b, EventBody::PlayerDisconnected(_))
    })
    .await;

    tokio::time::sleep(Duration::from_secs(10)).await;
    n0.table.command(TableCommand::Reconnected("p1".into())).await;
    wait_for(&mut n0.events, "reconnect notice", |b| {
        matches!(b, EventBody::PlayerReconnected(r) if r.player_id == "p1")
    })
    .await;

    // The grace deadline passes with no penalty.
    tokio::time::sleep(Duration::from_secs(600)).await;
    let snapshot = n0.table.snapshot();
    assert_eq!(snapshot.status, "PRE_FLOP", "hand still live");
    let p1 = snapshot
        .players
        .iter()
        .find(|p| p.player_id == "p1")
        .expect("p1 seated");
    assert!(p1.is_active);
    assert_eq!(p1.stack, 980);
}

// ----------------------------------------------------------------------
// Disconnect supervisor
// ----------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn supervisor_reports_expiry_once() {
    let (tx, mut rx) = mpsc::channel(8);
    let supervisor = DisconnectSupervisor::new(Duration::from_secs(300), tx);

    assert!(supervisor.player_disconnected("p1"));
    assert!(
        !supervisor.player_disconnected("p1"),
        "second disconnect is a no-op while supervised"
    );
    assert_eq!(supervisor.watching(), 1);

    let expired = tokio::time::timeout(Duration::from_secs(400), rx.recv())
        .await
        .expect("expiry within grace")
        .expect("channel open");
    assert_eq!(expired, TableCommand::GraceExpired("p1".into()));
    assert_eq!(supervisor.watching(), 0);
}

#[tokio::test(start_paused = true)]
async fn supervisor_reconnect_beats_the_timer() {
    let (tx, mut rx) = mpsc::channel(8);
    let supervisor = DisconnectSupervisor::new(Duration::from_secs(300), tx);

    assert!(supervisor.player_disconnected("p1"));
    tokio::time::sleep(Duration::from_secs(100)).await;
    assert!(supervisor.player_reconnected("p1"));
    assert!(!supervisor.player_reconnected("p1"), "record already cleared");

    tokio::time::sleep(Duration::from_secs(400)).await;
    assert!(rx.try_recv().is_err(), "no expiry after reconnect");
}

#[tokio::test(start_paused = true)]
async fn supervisor_shutdown_cancels_timers_without_firing() {
    let (tx, mut rx) = mpsc::channel(8);
    let supervisor = DisconnectSupervisor::new(Duration::from_secs(300), tx);

    supervisor.player_disconnected("p1");
    supervisor.player_disconnected("p2");
    supervisor.cancel_all();

    tokio::time::sleep(Duration::from_secs(400)).await;
    assert!(rx.try_recv().is_err(), "cancelled timers never fire");
}
