use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::PlayerId;
use crate::transport::TableCommand;

const LOG_TARGET: &str = "table::disconnect";

struct DisconnectRecord {
    started_at: DateTime<Utc>,
    reconnect: oneshot::Sender<()>,
    cancel: CancellationToken,
}

/// Per-player grace timers for mid-hand disconnects.
///
/// On disconnect a record is created and a timer task races the grace
/// period against a single-slot reconnect signal and an external cancel.
/// Reconnection in time drops the record silently; expiry feeds
/// [`TableCommand::GraceExpired`] back into the table's queue, where the
/// penalty pathway runs under the table lock.
pub struct DisconnectSupervisor {
    grace: Duration,
    records: Arc<DashMap<PlayerId, DisconnectRecord>>,
    expiry_tx: mpsc::Sender<TableCommand>,
    shutdown: CancellationToken,
}

impl DisconnectSupervisor {
    pub fn new(grace: Duration, expiry_tx: mpsc::Sender<TableCommand>) -> Self {
        Self {
            grace,
            records: Arc::new(DashMap::new()),
            expiry_tx,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Number of timers currently running.
    pub fn watching(&self) -> usize {
        self.records.len()
    }

    /// Start supervising a disconnected player. Returns false when a timer
    /// for the player is already running.
    pub fn player_disconnected(&self, player_id: &str) -> bool {
        if self.records.contains_key(player_id) {
            return false;
        }

        let (reconnect_tx, reconnect_rx) = oneshot::channel();
        let cancel = self.shutdown.child_token();
        self.records.insert(
            player_id.to_string(),
            DisconnectRecord {
                started_at: Utc::now(),
                reconnect: reconnect_tx,
                cancel: cancel.clone(),
            },
        );

        warn!(
            target = LOG_TARGET,
            player = %player_id,
            grace_secs = self.grace.as_secs(),
            "player disconnected, grace timer started"
        );

        let grace = self.grace;
        let player = player_id.to_string();
        let records = Arc::clone(&self.records);
        let expiry_tx = self.expiry_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(grace) => {
                    records.remove(&player);
                    warn!(
                        target = LOG_TARGET,
                        player = %player,
                        "grace period elapsed, reporting abandonment"
                    );
                    if expiry_tx.send(TableCommand::GraceExpired(player.clone())).await.is_err() {
                        warn!(target = LOG_TARGET, player = %player, "table gone, expiry dropped");
                    }
                }
                _ = reconnect_rx => {
                    info!(target = LOG_TARGET, player = %player, "player reconnected in time");
                }
                _ = cancel.cancelled() => {
                    records.remove(&player);
                }
            }
        });
        true
    }

    /// Signal a reconnect. Returns false when no timer was running. The
    /// record is removed here so the elapsed time can be reported.
    pub fn player_reconnected(&self, player_id: &str) -> bool {
        match self.records.remove(player_id) {
            Some((_, record)) => {
                let away = Utc::now() - record.started_at;
                info!(
                    target = LOG_TARGET,
                    player = %player_id,
                    away_secs = away.num_seconds(),
                    "reconnect signal delivered"
                );
                let _ = record.reconnect.send(());
                true
            }
            None => false,
        }
    }

    /// Cancel one player's timer without firing the penalty.
    pub fn cancel(&self, player_id: &str) {
        if let Some((_, record)) = self.records.remove(player_id) {
            record.cancel.cancel();
        }
    }

    /// Shutdown: every outstanding timer is cancelled without firing.
    pub fn cancel_all(&self) {
        self.shutdown.cancel();
        self.records.clear();
    }
}
