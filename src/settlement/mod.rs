//! Settlement adapter: the narrow facade toward the on-chain ledger.
//!
//! The engine treats the chain as best-effort. Every call returns a result,
//! but in-game state advances regardless of settlement failures; the
//! coordinator logs and moves on. Calls are made off the table lock.

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::info;

use crate::domain::{Chips, PlayerId};

const LOG_TARGET: &str = "settlement";

/// Opaque on-chain game handle.
pub type GameId = [u8; 32];

#[async_trait]
pub trait SettlementAdapter: Send + Sync {
    async fn create_game(
        &self,
        buy_in: Chips,
        small_blind: Chips,
        big_blind: Chips,
        max_players: usize,
    ) -> anyhow::Result<GameId>;

    async fn verify_buyin(&self, game_id: GameId, player: &str) -> anyhow::Result<bool>;

    async fn start_game(&self, game_id: GameId) -> anyhow::Result<()>;

    async fn end_game(
        &self,
        game_id: GameId,
        winners: Vec<PlayerId>,
        amounts: Vec<Chips>,
    ) -> anyhow::Result<()>;

    async fn end_with_penalty(
        &self,
        game_id: GameId,
        abandoned: PlayerId,
        winners: Vec<PlayerId>,
        amounts: Vec<Chips>,
    ) -> anyhow::Result<()>;
}

/// Recorded adapter call, for inspection in tests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SettlementCall {
    CreateGame {
        buy_in: Chips,
        small_blind: Chips,
        big_blind: Chips,
        max_players: usize,
    },
    VerifyBuyin {
        player: PlayerId,
    },
    StartGame,
    EndGame {
        winners: Vec<PlayerId>,
        amounts: Vec<Chips>,
    },
    EndWithPenalty {
        abandoned: PlayerId,
        winners: Vec<PlayerId>,
        amounts: Vec<Chips>,
    },
}

/// In-memory stand-in: approves every buy-in and records each call. The
/// default wiring when no chain is configured, and the test double.
#[derive(Default)]
pub struct NoopSettlement {
    calls: Mutex<Vec<SettlementCall>>,
}

impl NoopSettlement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<SettlementCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl SettlementAdapter for NoopSettlement {
    async fn create_game(
        &self,
        buy_in: Chips,
        small_blind: Chips,
        big_blind: Chips,
        max_players: usize,
    ) -> anyhow::Result<GameId> {
        self.calls.lock().push(SettlementCall::CreateGame {
            buy_in,
            small_blind,
            big_blind,
            max_players,
        });
        info!(target = LOG_TARGET, buy_in, "game created (no-op settlement)");
        Ok([0u8; 32])
    }

    async fn verify_buyin(&self, _game_id: GameId, player: &str) -> anyhow::Result<bool> {
        self.calls.lock().push(SettlementCall::VerifyBuyin {
            player: player.to_string(),
        });
        Ok(true)
    }

    async fn start_game(&self, _game_id: GameId) -> anyhow::Result<()> {
        self.calls.lock().push(SettlementCall::StartGame);
        Ok(())
    }

    async fn end_game(
        &self,
        _game_id: GameId,
        winners: Vec<PlayerId>,
        amounts: Vec<Chips>,
    ) -> anyhow::Result<()> {
        info!(
            target = LOG_TARGET,
            winners = winners.len(),
            "winnings recorded (no-op settlement)"
        );
        self.calls
            .lock()
            .push(SettlementCall::EndGame { winners, amounts });
        Ok(())
    }

    async fn end_with_penalty(
        &self,
        _game_id: GameId,
        abandoned: PlayerId,
        winners: Vec<PlayerId>,
        amounts: Vec<Chips>,
    ) -> anyhow::Result<()> {
        self.calls.lock().push(SettlementCall::EndWithPenalty {
            abandoned,
            winners,
            amounts,
        });
        Ok(())
    }
}
