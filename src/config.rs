use std::time::Duration;

use num_bigint::BigUint;
use serde::Deserialize;

use crate::crypto::default_prime;
use crate::engine::TableRules;

/// Per-table configuration. Defaults match the standard cash-table setup:
/// 10/20 blinds, 1000 starting stacks, six seats, five-minute grace.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub small_blind: u64,
    pub big_blind: u64,
    pub starting_stack: u64,
    pub max_players: usize,
    /// Seconds a disconnected player has to return before the penalty fires.
    pub grace_period_secs: u64,
    /// Shared SRA modulus as hex; `None` selects the built-in 2048-bit
    /// default. The modulus is a table parameter, never a constant.
    pub shared_prime_hex: Option<String>,
    /// Bound on the per-table inbound queue.
    pub inbound_queue_capacity: usize,
    /// Bound on the outbound event sink; events beyond it are dropped with
    /// a warning rather than blocking the table.
    pub event_buffer_capacity: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            small_blind: 10,
            big_blind: 20,
            starting_stack: 1000,
            max_players: 6,
            grace_period_secs: 300,
            shared_prime_hex: None,
            inbound_queue_capacity: 256,
            event_buffer_capacity: 1024,
        }
    }
}

impl TableConfig {
    pub fn rules(&self) -> TableRules {
        TableRules {
            small_blind: self.small_blind,
            big_blind: self.big_blind,
            starting_stack: self.starting_stack,
            max_players: self.max_players,
        }
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    /// The table's shared modulus; fails on a malformed override.
    pub fn shared_prime(&self) -> anyhow::Result<BigUint> {
        match &self.shared_prime_hex {
            None => Ok(default_prime().clone()),
            Some(hex) => BigUint::parse_bytes(hex.as_bytes(), 16)
                .ok_or_else(|| anyhow::anyhow!("shared_prime_hex is not valid hex")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_table_contract() {
        let cfg = TableConfig::default();
        assert_eq!(cfg.small_blind, 10);
        assert_eq!(cfg.big_blind, 20);
        assert_eq!(cfg.starting_stack, 1000);
        assert_eq!(cfg.max_players, 6);
        assert_eq!(cfg.grace_period(), Duration::from_secs(300));
        assert_eq!(cfg.shared_prime().expect("prime").bits(), 2048);
    }

    #[test]
    fn partial_json_overrides_only_named_fields() {
        let cfg: TableConfig =
            serde_json::from_str(r#"{"big_blind": 50, "grace_period_secs": 30}"#).expect("parse");
        assert_eq!(cfg.big_blind, 50);
        assert_eq!(cfg.small_blind, 10);
        assert_eq!(cfg.grace_period(), Duration::from_secs(30));
    }

    #[test]
    fn malformed_prime_override_is_rejected() {
        let cfg = TableConfig {
            shared_prime_hex: Some("zz".into()),
            ..TableConfig::default()
        };
        assert!(cfg.shared_prime().is_err());
    }
}
