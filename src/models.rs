// src/models.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// The issued currency being tracked (currency code + issuing account)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedAsset {
    pub issuer: String,
    pub currency: String,
}

/// Half-open range `[min, max)` of ledger indices assigned to one day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerWindow {
    pub min: u64,
    pub max: u64,
}

impl LedgerWindow {
    /// Window for `day`, counted from `start_ledger` in steps of `ledgers_per_day`.
    pub fn for_day(start_ledger: u64, ledgers_per_day: u64, day: u64) -> Self {
        let min = start_ledger + day * ledgers_per_day;
        Self {
            min,
            max: min + ledgers_per_day,
        }
    }

    /// Last ledger index inside the window (the remote max bound is inclusive).
    pub fn last(&self) -> u64 {
        self.max.saturating_sub(1).max(self.min)
    }

    pub fn contains(&self, ledger_index: u64) -> bool {
        ledger_index >= self.min && ledger_index < self.max
    }
}

/// A qualifying payment of the tracked asset
#[derive(Debug, Clone, PartialEq)]
pub struct Transfer {
    pub tx_hash: String,
    pub day: u64,
    pub ledger_index: u64,
    pub sender: String,
    pub receiver: String,
    pub amount: Decimal,
    pub timestamp: Option<DateTime<Utc>>,
}

/// End-of-day snapshot handed to the reporting sinks
#[derive(Debug, Clone, PartialEq)]
pub struct DailyAggregate {
    pub day: u64,
    pub balances: Vec<(String, Decimal)>, // nonzero only, sorted by address
    pub transfer_count: u64,
    pub active_address_count: usize,
    pub circulating_supply: Decimal,
    pub complete: bool, // false when a query came back partial or a transfer was dropped
    pub failed_queries: u64,
    pub failed_writes: u64,
    pub rejected_transfers: u64, // qualifying but undecodable or out of decimal range
}
