// src/ledger.rs
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::models::Transfer;

#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    #[error("balance of {address} would leave the decimal range")]
    BalanceOverflow { address: String },

    #[error("circulating supply would leave the decimal range")]
    SupplyOverflow,
}

/// Balances a transfer would produce, computed without touching the ledger
#[derive(Debug)]
pub struct Posting {
    sender: (String, Decimal),
    receiver: (String, Decimal),
    supply: Decimal,
}

fn positive(b: Decimal) -> Decimal {
    b.max(Decimal::ZERO)
}

/// Running address → signed balance map for the tracked asset.
///
/// The sum of positive balances is kept alongside so reading the supply
/// never has to re-add (and possibly overflow) the whole map.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BalanceLedger {
    balances: BTreeMap<String, Decimal>,
    supply: Decimal,
}

impl BalanceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that `transfer` fits the decimal range and return the resulting balances.
    pub fn plan(&self, transfer: &Transfer) -> Result<Posting, LedgerError> {
        let overflow = |address: &str| LedgerError::BalanceOverflow {
            address: address.to_string(),
        };
        let old_sender = self.balance(&transfer.sender);
        let new_sender = old_sender
            .checked_sub(transfer.amount)
            .ok_or_else(|| overflow(&transfer.sender))?;
        // a self-payment nets out on the same entry
        let old_receiver = if transfer.receiver == transfer.sender {
            new_sender
        } else {
            self.balance(&transfer.receiver)
        };
        let new_receiver = old_receiver
            .checked_add(transfer.amount)
            .ok_or_else(|| overflow(&transfer.receiver))?;

        let supply = if transfer.receiver == transfer.sender {
            Some(self.supply)
        } else {
            self.supply
                .checked_sub(positive(old_sender))
                .and_then(|s| s.checked_sub(positive(old_receiver)))
                .and_then(|s| s.checked_add(positive(new_sender)))
                .and_then(|s| s.checked_add(positive(new_receiver)))
        }
        .ok_or(LedgerError::SupplyOverflow)?;

        Ok(Posting {
            sender: (transfer.sender.clone(), new_sender),
            receiver: (transfer.receiver.clone(), new_receiver),
            supply,
        })
    }

    pub fn commit(&mut self, posting: Posting) {
        let (sender, sender_balance) = posting.sender;
        let (receiver, receiver_balance) = posting.receiver;
        self.balances.insert(sender, sender_balance);
        self.balances.insert(receiver, receiver_balance);
        self.supply = posting.supply;
    }

    /// Move `amount` from sender to receiver; absent entries start at zero.
    ///
    /// On overflow the ledger is left untouched.
    pub fn apply(&mut self, transfer: &Transfer) -> Result<(), LedgerError> {
        let posting = self.plan(transfer)?;
        self.commit(posting);
        Ok(())
    }

    pub fn balance(&self, address: &str) -> Decimal {
        self.balances.get(address).copied().unwrap_or(Decimal::ZERO)
    }

    /// Sum of strictly positive balances
    pub fn circulating_supply(&self) -> Decimal {
        self.supply
    }

    /// Nonzero balances, ordered by address
    pub fn nonzero_balances(&self) -> Vec<(String, Decimal)> {
        self.balances
            .iter()
            .filter(|(_, b)| !b.is_zero())
            .map(|(a, b)| (a.clone(), b.normalize()))
            .collect()
    }
}

/// Addresses whose history is queried each day.
///
/// Newly seen counterparties are staged and only join at the day boundary,
/// so the set queried during a day is fixed when that day starts.
#[derive(Debug, Clone)]
pub struct Watchlist {
    members: BTreeSet<String>,
    staged: BTreeSet<String>,
}

impl Watchlist {
    pub fn new(seed: &str) -> Self {
        Self {
            members: BTreeSet::from([seed.to_string()]),
            staged: BTreeSet::new(),
        }
    }

    /// Snapshot of the current members
    pub fn addresses(&self) -> Vec<String> {
        self.members.iter().cloned().collect()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.members.contains(address)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Buffer an observed address for the next `expand`
    pub fn stage(&mut self, address: &str) {
        if !self.contains(address) {
            self.staged.insert(address.to_string());
        }
    }

    /// Union `new_addresses` into the members; never removes anything
    pub fn expand<I>(&mut self, new_addresses: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let before = self.members.len();
        self.members.extend(new_addresses);
        self.members.len() - before
    }

    /// Merge everything staged during the day; returns how many joined
    pub fn merge_staged(&mut self) -> usize {
        let staged = std::mem::take(&mut self.staged);
        self.expand(staged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(hash: &str, from: &str, to: &str, amount: i64) -> Transfer {
        Transfer {
            tx_hash: hash.to_string(),
            day: 0,
            ledger_index: 1,
            sender: from.to_string(),
            receiver: to.to_string(),
            amount: Decimal::from(amount),
            timestamp: None,
        }
    }

    #[test]
    fn test_apply_and_supply() {
        let mut ledger = BalanceLedger::new();
        ledger.apply(&transfer("H1", "A", "B", 10)).unwrap();
        ledger.apply(&transfer("H2", "B", "A", 4)).unwrap();

        assert_eq!(ledger.balance("A"), Decimal::from(-6));
        assert_eq!(ledger.balance("B"), Decimal::from(6));
        assert_eq!(ledger.circulating_supply(), Decimal::from(6));
    }

    #[test]
    fn test_zero_balances_omitted_from_snapshot() {
        let mut ledger = BalanceLedger::new();
        ledger.apply(&transfer("H1", "A", "B", 5)).unwrap();
        ledger.apply(&transfer("H2", "B", "C", 5)).unwrap();

        assert_eq!(
            ledger.nonzero_balances(),
            vec![("A".to_string(), Decimal::from(-5)), ("C".to_string(), Decimal::from(5))]
        );
        assert_eq!(ledger.circulating_supply(), Decimal::from(5));
    }

    #[test]
    fn test_order_within_day_does_not_matter() {
        let transfers = vec![
            transfer("H1", "I", "A", 100),
            transfer("H2", "A", "B", 30),
            transfer("H3", "B", "C", 10),
            transfer("H4", "C", "I", 1),
        ];
        let mut forward = BalanceLedger::new();
        transfers.iter().for_each(|t| forward.apply(t).unwrap());
        let mut backward = BalanceLedger::new();
        transfers.iter().rev().for_each(|t| backward.apply(t).unwrap());

        assert_eq!(forward, backward);
    }

    fn big(hash: &str, from: &str, to: &str, value: &str) -> Transfer {
        Transfer {
            amount: Decimal::from_scientific(value).unwrap(),
            ..transfer(hash, from, to, 0)
        }
    }

    #[test]
    fn test_balance_overflow_is_rejected_without_side_effects() {
        let mut ledger = BalanceLedger::new();
        ledger.apply(&big("H1", "I", "A", "5e28")).unwrap();
        let before = ledger.clone();

        let err = ledger.apply(&big("H2", "I", "B", "5e28")).unwrap_err();

        assert_eq!(err, LedgerError::BalanceOverflow { address: "I".to_string() });
        assert_eq!(ledger, before);
        assert_eq!(ledger.balance("B"), Decimal::ZERO);
    }

    #[test]
    fn test_supply_overflow_is_rejected_without_side_effects() {
        let mut ledger = BalanceLedger::new();
        ledger.apply(&big("H1", "I", "A", "5e28")).unwrap();
        let before = ledger.clone();

        // neither balance overflows, but the positive total would
        let err = ledger.apply(&big("H2", "J", "B", "5e28")).unwrap_err();

        assert_eq!(err, LedgerError::SupplyOverflow);
        assert_eq!(ledger, before);
        assert_eq!(ledger.circulating_supply(), Decimal::from_scientific("5e28").unwrap());
    }

    #[test]
    fn test_supply_tracks_sign_changes() {
        let mut ledger = BalanceLedger::new();
        ledger.apply(&transfer("H1", "I", "A", 10)).unwrap();
        ledger.apply(&transfer("H2", "A", "B", 15)).unwrap();
        ledger.apply(&transfer("H3", "B", "B", 3)).unwrap();

        // A = -5, B = 15
        assert_eq!(ledger.balance("B"), Decimal::from(15));
        assert_eq!(ledger.circulating_supply(), Decimal::from(15));
    }

    #[test]
    fn test_watchlist_staging_is_deferred() {
        let mut watchlist = Watchlist::new("I");
        watchlist.stage("X");
        watchlist.stage("I");

        assert_eq!(watchlist.addresses(), vec!["I".to_string()]);
        assert!(!watchlist.contains("X"));

        assert_eq!(watchlist.merge_staged(), 1);
        assert!(watchlist.contains("X"));
        assert_eq!(watchlist.merge_staged(), 0);
    }

    #[test]
    fn test_watchlist_never_shrinks() {
        let mut watchlist = Watchlist::new("I");
        watchlist.expand(vec!["A".to_string(), "B".to_string()]);
        assert_eq!(watchlist.expand(vec!["A".to_string()]), 0);
        assert_eq!(watchlist.len(), 3);
    }
}
