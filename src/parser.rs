// src/parser.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

use crate::models::{TrackedAsset, Transfer};

/// Seconds between the Unix epoch and the ledger epoch (2000-01-01T00:00:00Z)
pub const RIPPLE_EPOCH_OFFSET: i64 = 946_684_800;

/// The transaction body of an `account_tx` entry (`tx` in API v1, `tx_json` in v2)
fn tx_body(raw: &Value) -> Option<&Value> {
    raw.get("tx").or_else(|| raw.get("tx_json")).filter(|t| t.is_object())
}

/// Transaction hash of an `account_tx` entry, wherever the API version puts it
pub fn record_hash(raw: &Value) -> Option<&str> {
    tx_body(raw)
        .and_then(|tx| tx.get("hash"))
        .or_else(|| raw.get("hash"))
        .and_then(Value::as_str)
}

fn issued_amount(tx: &Value) -> Option<&Value> {
    tx.get("Amount")
        .or_else(|| tx.get("DeliverMax"))
        .filter(|a| a.is_object())
}

/// True iff `raw` is a payment of the tracked issued currency from the tracked issuer.
///
/// Absent or malformed fields make the record non-qualifying.
pub fn is_qualifying_transfer(raw: &Value, asset: &TrackedAsset) -> bool {
    let Some(tx) = tx_body(raw) else {
        return false;
    };
    if tx.get("TransactionType").and_then(Value::as_str) != Some("Payment") {
        return false;
    }
    // native amounts are plain strings (drops), issued amounts are objects
    let Some(amount) = issued_amount(tx) else {
        return false;
    };
    amount.get("currency").and_then(Value::as_str) == Some(asset.currency.as_str())
        && amount.get("issuer").and_then(Value::as_str) == Some(asset.issuer.as_str())
}

/// Parse an issued-currency value, which may use scientific notation
pub fn parse_value(s: &str) -> Option<Decimal> {
    let s = s.trim();
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

fn ledger_time(seconds: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(seconds.checked_add(RIPPLE_EPOCH_OFFSET)?, 0)
}

fn as_index(v: &Value) -> Option<u64> {
    v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok()))
}

/// Decode a qualifying record into a `Transfer` for `day`
pub fn decode_transfer(raw: &Value, asset: &TrackedAsset, day: u64) -> Option<Transfer> {
    if !is_qualifying_transfer(raw, asset) {
        return None;
    }
    let tx = tx_body(raw)?;

    let tx_hash = record_hash(raw)?.to_string();
    let ledger_index = tx
        .get("ledger_index")
        .or_else(|| raw.get("ledger_index"))
        .and_then(as_index)?;
    let sender = tx.get("Account").and_then(Value::as_str)?.to_string();
    let receiver = tx.get("Destination").and_then(Value::as_str)?.to_string();
    let amount = issued_amount(tx)?
        .get("value")
        .and_then(Value::as_str)
        .and_then(parse_value)?;
    let timestamp = tx
        .get("date")
        .or_else(|| raw.get("date"))
        .and_then(Value::as_i64)
        .and_then(ledger_time);

    Some(Transfer {
        tx_hash,
        day,
        ledger_index,
        sender,
        receiver,
        amount,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::fake::payment;
    use serde_json::json;

    fn asset() -> TrackedAsset {
        TrackedAsset {
            issuer: "rIssuer".to_string(),
            currency: "PFT".to_string(),
        }
    }

    #[test]
    fn test_only_full_match_qualifies() {
        let all_match = payment("H1", 5, "rIssuer", "rX", "PFT", "rIssuer", "10");

        let mut wrong_type = all_match.clone();
        wrong_type["tx"]["TransactionType"] = json!("OfferCreate");

        let mut native = all_match.clone();
        native["tx"]["Amount"] = json!("1000000");

        let wrong_currency = payment("H1", 5, "rIssuer", "rX", "USD", "rIssuer", "10");
        let wrong_issuer = payment("H1", 5, "rIssuer", "rX", "PFT", "rOther", "10");

        let verdicts: Vec<bool> = [all_match, wrong_type, native, wrong_currency, wrong_issuer]
            .iter()
            .map(|r| is_qualifying_transfer(r, &asset()))
            .collect();
        assert_eq!(verdicts, vec![true, false, false, false, false]);
    }

    #[test]
    fn test_malformed_records_do_not_qualify() {
        for raw in [json!(null), json!({}), json!({"tx": "oops"}), json!({"tx": {"TransactionType": "Payment"}})] {
            assert!(!is_qualifying_transfer(&raw, &asset()));
            assert!(decode_transfer(&raw, &asset(), 0).is_none());
        }
    }

    #[test]
    fn test_decode_v1_entry() {
        let raw = payment("H1", 5, "rIssuer", "rX", "PFT", "rIssuer", "100");
        let t = decode_transfer(&raw, &asset(), 2).unwrap();
        assert_eq!(t.tx_hash, "H1");
        assert_eq!(t.day, 2);
        assert_eq!(t.ledger_index, 5);
        assert_eq!(t.sender, "rIssuer");
        assert_eq!(t.receiver, "rX");
        assert_eq!(t.amount, Decimal::from(100));
        assert_eq!(t.timestamp.unwrap().timestamp(), 767_000_000 + RIPPLE_EPOCH_OFFSET);
    }

    #[test]
    fn test_decode_v2_entry() {
        let raw = json!({
            "hash": "H2",
            "ledger_index": 9,
            "tx_json": {
                "TransactionType": "Payment",
                "Account": "rA",
                "Destination": "rB",
                "DeliverMax": { "currency": "PFT", "issuer": "rIssuer", "value": "2.5e1" }
            }
        });
        let t = decode_transfer(&raw, &asset(), 0).unwrap();
        assert_eq!(t.tx_hash, "H2");
        assert_eq!(t.ledger_index, 9);
        assert_eq!(t.amount, Decimal::from(25));
        assert!(t.timestamp.is_none());
    }

    #[test]
    fn test_unparseable_value_is_dropped() {
        let raw = payment("H1", 5, "rIssuer", "rX", "PFT", "rIssuer", "lots");
        assert!(is_qualifying_transfer(&raw, &asset()));
        assert!(decode_transfer(&raw, &asset(), 0).is_none());
        assert_eq!(record_hash(&raw), Some("H1"));
    }

    #[test]
    fn test_value_beyond_decimal_range_is_dropped() {
        assert_eq!(parse_value("1e90"), None);
        let raw = payment("H1", 5, "rIssuer", "rX", "PFT", "rIssuer", "1e90");
        assert!(is_qualifying_transfer(&raw, &asset()));
        assert!(decode_transfer(&raw, &asset(), 0).is_none());
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("0.001"), Some(Decimal::new(1, 3)));
        assert_eq!(parse_value("1e-5"), Some(Decimal::new(1, 5)));
        assert_eq!(parse_value(""), None);
    }
}
