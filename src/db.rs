use chrono::{DateTime, Utc};
use eyre::Result;
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::models::{DailyAggregate, Transfer};

const INIT_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS transfers (
  tx_hash       TEXT PRIMARY KEY,
  day           INTEGER NOT NULL,
  ledger_index  INTEGER NOT NULL,
  sender        TEXT NOT NULL,
  receiver      TEXT NOT NULL,
  amount        TEXT NOT NULL, -- Decimal stored as string
  timestamp     TEXT           -- RFC3339, NULL when the node omitted the date
);

CREATE INDEX IF NOT EXISTS idx_transfers_day ON transfers(day, ledger_index);

CREATE TABLE IF NOT EXISTS scan_days (
  day                  INTEGER PRIMARY KEY,
  transfer_count       INTEGER NOT NULL,
  active_address_count INTEGER NOT NULL,
  circulating_supply   TEXT NOT NULL,
  complete             INTEGER NOT NULL CHECK (complete IN (0, 1)),
  failed_queries       INTEGER NOT NULL,
  failed_writes        INTEGER NOT NULL,
  rejected_transfers   INTEGER NOT NULL DEFAULT 0,
  updated_at           TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// Connect to SQLite (with WAL mode for performance)
pub fn connect(path: &str) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    Ok(conn)
}

/// Run schema migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(INIT_SQL)?;
    Ok(())
}

/// Insert a transfer unless its hash is already recorded.
///
/// Returns `true` when a new row was written.
pub fn record_transfer(conn: &Connection, t: &Transfer) -> Result<bool> {
    let inserted = conn.execute(
        r#"
        INSERT INTO transfers (tx_hash, day, ledger_index, sender, receiver, amount, timestamp)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(tx_hash) DO NOTHING
        "#,
        params![
            t.tx_hash,
            t.day as i64,
            t.ledger_index as i64,
            t.sender,
            t.receiver,
            t.amount.to_string(),
            t.timestamp.map(|ts| ts.to_rfc3339()),
        ],
    )?;
    Ok(inserted > 0)
}

/// Record the day's totals and whether nothing was lost along the way
pub fn record_scan_day(conn: &Connection, agg: &DailyAggregate) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO scan_days (
            day, transfer_count, active_address_count,
            circulating_supply, complete, failed_queries, failed_writes, rejected_transfers, updated_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, datetime('now'))
        ON CONFLICT(day) DO UPDATE SET
            transfer_count       = excluded.transfer_count,
            active_address_count = excluded.active_address_count,
            circulating_supply   = excluded.circulating_supply,
            complete             = excluded.complete,
            failed_queries       = excluded.failed_queries,
            failed_writes        = excluded.failed_writes,
            rejected_transfers   = excluded.rejected_transfers,
            updated_at           = excluded.updated_at
        "#,
        params![
            agg.day as i64,
            agg.transfer_count as i64,
            agg.active_address_count as i64,
            agg.circulating_supply.to_string(),
            agg.complete,
            agg.failed_queries as i64,
            agg.failed_writes as i64,
            agg.rejected_transfers as i64,
        ],
    )?;
    Ok(())
}

/// All recorded transfers from days before `day`, in replay order
pub fn load_transfers_before(conn: &Connection, day: u64) -> Result<Vec<Transfer>> {
    let mut stmt = conn.prepare(
        "SELECT tx_hash, day, ledger_index, sender, receiver, amount, timestamp
         FROM transfers
         WHERE day < ?1
         ORDER BY day, ledger_index, tx_hash",
    )?;

    let rows = stmt.query_map([day as i64], |r| {
        let amount_str: String = r.get(5)?;
        let timestamp_str: Option<String> = r.get(6)?;
        Ok((
            r.get::<_, String>(0)?,
            r.get::<_, i64>(1)?,
            r.get::<_, i64>(2)?,
            r.get::<_, String>(3)?,
            r.get::<_, String>(4)?,
            amount_str,
            timestamp_str,
        ))
    })?;

    let mut transfers = Vec::new();
    for row in rows {
        let (tx_hash, day, ledger_index, sender, receiver, amount, timestamp) = row?;
        transfers.push(Transfer {
            tx_hash,
            day: day as u64,
            ledger_index: ledger_index as u64,
            sender,
            receiver,
            amount: Decimal::from_str(&amount)?,
            timestamp: timestamp
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
        });
    }
    Ok(transfers)
}
