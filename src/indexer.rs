use eyre::Result;
use rusqlite::Connection;
use std::collections::HashSet;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::checkpoint::Checkpoint;
use crate::config::Config;
use crate::fetcher::QueryClient;
use crate::ledger::{BalanceLedger, Watchlist};
use crate::models::{DailyAggregate, LedgerWindow};
use crate::report::ReportWriter;
use crate::rpc::LedgerRpc;
use crate::{db, parser};

/// Day-by-day scan of the watchlist, one day at a time, strictly in order.
///
/// Owns the balance ledger and the watchlist. A day's effects only become durable once its checkpoint is saved;
/// a restart replays the stored transfers of every earlier day to rebuild
/// that state and redoes the interrupted day from scratch.
pub struct Scanner<R: LedgerRpc> {
    cfg: Config,
    client: QueryClient<R>,
    conn: Connection,
    reports: ReportWriter,
    checkpoint: Checkpoint,
    ledger: BalanceLedger,
    watchlist: Watchlist,
    next_day: u64,
}

/// Whether finishing absolute day `day` completes a block of `every` days
fn milestone_reached(day: u64, every: u64) -> bool {
    every > 0 && (day + 1) % every == 0
}

/// Pause after every `every` days of this run, but not after its last day
fn cooldown_due(processed: u64, days: u64, every: u64) -> bool {
    every > 0 && processed % every == 0 && processed < days
}

impl<R: LedgerRpc> Scanner<R> {
    /// Pick up where the checkpoint says and rebuild in-memory state from the store.
    pub fn resume(cfg: Config, client: QueryClient<R>, conn: Connection) -> Result<Self> {
        let checkpoint = Checkpoint::new(&cfg.checkpoint_path);
        let next_day = checkpoint.load()?;
        let reports = ReportWriter::open(&cfg.output_dir)?;

        let mut ledger = BalanceLedger::new();
        let mut watchlist = Watchlist::new(&cfg.asset.issuer);

        let history = db::load_transfers_before(&conn, next_day)?;
        for transfer in &history {
            if let Err(e) = ledger.apply(transfer) {
                warn!("Skipping stored transfer {} on replay: {}", transfer.tx_hash, e);
                continue;
            }
            watchlist.expand([transfer.sender.clone(), transfer.receiver.clone()]);
        }

        info!(
            "Resuming at day {} from {} ({} stored transfers replayed, {} watched addresses)",
            next_day,
            checkpoint.path().display(),
            history.len(),
            watchlist.len()
        );

        Ok(Self {
            cfg,
            client,
            conn,
            reports,
            checkpoint,
            ledger,
            watchlist,
            next_day,
        })
    }

    pub fn next_day(&self) -> u64 {
        self.next_day
    }

    /// Process `days` consecutive days starting at the checkpointed day.
    pub async fn run(&mut self, days: u64) -> Result<()> {
        info!("Scanning {} day(s) from day {}", days, self.next_day);

        for processed in 1..=days {
            let day = self.next_day;
            let agg = self.scan_day(day).await;
            self.finish_day(&agg)?;

            if milestone_reached(day, self.cfg.milestone_every_days) {
                info!("✅ Completed {} days so far...", day + 1);
            }

            if cooldown_due(processed, days, self.cfg.cooldown_every_days) {
                info!(
                    "⏸ Taking a short break to avoid overloading the server ({}s)...",
                    self.cfg.cooldown.as_secs()
                );
                sleep(self.cfg.cooldown).await;
            }
        }

        info!("Scan finished, next day is {}", self.next_day);
        Ok(())
    }

    /// Query every address watched at the start of `day` and fold in what qualifies.
    async fn scan_day(&mut self, day: u64) -> DailyAggregate {
        let window = LedgerWindow::for_day(self.cfg.start_ledger, self.cfg.ledgers_per_day, day);
        info!("Processing day {}: ledgers {} to {}", day, window.min, window.max);

        // frozen for the whole day; new counterparties are staged
        let addresses = self.watchlist.addresses();
        let mut active: HashSet<String> = HashSet::new();
        // a hash only ever belongs to one window, so dedupe is per day
        let mut handled: HashSet<String> = HashSet::new();
        let mut transfer_count = 0u64;
        let mut failed_queries = 0u64;
        let mut failed_writes = 0u64;
        let mut rejected_transfers = 0u64;

        for address in &addresses {
            let outcome = self.client.fetch(address, window).await;
            if !outcome.is_complete() {
                failed_queries += 1;
            }

            for raw in outcome.records() {
                if !parser::is_qualifying_transfer(raw, &self.cfg.asset) {
                    continue;
                }
                let Some(transfer) = parser::decode_transfer(raw, &self.cfg.asset, day) else {
                    let hash = parser::record_hash(raw);
                    let first_sighting = match hash {
                        Some(h) => handled.insert(h.to_string()),
                        None => true,
                    };
                    if first_sighting {
                        warn!(
                            "Dropping undecodable {} payment {}",
                            self.cfg.asset.currency,
                            hash.unwrap_or("<no hash>")
                        );
                        rejected_transfers += 1;
                    }
                    continue;
                };
                if !window.contains(transfer.ledger_index) {
                    continue;
                }
                // the same payment shows up in both parties' histories
                if handled.contains(&transfer.tx_hash) {
                    continue;
                }
                let posting = match self.ledger.plan(&transfer) {
                    Ok(posting) => posting,
                    Err(e) => {
                        warn!("Rejecting transfer {}: {}", transfer.tx_hash, e);
                        handled.insert(transfer.tx_hash.clone());
                        rejected_transfers += 1;
                        continue;
                    }
                };
                if let Err(e) = db::record_transfer(&self.conn, &transfer) {
                    error!("DB insert failed for {}: {:?}", transfer.tx_hash, e);
                    failed_writes += 1;
                    continue;
                }

                handled.insert(transfer.tx_hash.clone());
                self.ledger.commit(posting);
                transfer_count += 1;
                for party in [&transfer.sender, &transfer.receiver] {
                    active.insert(party.clone());
                    self.watchlist.stage(party);
                }
            }
        }

        let joined = self.watchlist.merge_staged();
        let complete = failed_queries == 0 && failed_writes == 0 && rejected_transfers == 0;
        if !complete {
            warn!(
                "Day {} is incomplete: {} failed queries, {} failed writes, {} rejected transfers",
                day, failed_queries, failed_writes, rejected_transfers
            );
        }
        info!(
            "Day {}: {} transfers, {} active addresses, {} new watched addresses ({} total), issuer balance {}",
            day,
            transfer_count,
            active.len(),
            joined,
            self.watchlist.len(),
            self.ledger.balance(&self.cfg.asset.issuer)
        );

        DailyAggregate {
            day,
            balances: self.ledger.nonzero_balances(),
            transfer_count,
            active_address_count: active.len(),
            circulating_supply: self.ledger.circulating_supply(),
            complete,
            failed_queries,
            failed_writes,
            rejected_transfers,
        }
    }

    /// Emit the day's reports, then advance the checkpoint.
    fn finish_day(&mut self, agg: &DailyAggregate) -> Result<()> {
        if let Err(e) = db::record_scan_day(&self.conn, agg) {
            error!("Could not record status for day {}: {:?}", agg.day, e);
        }
        self.reports.write_day(agg)?;
        self.checkpoint.save(agg.day + 1)?;
        self.next_day = agg.day + 1;
        Ok(())
    }

    #[cfg(test)]
    fn rpc(&self) -> &R {
        self.client.rpc()
    }
}
