mod checkpoint;
mod config;
mod db;
mod fetcher;
mod indexer;
mod ledger;
mod models;
mod parser;
mod report;
mod response_log;
mod rpc;

use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::fetcher::QueryClient;
use crate::indexer::Scanner;
use crate::response_log::ResponseLog;
use crate::rpc::HttpLedgerRpc;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stdout)
        .with_target(false)
        .init();

    info!("XRPL token indexer starting...");

    // Load configuration
    let cfg = config::load()?;
    info!("  Node URL: {}", cfg.node_url);
    info!("  DB Path: {}", cfg.db_path);
    info!("  Asset: {} issued by {}", cfg.asset.currency, cfg.asset.issuer);
    info!("  Ledgers: start {} / {} per day", cfg.start_ledger, cfg.ledgers_per_day);
    info!("  Days to process: {}", cfg.number_of_days);

    // Anything failing up to here aborts before the scan loop
    let conn = db::connect(&cfg.db_path)?;
    db::run_migrations(&conn)?;

    let rpc = HttpLedgerRpc::new(
        &cfg.node_url,
        cfg.http_timeout,
        ResponseLog::new(&cfg.response_log_dir, cfg.response_log_rotate),
    )?;
    let client = QueryClient::new(rpc, cfg.page_limit, cfg.page_delay);
    let days = cfg.number_of_days;
    let mut scanner = Scanner::resume(cfg, client, conn)?;

    tokio::select! {
        res = scanner.run(days) => match res {
            Ok(()) => info!("Scan exited cleanly"),
            Err(e) => {
                error!("Scan error: {:?}", e);
                return Err(e);
            }
        },
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received, stopping...");
        }
    }

    info!("Indexer stopped, next day to process is {}.", scanner.next_day());
    Ok(())
}
