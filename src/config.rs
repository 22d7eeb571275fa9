use dotenvy::dotenv;
use eyre::{eyre, Result};
use std::{env, path::PathBuf, str::FromStr, time::Duration};
use tracing::info;

use crate::models::TrackedAsset;

#[derive(Debug, Clone)]
pub struct Config {
    pub node_url: String,
    pub db_path: String,
    pub asset: TrackedAsset,
    pub ledgers_per_day: u64,
    pub start_ledger: u64,
    pub number_of_days: u64,
    pub output_dir: PathBuf,
    pub checkpoint_path: PathBuf,
    pub response_log_dir: PathBuf,
    pub response_log_rotate: u64,
    pub page_limit: u32,
    pub page_delay: Duration,
    pub http_timeout: Duration,
    pub cooldown_every_days: u64,
    pub cooldown: Duration,
    pub milestone_every_days: u64,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

pub fn load() -> Result<Config> {
    dotenv().ok(); // load from .env file when present

    let cfg = Config {
        node_url: var_or("XRPL_NODE_URL", "http://s1.ripple.com:51234/"),
        db_path: var_or("DATABASE_URL", "xrpl_indexer.db"),
        asset: TrackedAsset {
            issuer: var_or("ISSUER_ADDRESS", "rnQUEEg8yyjrwk9FhyXpKavHyCRJM9BDMW"),
            currency: var_or("CURRENCY_CODE", "PFT"),
        },
        ledgers_per_day: parse_or("LEDGERS_PER_DAY", 22_700),
        start_ledger: parse_or("START_LEDGER", 87_570_565),
        number_of_days: parse_or("NUMBER_OF_DAYS", 368),
        output_dir: PathBuf::from(var_or("OUTPUT_DIR", ".")),
        checkpoint_path: PathBuf::from(var_or("CHECKPOINT_FILE", "checkpoint.txt")),
        response_log_dir: PathBuf::from(var_or("RESPONSE_LOG_DIR", "logs")),
        response_log_rotate: parse_or("RESPONSE_LOG_ROTATE", 1_000),
        page_limit: parse_or("PAGE_LIMIT", 500),
        page_delay: Duration::from_millis(parse_or("PAGE_DELAY_MS", 500)),
        http_timeout: Duration::from_secs(parse_or("HTTP_TIMEOUT_SECS", 30)),
        cooldown_every_days: parse_or("COOLDOWN_EVERY_DAYS", 25),
        cooldown: Duration::from_secs(parse_or("COOLDOWN_SECS", 300)),
        milestone_every_days: parse_or("MILESTONE_EVERY_DAYS", 10),
    };

    cfg.validate()?;
    info!("Loaded config: {:?}", cfg);

    Ok(cfg)
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.ledgers_per_day == 0 {
            return Err(eyre!("LEDGERS_PER_DAY must be greater than zero"));
        }
        if self.page_limit == 0 {
            return Err(eyre!("PAGE_LIMIT must be greater than zero"));
        }
        if self.asset.issuer.is_empty() || self.asset.currency.is_empty() {
            return Err(eyre!("ISSUER_ADDRESS and CURRENCY_CODE must be set"));
        }
        Ok(())
    }
}

/// Small, pause-free configuration rooted in `dir` for tests.
#[cfg(test)]
pub fn test_config(dir: &std::path::Path) -> Config {
    Config {
        node_url: "http://127.0.0.1:1/".to_string(),
        db_path: dir.join("test.db").to_string_lossy().into_owned(),
        asset: TrackedAsset {
            issuer: "rIssuer".to_string(),
            currency: "PFT".to_string(),
        },
        ledgers_per_day: 100,
        start_ledger: 1_000,
        number_of_days: 3,
        output_dir: dir.to_path_buf(),
        checkpoint_path: dir.join("checkpoint.txt"),
        response_log_dir: dir.join("logs"),
        response_log_rotate: 1_000,
        page_limit: 500,
        page_delay: Duration::ZERO,
        http_timeout: Duration::from_secs(1),
        cooldown_every_days: 25,
        cooldown: Duration::ZERO,
        milestone_every_days: 10,
    }
}
