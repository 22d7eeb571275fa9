// src/fetcher.rs
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::models::LedgerWindow;
use crate::rpc::{AccountTxRequest, LedgerRpc, RpcError};

/// Result of paging through one account's history for one window.
///
/// A failed page never raises; it ends pagination and the records gathered
/// so far come back as `Partial` together with the error.
#[derive(Debug)]
pub enum FetchOutcome {
    Complete(Vec<Value>),
    Partial { records: Vec<Value>, error: RpcError },
}

impl FetchOutcome {
    pub fn records(&self) -> &[Value] {
        match self {
            FetchOutcome::Complete(records) => records,
            FetchOutcome::Partial { records, .. } => records,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, FetchOutcome::Complete(_))
    }
}

pub struct QueryClient<R: LedgerRpc> {
    rpc: R,
    page_limit: u32,
    page_delay: Duration,
}

impl<R: LedgerRpc> QueryClient<R> {
    pub fn new(rpc: R, page_limit: u32, page_delay: Duration) -> Self {
        Self {
            rpc,
            page_limit,
            page_delay,
        }
    }

    /// Fetch every transaction touching `address` inside `window`, oldest first.
    pub async fn fetch(&mut self, address: &str, window: LedgerWindow) -> FetchOutcome {
        let mut records = Vec::new();
        let mut marker: Option<Value> = None;
        let mut pages = 0u32;

        loop {
            let req = AccountTxRequest {
                account: address.to_string(),
                ledger_index_min: window.min,
                ledger_index_max: window.last(),
                limit: self.page_limit,
                marker: marker.take(),
            };

            let page = match self.rpc.account_tx(&req).await {
                Ok(page) => page,
                Err(error) => {
                    warn!(
                        "Request failed for {} (ledgers {} → {}, page {}): {}",
                        address, window.min, window.last(), pages, error
                    );
                    return FetchOutcome::Partial { records, error };
                }
            };

            pages += 1;
            records.extend(page.transactions);

            match page.marker {
                Some(next) => {
                    marker = Some(next);
                    sleep(self.page_delay).await; // gentle pacing between pages
                }
                None => break,
            }
        }

        debug!("Fetched {} records for {} in {} page(s)", records.len(), address, pages);
        FetchOutcome::Complete(records)
    }

    #[cfg(test)]
    pub fn rpc(&self) -> &R {
        &self.rpc
    }
}
