// src/rpc.rs
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::response_log::ResponseLog;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("node error {error}: {message}")]
    Node { error: String, message: String },

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// One `account_tx` call: a single account over an inclusive ledger range
#[derive(Debug, Clone, PartialEq)]
pub struct AccountTxRequest {
    pub account: String,
    pub ledger_index_min: u64,
    pub ledger_index_max: u64,
    pub limit: u32,
    pub marker: Option<Value>,
}

impl AccountTxRequest {
    pub fn payload(&self) -> Value {
        let mut params = json!({
            "account": self.account,
            "ledger_index_min": self.ledger_index_min,
            "ledger_index_max": self.ledger_index_max,
            "binary": false,
            "limit": self.limit,
            "forward": true
        });
        if let Some(marker) = &self.marker {
            params["marker"] = marker.clone();
        }
        json!({
            "method": "account_tx",
            "params": [params]
        })
    }
}

/// One page of results; `marker` is the opaque continuation token
#[derive(Debug, Clone, Default)]
pub struct AccountTxPage {
    pub transactions: Vec<Value>,
    pub marker: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: AccountTxResult,
}

#[derive(Debug, Deserialize)]
struct AccountTxResult {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    transactions: Vec<Value>,
    #[serde(default)]
    marker: Option<Value>,
}

/// Paginated account history service
#[async_trait]
pub trait LedgerRpc: Send {
    async fn account_tx(&mut self, req: &AccountTxRequest) -> Result<AccountTxPage, RpcError>;
}

/// Parse a raw JSON-RPC body into a page, surfacing node-reported errors
pub fn parse_account_tx(text: &str) -> Result<AccountTxPage, RpcError> {
    let parsed: RpcResponse = serde_json::from_str(text)?;
    let result = parsed.result;

    if result.status.as_deref() == Some("error") || result.error.is_some() {
        return Err(RpcError::Node {
            error: result.error.unwrap_or_else(|| "unknown".to_string()),
            message: result.error_message.unwrap_or_default(),
        });
    }

    Ok(AccountTxPage {
        transactions: result.transactions,
        marker: result.marker.filter(|m| !m.is_null()),
    })
}

/// JSON-RPC over HTTP against a rippled / clio node
pub struct HttpLedgerRpc {
    client: Client,
    url: String,
    log: ResponseLog,
}

impl HttpLedgerRpc {
    pub fn new(url: &str, timeout: Duration, log: ResponseLog) -> Result<Self, RpcError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
            log,
        })
    }
}

#[async_trait]
impl LedgerRpc for HttpLedgerRpc {
    async fn account_tx(&mut self, req: &AccountTxRequest) -> Result<AccountTxPage, RpcError> {
        debug!(
            "📡 Sending account_tx → {} (account {}, ledgers {} → {})",
            self.url, req.account, req.ledger_index_min, req.ledger_index_max
        );

        let resp = self.client.post(&self.url).json(&req.payload()).send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if status != StatusCode::OK {
            return Err(RpcError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        if let Err(e) = self.log.record(&text) {
            warn!("Could not write response log in {}: {}", self.log.dir().display(), e);
        }

        parse_account_tx(&text)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shape() {
        let req = AccountTxRequest {
            account: "rA".to_string(),
            ledger_index_min: 10,
            ledger_index_max: 19,
            limit: 500,
            marker: None,
        };
        let p = req.payload();
        assert_eq!(p["method"], "account_tx");
        assert_eq!(p["params"][0]["account"], "rA");
        assert_eq!(p["params"][0]["ledger_index_max"], 19);
        assert_eq!(p["params"][0]["forward"], true);
        assert!(p["params"][0].get("marker").is_none());

        let with_marker = AccountTxRequest {
            marker: Some(json!({"ledger": 12, "seq": 3})),
            ..req
        };
        assert_eq!(with_marker.payload()["params"][0]["marker"]["seq"], 3);
    }

    #[test]
    fn test_parse_page_with_marker() {
        let body = r#"{"result":{"status":"success","transactions":[{"tx":{}}],"marker":{"ledger":5,"seq":1}}}"#;
        let page = parse_account_tx(body).unwrap();
        assert_eq!(page.transactions.len(), 1);
        assert!(page.marker.is_some());
    }

    #[test]
    fn test_parse_last_page() {
        let body = r#"{"result":{"status":"success","transactions":[]}}"#;
        let page = parse_account_tx(body).unwrap();
        assert!(page.transactions.is_empty());
        assert!(page.marker.is_none());
    }

    #[test]
    fn test_parse_node_error() {
        let body = r#"{"result":{"status":"error","error":"actNotFound","error_message":"Account not found."}}"#;
        match parse_account_tx(body) {
            Err(RpcError::Node { error, .. }) => assert_eq!(error, "actNotFound"),
            other => panic!("expected node error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(parse_account_tx("<html>"), Err(RpcError::Decode(_))));
    }
}
