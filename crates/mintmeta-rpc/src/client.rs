//! HTTP account store backed by `reqwest`.
//!
//! Transport failures (connection errors, 429 and 5xx responses, client-side
//! timeouts) are retried with exponential backoff. Node-side JSON-RPC errors
//! and undecodable responses are returned immediately.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use mintmeta_core::policy::{RetryConfig, RetryPolicy};
use mintmeta_core::{Account, AccountStore, Pubkey, StoreError};

use crate::request::{JsonRpcRequest, JsonRpcResponse, RpcContextResult, UiAccount};

/// Bank state the node answers from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Confirmed => "confirmed",
            Self::Finalized => "finalized",
        }
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Commitment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "processed" => Ok(Self::Processed),
            "confirmed" => Ok(Self::Confirmed),
            "finalized" => Ok(Self::Finalized),
            other => Err(format!("unknown commitment '{other}'")),
        }
    }
}

/// Configuration for [`RpcAccountStore`].
#[derive(Debug, Clone)]
pub struct RpcStoreConfig {
    pub url: String,
    pub commitment: Commitment,
    /// Per HTTP request, enforced by the client.
    pub request_timeout: Duration,
    pub retry: RetryConfig,
}

impl RpcStoreConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

impl Default for RpcStoreConfig {
    fn default() -> Self {
        Self {
            url: "https://api.mainnet-beta.solana.com".into(),
            commitment: Commitment::default(),
            request_timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
        }
    }
}

/// Solana JSON-RPC account store.
pub struct RpcAccountStore {
    url: String,
    http: reqwest::Client,
    retry: RetryPolicy,
    commitment: Commitment,
    request_timeout: Duration,
    next_id: AtomicU64,
}

impl RpcAccountStore {
    pub fn new(config: RpcStoreConfig) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| StoreError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            url: config.url,
            http,
            retry: RetryPolicy::new(config.retry),
            commitment: config.commitment,
            request_timeout: config.request_timeout,
            next_id: AtomicU64::new(1),
        })
    }

    /// Store with default settings for `url`.
    pub fn default_for(url: impl Into<String>) -> Result<Self, StoreError> {
        Self::new(RpcStoreConfig::new(url))
    }

    pub fn commitment(&self) -> Commitment {
        self.commitment
    }

    fn account_config(&self) -> Value {
        json!({ "encoding": "base64", "commitment": self.commitment.as_str() })
    }

    /// Call `method` and decode its result, retrying transient failures.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, StoreError> {
        let req = JsonRpcRequest::new(self.next_id.fetch_add(1, Ordering::Relaxed), method, params);

        let mut attempt = 0u32;
        let result = loop {
            attempt += 1;
            match self.send_once(&req).await {
                Ok(result) => break result,
                Err(e) if e.is_retryable() => match self.retry.next_delay(attempt) {
                    Some(delay) => {
                        tracing::warn!(
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            method,
                            error = %e,
                            url = %self.url,
                            "retrying request"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        tracing::error!(attempt, method, error = %e, url = %self.url, "max retries exceeded");
                        return Err(e);
                    }
                },
                Err(e) => return Err(e),
            }
        };

        serde_json::from_value(result)
            .map_err(|e| StoreError::Decode(format!("{method} result: {e}")))
    }

    async fn send_once(&self, req: &JsonRpcRequest) -> Result<Value, StoreError> {
        let resp = self
            .http
            .post(&self.url)
            .json(req)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let msg = format!("HTTP {}: {body}", status.as_u16());
            return Err(if status.is_server_error() || status.as_u16() == 429 {
                StoreError::Http(msg)
            } else {
                StoreError::Other(msg)
            });
        }

        let resp: JsonRpcResponse = resp.json().await.map_err(|e| self.transport_error(e))?;
        Ok(resp.into_result()?)
    }

    fn transport_error(&self, e: reqwest::Error) -> StoreError {
        if e.is_timeout() {
            StoreError::Timeout {
                ms: self.request_timeout.as_millis() as u64,
            }
        } else if e.is_decode() {
            StoreError::Decode(e.to_string())
        } else {
            StoreError::Http(e.to_string())
        }
    }
}

#[async_trait]
impl AccountStore for RpcAccountStore {
    async fn get_multiple_accounts(
        &self,
        keys: &[Pubkey],
    ) -> Result<Vec<Option<Account>>, StoreError> {
        let addresses: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        let resp: RpcContextResult<Vec<Option<UiAccount>>> = self
            .call(
                "getMultipleAccounts",
                vec![json!(addresses), self.account_config()],
            )
            .await?;
        tracing::debug!(keys = keys.len(), slot = resp.context.slot, "getMultipleAccounts");

        resp.value
            .iter()
            .map(|ui| ui.as_ref().map(UiAccount::decode).transpose())
            .collect()
    }

    async fn get_account(&self, key: &Pubkey) -> Result<Option<Account>, StoreError> {
        let resp: RpcContextResult<Option<UiAccount>> = self
            .call(
                "getAccountInfo",
                vec![json!(key.to_string()), self.account_config()],
            )
            .await?;
        resp.value.as_ref().map(UiAccount::decode).transpose()
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}
