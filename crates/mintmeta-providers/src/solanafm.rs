//! SolanaFM token API.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use mintmeta_core::{Metadata, MetadataProvider, ProviderError, Pubkey};

use crate::non_empty;
use crate::queue::{QueueConfig, RequestQueue};

pub const SOLANA_FM_API_URL: &str = "https://api.solana.fm/v0";

/// Mints per `POST /tokens` request.
pub const TOKENS_CHUNK_SIZE: usize = 50;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResult {
    pub token_hash: String,
    pub data: TokenData,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenData {
    #[serde(default)]
    pub mint: Option<String>,
    #[serde(default)]
    pub token_name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub decimals: Option<u8>,
    #[serde(default)]
    pub logo: Option<String>,
}

impl From<TokenData> for Metadata {
    fn from(d: TokenData) -> Self {
        Metadata {
            name: non_empty(d.token_name),
            symbol: non_empty(d.symbol),
            image: non_empty(d.logo),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: String,
    #[serde(default)]
    message: String,
    result: T,
}

impl<T> Envelope<T> {
    fn into_result(self, url: &str) -> Result<T, ProviderError> {
        if self.status.eq_ignore_ascii_case("success") {
            Ok(self.result)
        } else {
            Err(ProviderError::UnexpectedResponse(format!(
                "{url}: status {} ({})",
                self.status, self.message
            )))
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokensRequest<'a> {
    token_hashes: &'a [String],
}

#[async_trait]
pub trait SolanaFmClient: Send + Sync + 'static {
    async fn get_token(&self, token_hash: &str) -> Result<TokenResult, ProviderError>;

    async fn get_tokens(&self, token_hashes: &[String]) -> Result<Vec<TokenResult>, ProviderError>;
}

pub struct SolanaFmHttpClient {
    http: reqwest::Client,
    base_url: String,
}

impl SolanaFmHttpClient {
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        Self::with_base_url(SOLANA_FM_API_URL, timeout)
    }

    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    async fn read<T: DeserializeOwned>(
        url: &str,
        resp: reqwest::Response,
    ) -> Result<T, ProviderError> {
        let status = resp.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        resp.json::<Envelope<T>>()
            .await
            .map_err(|e| ProviderError::UnexpectedResponse(format!("{url}: {e}")))?
            .into_result(url)
    }
}

#[async_trait]
impl SolanaFmClient for SolanaFmHttpClient {
    async fn get_token(&self, token_hash: &str) -> Result<TokenResult, ProviderError> {
        let url = format!("{}/tokens/{token_hash}", self.base_url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        Self::read(&url, resp).await
    }

    async fn get_tokens(&self, token_hashes: &[String]) -> Result<Vec<TokenResult>, ProviderError> {
        let url = format!("{}/tokens", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&TokensRequest { token_hashes })
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        Self::read(&url, resp).await
    }
}

pub struct SolanaFmProvider {
    client: Arc<dyn SolanaFmClient>,
    queue: RequestQueue,
}

impl SolanaFmProvider {
    /// HTTP-backed provider, 5 requests in flight.
    pub fn new() -> Result<Self, ProviderError> {
        let client = SolanaFmHttpClient::new(Duration::from_secs(10))?;
        Ok(Self::with_client(Arc::new(client), QueueConfig::new(5)))
    }

    pub fn with_client(client: Arc<dyn SolanaFmClient>, queue: QueueConfig) -> Self {
        Self {
            client,
            queue: RequestQueue::new(queue),
        }
    }
}

#[async_trait]
impl MetadataProvider for SolanaFmProvider {
    fn name(&self) -> &str {
        "solanafm"
    }

    async fn find(&self, key: &Pubkey) -> Result<Option<Metadata>, ProviderError> {
        match self.client.get_token(&key.to_string()).await {
            Ok(token) => Ok(Some(token.data.into())),
            Err(e) => {
                warn!(key = %key, error = %e, "solanafm lookup failed");
                Ok(None)
            }
        }
    }

    /// Any failed chunk fails the whole call.
    async fn find_many(
        &self,
        keys: &[Pubkey],
    ) -> Result<HashMap<Pubkey, Option<Metadata>>, ProviderError> {
        let hashes: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        let chunks: Vec<&[String]> = hashes.chunks(TOKENS_CHUNK_SIZE).collect();
        debug!(keys = keys.len(), chunks = chunks.len(), "solanafm batch lookup");

        let requests: Vec<_> = chunks.iter().map(|chunk| self.client.get_tokens(chunk)).collect();
        let responses = self.queue.run_all(requests).await;

        let mut out: HashMap<Pubkey, Option<Metadata>> = keys.iter().map(|k| (*k, None)).collect();
        for response in responses {
            for token in response? {
                match token.token_hash.parse::<Pubkey>() {
                    Ok(key) => {
                        out.insert(key, Some(token.data.into()));
                    }
                    Err(e) => {
                        warn!(token_hash = %token.token_hash, error = %e, "skipping solanafm token")
                    }
                }
            }
        }
        Ok(out)
    }
}
