//! CoinGecko contract lookup.
//!
//! One request per mint (`/coins/solana/contract/{mint}`), paced through a
//! [`RequestQueue`] since the public API is heavily rate limited. A 404 means
//! CoinGecko does not list the token.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use mintmeta_core::{Metadata, MetadataProvider, ProviderError, Pubkey};

use crate::non_empty;
use crate::queue::{QueueConfig, RequestQueue};

pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";
pub const COINGECKO_PRO_API_URL: &str = "https://pro-api.coingecko.com/api/v3";

const SOLANA_ASSET_PLATFORM: &str = "solana";

/// The subset of CoinGecko's contract response that is used.
#[derive(Debug, Clone, Deserialize)]
pub struct ContractResponse {
    pub contract_address: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub image: ContractImage,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContractImage {
    pub large: Option<String>,
    pub small: Option<String>,
    pub thumb: Option<String>,
}

impl From<ContractResponse> for Metadata {
    fn from(c: ContractResponse) -> Self {
        let ContractImage { large, small, thumb } = c.image;
        Metadata {
            name: non_empty(c.name),
            // CoinGecko symbols are lower case
            symbol: non_empty(c.symbol).map(|s| s.to_uppercase()),
            image: non_empty(large).or(non_empty(small)).or(non_empty(thumb)),
        }
    }
}

#[async_trait]
pub trait CoinGeckoClient: Send + Sync + 'static {
    /// `Ok(None)` when the contract is unknown to CoinGecko.
    async fn get_contract(
        &self,
        asset_platform: &str,
        contract: &str,
    ) -> Result<Option<ContractResponse>, ProviderError>;
}

/// `reqwest` client for the public or pro API.
pub struct CoinGeckoHttpClient {
    http: reqwest::Client,
    api_key: Option<String>,
}

impl CoinGeckoHttpClient {
    /// With an API key, requests go to the pro endpoint.
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        Ok(Self { http, api_key })
    }

    fn url(&self, path: &str) -> String {
        match &self.api_key {
            Some(key) => format!("{COINGECKO_PRO_API_URL}{path}?x_cg_pro_api_key={key}"),
            None => format!("{COINGECKO_API_URL}{path}"),
        }
    }
}

#[async_trait]
impl CoinGeckoClient for CoinGeckoHttpClient {
    async fn get_contract(
        &self,
        asset_platform: &str,
        contract: &str,
    ) -> Result<Option<ContractResponse>, ProviderError> {
        // errors carry the path only, the full URL may hold the API key
        let path = format!("/coins/{asset_platform}/contract/{contract}");
        let resp = self
            .http
            .get(self.url(&path))
            .send()
            .await
            .map_err(|e| ProviderError::Http(format!("{path}: {}", e.without_url())))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                url: path,
            });
        }

        let contract = resp
            .json::<ContractResponse>()
            .await
            .map_err(|e| ProviderError::UnexpectedResponse(format!("{path}: {}", e.without_url())))?;
        Ok(Some(contract))
    }
}

pub struct CoinGeckoProvider {
    client: Arc<dyn CoinGeckoClient>,
    queue: RequestQueue,
}

impl CoinGeckoProvider {
    /// HTTP-backed provider with default pacing (1 in flight, 1 request/s).
    pub fn new(api_key: Option<String>) -> Result<Self, ProviderError> {
        let client = CoinGeckoHttpClient::new(api_key, Duration::from_secs(10))?;
        Ok(Self::with_client(Arc::new(client), Self::default_queue()))
    }

    pub fn with_client(client: Arc<dyn CoinGeckoClient>, queue: QueueConfig) -> Self {
        Self {
            client,
            queue: RequestQueue::new(queue),
        }
    }

    pub fn default_queue() -> QueueConfig {
        QueueConfig::new(1).with_rate_limit(1.0)
    }
}

#[async_trait]
impl MetadataProvider for CoinGeckoProvider {
    fn name(&self) -> &str {
        "coingecko"
    }

    async fn find(&self, key: &Pubkey) -> Result<Option<Metadata>, ProviderError> {
        let mint = key.to_string();
        match self.client.get_contract(SOLANA_ASSET_PLATFORM, &mint).await {
            Ok(contract) => Ok(contract.map(Metadata::from)),
            Err(e) => {
                warn!(key = %key, error = %e, "coingecko lookup failed");
                Ok(None)
            }
        }
    }

    async fn find_many(
        &self,
        keys: &[Pubkey],
    ) -> Result<HashMap<Pubkey, Option<Metadata>>, ProviderError> {
        debug!(keys = keys.len(), "coingecko batch lookup");
        let lookups: Vec<_> = keys.iter().map(|k| self.find(k)).collect();
        let found = self.queue.run_all(lookups).await;

        keys.iter()
            .zip(found)
            .map(|(key, metadata)| metadata.map(|m| (*key, m)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeCoinGecko {
        contracts: HashMap<String, serde_json::Value>,
        failing: Vec<String>,
        requests: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CoinGeckoClient for FakeCoinGecko {
        async fn get_contract(
            &self,
            asset_platform: &str,
            contract: &str,
        ) -> Result<Option<ContractResponse>, ProviderError> {
            assert_eq!(asset_platform, "solana");
            self.requests.lock().unwrap().push(contract.to_string());
            if self.failing.iter().any(|c| c == contract) {
                return Err(ProviderError::Status {
                    status: 429,
                    url: contract.to_string(),
                });
            }
            self.contracts
                .get(contract)
                .map(|v| serde_json::from_value(v.clone()))
                .transpose()
                .map_err(|e| ProviderError::UnexpectedResponse(e.to_string()))
        }
    }

    fn provider(fake: FakeCoinGecko) -> (Arc<FakeCoinGecko>, CoinGeckoProvider) {
        let fake = Arc::new(fake);
        let provider = CoinGeckoProvider::with_client(fake.clone(), QueueConfig::new(4));
        (fake, provider)
    }

    fn orca() -> serde_json::Value {
        serde_json::json!({
            "contract_address": "orcaEKTdK7LKz57vaAYr9QeNsVEPfiu6QeMU1kektZE",
            "id": "orca",
            "name": "Orca",
            "symbol": "orca",
            "image": {
                "thumb": "https://assets.coingecko.com/orca/thumb.png",
                "small": "https://assets.coingecko.com/orca/small.png",
                "large": null
            }
        })
    }

    #[tokio::test]
    async fn converts_contract_response() {
        let key = Pubkey::new([1; 32]);
        let (_, provider) = provider(FakeCoinGecko {
            contracts: HashMap::from([(key.to_string(), orca())]),
            ..Default::default()
        });

        let meta = provider.find(&key).await.unwrap().unwrap();
        assert_eq!(meta.name.as_deref(), Some("Orca"));
        assert_eq!(meta.symbol.as_deref(), Some("ORCA"));
        assert_eq!(meta.image.as_deref(), Some("https://assets.coingecko.com/orca/small.png"));
    }

    #[tokio::test]
    async fn unknown_and_failing_keys_are_misses() {
        let known = Pubkey::new([1; 32]);
        let unknown = Pubkey::new([2; 32]);
        let failing = Pubkey::new([3; 32]);
        let (fake, provider) = provider(FakeCoinGecko {
            contracts: HashMap::from([(known.to_string(), orca())]),
            failing: vec![failing.to_string()],
            ..Default::default()
        });

        let found = provider.find_many(&[known, unknown, failing]).await.unwrap();
        assert!(found[&known].is_some());
        assert!(found[&unknown].is_none());
        assert!(found[&failing].is_none());
        assert_eq!(fake.requests.lock().unwrap().len(), 3);
    }

    #[test]
    fn pro_key_switches_endpoint() {
        let public = CoinGeckoHttpClient::new(None, Duration::from_secs(1)).unwrap();
        assert_eq!(public.url("/ping"), "https://api.coingecko.com/api/v3/ping");

        let pro = CoinGeckoHttpClient::new(Some("k".into()), Duration::from_secs(1)).unwrap();
        assert_eq!(
            pro.url("/ping"),
            "https://pro-api.coingecko.com/api/v3/ping?x_cg_pro_api_key=k"
        );
    }
}
