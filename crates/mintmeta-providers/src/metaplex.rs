//! Metaplex Token Metadata provider.
//!
//! Name and symbol come from the on-chain metadata account, read through the
//! shared [`AccountCache`]. The image lives in the off-chain JSON document at
//! the account's `uri` and is only loaded when [`MetaplexConfig::load_image`]
//! is set.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use mintmeta_core::accounts::metaplex::metadata_address;
use mintmeta_core::accounts::{MetadataAccount, MetadataAccountParser};
use mintmeta_core::{AccountCache, FetchOptions, Metadata, MetadataProvider, ProviderError, Pubkey};

use crate::non_empty;
use crate::queue::{QueueConfig, RequestQueue};

#[derive(Debug, Clone)]
pub struct MetaplexConfig {
    /// Fetch the off-chain JSON for each token to fill `image`.
    pub load_image: bool,
    /// Pacing for off-chain JSON requests.
    pub queue: QueueConfig,
    /// Timeout for each off-chain JSON request.
    pub json_timeout: Duration,
}

impl Default for MetaplexConfig {
    fn default() -> Self {
        Self {
            load_image: false,
            queue: QueueConfig::new(5),
            json_timeout: Duration::from_secs(10),
        }
    }
}

/// Off-chain token JSON (Metaplex token standard). Only `image` is used.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

#[async_trait]
pub trait JsonMetadataClient: Send + Sync + 'static {
    async fn fetch_json(&self, uri: &str) -> Result<JsonMetadata, ProviderError>;
}

struct HttpJsonClient {
    http: reqwest::Client,
}

#[async_trait]
impl JsonMetadataClient for HttpJsonClient {
    async fn fetch_json(&self, uri: &str) -> Result<JsonMetadata, ProviderError> {
        let resp = self
            .http
            .get(uri)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ProviderError::Status {
                status: resp.status().as_u16(),
                url: uri.to_string(),
            });
        }
        resp.json()
            .await
            .map_err(|e| ProviderError::UnexpectedResponse(format!("{uri}: {e}")))
    }
}

pub struct MetaplexProvider {
    accounts: Arc<AccountCache>,
    json: Arc<dyn JsonMetadataClient>,
    queue: RequestQueue,
    load_image: bool,
}

impl MetaplexProvider {
    pub fn new(accounts: Arc<AccountCache>, config: MetaplexConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(config.json_timeout)
            .build()
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        Ok(Self::with_json_client(
            accounts,
            config,
            Arc::new(HttpJsonClient { http }),
        ))
    }

    pub fn with_json_client(
        accounts: Arc<AccountCache>,
        config: MetaplexConfig,
        json: Arc<dyn JsonMetadataClient>,
    ) -> Self {
        Self {
            accounts,
            json,
            queue: RequestQueue::new(config.queue),
            load_image: config.load_image,
        }
    }

    async fn image(&self, account: &MetadataAccount) -> Option<String> {
        if !self.load_image || account.uri.is_empty() {
            return None;
        }
        match self.queue.run(self.json.fetch_json(&account.uri)).await {
            Ok(json) => non_empty(json.image),
            Err(e) => {
                warn!(mint = %account.mint, uri = %account.uri, error = %e, "failed to load token JSON");
                None
            }
        }
    }
}

fn to_metadata(account: MetadataAccount, image: Option<String>) -> Metadata {
    Metadata {
        name: non_empty(Some(account.name)),
        symbol: non_empty(Some(account.symbol)),
        image,
    }
}

#[async_trait]
impl MetadataProvider for MetaplexProvider {
    fn name(&self) -> &str {
        "metaplex"
    }

    async fn find(&self, key: &Pubkey) -> Result<Option<Metadata>, ProviderError> {
        let Some(address) = metadata_address(key) else {
            return Ok(None);
        };
        let account = self
            .accounts
            .get_account(&address, &MetadataAccountParser, FetchOptions::default())
            .await?;
        let Some(account) = account else {
            return Ok(None);
        };
        let image = self.image(&account).await;
        Ok(Some(to_metadata(account, image)))
    }

    async fn find_many(
        &self,
        keys: &[Pubkey],
    ) -> Result<HashMap<Pubkey, Option<Metadata>>, ProviderError> {
        let addresses: Vec<(Pubkey, Pubkey)> = keys
            .iter()
            .filter_map(|k| metadata_address(k).map(|a| (*k, a)))
            .collect();
        let pdas: Vec<Pubkey> = addresses.iter().map(|(_, a)| *a).collect();
        let accounts = self
            .accounts
            .get_accounts_as_array(&pdas, &MetadataAccountParser, FetchOptions::default())
            .await?;
        debug!(
            keys = keys.len(),
            found = accounts.iter().filter(|a| a.is_some()).count(),
            "metaplex batch lookup"
        );

        let images: Vec<Option<String>> = futures::future::join_all(accounts.iter().map(|account| async move {
            match account {
                Some(account) => self.image(account).await,
                None => None,
            }
        }))
        .await;

        let mut out: HashMap<Pubkey, Option<Metadata>> = keys.iter().map(|k| (*k, None)).collect();
        for (((key, _), account), image) in addresses.iter().zip(accounts).zip(images) {
            if let Some(account) = account {
                out.insert(*key, Some(to_metadata(account, image)));
            }
        }
        Ok(out)
    }
}
