//! Token resolver: decimals from chain, metadata merged across providers.
//!
//! ```text
//! key → [result cache] → AccountCache<MintParser> (decimals)
//!     → provider 1 → provider 2 → ... (until every field is filled)
//! ```
//!
//! Providers are queried in list order. A field filled by an earlier provider
//! is never replaced by a later one. Provider failures and timeouts are
//! logged and skipped; only a missing mint account or a failed chain fetch
//! fails the call.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::accounts::MintParser;
use crate::cache::{AccountCache, FetchOptions};
use crate::error::ResolveError;
use crate::metadata::{Metadata, Token};
use crate::provider::MetadataProvider;
use crate::pubkey::Pubkey;

/// Configuration for [`TokenResolver`].
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Deadline for each provider call. A late provider is skipped.
    pub provider_timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(120),
        }
    }
}

/// A refresh always goes back to the chain for decimals.
fn mint_options(refresh: bool) -> FetchOptions {
    if refresh {
        FetchOptions::refresh()
    } else {
        FetchOptions::default()
    }
}

pub struct TokenResolver {
    accounts: Arc<AccountCache>,
    providers: Vec<Arc<dyn MetadataProvider>>,
    config: ResolverConfig,
    tokens: RwLock<HashMap<Pubkey, Token>>,
}

impl TokenResolver {
    pub fn new(accounts: Arc<AccountCache>) -> Self {
        Self::with_config(accounts, ResolverConfig::default())
    }

    pub fn with_config(accounts: Arc<AccountCache>, config: ResolverConfig) -> Self {
        Self {
            accounts,
            providers: Vec::new(),
            config,
            tokens: RwLock::new(HashMap::new()),
        }
    }

    /// Append a provider. Earlier providers take precedence.
    pub fn with_provider(mut self, provider: Arc<dyn MetadataProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Seed the result cache, e.g. from a previous run.
    pub fn with_tokens(self, tokens: impl IntoIterator<Item = Token>) -> Self {
        self.tokens
            .write()
            .unwrap()
            .extend(tokens.into_iter().map(|t| (t.mint, t)));
        self
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn accounts(&self) -> &Arc<AccountCache> {
        &self.accounts
    }

    /// The cached token for `key`, partial or not. Never touches the network.
    pub fn cached(&self, key: &Pubkey) -> Option<Token> {
        self.tokens.read().unwrap().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.tokens.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve one token.
    ///
    /// A complete cached token is returned as-is unless `refresh` is set.
    /// Otherwise decimals are re-read, previous metadata is dropped and the
    /// providers run until the metadata is complete or the list is exhausted.
    pub async fn find(&self, key: &Pubkey, refresh: bool) -> Result<Token, ResolveError> {
        if !refresh {
            if let Some(token) = self.complete(key) {
                debug!(key = %key, "token cache hit");
                return Ok(token);
            }
        }

        let mint = self
            .accounts
            .get_account(key, &MintParser, mint_options(refresh))
            .await?
            .ok_or_else(|| ResolveError::NotFound { keys: vec![*key] })?;
        let seeded = Token::new(*key, mint.decimals);
        self.tokens.write().unwrap().insert(*key, seeded.clone());

        for provider in &self.providers {
            let found =
                match tokio::time::timeout(self.config.provider_timeout, provider.find(key)).await {
                    Ok(Ok(found)) => found,
                    Ok(Err(e)) => {
                        warn!(provider = provider.name(), key = %key, error = %e, "metadata provider failed");
                        continue;
                    }
                    Err(_) => {
                        warn!(
                            provider = provider.name(),
                            key = %key,
                            timeout_ms = self.config.provider_timeout.as_millis() as u64,
                            "metadata provider timed out"
                        );
                        continue;
                    }
                };
            if let Some(metadata) = found {
                if !self.merge(key, &metadata) {
                    break;
                }
            }
        }

        Ok(self.cached(key).unwrap_or(seeded))
    }

    /// Resolve many tokens with one chain fetch and one call per provider.
    ///
    /// The result maps every input key to its token in input order. If any
    /// key has no mint account the call fails with
    /// [`ResolveError::NotFound`] listing all of them; tokens resolved for
    /// the other keys stay cached.
    pub async fn find_many(
        &self,
        keys: &[Pubkey],
        refresh: bool,
    ) -> Result<IndexMap<Pubkey, Token>, ResolveError> {
        let misses: Vec<Pubkey> = {
            let tokens = self.tokens.read().unwrap();
            let mut seen = HashSet::with_capacity(keys.len());
            keys.iter()
                .filter(|k| seen.insert(**k))
                .filter(|k| refresh || tokens.get(*k).map_or(true, Token::is_partial))
                .copied()
                .collect()
        };
        debug!(keys = keys.len(), misses = misses.len(), "resolving tokens");

        let mut not_found = Vec::new();
        if !misses.is_empty() {
            let mints = self
                .accounts
                .get_accounts(&misses, &MintParser, mint_options(refresh))
                .await?;

            let mut next = Vec::with_capacity(mints.len());
            {
                let mut tokens = self.tokens.write().unwrap();
                for (key, mint) in mints {
                    match mint {
                        Some(mint) => {
                            tokens.insert(key, Token::new(key, mint.decimals));
                            next.push(key);
                        }
                        None => not_found.push(key),
                    }
                }
            }

            for provider in &self.providers {
                if next.is_empty() {
                    break;
                }
                let found = match tokio::time::timeout(
                    self.config.provider_timeout,
                    provider.find_many(&next),
                )
                .await
                {
                    Ok(Ok(found)) => found,
                    Ok(Err(e)) => {
                        warn!(provider = provider.name(), keys = next.len(), error = %e, "metadata provider failed");
                        continue;
                    }
                    Err(_) => {
                        warn!(
                            provider = provider.name(),
                            keys = next.len(),
                            timeout_ms = self.config.provider_timeout.as_millis() as u64,
                            "metadata provider timed out"
                        );
                        continue;
                    }
                };

                let mut tokens = self.tokens.write().unwrap();
                next.retain(|key| {
                    let Some(token) = tokens.get_mut(key) else {
                        return false;
                    };
                    if let Some(Some(metadata)) = found.get(key) {
                        token.metadata.merge(metadata);
                    }
                    token.is_partial()
                });
                debug!(provider = provider.name(), remaining = next.len(), "provider pass done");
            }
        }

        if !not_found.is_empty() {
            return Err(ResolveError::NotFound { keys: not_found });
        }

        let tokens = self.tokens.read().unwrap();
        let mut out = IndexMap::with_capacity(keys.len());
        let mut missing = Vec::new();
        for key in keys {
            match tokens.get(key) {
                Some(token) => {
                    out.entry(*key).or_insert_with(|| token.clone());
                }
                None => missing.push(*key),
            }
        }
        if !missing.is_empty() {
            return Err(ResolveError::NotFound { keys: missing });
        }
        Ok(out)
    }

    fn complete(&self, key: &Pubkey) -> Option<Token> {
        self.tokens
            .read()
            .unwrap()
            .get(key)
            .filter(|t| !t.is_partial())
            .cloned()
    }

    /// Merge into the cached token. Returns whether it is still partial.
    fn merge(&self, key: &Pubkey, metadata: &Metadata) -> bool {
        let mut tokens = self.tokens.write().unwrap();
        match tokens.get_mut(key) {
            Some(token) => {
                token.metadata.merge(metadata);
                token.is_partial()
            }
            None => true,
        }
    }
}
