//! In-memory metadata, typically loaded from a curated JSON file.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use mintmeta_core::{Metadata, MetadataProvider, ProviderError, Pubkey};

/// Serves metadata from a fixed map. Never fails.
///
/// Put it first in the provider list to pin hand-curated values.
#[derive(Default)]
pub struct OverrideProvider {
    entries: RwLock<HashMap<Pubkey, Metadata>>,
}

impl OverrideProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `{ "<mint>": { "name": .., "symbol": .., "image": .. }, .. }`.
    pub fn from_json(json: &str) -> Result<Self, ProviderError> {
        let raw: HashMap<String, Metadata> = serde_json::from_str(json)
            .map_err(|e| ProviderError::UnexpectedResponse(format!("override file: {e}")))?;

        let provider = Self::new();
        for (mint, metadata) in raw {
            let key: Pubkey = mint
                .parse()
                .map_err(|e| ProviderError::Other(format!("override mint {mint}: {e}")))?;
            provider.insert(key, metadata);
        }
        Ok(provider)
    }

    pub fn insert(&self, key: Pubkey, metadata: Metadata) {
        self.entries.write().unwrap().insert(key, metadata);
    }

    pub fn with(self, key: Pubkey, metadata: Metadata) -> Self {
        self.insert(key, metadata);
        self
    }

    pub fn remove(&self, key: &Pubkey) -> Option<Metadata> {
        self.entries.write().unwrap().remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MetadataProvider for OverrideProvider {
    fn name(&self) -> &str {
        "overrides"
    }

    async fn find(&self, key: &Pubkey) -> Result<Option<Metadata>, ProviderError> {
        Ok(self.entries.read().unwrap().get(key).cloned())
    }

    async fn find_many(
        &self,
        keys: &[Pubkey],
    ) -> Result<HashMap<Pubkey, Option<Metadata>>, ProviderError> {
        let entries = self.entries.read().unwrap();
        Ok(keys.iter().map(|k| (*k, entries.get(k).cloned())).collect())
    }
}
