//! Metadata provider abstraction.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::metadata::Metadata;
use crate::pubkey::Pubkey;

/// A source of token metadata.
///
/// A key the provider does not know is `Ok(None)`. `Err` is reserved for
/// failures of the provider as a whole; the resolver logs those and moves on
/// to the next provider.
#[async_trait]
pub trait MetadataProvider: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn find(&self, key: &Pubkey) -> Result<Option<Metadata>, ProviderError>;

    /// Keys missing from the returned map are treated the same as `None`.
    async fn find_many(
        &self,
        keys: &[Pubkey],
    ) -> Result<HashMap<Pubkey, Option<Metadata>>, ProviderError>;
}
