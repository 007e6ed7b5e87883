//! Batch fetch gateway: chunked, concurrent, all-or-nothing account fetching.
//!
//! Keys are split into chunks of at most `chunk_size` (the store's per-call
//! limit). Every chunk is requested at once and the joined result is raced
//! against the caller's deadline:
//!
//! ```text
//! keys[0..250] → [0..100] [100..200] [200..250] → join → 250 results (input order)
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::future;
use tracing::debug;

use crate::error::FetchError;
use crate::pubkey::Pubkey;
use crate::store::{Account, AccountStore, MAX_MULTIPLE_ACCOUNTS};

/// A fetched account paired with the key it was requested for.
pub type FetchedAccount = (Pubkey, Option<Account>);

/// Chunking gateway in front of an [`AccountStore`].
#[derive(Clone)]
pub struct BatchGateway {
    store: Arc<dyn AccountStore>,
    chunk_size: usize,
}

impl BatchGateway {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self::with_chunk_size(store, MAX_MULTIPLE_ACCOUNTS)
    }

    /// Use a custom chunk size, clamped to `1..=MAX_MULTIPLE_ACCOUNTS`.
    pub fn with_chunk_size(store: Arc<dyn AccountStore>, chunk_size: usize) -> Self {
        Self {
            store,
            chunk_size: chunk_size.clamp(1, MAX_MULTIPLE_ACCOUNTS),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn store(&self) -> &Arc<dyn AccountStore> {
        &self.store
    }

    /// Fetch every key, one output per input key in input order.
    ///
    /// Fails with [`FetchError::Timeout`] if the chunks do not all complete
    /// within `timeout`, and with [`FetchError::InvariantViolation`] if the
    /// store answers any chunk with the wrong number of accounts. No partial
    /// result is ever returned.
    pub async fn fetch_many(
        &self,
        keys: &[Pubkey],
        timeout: Duration,
    ) -> Result<Vec<FetchedAccount>, FetchError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let chunks: Vec<&[Pubkey]> = keys.chunks(self.chunk_size).collect();
        debug!(
            keys = keys.len(),
            chunks = chunks.len(),
            store = self.store.endpoint(),
            "fetching accounts"
        );

        let requests = chunks
            .iter()
            .map(|chunk| self.store.get_multiple_accounts(chunk));
        let responses = tokio::time::timeout(timeout, future::try_join_all(requests))
            .await
            .map_err(|_| FetchError::Timeout {
                ms: timeout.as_millis() as u64,
            })??;

        let mut out = Vec::with_capacity(keys.len());
        for (chunk, accounts) in chunks.iter().zip(responses) {
            if accounts.len() != chunk.len() {
                return Err(FetchError::InvariantViolation {
                    expected: chunk.len(),
                    actual: accounts.len(),
                });
            }
            out.extend(chunk.iter().copied().zip(accounts));
        }
        Ok(out)
    }
}
