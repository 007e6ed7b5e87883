//! The `AccountStore` trait: the authoritative source of raw account data.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::pubkey::Pubkey;

/// Maximum number of keys a single `get_multiple_accounts` call may carry.
pub const MAX_MULTIPLE_ACCOUNTS: usize = 100;

/// Raw account as returned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub lamports: u64,
    /// Program that owns the account.
    pub owner: Pubkey,
    pub data: Vec<u8>,
    pub executable: bool,
}

/// Batched access to on-chain accounts.
///
/// # Contract
/// `get_multiple_accounts` receives at most [`MAX_MULTIPLE_ACCOUNTS`] keys and
/// returns exactly one entry per key, in input order; `None` means the
/// account does not exist.
#[async_trait]
pub trait AccountStore: Send + Sync + 'static {
    async fn get_multiple_accounts(
        &self,
        keys: &[Pubkey],
    ) -> Result<Vec<Option<Account>>, StoreError>;

    /// Fetch a single account.
    ///
    /// Default implementation issues a one-key batch; override when the store
    /// has a cheaper single-account call.
    async fn get_account(&self, key: &Pubkey) -> Result<Option<Account>, StoreError> {
        let mut accounts = self.get_multiple_accounts(std::slice::from_ref(key)).await?;
        match accounts.len() {
            1 => Ok(accounts.pop().flatten()),
            n => Err(StoreError::Decode(format!("expected 1 account, got {n}"))),
        }
    }

    /// Identifier used in logs (endpoint URL or name).
    fn endpoint(&self) -> &str;
}

// ─── In-memory store (for testing) ────────────────────────────────────────────

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// In-memory account store for tests and offline tooling.
///
/// Records the size of every batch it serves and can simulate latency.
#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: Mutex<HashMap<Pubkey, Account>>,
    batches: Mutex<Vec<usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    latency: Option<Duration>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every batch by `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn insert(&self, key: Pubkey, account: Account) {
        self.accounts.lock().unwrap().insert(key, account);
    }

    pub fn remove(&self, key: &Pubkey) {
        self.accounts.lock().unwrap().remove(key);
    }

    /// Number of `get_multiple_accounts` calls served so far.
    pub fn calls(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    /// Batch sizes of every call served so far, in arrival order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().clone()
    }

    /// Highest number of batches that were in flight at the same time.
    pub fn max_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn get_multiple_accounts(
        &self,
        keys: &[Pubkey],
    ) -> Result<Vec<Option<Account>>, StoreError> {
        self.batches.lock().unwrap().push(keys.len());
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let accounts = {
            let map = self.accounts.lock().unwrap();
            keys.iter().map(|k| map.get(k).cloned()).collect()
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(accounts)
    }

    fn endpoint(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(byte: u8) -> Account {
        Account {
            lamports: 1,
            owner: Pubkey::default(),
            data: vec![byte],
            executable: false,
        }
    }

    #[tokio::test]
    async fn memory_store_answers_in_input_order() {
        let store = MemoryAccountStore::new();
        let a = Pubkey::new([1; 32]);
        let b = Pubkey::new([2; 32]);
        store.insert(a, account(1));

        let got = store.get_multiple_accounts(&[b, a, b]).await.unwrap();
        assert_eq!(got, vec![None, Some(account(1)), None]);
        assert_eq!(store.batch_sizes(), vec![3]);
    }

    #[tokio::test]
    async fn default_single_fetch_uses_batch() {
        let store = MemoryAccountStore::new();
        let a = Pubkey::new([7; 32]);
        store.insert(a, account(7));

        assert_eq!(store.get_account(&a).await.unwrap(), Some(account(7)));
        assert_eq!(store.get_account(&Pubkey::default()).await.unwrap(), None);
        assert_eq!(store.calls(), 2);
    }
}
