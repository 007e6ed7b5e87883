//! Account cache: parsed accounts with per-parser retention.
//!
//! Every entry remembers the parser that produced it and when it was fetched.
//! A lookup refetches only the stale subset of the requested keys, writes the
//! freshly parsed values back, then answers purely from cache state:
//!
//! ```text
//! keys → [stale filter] → BatchGateway → parse → write → read back (input order)
//! ```
//!
//! The maximum age of an entry resolves in this order: the per-call
//! [`FetchOptions::max_age`], then the [`RetentionPolicy`] entry for the
//! parser, then forever. [`FetchOptions::refresh`] skips the cache entirely.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::error::FetchError;
use crate::gateway::BatchGateway;
use crate::parser::{AccountParser, ErasedParser, ErasedValue, ParserId};
use crate::pubkey::Pubkey;
use crate::store::{AccountStore, MAX_MULTIPLE_ACCOUNTS};

/// Maximum cache age per parser. Parsers without an entry are kept forever.
#[derive(Debug, Clone, Default)]
pub struct RetentionPolicy {
    max_ages: HashMap<ParserId, Duration>,
}

impl RetentionPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`set`](Self::set).
    pub fn with<P: AccountParser>(mut self, max_age: Duration) -> Self {
        self.set::<P>(max_age);
        self
    }

    pub fn set<P: AccountParser>(&mut self, max_age: Duration) {
        self.max_ages.insert(ParserId::of::<P>(), max_age);
    }

    pub fn get(&self, parser: &ParserId) -> Option<Duration> {
        self.max_ages.get(parser).copied()
    }
}

/// Per-call overrides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Accept cached entries up to this age, overriding the retention policy.
    pub max_age: Option<Duration>,
    /// Treat every requested key as stale, whatever its age.
    pub refresh: bool,
}

impl FetchOptions {
    pub fn max_age(max_age: Duration) -> Self {
        Self {
            max_age: Some(max_age),
            ..Self::default()
        }
    }

    /// Refetch every requested key from the store.
    pub fn refresh() -> Self {
        Self {
            refresh: true,
            ..Self::default()
        }
    }
}

/// Configuration for [`AccountCache`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Deadline for each batch fetch issued by the cache.
    pub fetch_timeout: Duration,
    /// Keys per store call.
    pub chunk_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(10),
            chunk_size: MAX_MULTIPLE_ACCOUNTS,
        }
    }
}

struct CacheEntry {
    parser: Arc<dyn ErasedParser>,
    value: Option<ErasedValue>,
    fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    fn is_stale(&self, parser: ParserId, max_age: Option<Duration>, now: DateTime<Utc>) -> bool {
        // Stale by parser as well as by age: an entry written by another
        // parser holds a value of another type and is refetched, not read
        // back as a miss. See "Parser replacement per key" in DESIGN.md.
        if self.parser.parser_id() != parser {
            return true;
        }
        match max_age {
            None => false,
            // a negative elapsed time (clock stepped back) counts as fresh
            Some(max_age) => match (now - self.fetched_at).to_std() {
                Ok(elapsed) => elapsed > max_age,
                Err(_) => false,
            },
        }
    }
}

/// In-memory cache of parsed accounts in front of a [`BatchGateway`].
///
/// Created explicitly by the caller and shared through an `Arc`; there is no
/// global instance.
pub struct AccountCache {
    gateway: BatchGateway,
    retention: RetentionPolicy,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<Pubkey, CacheEntry>>,
}

impl AccountCache {
    pub fn new(store: Arc<dyn AccountStore>, retention: RetentionPolicy) -> Self {
        Self::with_config(store, retention, CacheConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn AccountStore>,
        retention: RetentionPolicy,
        config: CacheConfig,
    ) -> Self {
        Self {
            gateway: BatchGateway::with_chunk_size(store, config.chunk_size),
            retention,
            config,
            clock: Arc::new(SystemClock),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn retention(&self) -> &RetentionPolicy {
        &self.retention
    }

    /// Fetch one account, from cache if fresh.
    pub async fn get_account<P: AccountParser + Clone>(
        &self,
        key: &Pubkey,
        parser: &P,
        opts: FetchOptions,
    ) -> Result<Option<P::Output>, FetchError> {
        let now = self.clock.now();
        self.populate(std::slice::from_ref(key), parser, opts, now)
            .await?;
        Ok(self.read::<P>(key))
    }

    /// Fetch many accounts, keyed by address.
    ///
    /// Iteration order follows `keys`; repeated keys keep their first position.
    pub async fn get_accounts<P: AccountParser + Clone>(
        &self,
        keys: &[Pubkey],
        parser: &P,
        opts: FetchOptions,
    ) -> Result<IndexMap<Pubkey, Option<P::Output>>, FetchError> {
        let now = self.clock.now();
        self.populate(keys, parser, opts, now).await?;

        let entries = self.entries.read().unwrap();
        let mut out = IndexMap::with_capacity(keys.len());
        for key in keys {
            if !out.contains_key(key) {
                out.insert(*key, read_entry::<P>(&entries, key));
            }
        }
        Ok(out)
    }

    /// Fetch many accounts positionally; one output per input key, duplicates included.
    pub async fn get_accounts_as_array<P: AccountParser + Clone>(
        &self,
        keys: &[Pubkey],
        parser: &P,
        opts: FetchOptions,
    ) -> Result<Vec<Option<P::Output>>, FetchError> {
        let now = self.clock.now();
        self.populate(keys, parser, opts, now).await?;

        let entries = self.entries.read().unwrap();
        Ok(keys.iter().map(|k| read_entry::<P>(&entries, k)).collect())
    }

    /// Refetch every cached key, regardless of age, re-parsing each entry with
    /// the parser that produced it.
    pub async fn refresh_all(&self) -> Result<(), FetchError> {
        let now = self.clock.now();
        let snapshot: Vec<(Pubkey, Arc<dyn ErasedParser>)> = self
            .entries
            .read()
            .unwrap()
            .iter()
            .map(|(k, e)| (*k, e.parser.clone()))
            .collect();
        if snapshot.is_empty() {
            return Ok(());
        }

        let keys: Vec<Pubkey> = snapshot.iter().map(|(k, _)| *k).collect();
        let fetched = self
            .gateway
            .fetch_many(&keys, self.config.fetch_timeout)
            .await?;

        let refreshed: Vec<(Pubkey, CacheEntry)> = snapshot
            .into_iter()
            .zip(fetched)
            .map(|((key, parser), (_, account))| {
                let value = parser.parse_erased(&key, account.as_ref());
                (key, CacheEntry { parser, value, fetched_at: now })
            })
            .collect();

        debug!(keys = refreshed.len(), "refreshed account cache");
        self.entries.write().unwrap().extend(refreshed);
        Ok(())
    }

    /// Number of cached keys (including cached misses).
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &Pubkey) -> bool {
        self.entries.read().unwrap().contains_key(key)
    }

    /// Drop one entry so the next lookup refetches it.
    pub fn invalidate(&self, key: &Pubkey) {
        self.entries.write().unwrap().remove(key);
    }

    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }

    fn read<P: AccountParser>(&self, key: &Pubkey) -> Option<P::Output> {
        read_entry::<P>(&self.entries.read().unwrap(), key)
    }

    fn max_age(&self, parser: &ParserId, opts: FetchOptions) -> Option<Duration> {
        opts.max_age.or_else(|| self.retention.get(parser))
    }

    /// Fetch and store the stale subset of `keys`. Writes nothing on failure.
    async fn populate<P: AccountParser + Clone>(
        &self,
        keys: &[Pubkey],
        parser: &P,
        opts: FetchOptions,
        now: DateTime<Utc>,
    ) -> Result<(), FetchError> {
        let parser_id = ParserId::of::<P>();
        let max_age = self.max_age(&parser_id, opts);

        let stale: Vec<Pubkey> = {
            let entries = self.entries.read().unwrap();
            let mut seen = HashSet::with_capacity(keys.len());
            keys.iter()
                .filter(|k| seen.insert(**k))
                .filter(|k| {
                    opts.refresh
                        || entries
                            .get(*k)
                            .map_or(true, |e| e.is_stale(parser_id, max_age, now))
                })
                .copied()
                .collect()
        };

        if stale.is_empty() {
            debug!(keys = keys.len(), parser = parser_id.name(), "account cache hit");
            return Ok(());
        }
        debug!(
            keys = keys.len(),
            stale = stale.len(),
            parser = parser_id.name(),
            "account cache miss"
        );

        let fetched = self
            .gateway
            .fetch_many(&stale, self.config.fetch_timeout)
            .await?;

        let erased: Arc<dyn ErasedParser> = Arc::new(parser.clone());
        let parsed: Vec<(Pubkey, CacheEntry)> = fetched
            .into_iter()
            .map(|(key, account)| {
                let value = erased.parse_erased(&key, account.as_ref());
                let entry = CacheEntry {
                    parser: erased.clone(),
                    value,
                    fetched_at: now,
                };
                (key, entry)
            })
            .collect();

        self.entries.write().unwrap().extend(parsed);
        Ok(())
    }
}

fn read_entry<P: AccountParser>(
    entries: &HashMap<Pubkey, CacheEntry>,
    key: &Pubkey,
) -> Option<P::Output> {
    entries
        .get(key)?
        .value
        .as_ref()?
        .downcast_ref::<P::Output>()
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::mint::encode_mint;
    use crate::accounts::{MintParser, TOKEN_PROGRAM_ID};
    use crate::clock::ManualClock;
    use crate::error::ParseError;
    use crate::store::{Account, MemoryAccountStore};

    /// Reads the first data byte; any account works.
    #[derive(Clone)]
    struct FirstByte;

    impl AccountParser for FirstByte {
        type Output = u8;

        fn parse(&self, _key: &Pubkey, account: &Account) -> Result<u8, ParseError> {
            account
                .data
                .first()
                .copied()
                .ok_or_else(|| ParseError::Decode("empty".into()))
        }
    }

    #[derive(Clone)]
    struct DataLen;

    impl AccountParser for DataLen {
        type Output = usize;

        fn parse(&self, _key: &Pubkey, account: &Account) -> Result<usize, ParseError> {
            Ok(account.data.len())
        }
    }

    fn key(b: u8) -> Pubkey {
        Pubkey::new([b; 32])
    }

    fn raw(data: Vec<u8>) -> Account {
        Account {
            lamports: 1,
            owner: TOKEN_PROGRAM_ID,
            data,
            executable: false,
        }
    }

    struct Fixture {
        store: Arc<MemoryAccountStore>,
        clock: Arc<ManualClock>,
        cache: AccountCache,
    }

    fn fixture(retention: RetentionPolicy) -> Fixture {
        let store = Arc::new(MemoryAccountStore::new());
        let clock = Arc::new(ManualClock::default());
        let cache = AccountCache::new(store.clone(), retention).with_clock(clock.clone());
        Fixture { store, clock, cache }
    }

    #[tokio::test]
    async fn boundary_age_is_still_fresh() {
        let f = fixture(RetentionPolicy::new().with::<FirstByte>(Duration::from_millis(1000)));
        f.store.insert(key(1), raw(vec![1]));

        f.cache.get_account(&key(1), &FirstByte, FetchOptions::default()).await.unwrap();
        f.clock.advance(Duration::from_millis(1000));
        f.cache.get_account(&key(1), &FirstByte, FetchOptions::default()).await.unwrap();
        assert_eq!(f.store.calls(), 1);

        f.clock.advance(Duration::from_millis(1));
        f.cache.get_account(&key(1), &FirstByte, FetchOptions::default()).await.unwrap();
        assert_eq!(f.store.calls(), 2);
    }

    #[tokio::test]
    async fn call_override_beats_retention_policy() {
        let f = fixture(RetentionPolicy::new().with::<FirstByte>(Duration::from_secs(3600)));
        f.store.insert(key(1), raw(vec![1]));

        f.cache.get_account(&key(1), &FirstByte, FetchOptions::default()).await.unwrap();
        f.clock.advance(Duration::from_secs(5));
        f.cache
            .get_account(&key(1), &FirstByte, FetchOptions::max_age(Duration::from_secs(1)))
            .await
            .unwrap();
        assert_eq!(f.store.calls(), 2);
    }

    #[tokio::test]
    async fn refresh_refetches_without_clock_moving() {
        let f = fixture(RetentionPolicy::new());
        f.store.insert(key(1), raw(vec![1]));
        f.store.insert(key(2), raw(vec![2]));

        f.cache.get_account(&key(1), &FirstByte, FetchOptions::default()).await.unwrap();
        f.store.insert(key(1), raw(vec![7]));

        let got = f
            .cache
            .get_accounts_as_array(&[key(1), key(2), key(1)], &FirstByte, FetchOptions::refresh())
            .await
            .unwrap();
        assert_eq!(got, vec![Some(7), Some(2), Some(7)]);
        assert_eq!(f.store.batch_sizes(), vec![1, 2]);
    }

    #[tokio::test]
    async fn no_policy_means_forever() {
        let f = fixture(RetentionPolicy::new());
        f.store.insert(key(1), raw(vec![1]));

        f.cache.get_account(&key(1), &FirstByte, FetchOptions::default()).await.unwrap();
        f.clock.advance(Duration::from_secs(86_400 * 365));
        f.cache.get_account(&key(1), &FirstByte, FetchOptions::default()).await.unwrap();
        assert_eq!(f.store.calls(), 1);
    }

    #[tokio::test]
    async fn missing_accounts_are_cached_until_stale() {
        let f = fixture(RetentionPolicy::new().with::<FirstByte>(Duration::from_secs(10)));

        let first = f.cache.get_account(&key(9), &FirstByte, FetchOptions::default()).await.unwrap();
        assert_eq!(first, None);
        assert!(f.cache.contains(&key(9)));

        // appears on chain, but the cached miss is still fresh
        f.store.insert(key(9), raw(vec![7]));
        let second = f.cache.get_account(&key(9), &FirstByte, FetchOptions::default()).await.unwrap();
        assert_eq!(second, None);

        f.clock.advance(Duration::from_secs(11));
        let third = f.cache.get_account(&key(9), &FirstByte, FetchOptions::default()).await.unwrap();
        assert_eq!(third, Some(7));
        assert_eq!(f.store.calls(), 2);
    }

    #[tokio::test]
    async fn parse_failures_become_none() {
        let f = fixture(RetentionPolicy::new());
        f.store.insert(key(1), raw(vec![]));
        let got = f.cache.get_account(&key(1), &FirstByte, FetchOptions::default()).await.unwrap();
        assert_eq!(got, None);
    }

    #[tokio::test]
    async fn batch_results_follow_input_order() {
        let f = fixture(RetentionPolicy::new());
        for b in 1..=4 {
            f.store.insert(key(b), raw(vec![b]));
        }
        let keys = [key(3), key(1), key(5), key(3), key(2)];

        let array = f
            .cache
            .get_accounts_as_array(&keys, &FirstByte, FetchOptions::default())
            .await
            .unwrap();
        assert_eq!(array, vec![Some(3), Some(1), None, Some(3), Some(2)]);
        // duplicates were fetched once
        assert_eq!(f.store.batch_sizes(), vec![4]);

        let map = f
            .cache
            .get_accounts(&keys, &FirstByte, FetchOptions::default())
            .await
            .unwrap();
        let order: Vec<Pubkey> = map.keys().copied().collect();
        assert_eq!(order, vec![key(3), key(1), key(5), key(2)]);
        assert_eq!(map[&key(5)], None);
        assert_eq!(f.store.calls(), 1);
    }

    #[tokio::test]
    async fn only_stale_keys_are_fetched() {
        let f = fixture(RetentionPolicy::new());
        f.store.insert(key(1), raw(vec![1]));
        f.store.insert(key(2), raw(vec![2]));

        f.cache.get_account(&key(1), &FirstByte, FetchOptions::default()).await.unwrap();
        f.cache
            .get_accounts_as_array(&[key(1), key(2)], &FirstByte, FetchOptions::default())
            .await
            .unwrap();
        assert_eq!(f.store.batch_sizes(), vec![1, 1]);
    }

    #[tokio::test]
    async fn switching_parser_replaces_entry() {
        let f = fixture(RetentionPolicy::new());
        f.store.insert(key(1), raw(vec![4, 4, 4]));

        let byte = f.cache.get_account(&key(1), &FirstByte, FetchOptions::default()).await.unwrap();
        assert_eq!(byte, Some(4));
        let len = f.cache.get_account(&key(1), &DataLen, FetchOptions::default()).await.unwrap();
        assert_eq!(len, Some(3));
        assert_eq!(f.store.calls(), 2);

        // the first parser's value is gone; asking again refetches
        f.cache.get_account(&key(1), &FirstByte, FetchOptions::default()).await.unwrap();
        assert_eq!(f.store.calls(), 3);
        assert_eq!(f.cache.len(), 1);
    }

    #[tokio::test]
    async fn refresh_all_uses_each_entry_parser() {
        let f = fixture(RetentionPolicy::new());
        f.store.insert(key(1), raw(vec![1]));
        f.store.insert(key(2), raw(encode_mint(None, 0, 6, None)));

        f.cache.get_account(&key(1), &FirstByte, FetchOptions::default()).await.unwrap();
        f.cache.get_account(&key(2), &MintParser, FetchOptions::default()).await.unwrap();

        f.store.insert(key(1), raw(vec![10]));
        f.store.insert(key(2), raw(encode_mint(None, 0, 9, None)));
        f.cache.refresh_all().await.unwrap();
        assert_eq!(f.store.batch_sizes().last(), Some(&2));

        let byte = f.cache.get_account(&key(1), &FirstByte, FetchOptions::default()).await.unwrap();
        let mint = f.cache.get_account(&key(2), &MintParser, FetchOptions::default()).await.unwrap();
        assert_eq!(byte, Some(10));
        assert_eq!(mint.map(|m| m.decimals), Some(9));
        assert_eq!(f.store.calls(), 3);
    }

    #[tokio::test]
    async fn refresh_all_on_empty_cache_is_noop() {
        let f = fixture(RetentionPolicy::new());
        f.cache.refresh_all().await.unwrap();
        assert_eq!(f.store.calls(), 0);
    }

    #[tokio::test]
    async fn timeout_writes_nothing() {
        let store = Arc::new(MemoryAccountStore::new().with_latency(Duration::from_secs(5)));
        store.insert(key(1), raw(vec![1]));
        let cache = AccountCache::with_config(
            store,
            RetentionPolicy::new(),
            CacheConfig {
                fetch_timeout: Duration::from_millis(20),
                ..Default::default()
            },
        );

        let err = cache
            .get_accounts(&[key(1), key(2)], &FirstByte, FetchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout { .. }));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let f = fixture(RetentionPolicy::new());
        f.store.insert(key(1), raw(vec![1]));
        f.cache.get_account(&key(1), &FirstByte, FetchOptions::default()).await.unwrap();
        f.cache.invalidate(&key(1));
        assert!(!f.cache.contains(&key(1)));
        f.cache.get_account(&key(1), &FirstByte, FetchOptions::default()).await.unwrap();
        assert_eq!(f.store.calls(), 2);
    }
}
