//! Token repository: a local set of mints with tags and exclusions.
//!
//! Mints are registered up front, optionally with tags (`"whitelisted"`,
//! `"coingecko"`, ...), and resolved on demand through a shared
//! [`TokenResolver`]. Excluded mints are never returned, even if they are
//! added again later.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ResolveError;
use crate::metadata::Token;
use crate::pubkey::Pubkey;
use crate::resolver::TokenResolver;

/// A named, versioned list of mints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mintlist {
    pub name: String,
    pub version: String,
    pub mints: Vec<Pubkey>,
}

/// A resolved token with the tags it was registered under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedToken {
    #[serde(flatten)]
    pub token: Token,
    pub tags: Vec<String>,
}

#[derive(Default)]
struct RepositoryState {
    mints: IndexMap<Pubkey, IndexSet<String>>,
    tags: IndexMap<String, IndexSet<Pubkey>>,
    excluded: HashSet<Pubkey>,
}

impl RepositoryState {
    fn tags_of(&self, mint: &Pubkey) -> Vec<String> {
        self.mints
            .get(mint)
            .map(|tags| tags.iter().cloned().collect())
            .unwrap_or_default()
    }
}

pub struct TokenRepository {
    resolver: Arc<TokenResolver>,
    state: RwLock<RepositoryState>,
}

impl TokenRepository {
    pub fn new(resolver: Arc<TokenResolver>) -> Self {
        Self {
            resolver,
            state: RwLock::new(RepositoryState::default()),
        }
    }

    pub fn resolver(&self) -> &Arc<TokenResolver> {
        &self.resolver
    }

    /// Register a mint. Tags merge with any it already has, in first-seen order.
    pub fn add_mint<S: AsRef<str>>(&self, mint: Pubkey, tags: &[S]) -> &Self {
        let mut state = self.state.write().unwrap();
        let own = state.mints.entry(mint).or_default();
        for tag in tags {
            own.insert(tag.as_ref().to_string());
        }
        for tag in tags {
            state
                .tags
                .entry(tag.as_ref().to_string())
                .or_default()
                .insert(mint);
        }
        self
    }

    /// Register every mint with the same tags.
    pub fn add_mints<S: AsRef<str>>(&self, mints: &[Pubkey], tags: &[S]) -> &Self {
        for mint in mints {
            self.add_mint(*mint, tags);
        }
        self
    }

    pub fn add_mintlist<S: AsRef<str>>(&self, mintlist: &Mintlist, tags: &[S]) -> &Self {
        self.add_mints(&mintlist.mints, tags)
    }

    /// Hide mints from every lookup. Exclusion is permanent.
    pub fn exclude_mints(&self, mints: &[Pubkey]) -> &Self {
        self.state
            .write()
            .unwrap()
            .excluded
            .extend(mints.iter().copied());
        self
    }

    pub fn exclude_mintlist(&self, mintlist: &Mintlist) -> &Self {
        self.exclude_mints(&mintlist.mints)
    }

    pub fn is_excluded(&self, mint: &Pubkey) -> bool {
        self.state.read().unwrap().excluded.contains(mint)
    }

    /// Registered mints, excluded ones included, in registration order.
    pub fn mints(&self) -> Vec<Pubkey> {
        self.state.read().unwrap().mints.keys().copied().collect()
    }

    /// Resolve one mint. `None` if it is excluded.
    ///
    /// The mint does not have to be registered; an unregistered mint has no tags.
    pub async fn get(
        &self,
        mint: &Pubkey,
        refresh: bool,
    ) -> Result<Option<TaggedToken>, ResolveError> {
        if self.is_excluded(mint) {
            return Ok(None);
        }
        let token = self.resolver.find(mint, refresh).await?;
        let tags = self.state.read().unwrap().tags_of(mint);
        Ok(Some(TaggedToken { token, tags }))
    }

    /// Resolve many mints in input order, skipping excluded ones.
    pub async fn get_many(
        &self,
        mints: &[Pubkey],
        refresh: bool,
    ) -> Result<Vec<TaggedToken>, ResolveError> {
        let wanted: Vec<Pubkey> = {
            let state = self.state.read().unwrap();
            mints
                .iter()
                .filter(|m| !state.excluded.contains(*m))
                .copied()
                .collect()
        };
        debug!(
            mints = mints.len(),
            excluded = mints.len() - wanted.len(),
            "repository lookup"
        );
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        let tokens = self.resolver.find_many(&wanted, refresh).await?;
        let state = self.state.read().unwrap();
        Ok(tokens
            .into_values()
            // a mint excluded while the lookup was running
            .filter(|token| !state.excluded.contains(&token.mint))
            .map(|token| {
                let tags = state.tags_of(&token.mint);
                TaggedToken { token, tags }
            })
            .collect())
    }

    /// Resolve every registered mint that is not excluded.
    pub async fn get_all(&self, refresh: bool) -> Result<Vec<TaggedToken>, ResolveError> {
        let mints = self.mints();
        self.get_many(&mints, refresh).await
    }

    /// Resolve every mint registered under `tag`, in registration order.
    pub async fn get_by_tag(
        &self,
        tag: &str,
        refresh: bool,
    ) -> Result<Vec<TaggedToken>, ResolveError> {
        let mints: Vec<Pubkey> = self
            .state
            .read()
            .unwrap()
            .tags
            .get(tag)
            .map(|mints| mints.iter().copied().collect())
            .unwrap_or_default();
        self.get_many(&mints, refresh).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::mint::encode_mint;
    use crate::accounts::TOKEN_PROGRAM_ID;
    use crate::cache::{AccountCache, RetentionPolicy};
    use crate::error::ProviderError;
    use crate::metadata::Metadata;
    use crate::provider::MetadataProvider;
    use crate::store::{Account, MemoryAccountStore};
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Answers `P<n>` for the key `[n; 32]`.
    struct Numbered;

    fn numbered(key: &Pubkey) -> Metadata {
        let n = key.as_bytes()[0];
        Metadata::new(format!("P{n} Token"), format!("P{n}"), format!("https://p{n}.com"))
    }

    #[async_trait]
    impl MetadataProvider for Numbered {
        fn name(&self) -> &str {
            "numbered"
        }

        async fn find(&self, key: &Pubkey) -> Result<Option<Metadata>, ProviderError> {
            Ok(Some(numbered(key)))
        }

        async fn find_many(
            &self,
            keys: &[Pubkey],
        ) -> Result<HashMap<Pubkey, Option<Metadata>>, ProviderError> {
            Ok(keys.iter().map(|k| (*k, Some(numbered(k)))).collect())
        }
    }

    fn key(b: u8) -> Pubkey {
        Pubkey::new([b; 32])
    }

    fn repository(mints: &[u8]) -> (Arc<MemoryAccountStore>, TokenRepository) {
        let store = Arc::new(MemoryAccountStore::new());
        for b in mints {
            store.insert(
                key(*b),
                Account {
                    lamports: 1,
                    owner: TOKEN_PROGRAM_ID,
                    data: encode_mint(None, 0, 9, None),
                    executable: false,
                },
            );
        }
        let cache = Arc::new(AccountCache::new(store.clone(), RetentionPolicy::new()));
        let resolver = TokenResolver::new(cache).with_provider(Arc::new(Numbered));
        (store, TokenRepository::new(Arc::new(resolver)))
    }

    fn symbols(tokens: &[TaggedToken]) -> Vec<&str> {
        tokens
            .iter()
            .map(|t| t.token.metadata.symbol.as_deref().unwrap_or_default())
            .collect()
    }

    #[tokio::test]
    async fn get_attaches_tags() {
        let (_, repo) = repository(&[1, 2, 3]);
        repo.add_mint(key(1), &["whitelisted"]).add_mint::<&str>(key(2), &[]);

        let one = repo.get(&key(1), false).await.unwrap().unwrap();
        assert_eq!(one.token.mint, key(1));
        assert_eq!(one.token.decimals, 9);
        assert_eq!(one.token.metadata.symbol.as_deref(), Some("P1"));
        assert_eq!(one.tags, vec!["whitelisted"]);

        let two = repo.get(&key(2), false).await.unwrap().unwrap();
        assert!(two.tags.is_empty());

        // unregistered mints still resolve, untagged
        let three = repo.get(&key(3), false).await.unwrap().unwrap();
        assert_eq!(three.token.metadata.symbol.as_deref(), Some("P3"));
        assert!(three.tags.is_empty());
    }

    #[tokio::test]
    async fn adding_again_merges_tags() {
        let (_, repo) = repository(&[1]);
        let list = Mintlist {
            name: "Test Mintlist".into(),
            version: "0.0.1".into(),
            mints: vec![key(1)],
        };
        repo.add_mint(key(1), &["tag1"])
            .add_mints(&[key(1)], &["tag2", "tag1"])
            .add_mintlist(&list, &["tag3"]);

        let all = repo.get_all(false).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].tags, vec!["tag1", "tag2", "tag3"]);
    }

    #[tokio::test]
    async fn get_many_keeps_input_order_in_one_batch() {
        let (store, repo) = repository(&[1, 2, 3]);
        let mints = [key(3), key(1), key(2)];
        repo.add_mints(&mints, &["whitelisted"]);

        let tokens = repo.get_many(&mints, false).await.unwrap();
        assert_eq!(symbols(&tokens), vec!["P3", "P1", "P2"]);
        assert!(tokens.iter().all(|t| t.tags == vec!["whitelisted"]));
        assert_eq!(store.calls(), 1);
    }

    #[tokio::test]
    async fn get_by_tag() {
        let (_, repo) = repository(&[1, 2, 3]);
        repo.add_mints(&[key(1), key(2), key(3)], &["whitelisted"])
            .add_mint(key(1), &["coingecko"]);

        let whitelisted = repo.get_by_tag("whitelisted", false).await.unwrap();
        assert_eq!(symbols(&whitelisted), vec!["P1", "P2", "P3"]);

        let coingecko = repo.get_by_tag("coingecko", false).await.unwrap();
        assert_eq!(coingecko.len(), 1);
        assert_eq!(coingecko[0].tags, vec!["whitelisted", "coingecko"]);

        assert!(repo.get_by_tag("unknown", false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn excluded_mints_stay_hidden() {
        let (store, repo) = repository(&[1, 2, 3]);
        repo.add_mints(&[key(1), key(2), key(3)], &["whitelisted"])
            .exclude_mints(&[key(1)])
            .add_mint::<&str>(key(1), &[]);

        let tokens = repo.get_all(false).await.unwrap();
        assert_eq!(symbols(&tokens), vec!["P2", "P3"]);
        assert_eq!(store.batch_sizes(), vec![2]);
        assert_eq!(repo.get(&key(1), false).await.unwrap(), None);

        repo.exclude_mintlist(&Mintlist {
            mints: vec![key(2)],
            ..Default::default()
        });
        let tokens = repo.get_all(false).await.unwrap();
        assert_eq!(symbols(&tokens), vec!["P3"]);
        assert_eq!(repo.mints().len(), 3);
    }

    #[tokio::test]
    async fn excluded_missing_mint_does_not_fail_lookup() {
        let (_, repo) = repository(&[1]);
        repo.add_mints(&[key(1), key(9)], &["whitelisted"])
            .exclude_mints(&[key(9)]);

        let tokens = repo.get_by_tag("whitelisted", false).await.unwrap();
        assert_eq!(symbols(&tokens), vec!["P1"]);

        repo.add_mint(key(8), &["whitelisted"]);
        match repo.get_all(false).await.unwrap_err() {
            ResolveError::NotFound { keys } => assert_eq!(keys, vec![key(8)]),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn tagged_token_serializes_flat() {
        let token = TaggedToken {
            token: Token::new(key(1), 6).with_metadata(Metadata::new("One", "ONE", "1.png")),
            tags: vec!["whitelisted".into()],
        };
        let json = serde_json::to_value(&token).unwrap();
        assert_eq!(json["decimals"], 6);
        assert_eq!(json["symbol"], "ONE");
        assert_eq!(json["tags"][0], "whitelisted");
    }
}
