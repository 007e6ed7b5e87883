//! mintmeta-core: account caching and token metadata resolution.
//!
//! # Overview
//!
//! The core crate turns mint addresses into tokens with decimals and display
//! metadata. It defines:
//!
//! - [`AccountStore`]: the async trait every account source implements
//! - [`BatchGateway`]: chunked, concurrent, order-preserving batch fetches
//! - [`AccountParser`]: typed decoders, with built-ins in [`accounts`]
//! - [`AccountCache`]: parsed accounts with per-parser retention
//! - [`MetadataProvider`]: the async trait every metadata source implements
//! - [`TokenResolver`]: merges provider answers on top of on-chain decimals
//! - [`TokenRepository`]: a tagged local set of mints resolved on demand
//! - [`policy`] module: retry backoff and rate limiting for outbound calls

pub mod accounts;
pub mod cache;
pub mod clock;
pub mod error;
pub mod gateway;
pub mod metadata;
pub mod parser;
pub mod policy;
pub mod provider;
pub mod pubkey;
pub mod repository;
pub mod resolver;
pub mod store;

pub use cache::{AccountCache, CacheConfig, FetchOptions, RetentionPolicy};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{FetchError, ParseError, ProviderError, ResolveError, StoreError};
pub use gateway::{BatchGateway, FetchedAccount};
pub use metadata::{Metadata, Token};
pub use parser::{parse_account, AccountParser, ParserId};
pub use provider::MetadataProvider;
pub use pubkey::{Pubkey, PubkeyError};
pub use repository::{Mintlist, TaggedToken, TokenRepository};
pub use resolver::{ResolverConfig, TokenResolver};
pub use store::{Account, AccountStore, MemoryAccountStore, MAX_MULTIPLE_ACCOUNTS};
