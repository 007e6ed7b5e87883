//! mintmeta-providers: [`MetadataProvider`](mintmeta_core::MetadataProvider)
//! implementations.
//!
//! | Provider | Source | Default pacing |
//! |----------|--------|----------------|
//! | [`OverrideProvider`] | in-memory map | none |
//! | [`MetaplexProvider`] | on-chain metadata account + off-chain JSON | 5 concurrent |
//! | [`CoinGeckoProvider`] | `/coins/solana/contract/{mint}` | 1 concurrent, 1 req/s |
//! | [`SolanaFmProvider`] | `/v0/tokens` | 5 concurrent |

pub mod coingecko;
pub mod metaplex;
pub mod overrides;
pub mod queue;
pub mod solanafm;

pub use coingecko::{CoinGeckoClient, CoinGeckoHttpClient, CoinGeckoProvider};
pub use metaplex::{JsonMetadataClient, MetaplexConfig, MetaplexProvider};
pub use overrides::OverrideProvider;
pub use queue::{QueueConfig, RequestQueue};
pub use solanafm::{SolanaFmClient, SolanaFmHttpClient, SolanaFmProvider};

/// Empty strings from upstream APIs count as missing.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
