//! mintmeta CLI: resolve token decimals and metadata from the terminal.
//!
//! Usage:
//! ```bash
//! # Resolve tokens (Metaplex metadata by default)
//! mintmeta find --url https://api.mainnet-beta.solana.com \
//!     EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v
//!
//! # Add CoinGecko and SolanaFM as fallbacks, load images
//! mintmeta find --url <RPC> --coingecko --solanafm --load-image <MINT>...
//!
//! # Print the raw mint account
//! mintmeta account --url <RPC> <MINT>
//! ```

mod logging;

use std::env;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};

use mintmeta_core::accounts::MintParser;
use mintmeta_core::{
    AccountCache, CacheConfig, FetchOptions, Pubkey, RetentionPolicy, Token, TokenResolver,
};
use mintmeta_providers::{
    CoinGeckoProvider, MetaplexConfig, MetaplexProvider, OverrideProvider, SolanaFmProvider,
};
use mintmeta_rpc::{Commitment, RpcAccountStore, RpcStoreConfig};

use logging::{init_tracing, LogConfig};

/// Flags followed by a value.
const VALUE_FLAGS: &[&str] = &[
    "--url",
    "--commitment",
    "--timeout-ms",
    "--coingecko-key",
    "--overrides",
    "--log-level",
];

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let rest = &args[2..];
    init_tracing(&LogConfig {
        level: parse_flag(rest, "--log-level").unwrap_or_else(|| LogConfig::default().level),
        json: has_flag(rest, "--json-logs"),
    });

    let result = match args[1].as_str() {
        "find" => cmd_find(rest).await,
        "account" => cmd_account(rest).await,
        "providers" => {
            cmd_providers();
            Ok(())
        }
        "version" | "--version" | "-V" => {
            println!("mintmeta {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn print_usage() {
    println!("mintmeta {}", env!("CARGO_PKG_VERSION"));
    println!("Resolve SPL token decimals and metadata\n");
    println!("USAGE:");
    println!("    mintmeta <COMMAND> [FLAGS] [MINT]...\n");
    println!("COMMANDS:");
    println!("    find       Resolve tokens and print them as JSON");
    println!("    account    Print the parsed mint account");
    println!("    providers  List metadata providers");
    println!("    version    Print version");
    println!("    help       Print this help\n");
    println!("FLAGS:");
    println!("    --url <URL>            Solana RPC endpoint  [required]");
    println!("    --commitment <LEVEL>   processed | confirmed | finalized  [default: confirmed]");
    println!("    --timeout-ms <MS>      Account fetch deadline  [default: 10000]");
    println!("    --overrides <FILE>     JSON file of mint -> metadata, queried first");
    println!("    --no-metaplex          Skip on-chain Metaplex metadata");
    println!("    --load-image           Load Metaplex off-chain JSON for images");
    println!("    --coingecko            Query the public CoinGecko API");
    println!("    --coingecko-key <KEY>  Query the CoinGecko pro API");
    println!("    --solanafm             Query the SolanaFM API");
    println!("    --log-level <LEVEL>    Log filter  [default: warn]");
    println!("    --json-logs            Emit logs as JSON lines on stderr");
}

fn account_cache(args: &[String]) -> anyhow::Result<Arc<AccountCache>> {
    let url = parse_flag(args, "--url").ok_or_else(|| anyhow!("--url is required"))?;
    let commitment = match parse_flag(args, "--commitment") {
        Some(c) => c.parse::<Commitment>().map_err(|e| anyhow!(e))?,
        None => Commitment::default(),
    };
    let mut cache_config = CacheConfig::default();
    if let Some(ms) = parse_flag(args, "--timeout-ms") {
        let ms: u64 = ms.parse().context("--timeout-ms must be a number")?;
        cache_config.fetch_timeout = Duration::from_millis(ms);
    }

    let store = RpcAccountStore::new(RpcStoreConfig {
        commitment,
        ..RpcStoreConfig::new(url)
    })?;
    Ok(Arc::new(AccountCache::with_config(
        Arc::new(store),
        RetentionPolicy::new(),
        cache_config,
    )))
}

async fn cmd_find(args: &[String]) -> anyhow::Result<()> {
    let mints = parse_mints(args)?;
    if mints.is_empty() {
        bail!("at least one mint is required");
    }

    let accounts = account_cache(args)?;
    let mut resolver = TokenResolver::new(accounts.clone());

    if let Some(path) = parse_flag(args, "--overrides") {
        let json = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
        resolver = resolver.with_provider(Arc::new(OverrideProvider::from_json(&json)?));
    }
    if !has_flag(args, "--no-metaplex") {
        let config = MetaplexConfig {
            load_image: has_flag(args, "--load-image"),
            ..MetaplexConfig::default()
        };
        resolver = resolver.with_provider(Arc::new(MetaplexProvider::new(accounts, config)?));
    }
    let coingecko_key = parse_flag(args, "--coingecko-key");
    if coingecko_key.is_some() || has_flag(args, "--coingecko") {
        resolver = resolver.with_provider(Arc::new(CoinGeckoProvider::new(coingecko_key)?));
    }
    if has_flag(args, "--solanafm") {
        resolver = resolver.with_provider(Arc::new(SolanaFmProvider::new()?));
    }
    tracing::info!(providers = ?resolver.provider_names(), mints = mints.len(), "resolving");

    let tokens: Vec<Token> = resolver
        .find_many(&mints, false)
        .await?
        .into_values()
        .collect();
    println!("{}", serde_json::to_string_pretty(&tokens)?);
    Ok(())
}

async fn cmd_account(args: &[String]) -> anyhow::Result<()> {
    let mints = parse_mints(args)?;
    let [mint] = mints.as_slice() else {
        bail!("exactly one mint is required");
    };

    let accounts = account_cache(args)?;
    let parsed = accounts
        .get_account(mint, &MintParser, FetchOptions::default())
        .await?
        .ok_or_else(|| anyhow!("{mint} is not a mint account"))?;
    println!("{}", serde_json::to_string_pretty(&parsed)?);
    Ok(())
}

fn cmd_providers() {
    println!("Metadata providers, in query order:\n");
    println!("  overrides  Local JSON file (--overrides <FILE>)");
    println!("             Never fails, always first");
    println!();
    println!("  metaplex   On-chain Token Metadata account");
    println!("             Name, symbol; image with --load-image");
    println!();
    println!("  coingecko  CoinGecko (https://www.coingecko.com)");
    println!("             Auth:   optional pro API key");
    println!("             Limit:  1 request/s");
    println!();
    println!("  solanafm   SolanaFM (https://solana.fm)");
    println!("             Batched, 50 mints per request");
}

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    args.get(pos + 1).cloned()
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

/// Arguments that are neither flags nor flag values.
fn positional(args: &[String]) -> Vec<&str> {
    let mut out = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if VALUE_FLAGS.contains(&arg.as_str()) {
            iter.next();
        } else if !arg.starts_with("--") {
            out.push(arg.as_str());
        }
    }
    out
}

fn parse_mints(args: &[String]) -> anyhow::Result<Vec<Pubkey>> {
    positional(args)
        .into_iter()
        .map(|s| s.parse::<Pubkey>().with_context(|| format!("invalid mint {s}")))
        .collect()
}
