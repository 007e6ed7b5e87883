//! Error types for the fetch, parse and resolve pipeline.

use thiserror::Error;

use crate::pubkey::Pubkey;

/// Errors raised by an [`AccountStore`](crate::store::AccountStore) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// HTTP request failed (connection refused, bad status, etc.).
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON-RPC error returned by the node.
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Response could not be decoded into accounts.
    #[error("decode error: {0}")]
    Decode(String),

    /// The store's own request deadline elapsed.
    #[error("store request timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// Returns `true` if the error is transient and the request may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Timeout { .. })
    }
}

/// Fatal errors from the batch gateway and the account cache.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Not every chunk completed before the deadline. Nothing was written.
    #[error("account fetch timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The store answered a chunk with the wrong number of accounts.
    #[error("store returned {actual} accounts for {expected} keys")]
    InvariantViolation { expected: usize, actual: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Reasons a raw account could not be decoded. Never leaves the parser registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("account owned by {owner}, expected {expected}")]
    InvalidOwner { owner: Pubkey, expected: String },

    #[error("invalid account length {len}, expected {expected}")]
    InvalidLength { len: usize, expected: String },

    #[error("unexpected account type {0}")]
    InvalidAccountType(u8),

    #[error("account is not initialized")]
    Uninitialized,

    #[error("decode failed: {0}")]
    Decode(String),
}

/// Errors a metadata provider may raise for systemic failures.
///
/// A provider that simply does not know a key returns `Ok(None)` instead.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("{0}")]
    Other(String),
}

/// Fatal errors from the token resolver.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No mint account exists for these keys.
    #[error("mint not found: {}", join_keys(.keys))]
    NotFound { keys: Vec<Pubkey> },

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

fn join_keys(keys: &[Pubkey]) -> String {
    keys.iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_store_errors() {
        assert!(StoreError::Http("refused".into()).is_retryable());
        assert!(StoreError::Timeout { ms: 10 }.is_retryable());
        assert!(!StoreError::Rpc { code: -32602, message: "bad".into() }.is_retryable());
        assert!(!StoreError::Decode("x".into()).is_retryable());
    }

    #[test]
    fn not_found_lists_keys() {
        let a = Pubkey::new([1; 32]);
        let b = Pubkey::new([2; 32]);
        let err = ResolveError::NotFound { keys: vec![a, b] };
        let msg = err.to_string();
        assert!(msg.contains(&a.to_string()));
        assert!(msg.contains(&b.to_string()));
    }
}
