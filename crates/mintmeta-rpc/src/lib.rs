//! mintmeta-rpc: Solana JSON-RPC [`AccountStore`](mintmeta_core::AccountStore).
//!
//! [`RpcAccountStore`] serves `getMultipleAccounts` / `getAccountInfo` over
//! HTTP with base64 account data, retrying transient failures with
//! exponential backoff.

pub mod client;
pub mod request;

pub use client::{Commitment, RpcAccountStore, RpcStoreConfig};
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, UiAccount};
