//! Outbound request policies shared by the RPC store and the HTTP providers.
//!
//! ```text
//! request → [RateLimiter] → [RetryPolicy] → transport
//! ```

pub mod rate_limiter;
pub mod retry;

pub use rate_limiter::{RateLimiter, RateLimiterConfig};
pub use retry::{RetryConfig, RetryPolicy};
