//! Canonical state service adapters
//!
//! - HTTP client with retry and client-side rate limiting
//! - In-process store for replays and tests

pub mod client;
pub mod in_memory;
pub mod rate_limiter;
pub mod retry;

pub use client::HttpCanonicalStateService;
pub use in_memory::InMemoryCanonicalState;
pub use rate_limiter::TokenBucketRateLimiter;
pub use retry::RetryPolicy;
