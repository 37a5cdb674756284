//! Market data providers.
//!
//! Two interchangeable HTTP clients — Alpha Vantage (professional tier)
//! and Yahoo Finance (consumer fallback) — composed behind a single
//! [`FailoverProvider`] that validates input, rate-limits per provider,
//! and retries transient failures on the other side of the chain.

mod alpha_vantage;
mod failover;
mod rate_limit;
mod yahoo;

pub use alpha_vantage::{AlphaVantageConfig, AlphaVantageProvider};
pub use failover::FailoverProvider;
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use yahoo::{YahooConfig, YahooProvider};
