//! Market data engine.
//!
//! The cache orchestrator: resolves every data request through
//! memory -> persistent store -> provider, applying freshness policy,
//! fetching only missing sub-ranges, coalescing concurrent identical
//! misses, and falling back to annotated stale data when a refresh
//! fails. Computed risk metrics ride the same tiers keyed by request
//! fingerprint.

mod coalesce;
mod fingerprint;
mod orchestrator;

pub use coalesce::SingleFlight;
pub use fingerprint::analysis_key;
pub use orchestrator::{EngineOptions, MarketDataEngine};
