//! Persistent price store.
//!
//! Durable cache of historical bars and computed analysis results,
//! keyed by symbol and date with per-symbol coverage windows so the
//! orchestrator can fetch only uncovered gaps.

mod sqlite;

pub use sqlite::SqliteStore;
