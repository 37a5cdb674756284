//! Core types and traits for the market data engine.
//!
//! This crate provides the foundational building blocks including:
//! - Price data types (PriceBar, PriceSeries, DateRange)
//! - Cache entry and freshness types
//! - Risk analysis result types
//! - Portfolio allocation types
//! - Traits for quote providers and persistent price stores
//! - The error taxonomy shared across the engine

pub mod types;
pub mod traits;
pub mod error;

pub use error::{AnalyticsError, EngineError, EngineResult, ProviderError, StoreError};
pub use types::*;
pub use traits::*;
