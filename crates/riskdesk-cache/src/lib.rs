//! Process-local memory cache.
//!
//! The fast tier in front of the persistent store: bounded, LRU-evicted,
//! expired lazily on read. Never authoritative — everything in here is a
//! disposable copy of the persistent tier or a provider response.

mod memory;

pub use memory::MemoryCache;
