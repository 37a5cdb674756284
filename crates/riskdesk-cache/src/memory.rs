//! Bounded LRU cache with lazy TTL expiry.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use riskdesk_core::{CacheEntry, FreshnessPolicy};
use tracing::{debug, warn};

struct Slot<T> {
    entry: CacheEntry<T>,
    last_used: u64,
}

struct Inner<T> {
    map: HashMap<String, Slot<T>>,
    tick: u64,
}

/// Single-process cache of `CacheEntry` values keyed by string.
///
/// Expiry is evaluated on read against the freshness policy: an expired
/// entry is reported absent (logically evicted) but left in place until
/// capacity pressure or invalidation removes it, so the orchestrator can
/// still retrieve it explicitly as a stale fallback. Eviction is
/// least-recently-used over a fixed entry cap.
pub struct MemoryCache<T> {
    inner: Mutex<Inner<T>>,
    policy: FreshnessPolicy,
    capacity: usize,
}

impl<T: Clone> MemoryCache<T> {
    /// Create a cache with the given entry cap and freshness policy.
    pub fn new(capacity: usize, policy: FreshnessPolicy) -> Self {
        Self {
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                tick: 0,
            }),
            policy,
            capacity: capacity.max(1),
        }
    }

    /// Lock the map, recovering from poison. Worst case after recovery is
    /// a spurious miss, which the slower tiers absorb.
    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            warn!("memory cache mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Get a fresh entry. Expired entries are treated as absent.
    pub fn get(&self, key: &str) -> Option<CacheEntry<T>> {
        let now = Utc::now();
        let mut inner = self.lock();
        inner.tick += 1;
        let tick = inner.tick;

        let slot = inner.map.get_mut(key)?;
        if !slot.entry.is_fresh(&self.policy, now) {
            debug!(key, "memory cache entry expired");
            return None;
        }
        slot.last_used = tick;
        Some(slot.entry.clone())
    }

    /// Get an entry regardless of freshness, with a flag saying whether it
    /// is still fresh. Used for stale-fallback decisions.
    pub fn get_any(&self, key: &str) -> Option<(CacheEntry<T>, bool)> {
        let now = Utc::now();
        let mut inner = self.lock();
        inner.tick += 1;
        let tick = inner.tick;

        let slot = inner.map.get_mut(key)?;
        slot.last_used = tick;
        let fresh = slot.entry.is_fresh(&self.policy, now);
        Some((slot.entry.clone(), fresh))
    }

    /// Insert an entry, evicting the least recently used slot at capacity.
    pub fn put(&self, key: impl Into<String>, entry: CacheEntry<T>) {
        let key = key.into();
        let mut inner = self.lock();
        inner.tick += 1;
        let tick = inner.tick;

        if !inner.map.contains_key(&key) && inner.map.len() >= self.capacity {
            if let Some(oldest) = inner
                .map
                .iter()
                .min_by_key(|(_, slot)| slot.last_used)
                .map(|(k, _)| k.clone())
            {
                debug!(key = %oldest, "evicting least recently used entry");
                inner.map.remove(&oldest);
            }
        }
        inner.map.insert(
            key,
            Slot {
                entry,
                last_used: tick,
            },
        );
    }

    /// Drop every entry whose key starts with the given prefix. Returns
    /// the number removed.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut inner = self.lock();
        let before = inner.map.len();
        inner.map.retain(|k, _| !k.starts_with(prefix));
        before - inner.map.len()
    }

    /// Drop everything. Returns the number removed.
    pub fn invalidate_all(&self) -> usize {
        let mut inner = self.lock();
        let count = inner.map.len();
        inner.map.clear();
        count
    }

    /// Number of entries currently held, fresh or not.
    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
