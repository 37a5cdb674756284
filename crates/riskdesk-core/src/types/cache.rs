//! Cache entries and freshness policy.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Governs which freshness window applies to a cached value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtlClass {
    /// Live quotes, seconds-to-minutes scale.
    Live,
    /// Historical bar series, day scale.
    Historical,
    /// Computed analysis results, day scale.
    Analysis,
}

/// Freshness windows per TTL class. Defaults follow the design: live
/// quotes 5 minutes, historical and analysis 24 hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    pub live: Duration,
    pub historical: Duration,
    pub analysis: Duration,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self {
            live: Duration::minutes(5),
            historical: Duration::hours(24),
            analysis: Duration::hours(24),
        }
    }
}

impl FreshnessPolicy {
    /// Build a policy from per-class windows in seconds.
    pub fn from_secs(live: i64, historical: i64, analysis: i64) -> Self {
        Self {
            live: Duration::seconds(live),
            historical: Duration::seconds(historical),
            analysis: Duration::seconds(analysis),
        }
    }

    /// The window applied to a class.
    pub fn ttl(&self, class: TtlClass) -> Duration {
        match class {
            TtlClass::Live => self.live,
            TtlClass::Historical => self.historical,
            TtlClass::Analysis => self.analysis,
        }
    }
}

/// A cached value with its fetch timestamp and TTL class.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    pub value: T,
    pub fetched_at: DateTime<Utc>,
    pub ttl_class: TtlClass,
}

impl<T> CacheEntry<T> {
    /// Wrap a value fetched right now.
    pub fn new(value: T, ttl_class: TtlClass) -> Self {
        Self {
            value,
            fetched_at: Utc::now(),
            ttl_class,
        }
    }

    /// Wrap a value with an explicit fetch time. Used when promoting a
    /// persistent-tier hit to memory without resetting its age.
    pub fn with_fetched_at(value: T, fetched_at: DateTime<Utc>, ttl_class: TtlClass) -> Self {
        Self {
            value,
            fetched_at,
            ttl_class,
        }
    }

    /// Whether the entry is inside its freshness window at `now`.
    pub fn is_fresh(&self, policy: &FreshnessPolicy, now: DateTime<Utc>) -> bool {
        now - self.fetched_at < policy.ttl(self.ttl_class)
    }
}
