//! Named TTL tiers
//!
//! The tier is chosen by whoever computes a section; the cache layer only
//! receives the resulting number of seconds.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cache lifetime classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TtlTier {
    /// Reference data that practically never changes (7 days)
    VeryStatic,
    /// Dimension lists and similar (24 hours)
    Static,
    /// Standard KPI results (2 hours)
    Metrics,
    /// Expensive multi-query computations (4 hours)
    ComputedHeavy,
    /// Near-live figures (10 minutes)
    Realtime,
    /// Short-lived lookups (5 minutes)
    Short,
    /// Trending lists (3 minutes)
    Trending,
}

impl TtlTier {
    /// Lifetime in seconds
    pub const fn secs(self) -> u64 {
        match self {
            TtlTier::VeryStatic => 7 * 24 * 60 * 60,
            TtlTier::Static => 24 * 60 * 60,
            TtlTier::Metrics => 2 * 60 * 60,
            TtlTier::ComputedHeavy => 4 * 60 * 60,
            TtlTier::Realtime => 10 * 60,
            TtlTier::Short => 5 * 60,
            TtlTier::Trending => 3 * 60,
        }
    }

    /// Lifetime as a `Duration`
    pub const fn duration(self) -> Duration {
        Duration::from_secs(self.secs())
    }
}
