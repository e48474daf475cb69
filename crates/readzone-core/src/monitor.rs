//! Connection-pool utilization and query-latency classification.
//!
//! Adapters report raw pool numbers; this module decides what counts as
//! stressed or slow so the thresholds live with the rest of the policy.

use std::time::Duration;

use readzone_types::config::PoolConfig;
use serde::Serialize;

/// Snapshot of a connection pool.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PoolStats {
    /// Open connections, idle or in use.
    pub size: u32,
    pub idle: u32,
    pub max: u32,
}

impl PoolStats {
    pub fn in_use(&self) -> u32 {
        self.size.saturating_sub(self.idle)
    }

    /// Fraction of the pool's capacity currently in use.
    pub fn utilization(&self) -> f64 {
        if self.max == 0 {
            return 0.0;
        }
        f64::from(self.in_use()) / f64::from(self.max)
    }

    pub fn under_stress(&self, threshold: f64) -> bool {
        self.utilization() > threshold
    }
}

/// Pool and query health as judged against [`PoolConfig`].
#[derive(Debug, Clone, Copy)]
pub struct PoolMonitor {
    stress_threshold: f64,
    slow_query: Duration,
}

impl PoolMonitor {
    pub fn new(config: &PoolConfig) -> Self {
        Self {
            stress_threshold: config.stress_threshold,
            slow_query: Duration::from_millis(config.slow_query_ms),
        }
    }

    pub fn slow_query_threshold(&self) -> Duration {
        self.slow_query
    }

    pub fn is_slow(&self, elapsed: Duration) -> bool {
        elapsed > self.slow_query
    }

    /// Build a health report, logging a warning when the pool is stressed.
    pub fn report(&self, name: &'static str, stats: PoolStats) -> PoolHealth {
        let under_stress = stats.under_stress(self.stress_threshold);
        if under_stress {
            tracing::warn!(
                pool = name,
                in_use = stats.in_use(),
                max = stats.max,
                utilization = stats.utilization(),
                "connection pool under stress"
            );
        }
        PoolHealth {
            name,
            stats,
            utilization: stats.utilization(),
            under_stress,
        }
    }

    /// Report a single-connection pool without judging stress.
    ///
    /// One connection is fully used by any write, so utilization there says
    /// nothing about load. Writer contention shows up as slow queries instead.
    pub fn report_exclusive(&self, name: &'static str, stats: PoolStats) -> PoolHealth {
        PoolHealth {
            name,
            stats,
            utilization: stats.utilization(),
            under_stress: false,
        }
    }

    /// Log a warning when a query took longer than the slow threshold.
    /// Returns whether it did.
    pub fn observe_query(&self, label: &str, elapsed: Duration) -> bool {
        let slow = self.is_slow(elapsed);
        if slow {
            tracing::warn!(
                query = label,
                elapsed_ms = elapsed.as_millis() as u64,
                threshold_ms = self.slow_query.as_millis() as u64,
                "slow query"
            );
        }
        slow
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PoolHealth {
    pub name: &'static str,
    pub stats: PoolStats,
    pub utilization: f64,
    pub under_stress: bool,
}
