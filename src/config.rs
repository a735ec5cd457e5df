//! Watcher configuration.
//!
//! Tunables for the reconciliation engine: poll cadence, channel sizing,
//! tombstone retention, and the push/poll conflict window.

use std::time::Duration;

/// Configuration for the order watcher and reconciliation engine.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Interval between poll-feed snapshot sweeps.
    pub poll_interval: Duration,
    /// Capacity of each bounded feed channel (push and poll).
    pub feed_channel_capacity: usize,
    /// Capacity of the lifecycle notification broadcast channel.
    pub event_channel_capacity: usize,
    /// How long tombstones for unwatched orders are retained, so that
    /// late duplicate events are still recognized and dropped.
    pub tombstone_ttl_secs: u64,
    /// Window within which a rejected stale update from the other feed is
    /// considered ordinary push/poll raciness (logged at debug). Rejections
    /// arriving outside this window are logged as consistency warnings.
    pub conflict_window: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            feed_channel_capacity: 256,
            event_channel_capacity: 256,
            tombstone_ttl_secs: 300,
            conflict_window: Duration::from_secs(2),
        }
    }
}

impl WatcherConfig {
    /// Config for latency-sensitive trading (tight poll cadence).
    pub fn strict() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            feed_channel_capacity: 1024,
            event_channel_capacity: 1024,
            tombstone_ttl_secs: 120,
            conflict_window: Duration::from_millis(500),
        }
    }

    /// Config for low-rate usage (relaxed cadence, longer retention).
    pub fn relaxed() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            feed_channel_capacity: 64,
            event_channel_capacity: 64,
            tombstone_ttl_secs: 900,
            conflict_window: Duration::from_secs(10),
        }
    }
}
