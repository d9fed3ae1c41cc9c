//! Shared constants

use std::time::Duration;

/// Window over which the share rate is counted
pub const SHARE_RATE_WINDOW: Duration = Duration::from_secs(60);

/// Samples kept by each running average
pub const RUNNING_AVERAGE_CAPACITY: usize = 60;

/// Sync status is never shown older than this, whatever the source's own window
pub const SYNC_STATUS_FRESHNESS: Duration = Duration::from_secs(30);

/// Expected hashes per unit of difficulty (2^32)
pub const HASHES_PER_DIFFICULTY_UNIT: f64 = 4_294_967_296.0;
