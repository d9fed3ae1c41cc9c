//! quai-dash-core: Core traits and shared state for the quai-dash metrics core.
//!
//! This crate contains the `MetricsSource` trait implemented by every poller,
//! the source `Registry`, the per-source data slots pollers write into, and
//! the deduplicating event log.

pub mod constants;
mod data_source;
mod event_log;
mod registry;
mod slots;

pub use constants::{
    HASHES_PER_DIFFICULTY_UNIT, RUNNING_AVERAGE_CAPACITY, SHARE_RATE_WINDOW,
    SYNC_STATUS_FRESHNESS,
};
pub use data_source::{BoxedMetricsSource, MetricsSource, PollError, SourceMetadata};
pub use event_log::{EventLog, LogEntry, LogLevel, SharedEventLog, EVENT_LOG_CAPACITY};
pub use registry::{Registry, SourceFactory};
pub use slots::{is_fresh, SlotEntry, SlotError, SlotSet, SlotStore, SlotWriter};

// Re-export types used in trait signatures for convenience
pub use quai_dash_types::{MetricField, MetricsSnapshot, SourceKind, SourcesConfig};
