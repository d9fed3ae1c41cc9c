//! quai-dash-types: Shared data types for the quai-dash metrics core.
//!
//! Pure data (snapshots, the reconciled view, GPU records, source configs,
//! preferences) shared by every quai-dash crate. No IO lives here.

pub mod gpu;
pub mod preferences;
pub mod snapshot;
pub mod source;
pub mod sources;
pub mod view;

pub use gpu::{GpuConfig, GpuReading};
pub use preferences::Preferences;
pub use snapshot::{MetricField, MetricsSnapshot, SnapshotOrigin, SyncStatus};
pub use source::{SourceKind, SourceStatus};
pub use sources::{
    ExplorerEndpoint, ExplorerEndpointKind, ExplorerSourceConfig, NodeSourceConfig,
    PrometheusSourceConfig, SimulationConfig, SourcesConfig,
};
pub use view::{DerivedMetrics, MiningSummary, Reading, ReconciledView, SourceReport};
