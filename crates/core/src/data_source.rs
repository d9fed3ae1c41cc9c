//! Metrics source trait and related types

use async_trait::async_trait;
use quai_dash_rpc::{CallError, ErrorClass};
use quai_dash_types::{MetricField, MetricsSnapshot, SourceKind, SourcesConfig};
use thiserror::Error;

/// Metadata about a metrics source
#[derive(Debug, Clone)]
pub struct SourceMetadata {
    pub kind: SourceKind,
    /// Human-readable name
    pub name: String,
    /// Description of what this source provides
    pub description: String,
    /// Metrics this source can report
    pub provides: Vec<MetricField>,
}

/// Why a poll produced no snapshot
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PollError {
    #[error(transparent)]
    Call(#[from] CallError),

    /// The source answered, but nothing it said had a recognizable shape
    #[error("unrecognized response: {0}")]
    Unrecognized(String),

    /// Configuration leaves nothing to poll (e.g. an empty query list)
    #[error("not configured: {0}")]
    NotConfigured(String),
}

impl PollError {
    pub fn class(&self) -> ErrorClass {
        match self {
            PollError::Call(err) => err.class(),
            PollError::Unrecognized(_) => ErrorClass::Protocol,
            PollError::NotConfigured(_) => ErrorClass::Configuration,
        }
    }
}

/// Trait for all metrics sources
///
/// A source fetches one snapshot per poll. It receives the configuration as
/// it stood when the tick started and must not hold on to it across polls.
#[async_trait]
pub trait MetricsSource: Send {
    /// Get metadata about this source
    fn metadata(&self) -> &SourceMetadata;

    fn kind(&self) -> SourceKind {
        self.metadata().kind
    }

    /// Fetch a fresh snapshot
    ///
    /// Called on the source's own interval, never concurrently with itself.
    async fn poll(&mut self, config: &SourcesConfig) -> Result<MetricsSnapshot, PollError>;
}

/// Type-erased metrics source for dynamic dispatch
pub type BoxedMetricsSource = Box<dyn MetricsSource>;
