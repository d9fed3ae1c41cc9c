//! Registry of metrics source factories

use super::BoxedMetricsSource;
use anyhow::{anyhow, Result};
use quai_dash_types::SourceKind;
use std::collections::BTreeMap;

/// Function that creates a metrics source
pub type SourceFactory = fn() -> BoxedMetricsSource;

/// Registry of metrics sources
///
/// Built-in sources are registered at startup; tests and embedders can
/// replace a factory to substitute their own source.
pub struct Registry {
    sources: BTreeMap<SourceKind, SourceFactory>,
}

impl Registry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            sources: BTreeMap::new(),
        }
    }

    /// Register a source, replacing any previous factory for the same kind
    pub fn register_source(&mut self, kind: SourceKind, factory: SourceFactory) {
        self.sources.insert(kind, factory);
    }

    /// Create a source by kind
    pub fn create_source(&self, kind: SourceKind) -> Result<BoxedMetricsSource> {
        let factory = self
            .sources
            .get(&kind)
            .ok_or_else(|| anyhow!("Unknown source: {}", kind))?;
        Ok(factory())
    }

    /// List registered sources, highest precedence first
    pub fn list_sources(&self) -> Vec<SourceKind> {
        self.sources.keys().copied().collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MetricsSource, PollError, SourceMetadata};
    use async_trait::async_trait;
    use chrono::Utc;
    use quai_dash_types::{MetricsSnapshot, SourcesConfig};

    struct NullSource(SourceMetadata);

    #[async_trait]
    impl MetricsSource for NullSource {
        fn metadata(&self) -> &SourceMetadata {
            &self.0
        }

        async fn poll(&mut self, _config: &SourcesConfig) -> Result<MetricsSnapshot, PollError> {
            Ok(MetricsSnapshot::new(self.kind(), Utc::now()))
        }
    }

    fn null_node() -> BoxedMetricsSource {
        Box::new(NullSource(SourceMetadata {
            kind: SourceKind::Node,
            name: "Null".to_string(),
            description: String::new(),
            provides: Vec::new(),
        }))
    }

    #[test]
    fn test_create_registered_source() {
        let mut registry = Registry::new();
        registry.register_source(SourceKind::Node, null_node);

        let source = registry.create_source(SourceKind::Node).unwrap();
        assert_eq!(source.kind(), SourceKind::Node);
        assert!(registry.create_source(SourceKind::Explorer).is_err());
        assert_eq!(registry.list_sources(), vec![SourceKind::Node]);
    }
}
