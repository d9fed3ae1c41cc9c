//! quai-dash-sources: Metrics source implementations for quai-dash.

mod explorer;
mod node;
mod prometheus;
mod quantity;
mod simulated;

pub use explorer::{ExplorerSource, LATEST_BLOCK_QUERY};
pub use node::NodeSource;
pub use prometheus::PrometheusSource;
pub use quantity::{lookup, parse_float, parse_quantity, parse_u128};
pub use simulated::SimulatedSource;

use quai_dash_core::Registry;
use quai_dash_types::SourceKind;

/// Register all built-in sources with a registry
pub fn register_all(registry: &mut Registry) {
    registry.register_source(SourceKind::Node, || Box::new(NodeSource::new()));
    registry.register_source(SourceKind::Prometheus, || {
        Box::new(PrometheusSource::new())
    });
    registry.register_source(SourceKind::Explorer, || Box::new(ExplorerSource::new()));
    registry.register_source(SourceKind::Simulated, || {
        Box::new(SimulatedSource::new())
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_all_covers_every_kind() {
        let mut registry = Registry::new();
        register_all(&mut registry);
        for kind in SourceKind::BY_PRECEDENCE {
            let source = registry.create_source(kind).unwrap();
            assert_eq!(source.kind(), kind);
        }
    }
}
