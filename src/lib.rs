//! quai-dash: headless metrics core for a Quai Network GPU mining dashboard
//!
//! This library provides:
//! - Pollers for a node's JSON-RPC endpoint, Prometheus and a block explorer,
//!   with a simulated fallback when no real source is enabled
//! - Reconciliation of the per-source slots into one view by precedence and freshness
//! - Mining state, running averages, history and export
//! - Configuration and preference persistence

pub mod config;
pub mod core;

// Re-export commonly used types
pub use config::AppConfig;
pub use core::{AppContext, Dashboard, PollManager};
pub use quai_dash_types::{Reading, ReconciledView, SourceKind};
