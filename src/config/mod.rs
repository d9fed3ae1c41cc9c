//! Configuration management

mod settings;
mod store;

pub use settings::{config_dir, AppConfig, ReconcileConfig, CONFIG_VERSION};
pub use store::JsonStore;
