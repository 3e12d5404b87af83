//! Core configuration management types.

pub mod document;
mod manager;
mod options;
mod registry;

pub use document::Document;
pub use manager::ConfigManager;
pub use options::{DEFAULT_CONFIG_DIR, DEFAULT_DEBOUNCE, DEFAULT_EXTENSION, ManagerOptions};
pub use registry::ManagerRegistry;
