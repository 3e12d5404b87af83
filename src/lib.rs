//! # kindconf
//!
//! Typed per-kind configuration managers with layered sources and hot reload,
//! and a multi-sink logger that can be reconfigured at runtime.
//!
//! ## Overview
//!
//! Each subsystem declares its settings as a [`ConfigKind`](kind::ConfigKind):
//! a deserializable record with a stable name and a declarative schema of keys,
//! defaults and descriptions. The [`ManagerRegistry`](core::ManagerRegistry)
//! hands out one [`ConfigManager`](core::ConfigManager) per kind, which:
//!
//! - resolves values with the precedence override > environment > document > default
//! - finds `<name>.<ext>` along its search paths, or writes the defaults there
//! - serves lock-free snapshot reads through `arc-swap`
//! - coerces loosely-typed values into typed scalars and lists
//! - reloads the document when it changes on disk
//!
//! The [`LoggerManager`](logging::LoggerManager) fans records out to console,
//! file, TCP and UDP sinks and rebuilds its logger atomically when its
//! [`LogConfig`](logging::LogConfig) changes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kindconf::prelude::*;
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct Http {
//!     port: u16,
//!     allowed_origins: Vec<String>,
//! }
//!
//! impl ConfigKind for Http {
//!     const NAME: &'static str = "http";
//!
//!     fn schema() -> Schema {
//!         Schema::new()
//!             .field("port", 8080, "Listen port")
//!             .field("allowed_origins", vec!["*"], "CORS origins")
//!     }
//! }
//!
//! # async fn example() -> kindconf::error::Result<()> {
//! let http = ManagerRegistry::global().get_or_create::<Http>();
//! println!("port = {}", http.get_int("port"));
//!
//! // Reload automatically when conf/http.yaml changes
//! let _watch = http.watch_config()?;
//!
//! let logs = std::sync::Arc::new(LoggerManager::new());
//! logs.init(LogConfig::default());
//! logs.with_field("port", http.get_int("port")).info("listening");
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `file-watch` (default): [`ConfigManager::watch_config`](core::ConfigManager::watch_config)
//!   and the [`notify::ConfigWatcher`], backed by `notify` and `tokio`.

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod coerce;
pub mod core;
pub mod error;
pub mod kind;
pub mod logging;
pub mod notify;
pub mod sources;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::coerce::Coercion;
    pub use crate::core::{ConfigManager, ManagerOptions, ManagerRegistry};
    pub use crate::error::{ConfigError, Result, ValidationError};
    pub use crate::kind::{ConfigKind, Schema};
    pub use crate::logging::{LogConfig, LogFormat, LogLevel, LoggerManager, SinkKind, SinkSpec};
    pub use crate::notify::SubscriptionHandle;

    #[cfg(feature = "file-watch")]
    pub use crate::notify::WatchHandle;
}
