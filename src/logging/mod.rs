//! Multi-sink logging with runtime reconfiguration.
//!
//! [`LoggerManager`] holds the active [`LogConfig`] and the [`Logger`] built
//! from it. Records are formatted once and fanned out to every sink through a
//! [`MultiWriter`]; one sink failing never affects the others.
//!
//! ```rust
//! use kindconf::logging::{LogConfig, LoggerManager, SinkSpec};
//! use std::sync::Arc;
//!
//! let logs = Arc::new(LoggerManager::new());
//! logs.init(LogConfig {
//!     sinks: vec![SinkSpec::stdout()],
//!     ..LogConfig::default()
//! });
//!
//! logs.with_field("port", 8080).info("listening");
//! logs.info(format_args!("{} workers started", 4));
//! ```

pub mod config;
pub mod format;
mod layer;
mod logger;
mod manager;
pub mod sink;
mod writer;

pub use config::{
    ConsoleStream, DEFAULT_TCP_TIMEOUT_MS, DEFAULT_TIME_FORMAT, LogConfig, LogFormat, LogLevel,
    Rotation, SinkKind, SinkSpec,
};
pub use format::{Caller, Formatter, JsonFormatter, Record, TextFormatter, formatter_for};
pub use layer::LoggerLayer;
pub use logger::{Entry, Logger};
pub use manager::LoggerManager;
pub use sink::{ConsoleSink, FileSink, Sink, TcpSink, UdpSink, build_sink};
pub use writer::MultiWriter;
