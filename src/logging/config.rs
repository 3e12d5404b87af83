//! The `log` configuration kind.

use crate::error::ValidationError;
use crate::kind::{ConfigKind, Schema};
use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Default strftime layout for record timestamps.
pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Default TCP connect and write timeout in milliseconds.
pub const DEFAULT_TCP_TIMEOUT_MS: u64 = 3000;

/// Record severity, lowest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Very fine-grained tracing
    Trace,
    /// Debugging detail
    Debug,
    /// Normal operation
    #[default]
    Info,
    /// Something unexpected but recoverable
    #[serde(alias = "warning")]
    Warn,
    /// An operation failed
    Error,
    /// Logged, then the process exits
    Fatal,
    /// Logged, then the caller panics
    Panic,
}

impl LogLevel {
    /// Lower-case identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Fatal => "fatal",
            Self::Panic => "panic",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "fatal" => Ok(Self::Fatal),
            "panic" => Ok(Self::Panic),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

impl From<&tracing::Level> for LogLevel {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::TRACE => Self::Trace,
            tracing::Level::DEBUG => Self::Debug,
            tracing::Level::INFO => Self::Info,
            tracing::Level::WARN => Self::Warn,
            tracing::Level::ERROR => Self::Error,
        }
    }
}

/// Output encoding of records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// `timestamp LEVEL message key=value`
    #[default]
    #[serde(alias = "console")]
    Text,
    /// One JSON object per line
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Json => f.write_str("json"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "console" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// Console stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleStream {
    /// Standard output
    #[default]
    Stdout,
    /// Standard error
    Stderr,
}

/// Rotation schedule of a file sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    /// Single file, never rotated
    #[default]
    Never,
    /// New file every minute
    Minutely,
    /// New file every hour
    Hourly,
    /// New file every day
    Daily,
}

/// Kind tag of a sink, used to remove sinks by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkKind {
    /// Console sink
    Console,
    /// File sink
    File,
    /// TCP sink
    Tcp,
    /// UDP sink
    Udp,
}

impl SinkKind {
    /// Lower-case identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Console => "console",
            Self::File => "file",
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_tcp_timeout() -> u64 {
    DEFAULT_TCP_TIMEOUT_MS
}

/// One enabled sink with its settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SinkSpec {
    /// Write to stdout or stderr.
    Console {
        /// Target stream
        #[serde(default)]
        stream: ConsoleStream,
    },
    /// Append to a (possibly rotated) file.
    File {
        /// File path; rotated files get a date suffix
        path: String,
        /// Rotation schedule
        #[serde(default)]
        rotation: Rotation,
    },
    /// Push lines to a TCP endpoint.
    Tcp {
        /// `host:port`
        address: String,
        /// Connect and write timeout
        #[serde(default = "default_tcp_timeout")]
        timeout_ms: u64,
    },
    /// Send one datagram per record.
    Udp {
        /// `host:port`
        address: String,
    },
}

impl SinkSpec {
    /// Console sink on stdout.
    pub fn stdout() -> Self {
        Self::Console {
            stream: ConsoleStream::Stdout,
        }
    }

    /// Non-rotating file sink.
    pub fn file(path: impl Into<String>) -> Self {
        Self::File {
            path: path.into(),
            rotation: Rotation::Never,
        }
    }

    /// Kind tag of this sink.
    pub fn kind(&self) -> SinkKind {
        match self {
            Self::Console { .. } => SinkKind::Console,
            Self::File { .. } => SinkKind::File,
            Self::Tcp { .. } => SinkKind::Tcp,
            Self::Udp { .. } => SinkKind::Udp,
        }
    }
}

/// Logger settings, managed like any other configuration kind (`log.yaml`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Records below this severity are discarded.
    pub level: LogLevel,
    /// Record encoding.
    pub format: LogFormat,
    /// Enabled sinks.
    pub sinks: Vec<SinkSpec>,
    /// Append the call site to each record.
    pub show_caller: bool,
    /// Prefix each record with a timestamp.
    pub show_timestamp: bool,
    /// strftime layout for timestamps.
    pub time_format: String,
    /// Fields attached to every record.
    pub fields: BTreeMap<String, Value>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Text,
            sinks: vec![SinkSpec::stdout()],
            show_caller: false,
            show_timestamp: true,
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            fields: BTreeMap::new(),
        }
    }
}

impl ConfigKind for LogConfig {
    const NAME: &'static str = "log";

    fn schema() -> Schema {
        Schema::from_defaults(&LogConfig::default())
            .describe("level", "Minimum level: trace, debug, info, warn, error, fatal, panic")
            .describe("format", "Record format: text or json")
            .describe("sinks", "Outputs; each has a type of console, file, tcp or udp")
            .describe("show_caller", "Append file:line of the call site")
            .describe("show_timestamp", "Prefix records with a timestamp")
            .describe("time_format", "strftime layout of the timestamp")
            .describe("fields", "Fields added to every record")
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = Vec::new();

        if StrftimeItems::new(&self.time_format).any(|item| matches!(item, Item::Error)) {
            errors.push(ValidationError::invalid_field(
                "time_format",
                format!("'{}' is not a valid strftime layout", self.time_format),
            ));
        }

        for (i, sink) in self.sinks.iter().enumerate() {
            let empty = match sink {
                SinkSpec::Console { .. } => false,
                SinkSpec::File { path, .. } => path.trim().is_empty(),
                SinkSpec::Tcp { address, .. } | SinkSpec::Udp { address } => address.trim().is_empty(),
            };
            if empty {
                errors.push(ValidationError::invalid_field(
                    format!("sinks.{}", i),
                    format!("{} sink needs a destination", sink.kind()),
                ));
            }
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ValidationError::Multiple(errors)),
        }
    }
}
