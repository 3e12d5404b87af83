//! Record encoding.

use crate::logging::config::{DEFAULT_TIME_FORMAT, LogConfig, LogFormat, LogLevel};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::io::{self, Write};

/// Source location of a log call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    /// Source file
    pub file: &'static str,
    /// Line number
    pub line: u32,
}

impl From<&'static std::panic::Location<'static>> for Caller {
    fn from(location: &'static std::panic::Location<'static>) -> Self {
        Self {
            file: location.file(),
            line: location.line(),
        }
    }
}

/// A single log event, before encoding.
#[derive(Debug, Clone)]
pub struct Record {
    /// When the event happened
    pub time: DateTime<Utc>,
    /// Severity
    pub level: LogLevel,
    /// Message text
    pub message: String,
    /// Global fields followed by per-call fields; later keys win
    pub fields: Vec<(String, Value)>,
    /// Call site, if known
    pub caller: Option<Caller>,
}

/// Encodes records as bytes.
pub trait Formatter: Send + Sync {
    /// Append the encoded record, including the trailing newline, to `out`.
    fn format(&self, record: &Record, out: &mut Vec<u8>) -> io::Result<()>;
}

/// Formatter selected by `config.format`.
pub fn formatter_for(config: &LogConfig) -> Box<dyn Formatter> {
    let layout = Layout::from_config(config);
    match config.format {
        LogFormat::Text => Box::new(TextFormatter { layout }),
        LogFormat::Json => Box::new(JsonFormatter { layout }),
    }
}

#[derive(Debug, Clone)]
struct Layout {
    show_timestamp: bool,
    show_caller: bool,
    time_format: String,
}

impl Layout {
    fn from_config(config: &LogConfig) -> Self {
        let valid = !StrftimeItems::new(&config.time_format).any(|item| matches!(item, Item::Error));
        let time_format = if valid {
            config.time_format.clone()
        } else {
            tracing::warn!(time_format = %config.time_format, "invalid time format; using default");
            DEFAULT_TIME_FORMAT.to_string()
        };
        Self {
            show_timestamp: config.show_timestamp,
            show_caller: config.show_caller,
            time_format,
        }
    }

    fn timestamp(&self, time: &DateTime<Utc>) -> String {
        time.format(&self.time_format).to_string()
    }
}

/// Fields with later duplicates removed, keeping the position of the first.
fn dedup_fields(fields: &[(String, Value)]) -> Vec<(&str, &Value)> {
    let mut out: Vec<(&str, &Value)> = Vec::with_capacity(fields.len());
    for (key, value) in fields {
        match out.iter_mut().find(|(k, _)| *k == key.as_str()) {
            Some(existing) => existing.1 = value,
            None => out.push((key.as_str(), value)),
        }
    }
    out
}

/// `timestamp LEVEL message key=value ... caller=file:line`
pub struct TextFormatter {
    layout: Layout,
}

impl TextFormatter {
    fn write_value(out: &mut Vec<u8>, value: &Value) -> io::Result<()> {
        match value {
            Value::String(s) if needs_quoting(s) => write!(out, "{:?}", s),
            Value::String(s) => out.write_all(s.as_bytes()),
            other => write!(out, "{}", other),
        }
    }
}

fn needs_quoting(s: &str) -> bool {
    s.is_empty() || s.chars().any(|c| c.is_whitespace() || c == '=' || c == '"')
}

impl Formatter for TextFormatter {
    fn format(&self, record: &Record, out: &mut Vec<u8>) -> io::Result<()> {
        if self.layout.show_timestamp {
            write!(out, "{} ", self.layout.timestamp(&record.time))?;
        }
        write!(out, "{:<5} {}", record.level.as_str().to_ascii_uppercase(), record.message)?;

        for (key, value) in dedup_fields(&record.fields) {
            write!(out, " {}=", key)?;
            Self::write_value(out, value)?;
        }

        if self.layout.show_caller {
            if let Some(caller) = record.caller {
                write!(out, " caller={}:{}", caller.file, caller.line)?;
            }
        }
        out.write_all(b"\n")
    }
}

const RESERVED_KEYS: [&str; 4] = ["time", "level", "msg", "caller"];

/// One JSON object per line.
///
/// Field keys that collide with `time`, `level`, `msg` or `caller` are
/// written as `fields.<key>`.
pub struct JsonFormatter {
    layout: Layout,
}

impl Formatter for JsonFormatter {
    fn format(&self, record: &Record, out: &mut Vec<u8>) -> io::Result<()> {
        let mut object = Map::new();
        if self.layout.show_timestamp {
            object.insert("time".into(), Value::String(self.layout.timestamp(&record.time)));
        }
        object.insert("level".into(), Value::String(record.level.as_str().into()));
        object.insert("msg".into(), Value::String(record.message.clone()));
        if self.layout.show_caller {
            if let Some(caller) = record.caller {
                object.insert(
                    "caller".into(),
                    Value::String(format!("{}:{}", caller.file, caller.line)),
                );
            }
        }

        for (key, value) in dedup_fields(&record.fields) {
            let key = if RESERVED_KEYS.contains(&key) {
                format!("fields.{}", key)
            } else {
                key.to_string()
            };
            object.insert(key, value.clone());
        }

        serde_json::to_writer(&mut *out, &object)?;
        out.write_all(b"\n")
    }
}
