//! Logger instances and structured entries.

use crate::logging::config::{ConsoleStream, LogConfig, LogLevel};
use crate::logging::format::{Caller, Formatter, Record, formatter_for};
use crate::logging::sink::{ConsoleSink, Sink, build_sink};
use crate::logging::writer::MultiWriter;
use chrono::Utc;
use serde_json::Value;
use std::fmt::Display;
use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// An immutable logger: level filter, formatter and sink set.
///
/// Reconfiguration builds a new `Logger` and closes the old one. A closed
/// logger drops every record.
pub struct Logger {
    level: LogLevel,
    formatter: Box<dyn Formatter>,
    writer: MultiWriter,
    fields: Vec<(String, Value)>,
    closed: AtomicBool,
}

impl Logger {
    /// Build a logger and its sinks from `config`.
    ///
    /// Sinks that fail to construct are reported and skipped. If none remain,
    /// records go to stdout.
    pub fn build(config: &LogConfig) -> Self {
        let mut sinks: Vec<Box<dyn Sink>> = Vec::with_capacity(config.sinks.len());
        for spec in &config.sinks {
            match build_sink(spec) {
                Ok(sink) => sinks.push(sink),
                Err(e) => {
                    tracing::warn!(sink = %spec.kind(), error = %e, "log sink unavailable; skipping");
                }
            }
        }
        if sinks.is_empty() {
            tracing::debug!("no log sinks available; falling back to stdout");
            sinks.push(Box::new(ConsoleSink::new(ConsoleStream::Stdout)));
        }
        Self::from_parts(config, sinks)
    }

    /// Logger over caller-supplied sinks; `config.sinks` is ignored.
    pub fn from_parts(config: &LogConfig, sinks: Vec<Box<dyn Sink>>) -> Self {
        Self {
            level: config.level,
            formatter: formatter_for(config),
            writer: MultiWriter::new(sinks),
            fields: config
                .fields
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            closed: AtomicBool::new(false),
        }
    }

    /// Minimum level.
    pub fn level(&self) -> LogLevel {
        self.level
    }

    /// Whether records at `level` are written.
    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.level && !self.is_closed()
    }

    /// Whether [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Identifiers of the active sinks.
    pub fn sink_names(&self) -> Vec<&'static str> {
        self.writer.names()
    }

    /// Format and fan out one record.
    pub fn log(&self, level: LogLevel, message: impl Display, fields: &[(String, Value)], caller: Option<Caller>) {
        if !self.enabled(level) {
            return;
        }

        let mut all_fields = Vec::with_capacity(self.fields.len() + fields.len());
        all_fields.extend(self.fields.iter().cloned());
        all_fields.extend(fields.iter().cloned());

        let record = Record {
            time: Utc::now(),
            level,
            message: message.to_string(),
            fields: all_fields,
            caller,
        };

        let mut buf = Vec::with_capacity(256);
        if let Err(e) = self.formatter.format(&record, &mut buf) {
            tracing::warn!(error = %e, "failed to format log record");
            return;
        }
        let _ = self.writer.write(&buf);
    }

    /// Flush every sink.
    pub fn flush(&self) {
        let _ = self.writer.flush();
    }

    /// Close every sink. Later records are dropped. Closing twice is a no-op.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _ = self.writer.close();
        }
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        self.close();
    }
}

/// A record under construction: a logger plus per-call fields.
///
/// # Examples
///
/// ```rust
/// use kindconf::logging::LoggerManager;
///
/// let logs = LoggerManager::new();
/// logs.with_field("request_id", "r-42")
///     .with_field("attempt", 2)
///     .warn("upstream timed out");
/// ```
#[derive(Clone)]
pub struct Entry {
    logger: Arc<Logger>,
    fields: Vec<(String, Value)>,
}

impl Entry {
    /// Entry without fields.
    pub fn new(logger: Arc<Logger>) -> Self {
        Self {
            logger,
            fields: Vec::new(),
        }
    }

    /// Add one field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    /// Add several fields.
    pub fn with_fields<I, K, V>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.fields
            .extend(fields.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Fields attached so far.
    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    /// Write at `level`, attributing the record to `caller`.
    pub fn log_at(&self, level: LogLevel, message: impl Display, caller: Option<Caller>) {
        self.logger.log(level, message, &self.fields, caller);
    }

    /// Write at `level`.
    #[track_caller]
    pub fn log(&self, level: LogLevel, message: impl Display) {
        self.log_at(level, message, Some(Location::caller().into()));
    }

    /// Write at trace level.
    #[track_caller]
    pub fn trace(&self, message: impl Display) {
        self.log(LogLevel::Trace, message);
    }

    /// Write at debug level.
    #[track_caller]
    pub fn debug(&self, message: impl Display) {
        self.log(LogLevel::Debug, message);
    }

    /// Write at info level.
    #[track_caller]
    pub fn info(&self, message: impl Display) {
        self.log(LogLevel::Info, message);
    }

    /// Write at warn level.
    #[track_caller]
    pub fn warn(&self, message: impl Display) {
        self.log(LogLevel::Warn, message);
    }

    /// Write at error level.
    #[track_caller]
    pub fn error(&self, message: impl Display) {
        self.log(LogLevel::Error, message);
    }

    /// Write at fatal level, flush, and exit the process with status 1.
    #[track_caller]
    pub fn fatal(&self, message: impl Display) -> ! {
        self.log(LogLevel::Fatal, message);
        self.logger.flush();
        self.logger.close();
        std::process::exit(1)
    }

    /// Write at panic level, then panic with the same message.
    #[track_caller]
    pub fn panic(&self, message: impl Display) -> ! {
        let message = message.to_string();
        self.log(LogLevel::Panic, &message);
        self.logger.flush();
        panic!("{}", message)
    }
}
