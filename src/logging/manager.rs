//! Runtime-reconfigurable logger context.

use crate::core::ConfigManager;
use crate::error::Result;
use crate::logging::config::{LogConfig, LogFormat, LogLevel, SinkKind, SinkSpec};
use crate::logging::layer::LoggerLayer;
use crate::logging::logger::{Entry, Logger};
use crate::notify::SubscriptionHandle;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::fmt::Display;
use std::sync::{Arc, OnceLock};

struct Active {
    config: LogConfig,
    logger: Arc<Logger>,
}

/// Owns the active [`LogConfig`] and the [`Logger`] built from it.
///
/// The manager is either uninitialized or active. Every mutation builds a
/// complete new logger first, swaps it in under the write lock and then closes
/// the previous one, so a log call sees either the old configuration or the
/// new one. Log calls only clone the current logger under the read lock and
/// write without holding it.
///
/// Until [`init`](Self::init) runs, records go to a stdout logger built from
/// `LogConfig::default()`.
///
/// # Examples
///
/// ```rust
/// use kindconf::logging::{LogConfig, LogFormat, LogLevel, LoggerManager};
///
/// let logs = LoggerManager::new();
/// assert!(logs.init(LogConfig::default()));
/// assert!(!logs.init(LogConfig::default()));
///
/// logs.update_level(LogLevel::Debug);
/// logs.update_format(LogFormat::Json);
/// logs.debug("now visible, as JSON");
/// ```
pub struct LoggerManager {
    state: RwLock<Option<Active>>,
    lifecycle: Mutex<()>,
    bootstrap: OnceLock<Arc<Logger>>,
}

impl LoggerManager {
    /// Uninitialized manager.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(None),
            lifecycle: Mutex::new(()),
            bootstrap: OnceLock::new(),
        }
    }

    /// Activate with `config`. Returns `false` (and changes nothing) if the
    /// manager is already active.
    pub fn init(&self, config: LogConfig) -> bool {
        let _guard = self.lifecycle.lock();
        if self.state.read().is_some() {
            return false;
        }
        self.install(config);
        true
    }

    /// Whether `init` has run since creation or the last `shutdown`.
    pub fn is_initialized(&self) -> bool {
        self.state.read().is_some()
    }

    /// Replace the whole configuration. Activates the manager if needed.
    pub fn update_config(&self, config: LogConfig) {
        let _guard = self.lifecycle.lock();
        self.install(config);
    }

    /// Change only the minimum level.
    pub fn update_level(&self, level: LogLevel) {
        self.modify(|config| config.level = level);
    }

    /// Change only the record format.
    pub fn update_format(&self, format: LogFormat) {
        self.modify(|config| config.format = format);
    }

    /// Enable one more sink. An identical sink is not added twice.
    pub fn add_sink(&self, spec: SinkSpec) {
        self.modify(|config| {
            if !config.sinks.contains(&spec) {
                config.sinks.push(spec);
            }
        });
    }

    /// Disable every sink of `kind`. Returns whether any was removed.
    pub fn remove_sink(&self, kind: SinkKind) -> bool {
        let mut removed = false;
        self.modify(|config| {
            let before = config.sinks.len();
            config.sinks.retain(|sink| sink.kind() != kind);
            removed = config.sinks.len() != before;
        });
        removed
    }

    /// Close the current sinks and activate afresh with `config`.
    pub fn reset(&self, config: LogConfig) {
        let _guard = self.lifecycle.lock();
        self.deactivate();
        self.install(config);
    }

    /// Close every sink and return to the uninitialized state.
    pub fn shutdown(&self) {
        let _guard = self.lifecycle.lock();
        self.deactivate();
    }

    fn modify(&self, change: impl FnOnce(&mut LogConfig)) {
        let _guard = self.lifecycle.lock();
        let mut config = self.config();
        change(&mut config);
        self.install(config);
    }

    // Caller holds `lifecycle`.
    fn install(&self, config: LogConfig) {
        let logger = Arc::new(Logger::build(&config));
        tracing::debug!(
            level = %config.level,
            format = %config.format,
            sinks = ?logger.sink_names(),
            "logger rebuilt"
        );
        let previous = self.state.write().replace(Active { config, logger });
        if let Some(previous) = previous {
            previous.logger.close();
        }
    }

    // Caller holds `lifecycle`.
    fn deactivate(&self) {
        if let Some(previous) = self.state.write().take() {
            previous.logger.close();
        }
    }

    /// Current configuration, or the defaults when uninitialized.
    pub fn config(&self) -> LogConfig {
        self.state
            .read()
            .as_ref()
            .map(|active| active.config.clone())
            .unwrap_or_default()
    }

    /// Current minimum level.
    pub fn level(&self) -> LogLevel {
        self.state
            .read()
            .as_ref()
            .map_or(LogLevel::default(), |active| active.config.level)
    }

    /// Current record format.
    pub fn format(&self) -> LogFormat {
        self.state
            .read()
            .as_ref()
            .map_or(LogFormat::default(), |active| active.config.format)
    }

    /// Current logger.
    ///
    /// The returned logger is closed by the next reconfiguration and then drops
    /// its records, so fetch it per use rather than caching it.
    pub fn logger(&self) -> Arc<Logger> {
        if let Some(active) = self.state.read().as_ref() {
            return Arc::clone(&active.logger);
        }
        Arc::clone(
            self.bootstrap
                .get_or_init(|| Arc::new(Logger::build(&LogConfig::default()))),
        )
    }

    /// Keep this manager in step with a `LogConfig` manager.
    ///
    /// Applies the current configuration now and again after every reload or
    /// `set` on `configs`. Dropping the returned handle stops following.
    ///
    /// # Errors
    ///
    /// Fails if the current configuration does not load or validate.
    pub fn follow(self: &Arc<Self>, configs: &Arc<ConfigManager<LogConfig>>) -> Result<SubscriptionHandle> {
        self.update_config(configs.get_config()?);

        let logs = Arc::downgrade(self);
        let source = Arc::downgrade(configs);
        Ok(configs.on_change(move || {
            let (Some(logs), Some(source)) = (logs.upgrade(), source.upgrade()) else {
                return;
            };
            match source.get_config() {
                Ok(config) => logs.update_config(config),
                Err(e) => tracing::warn!(error = %e, "log configuration rejected; keeping current logger"),
            }
        }))
    }

    /// `tracing` layer that forwards events to this manager.
    pub fn layer(self: &Arc<Self>) -> LoggerLayer {
        LoggerLayer::new(Arc::clone(self))
    }

    /// Entry on the current logger, for adding fields.
    pub fn entry(&self) -> Entry {
        Entry::new(self.logger())
    }

    /// Entry carrying one field.
    pub fn with_field(&self, key: impl Into<String>, value: impl Into<Value>) -> Entry {
        self.entry().with_field(key, value)
    }

    /// Entry carrying several fields.
    pub fn with_fields<I, K, V>(&self, fields: I) -> Entry
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.entry().with_fields(fields)
    }

    /// Write at `level`.
    #[track_caller]
    pub fn log(&self, level: LogLevel, message: impl Display) {
        self.entry().log(level, message);
    }

    /// Write at trace level.
    #[track_caller]
    pub fn trace(&self, message: impl Display) {
        self.entry().trace(message);
    }

    /// Write at debug level.
    #[track_caller]
    pub fn debug(&self, message: impl Display) {
        self.entry().debug(message);
    }

    /// Write at info level.
    #[track_caller]
    pub fn info(&self, message: impl Display) {
        self.entry().info(message);
    }

    /// Write at warn level.
    #[track_caller]
    pub fn warn(&self, message: impl Display) {
        self.entry().warn(message);
    }

    /// Write at error level.
    #[track_caller]
    pub fn error(&self, message: impl Display) {
        self.entry().error(message);
    }

    /// Write at fatal level and exit the process with status 1.
    #[track_caller]
    pub fn fatal(&self, message: impl Display) -> ! {
        self.entry().fatal(message)
    }

    /// Write at panic level, then panic.
    #[track_caller]
    pub fn panic(&self, message: impl Display) -> ! {
        self.entry().panic(message)
    }
}

impl Default for LoggerManager {
    fn default() -> Self {
        Self::new()
    }
}
