//! Per-kind configuration manager.

use crate::coerce::{self, Coercion};
use crate::core::{Document, ManagerOptions};
use crate::error::{CoerceError, ConfigError, Result};
use crate::kind::{ConfigKind, Schema};
use crate::notify::{SubscriberRegistry, SubscriptionHandle};
use crate::sources::{DocumentFormat, EnvOverlay, FileSource};
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[cfg(feature = "file-watch")]
use crate::notify::{ConfigWatcher, WatchHandle};

/// Owns loading, caching and mutation of one configuration kind.
///
/// Readers load the current [`Document`] snapshot from an `ArcSwap` and never
/// block; `set`, reloads and initialization build a new snapshot and publish it
/// whole while holding the manager's writer lock, so a reader sees either the
/// old document or the new one.
///
/// Usually obtained through [`ManagerRegistry`](crate::core::ManagerRegistry)
/// so there is one manager per kind.
///
/// # Examples
///
/// ```rust,no_run
/// use kindconf::prelude::*;
/// use serde::Deserialize;
///
/// #[derive(Debug, Deserialize)]
/// struct Sample {
///     host: String,
///     port: u16,
/// }
///
/// impl ConfigKind for Sample {
///     const NAME: &'static str = "sample";
///     fn schema() -> Schema {
///         Schema::new()
///             .field("host", "localhost", "Bind address")
///             .field("port", 8080, "Bind port")
///     }
/// }
///
/// let manager = ManagerRegistry::global().get_or_create::<Sample>();
/// assert_eq!(manager.get_int("port"), 8080);
///
/// manager.set("port", 9090);
/// let sample = manager.get_config()?;
/// assert_eq!(sample.port, 9090);
/// # Ok::<(), ConfigError>(())
/// ```
pub struct ConfigManager<T> {
    options: ManagerOptions,
    schema: Schema,
    env: EnvOverlay,
    document: ArcSwap<Document>,
    resolved: RwLock<Option<PathBuf>>,
    writer: Mutex<()>,
    initialized: AtomicBool,
    subscribers: SubscriberRegistry,
    _kind: PhantomData<fn() -> T>,
}

impl<T: ConfigKind> ConfigManager<T> {
    /// Manager with the default options for `T`.
    ///
    /// # Panics
    ///
    /// Panics if `T::NAME` is empty.
    pub fn new() -> Self {
        Self::with_options(ManagerOptions::for_kind::<T>())
    }

    /// Manager with explicit options.
    ///
    /// # Panics
    ///
    /// Panics if `T::NAME` is empty.
    pub fn with_options(options: ManagerOptions) -> Self {
        assert!(
            !T::NAME.is_empty(),
            "configuration kind identity must not be empty"
        );
        let env = options.env_overlay();
        Self {
            options,
            schema: T::schema(),
            env,
            document: ArcSwap::from_pointee(Document::default()),
            resolved: RwLock::new(None),
            writer: Mutex::new(()),
            initialized: AtomicBool::new(false),
            subscribers: SubscriberRegistry::new(),
            _kind: PhantomData,
        }
    }

    /// Identity of the managed kind.
    pub fn name(&self) -> &'static str {
        T::NAME
    }

    /// Options this manager was built with.
    pub fn options(&self) -> &ManagerOptions {
        &self.options
    }

    /// Whether `initialize` has completed.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Load defaults, environment and document. Runs once; later calls are no-ops.
    ///
    /// 1. install schema defaults;
    /// 2. apply the environment overlay;
    /// 3. parse the first document found along the search paths;
    /// 4. if there is none, write the canonical default document to the first
    ///    search directory that accepts it (never overwriting);
    /// 5. mark the manager initialized.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` if a document exists but is malformed. The
    /// manager then keeps serving defaults and stays uninitialized.
    pub fn initialize(&self) -> Result<()> {
        if self.is_initialized() {
            return Ok(());
        }
        let _guard = self.writer.lock();
        if self.is_initialized() {
            return Ok(());
        }

        // Overrides set while an earlier attempt failed stay in place.
        let defaults = self.document.load().with_defaults(self.schema.defaults(), &self.env);
        self.document.store(Arc::new(defaults));

        match self.locate()? {
            Some((path, tree)) => {
                let next = self.document.load().with_file(tree, &self.env);
                self.document.store(Arc::new(next));
                tracing::debug!(kind = T::NAME, path = %path.display(), "configuration loaded");
                *self.resolved.write() = Some(path);
            }
            None => self.synthesize(),
        }

        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    fn locate(&self) -> Result<Option<(PathBuf, Value)>> {
        for candidate in self.options.candidates() {
            let source = FileSource::new(&candidate)?;
            if let Some(tree) = source.load()? {
                return Ok(Some((candidate, tree)));
            }
        }
        Ok(None)
    }

    fn synthesize(&self) {
        let contents = match self
            .options
            .format()
            .and_then(|format| self.schema.render(format))
        {
            Ok(contents) => contents,
            Err(e) => {
                tracing::error!(kind = T::NAME, error = %e, "cannot render default configuration");
                return;
            }
        };

        for candidate in self.options.candidates() {
            let created = FileSource::new(&candidate).and_then(|source| source.create(&contents));
            match created {
                Ok(created) => {
                    if created {
                        tracing::info!(kind = T::NAME, path = %candidate.display(), "created default configuration");
                    }
                    *self.resolved.write() = Some(candidate);
                    return;
                }
                Err(e) => {
                    tracing::warn!(kind = T::NAME, error = %e, "cannot create default configuration here");
                }
            }
        }
        tracing::error!(
            kind = T::NAME,
            "no writable search path; running on in-memory defaults"
        );
    }

    fn ensure_initialized(&self) {
        if let Err(e) = self.initialize() {
            tracing::error!(kind = T::NAME, error = %e, "configuration initialization failed");
        }
    }

    /// Current document snapshot.
    pub fn snapshot(&self) -> Arc<Document> {
        self.ensure_initialized();
        self.document.load_full()
    }

    /// Decode the current document into a fresh `T`.
    ///
    /// The value is a snapshot; later changes do not affect it.
    ///
    /// # Errors
    ///
    /// Returns `Parse` if initialization fails, `Decode` if the document does
    /// not fit `T`, and `Validation` if `T::validate` rejects it.
    pub fn get_config(&self) -> Result<T> {
        self.initialize()?;
        decode(&self.document.load())
    }

    /// Raw value at a dotted key.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.snapshot().get(key).cloned()
    }

    fn scalar<V: Default>(&self, key: &str, convert: fn(&Value) -> std::result::Result<V, CoerceError>) -> V {
        let snapshot = self.snapshot();
        let Some(value) = snapshot.get(key) else {
            return V::default();
        };
        convert(value).unwrap_or_else(|e| {
            tracing::debug!(kind = T::NAME, key, error = %e, "value does not coerce");
            V::default()
        })
    }

    /// String at `key`, or `""`.
    pub fn get_string(&self, key: &str) -> String {
        self.scalar(key, coerce::to_string)
    }

    /// Integer at `key`, or `0`.
    pub fn get_int(&self, key: &str) -> i64 {
        self.scalar(key, coerce::to_i64)
    }

    /// Boolean at `key`, or `false`.
    pub fn get_bool(&self, key: &str) -> bool {
        self.scalar(key, coerce::to_bool)
    }

    /// Float at `key`, or `0.0`.
    pub fn get_float(&self, key: &str) -> f64 {
        self.scalar(key, coerce::to_f64)
    }

    /// Duration at `key`, or zero.
    pub fn get_duration(&self, key: &str) -> Duration {
        self.scalar(key, coerce::to_duration)
    }

    /// Timestamp at `key`, or the Unix epoch.
    pub fn get_time(&self, key: &str) -> DateTime<Utc> {
        self.scalar(key, coerce::to_time)
    }

    fn slice<V>(
        &self,
        key: &str,
        convert: fn(&Value, Coercion) -> std::result::Result<Vec<V>, CoerceError>,
    ) -> Option<Vec<V>> {
        let snapshot = self.snapshot();
        let value = snapshot.get(key)?;
        match convert(value, self.options.coercion()) {
            Ok(items) => Some(items),
            Err(e) => {
                tracing::debug!(kind = T::NAME, key, error = %e, "list does not coerce");
                None
            }
        }
    }

    /// Strings at `key`.
    pub fn get_string_slice(&self, key: &str) -> Vec<String> {
        self.slice(key, coerce::to_string_slice).unwrap_or_default()
    }

    /// Booleans at `key`.
    pub fn get_bool_slice(&self, key: &str) -> Vec<bool> {
        self.slice(key, coerce::to_bool_slice).unwrap_or_default()
    }

    /// Integers at `key`.
    pub fn get_int_slice(&self, key: &str) -> Vec<i64> {
        self.slice(key, coerce::to_i64_slice).unwrap_or_default()
    }

    /// Floats at `key`.
    pub fn get_float_slice(&self, key: &str) -> Vec<f64> {
        self.slice(key, coerce::to_f64_slice).unwrap_or_default()
    }

    /// Durations at `key`.
    pub fn get_duration_slice(&self, key: &str) -> Vec<Duration> {
        self.slice(key, coerce::to_duration_slice).unwrap_or_default()
    }

    /// Timestamps at `key`.
    pub fn get_time_slice(&self, key: &str) -> Vec<DateTime<Utc>> {
        self.slice(key, coerce::to_time_slice).unwrap_or_default()
    }

    /// Strings at `key`, or `default` when absent or nothing coerces.
    pub fn get_string_slice_or(&self, key: &str, default: Vec<String>) -> Vec<String> {
        non_empty_or(self.slice(key, coerce::to_string_slice), default)
    }

    /// Booleans at `key`, or `default` when absent or nothing coerces.
    pub fn get_bool_slice_or(&self, key: &str, default: Vec<bool>) -> Vec<bool> {
        non_empty_or(self.slice(key, coerce::to_bool_slice), default)
    }

    /// Integers at `key`, or `default` when absent or nothing coerces.
    pub fn get_int_slice_or(&self, key: &str, default: Vec<i64>) -> Vec<i64> {
        non_empty_or(self.slice(key, coerce::to_i64_slice), default)
    }

    /// Floats at `key`, or `default` when absent or nothing coerces.
    pub fn get_float_slice_or(&self, key: &str, default: Vec<f64>) -> Vec<f64> {
        non_empty_or(self.slice(key, coerce::to_f64_slice), default)
    }

    /// Durations at `key`, or `default` when absent or nothing coerces.
    pub fn get_duration_slice_or(&self, key: &str, default: Vec<Duration>) -> Vec<Duration> {
        non_empty_or(self.slice(key, coerce::to_duration_slice), default)
    }

    /// Timestamps at `key`, or `default` when absent or nothing coerces.
    pub fn get_time_slice_or(&self, key: &str, default: Vec<DateTime<Utc>>) -> Vec<DateTime<Utc>> {
        non_empty_or(self.slice(key, coerce::to_time_slice), default)
    }

    /// Whether `key` has a value from the document, environment or `set`.
    pub fn is_set(&self, key: &str) -> bool {
        self.snapshot().is_set(key)
    }

    /// Override `key` in memory. Nothing is written to disk.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        self.ensure_initialized();
        {
            let _guard = self.writer.lock();
            let next = self.document.load().with_override(key, value.into(), &self.env);
            self.document.store(Arc::new(next));
        }
        self.subscribers.notify_all();
    }

    /// Path of the backing document, once resolved or created.
    pub fn config_file(&self) -> Option<PathBuf> {
        self.ensure_initialized();
        self.resolved.read().clone()
    }

    /// Re-read the backing document and replace the file layer.
    ///
    /// The new document must parse, decode into `T` and validate; otherwise the
    /// current state is kept and the error returned.
    pub fn reload(&self) -> Result<()> {
        self.initialize()?;
        let path = self
            .resolved
            .read()
            .clone()
            .ok_or_else(|| ConfigError::Other(format!("no document resolved for '{}'", T::NAME)))?;

        let tree = FileSource::new(&path)?.load()?.ok_or_else(|| {
            ConfigError::Other(format!("document {} disappeared", path.display()))
        })?;

        {
            let _guard = self.writer.lock();
            let next = self.document.load().with_file(tree, &self.env);
            decode::<T>(&next)?;
            self.document.store(Arc::new(next));
        }
        tracing::info!(kind = T::NAME, path = %path.display(), "configuration reloaded");
        self.subscribers.notify_all();
        Ok(())
    }

    /// Persist the merged document to the backing path.
    ///
    /// Writes to the resolved document, or to the first search path if none
    /// was resolved, replacing any existing file.
    pub fn write_config(&self) -> Result<PathBuf> {
        self.ensure_initialized();
        let path = match self.resolved.read().clone() {
            Some(path) => path,
            None => self
                .options
                .candidates()
                .into_iter()
                .next()
                .ok_or_else(|| ConfigError::Other("no search paths configured".to_string()))?,
        };

        let source = FileSource::new(&path)?;
        let format: DocumentFormat = source.format();
        let contents = format.serialize(self.document.load().merged())?;
        source.write(&contents)?;

        *self.resolved.write() = Some(path.clone());
        Ok(path)
    }

    /// Run `callback` after every successful reload or `set`.
    pub fn on_change<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribers.subscribe(callback)
    }

    /// Reload automatically when the backing document changes.
    ///
    /// Reload failures are logged and the previous state kept. The loop runs
    /// until the returned handle is dropped or stopped.
    ///
    /// # Errors
    ///
    /// Fails outside a tokio runtime, or if no document path was resolved
    /// (defaults could not be written anywhere).
    #[cfg(feature = "file-watch")]
    pub fn watch_config(self: &Arc<Self>) -> Result<WatchHandle> {
        let path = self.config_file().ok_or_else(|| {
            ConfigError::Watch(format!("no document resolved for '{}'", T::NAME))
        })?;

        let (watcher, mut reloads) = ConfigWatcher::new(self.options.debounce())?;
        watcher.watch(&path)?;

        let (stop_tx, mut stop_rx) = tokio::sync::oneshot::channel::<()>();
        let manager = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    signal = reloads.recv() => {
                        let (Some(()), Some(manager)) = (signal, manager.upgrade()) else {
                            break;
                        };
                        if let Err(e) = manager.reload() {
                            tracing::warn!(kind = T::NAME, error = %e, "reload failed; keeping current configuration");
                        }
                    }
                }
            }
            tracing::debug!(kind = T::NAME, "configuration watch stopped");
        });

        tracing::info!(kind = T::NAME, path = %path.display(), "watching configuration");
        Ok(WatchHandle::new(watcher, stop_tx, task))
    }
}

impl<T: ConfigKind> Default for ConfigManager<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn decode<T: ConfigKind>(document: &Document) -> Result<T> {
    let value: T = serde_json::from_value(document.merged().clone())
        .map_err(|e| ConfigError::Decode(format!("{}: {}", T::NAME, e)))?;
    value.validate()?;
    Ok(value)
}

fn non_empty_or<V>(items: Option<Vec<V>>, default: Vec<V>) -> Vec<V> {
    match items {
        Some(items) if !items.is_empty() => items,
        _ => default,
    }
}
