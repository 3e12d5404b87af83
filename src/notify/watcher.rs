//! File watching for automatic configuration reloads.

use crate::error::{ConfigError, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Configuration watcher that monitors documents for changes.
///
/// Watches the parent directory of each document, so saves performed as
/// "write temp file, rename over target" are seen as well as in-place writes.
/// Events are debounced before a reload signal is sent.
///
/// Must be created inside a tokio runtime.
///
/// # Examples
///
/// ```rust,no_run
/// use kindconf::notify::ConfigWatcher;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (watcher, mut rx) = ConfigWatcher::new(Duration::from_millis(500))?;
/// watcher.watch("/path/to/config.yaml")?;
///
/// // Listen for reload signals
/// while let Some(()) = rx.recv().await {
///     println!("Config file changed, reload triggered!");
/// }
/// # Ok(())
/// # }
/// ```
pub struct ConfigWatcher {
    watcher: Mutex<RecommendedWatcher>,
    debounce_duration: Duration,
    targets: Arc<Mutex<Vec<PathBuf>>>,
}

impl ConfigWatcher {
    /// Create a new configuration watcher.
    ///
    /// Returns the watcher and a receiver that gets a message whenever a
    /// watched document changed.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no tokio runtime or the platform watcher
    /// cannot be created.
    pub fn new(debounce_duration: Duration) -> Result<(Self, mpsc::Receiver<()>)> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| ConfigError::Watch("file watching requires a tokio runtime".to_string()))?;

        let (tx, rx) = mpsc::channel(100);
        let debounce = debounce_duration;
        let targets: Arc<Mutex<Vec<PathBuf>>> = Arc::new(Mutex::new(Vec::new()));

        // Channel for raw events from notify
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

        let filter_targets = Arc::clone(&targets);
        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                    return;
                }
                let targets = filter_targets.lock();
                if event.paths.iter().any(|p| targets.contains(p)) {
                    let _ = event_tx.send(event);
                }
            }
            Err(e) => tracing::warn!(error = %e, "file watch error"),
        })
        .map_err(|e| ConfigError::Watch(format!("Failed to create file watcher: {}", e)))?;

        // Debounce events and trigger reloads
        runtime.spawn(async move {
            let started = tokio::time::Instant::now();
            let mut last_reload = started.checked_sub(debounce).unwrap_or(started);

            while let Some(_event) = event_rx.recv().await {
                let now = tokio::time::Instant::now();
                let elapsed = now.duration_since(last_reload);

                if elapsed >= debounce {
                    if tx.send(()).await.is_err() {
                        break;
                    }
                    last_reload = now;
                } else {
                    // Trailing reload so the last write in a burst is picked up
                    let remaining = debounce - elapsed;
                    let tx_clone = tx.clone();
                    tokio::spawn(async move {
                        sleep(remaining).await;
                        let _ = tx_clone.send(()).await;
                    });
                }
            }
        });

        Ok((
            Self {
                watcher: Mutex::new(watcher),
                debounce_duration,
                targets,
            },
            rx,
        ))
    }

    /// Start watching a document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not exist or its directory cannot
    /// be watched.
    pub fn watch(&self, path: impl AsRef<Path>) -> Result<()> {
        let target = path
            .as_ref()
            .canonicalize()
            .map_err(|e| ConfigError::Watch(format!("Failed to resolve path: {}", e)))?;
        let directory = target
            .parent()
            .ok_or_else(|| ConfigError::Watch(format!("{} has no parent directory", target.display())))?;

        self.watcher
            .lock()
            .watch(directory, RecursiveMode::NonRecursive)
            .map_err(|e| ConfigError::Watch(format!("Failed to watch path: {}", e)))?;

        let mut targets = self.targets.lock();
        if !targets.contains(&target) {
            targets.push(target);
        }
        Ok(())
    }

    /// Stop watching a document.
    pub fn unwatch(&self, path: impl AsRef<Path>) -> Result<()> {
        let target = path.as_ref().canonicalize().map_err(|e| {
            ConfigError::Watch(format!("Failed to resolve path for unwatching: {}", e))
        })?;

        let mut targets = self.targets.lock();
        targets.retain(|p| p != &target);

        let Some(directory) = target.parent() else {
            return Ok(());
        };
        if targets.iter().all(|p| p.parent() != Some(directory)) {
            self.watcher
                .lock()
                .unwatch(directory)
                .map_err(|e| ConfigError::Watch(format!("Failed to unwatch path: {}", e)))?;
        }
        Ok(())
    }

    /// Get the debounce duration for this watcher.
    pub fn debounce_duration(&self) -> Duration {
        self.debounce_duration
    }

    /// Documents currently watched.
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.targets.lock().clone()
    }
}

/// A running watch loop for one manager.
///
/// Dropping the handle closes the stop channel, which ends the loop and
/// releases the platform watcher.
pub struct WatchHandle {
    watcher: ConfigWatcher,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl WatchHandle {
    pub(crate) fn new(watcher: ConfigWatcher, stop: oneshot::Sender<()>, task: JoinHandle<()>) -> Self {
        Self {
            watcher,
            stop: Some(stop),
            task,
        }
    }

    /// Documents watched by this loop.
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.watcher.watched_paths()
    }

    /// Whether the reload loop is still running.
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the loop and wait for it to finish.
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        let _ = (&mut self.task).await;
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}
