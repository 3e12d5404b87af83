//! Bridge from `tracing` events to a [`LoggerManager`].

use crate::logging::config::LogLevel;
use crate::logging::format::Caller;
use crate::logging::manager::LoggerManager;
use serde_json::Value;
use std::cell::Cell;
use std::fmt;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

thread_local! {
    static FORWARDING: Cell<bool> = const { Cell::new(false) };
}

/// Resets the re-entrancy flag even if a sink panics.
struct ForwardGuard;

impl Drop for ForwardGuard {
    fn drop(&mut self) {
        FORWARDING.with(|flag| flag.set(false));
    }
}

/// A `tracing_subscriber` layer that writes events through the manager's
/// current logger.
///
/// Events raised while an event is already being written on the same thread
/// (for example a sink failure warning) are dropped instead of recursing.
///
/// # Examples
///
/// ```rust
/// use kindconf::logging::LoggerManager;
/// use std::sync::Arc;
/// use tracing_subscriber::layer::SubscriberExt;
///
/// let logs = Arc::new(LoggerManager::new());
/// let subscriber = tracing_subscriber::registry().with(logs.layer());
/// tracing::subscriber::with_default(subscriber, || {
///     tracing::info!(user = "ada", "signed in");
/// });
/// ```
pub struct LoggerLayer {
    manager: Arc<LoggerManager>,
}

impl LoggerLayer {
    /// Layer forwarding to `manager`.
    pub fn new(manager: Arc<LoggerManager>) -> Self {
        Self { manager }
    }
}

impl<S: Subscriber> Layer<S> for LoggerLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if FORWARDING.with(|flag| flag.replace(true)) {
            return;
        }
        let _guard = ForwardGuard;

        let metadata = event.metadata();
        let level = LogLevel::from(metadata.level());
        let logger = self.manager.logger();
        if !logger.enabled(level) {
            return;
        }

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);
        visitor
            .fields
            .insert(0, ("target".to_string(), Value::String(metadata.target().to_string())));

        let caller = match (metadata.file(), metadata.line()) {
            (Some(file), Some(line)) => Some(Caller { file, line }),
            _ => None,
        };
        logger.log(level, visitor.message, &visitor.fields, caller);
    }
}

#[derive(Default)]
struct EventVisitor {
    message: String,
    fields: Vec<(String, Value)>,
}

impl EventVisitor {
    fn push(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
        } else {
            self.fields.push((field.name().to_string(), value));
        }
    }
}

impl Visit for EventVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, Value::String(value.to_string()));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, Value::Bool(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.push(field, Value::String(format!("{:?}", value)));
    }
}
