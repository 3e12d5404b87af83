//! Environment variable overlay.

use crate::coerce;
use crate::core::document;
use serde_json::Value;

/// Environment variable overlay for one configuration kind.
///
/// Each known key maps to exactly one variable: the prefix, an underscore,
/// then the dotted key upper-cased with `.` and `-` replaced by `_`.
///
/// # Examples
///
/// ```rust
/// use kindconf::sources::EnvOverlay;
///
/// // server.max-connections -> APP_SERVER_MAX_CONNECTIONS
/// let overlay = EnvOverlay::new("APP");
/// assert_eq!(overlay.var_name("server.max-connections"), "APP_SERVER_MAX_CONNECTIONS");
/// ```
#[derive(Debug, Clone, Default)]
pub struct EnvOverlay {
    prefix: Option<String>,
}

impl EnvOverlay {
    /// Create an overlay reading variables under `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: (!prefix.is_empty()).then_some(prefix),
        }
    }

    /// An overlay that never reads the environment.
    pub fn disabled() -> Self {
        Self { prefix: None }
    }

    /// Whether the overlay reads the environment at all.
    pub fn is_enabled(&self) -> bool {
        self.prefix.is_some()
    }

    /// Variable name consulted for a dotted key.
    pub fn var_name(&self, key: &str) -> String {
        let suffix: String = key
            .chars()
            .map(|c| match c {
                '.' | '-' => '_',
                c => c.to_ascii_uppercase(),
            })
            .collect();
        match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix.to_ascii_uppercase(), suffix),
            None => suffix,
        }
    }

    /// Raw variable value for a dotted key, if set.
    pub fn lookup(&self, key: &str) -> Option<String> {
        if !self.is_enabled() {
            return None;
        }
        std::env::var(self.var_name(key)).ok()
    }

    /// Build the environment layer for every leaf key of `base`.
    ///
    /// Variable text is converted toward the type already present at that key
    /// so numeric and boolean fields survive the trip through a string.
    pub fn overlay(&self, base: &Value) -> Value {
        let mut layer = Value::Object(serde_json::Map::new());
        if !self.is_enabled() {
            return layer;
        }

        for (key, current) in document::leaf_paths(base) {
            if let Some(raw) = self.lookup(&key) {
                tracing::debug!(key = %key, var = %self.var_name(&key), "environment override");
                document::insert(&mut layer, &key, typed_like(current, raw));
            }
        }
        layer
    }

    /// Human-readable name for diagnostics.
    pub fn name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("env:{}_*", prefix),
            None => "env:disabled".to_string(),
        }
    }
}

fn typed_like(current: &Value, raw: String) -> Value {
    let text = Value::String(raw);
    let converted = match current {
        Value::Bool(_) => coerce::to_bool(&text).ok().map(Value::Bool),
        Value::Number(n) if n.is_i64() || n.is_u64() => {
            coerce::to_i64(&text).ok().map(Value::from)
        }
        Value::Number(_) => coerce::to_f64(&text)
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        Value::Array(_) => coerce::to_string_slice(&text, coerce::Coercion::Lenient)
            .ok()
            .map(|items| Value::Array(items.into_iter().map(Value::String).collect())),
        _ => None,
    };
    converted.unwrap_or(text)
}
