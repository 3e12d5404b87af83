//! Process-wide lookup of one manager per configuration kind.

use crate::core::{ConfigManager, ManagerOptions};
use crate::kind::ConfigKind;
use dashmap::DashMap;
use std::any::Any;
use std::sync::{Arc, OnceLock};

type AnyManager = Arc<dyn Any + Send + Sync>;

/// Hands out the single [`ConfigManager`] for each kind.
///
/// Managers are keyed by [`ConfigKind::NAME`]. Construction is lazy and
/// happens at most once per kind even under concurrent first use; the
/// returned manager is not initialized until it is first read.
///
/// # Examples
///
/// ```rust,no_run
/// use kindconf::prelude::*;
/// use serde::Deserialize;
/// use std::sync::Arc;
///
/// #[derive(Deserialize)]
/// struct Cache {
///     ttl: u64,
/// }
///
/// impl ConfigKind for Cache {
///     const NAME: &'static str = "cache";
///     fn schema() -> Schema {
///         Schema::new().field("ttl", 60, "Entry lifetime in seconds")
///     }
/// }
///
/// let a = ManagerRegistry::global().get_or_create::<Cache>();
/// let b = ManagerRegistry::global().get_or_create::<Cache>();
/// assert!(Arc::ptr_eq(&a, &b));
/// ```
#[derive(Default)]
pub struct ManagerRegistry {
    managers: DashMap<&'static str, AnyManager>,
}

impl ManagerRegistry {
    /// Empty registry, independent of the global one.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static ManagerRegistry {
        static GLOBAL: OnceLock<ManagerRegistry> = OnceLock::new();
        GLOBAL.get_or_init(ManagerRegistry::new)
    }

    /// Manager for `T`, created with default options on first use.
    ///
    /// # Panics
    ///
    /// Panics if `T::NAME` is empty or already registered by a different type.
    pub fn get_or_create<T: ConfigKind>(&self) -> Arc<ConfigManager<T>> {
        self.get_or_create_with::<T>(ManagerOptions::for_kind::<T>())
    }

    /// Manager for `T`, created with `options` on first use.
    ///
    /// Options are ignored if the manager already exists.
    ///
    /// # Panics
    ///
    /// Panics if `T::NAME` is empty or already registered by a different type.
    pub fn get_or_create_with<T: ConfigKind>(&self, options: ManagerOptions) -> Arc<ConfigManager<T>> {
        assert!(
            !T::NAME.is_empty(),
            "configuration kind identity must not be empty"
        );

        let entry = self
            .managers
            .entry(T::NAME)
            .or_insert_with(|| {
                tracing::debug!(kind = T::NAME, "registering configuration manager");
                Arc::new(ConfigManager::<T>::with_options(options)) as AnyManager
            })
            .value()
            .clone();

        downcast::<T>(entry)
    }

    /// Existing manager for `T`, if any.
    ///
    /// # Panics
    ///
    /// Panics if `T::NAME` is registered by a different type.
    pub fn get<T: ConfigKind>(&self) -> Option<Arc<ConfigManager<T>>> {
        let entry = self.managers.get(T::NAME)?.value().clone();
        Some(downcast::<T>(entry))
    }

    /// Whether a manager is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.managers.contains_key(name)
    }

    /// Number of registered managers.
    pub fn len(&self) -> usize {
        self.managers.len()
    }

    /// Whether no managers are registered.
    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }

    /// Forget every manager. Outstanding `Arc`s stay usable but are no longer
    /// handed out.
    pub fn reset(&self) {
        self.managers.clear();
    }
}

fn downcast<T: ConfigKind>(entry: AnyManager) -> Arc<ConfigManager<T>> {
    match entry.downcast::<ConfigManager<T>>() {
        Ok(manager) => manager,
        Err(_) => panic!(
            "configuration kind '{}' is already registered by a different type than {}",
            T::NAME,
            std::any::type_name::<T>()
        ),
    }
}
