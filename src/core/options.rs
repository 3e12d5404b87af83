//! Options for constructing a `ConfigManager`.

use crate::coerce::Coercion;
use crate::error::Result;
use crate::kind::ConfigKind;
use crate::sources::{DocumentFormat, EnvOverlay};
use std::path::PathBuf;
use std::time::Duration;

/// Conventional subdirectory searched first for documents.
pub const DEFAULT_CONFIG_DIR: &str = "conf";

/// Extension used when none is configured.
pub const DEFAULT_EXTENSION: &str = "yaml";

/// Default debounce for file-watch reloads.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

/// Where and how a manager finds its document.
///
/// Provides a fluent interface in the same spirit as the manager registry's
/// `get_or_create_with`.
///
/// # Examples
///
/// ```rust
/// use kindconf::core::ManagerOptions;
///
/// let options = ManagerOptions::new("app")
///     .with_search_paths(["/etc/app", "conf"])
///     .with_extension("toml")
///     .with_env_prefix("MYAPP");
///
/// assert_eq!(options.document_name(), "app.toml");
/// ```
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    name: String,
    search_paths: Vec<PathBuf>,
    extension: String,
    env_prefix: Option<String>,
    coercion: Coercion,
    debounce: Duration,
}

impl ManagerOptions {
    /// Defaults for a document named `name`: search `conf/` then `.`, YAML,
    /// environment prefix derived from the name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let env_prefix = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect();
        Self {
            name,
            search_paths: vec![PathBuf::from(DEFAULT_CONFIG_DIR), PathBuf::from(".")],
            extension: DEFAULT_EXTENSION.to_string(),
            env_prefix: Some(env_prefix),
            coercion: Coercion::default(),
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    /// Defaults for configuration kind `T`.
    pub fn for_kind<T: ConfigKind>() -> Self {
        Self::new(T::NAME)
    }

    /// Append a search directory. Earlier directories win.
    pub fn with_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_paths.push(path.into());
        self
    }

    /// Replace the search directories.
    pub fn with_search_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.search_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Document extension (`yaml`, `yml`, `toml`, `json`).
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    /// Environment variable prefix; an empty prefix disables the overlay.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.env_prefix = (!prefix.is_empty()).then_some(prefix);
        self
    }

    /// Do not consult the environment.
    pub fn without_env(mut self) -> Self {
        self.env_prefix = None;
        self
    }

    /// Element failure policy for the slice accessors.
    pub fn with_coercion(mut self, coercion: Coercion) -> Self {
        self.coercion = coercion;
        self
    }

    /// Minimum time between file-watch reloads.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// File name of the document, e.g. `app.yaml`.
    pub fn document_name(&self) -> String {
        format!("{}.{}", self.name, self.extension)
    }

    /// Candidate document paths in search order.
    pub fn candidates(&self) -> Vec<PathBuf> {
        let file_name = self.document_name();
        self.search_paths.iter().map(|dir| dir.join(&file_name)).collect()
    }

    /// Document format implied by the extension.
    pub fn format(&self) -> Result<DocumentFormat> {
        DocumentFormat::from_extension(&self.extension)
    }

    /// Environment overlay for these options.
    pub fn env_overlay(&self) -> EnvOverlay {
        match &self.env_prefix {
            Some(prefix) => EnvOverlay::new(prefix.clone()),
            None => EnvOverlay::disabled(),
        }
    }

    /// Configured search directories.
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Configured coercion policy.
    pub fn coercion(&self) -> Coercion {
        self.coercion
    }

    /// Configured watch debounce.
    pub fn debounce(&self) -> Duration {
        self.debounce
    }
}
