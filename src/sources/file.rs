//! File-backed configuration document.

use crate::error::{ConfigError, Result};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Encoding of a configuration document on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// `.yaml` / `.yml`
    Yaml,
    /// `.toml`
    Toml,
    /// `.json`
    Json,
}

impl DocumentFormat {
    /// Detect the format from a file extension (without the leading dot).
    pub fn from_extension(extension: &str) -> Result<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Parse a document in this format. Keys keep their case.
    ///
    /// An empty document parses as an empty table; any other non-table top
    /// level is rejected.
    pub fn parse(self, text: &str) -> std::result::Result<Value, String> {
        let tree = match self {
            Self::Yaml => serde_yaml::from_str::<Value>(text).map_err(|e| e.to_string())?,
            Self::Toml => toml::from_str::<Value>(text).map_err(|e| e.to_string())?,
            Self::Json => serde_json::from_str::<Value>(text).map_err(|e| e.to_string())?,
        };
        match tree {
            Value::Object(_) => Ok(tree),
            Value::Null => Ok(Value::Object(serde_json::Map::new())),
            other => Err(format!("top level must be a table, found {}", kind_of(&other))),
        }
    }

    /// Serialize a document tree in this format.
    pub fn serialize(self, document: &Value) -> Result<String> {
        match self {
            Self::Yaml => serde_yaml::to_string(document)
                .map_err(|e| ConfigError::Other(format!("Failed to encode YAML: {}", e))),
            Self::Toml => toml::to_string_pretty(document)
                .map_err(|e| ConfigError::Other(format!("Failed to encode TOML: {}", e))),
            Self::Json => serde_json::to_string_pretty(document)
                .map(|mut s| {
                    s.push('\n');
                    s
                })
                .map_err(|e| ConfigError::Other(format!("Failed to encode JSON: {}", e))),
        }
    }
}

/// File-based configuration document.
///
/// Reads YAML, TOML, or JSON into a `serde_json::Value` tree and writes
/// documents back out, creating parent directories as needed.
///
/// # Examples
///
/// ```rust,no_run
/// use kindconf::sources::FileSource;
///
/// let source = FileSource::new("conf/app.yaml")?;
/// if let Some(document) = source.load()? {
///     println!("{}", document);
/// }
/// # Ok::<(), kindconf::error::ConfigError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    format: DocumentFormat,
}

impl FileSource {
    /// Create a file source, detecting the format from the extension.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedFormat` if the extension is missing or unknown.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.display().to_string()))?;
        let format = DocumentFormat::from_extension(extension)?;
        Ok(Self { path, format })
    }

    /// Path of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Format of the backing document.
    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    /// Whether the document exists on disk.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Human-readable name for diagnostics.
    pub fn name(&self) -> String {
        format!("file:{}", self.path.display())
    }

    /// Read and parse the document.
    ///
    /// Returns `Ok(None)` when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` if the file exists but is malformed.
    pub fn load(&self) -> Result<Option<Value>> {
        if !self.exists() {
            return Ok(None);
        }

        let text = fs::read_to_string(&self.path).map_err(|e| self.parse_error(e))?;
        let tree = self.format.parse(&text).map_err(|e| self.parse_error(e))?;
        Ok(Some(tree))
    }

    /// Create the document with `contents` unless it already exists.
    ///
    /// Parent directories are created as needed. Returns `Ok(false)` if a file
    /// was already present; it is never overwritten.
    pub fn create(&self, contents: &str) -> Result<bool> {
        self.ensure_parent()?;
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path);

        match file {
            Ok(mut file) => {
                file.write_all(contents.as_bytes())
                    .map_err(|e| self.write_error(e))?;
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(self.write_error(e)),
        }
    }

    /// Write `contents`, replacing any existing document.
    pub fn write(&self, contents: &str) -> Result<()> {
        self.ensure_parent()?;
        fs::write(&self.path, contents).map_err(|e| self.write_error(e))
    }

    fn ensure_parent(&self) -> Result<()> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                fs::create_dir_all(parent).map_err(|e| self.write_error(e))
            }
            _ => Ok(()),
        }
    }

    fn parse_error(&self, err: impl std::fmt::Display) -> ConfigError {
        ConfigError::Parse {
            path: self.path.clone(),
            message: err.to_string(),
        }
    }

    fn write_error(&self, source: std::io::Error) -> ConfigError {
        ConfigError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a table",
    }
}
