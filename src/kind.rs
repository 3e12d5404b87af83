//! Configuration kinds and their declarative schemas.

use crate::core::document;
use crate::error::{Result, ValidationError};
use crate::sources::DocumentFormat;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A compile-time configuration record with its own defaults and document.
///
/// `NAME` identifies the kind process-wide; it names the backing document
/// (`<NAME>.<ext>`) and keys the manager registry. Two kinds sharing a name
/// would alias one manager, so the registry rejects that.
///
/// # Examples
///
/// ```rust
/// use kindconf::kind::{ConfigKind, Schema};
/// use serde::Deserialize;
///
/// #[derive(Debug, Deserialize)]
/// struct Database {
///     url: String,
///     pool_size: u32,
/// }
///
/// impl ConfigKind for Database {
///     const NAME: &'static str = "database";
///
///     fn schema() -> Schema {
///         Schema::new()
///             .field("url", "postgres://localhost/app", "Connection string")
///             .field("pool_size", 10, "Maximum pooled connections")
///     }
/// }
/// ```
pub trait ConfigKind: DeserializeOwned + Send + Sync + 'static {
    /// Stable identity of this kind.
    const NAME: &'static str;

    /// Keys, defaults and descriptions for this kind.
    fn schema() -> Schema;

    /// Check a decoded value before it is handed out or a reload is accepted.
    fn validate(&self) -> std::result::Result<(), ValidationError> {
        Ok(())
    }
}

/// One schema entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Dotted key path
    pub key: String,
    /// Default value
    pub default: Value,
    /// Human description, emitted as a comment in generated YAML
    pub description: String,
}

/// Declarative description of a configuration kind.
///
/// Both the in-memory defaults and the canonical on-disk document are
/// generated from the same field list, so the two cannot drift apart.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    /// Empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field. A later field with the same key replaces the earlier one.
    pub fn field(
        mut self,
        key: impl Into<String>,
        default: impl Into<Value>,
        description: impl Into<String>,
    ) -> Self {
        let field = Field {
            key: key.into(),
            default: default.into(),
            description: description.into(),
        };
        match self.fields.iter_mut().find(|f| f.key == field.key) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
        self
    }

    /// Schema whose fields are the leaves of a serialized default value.
    ///
    /// Attach descriptions afterwards with [`Schema::describe`].
    pub fn from_defaults<D: Serialize>(defaults: &D) -> Self {
        match serde_json::to_value(defaults) {
            Ok(tree) => document::leaf_paths(&tree)
                .into_iter()
                .fold(Self::new(), |schema, (key, value)| {
                    schema.field(key, value.clone(), "")
                }),
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize schema defaults");
                Self::new()
            }
        }
    }

    /// Set the description of an existing field.
    pub fn describe(mut self, key: &str, description: impl Into<String>) -> Self {
        if let Some(field) = self.fields.iter_mut().find(|f| f.key == key) {
            field.description = description.into();
        }
        self
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Defaults as a nested tree.
    pub fn defaults(&self) -> Value {
        let mut tree = Value::Object(serde_json::Map::new());
        for field in &self.fields {
            document::insert(&mut tree, &field.key, field.default.clone());
        }
        tree
    }

    /// Canonical document text for the defaults.
    ///
    /// YAML keeps declaration order and carries descriptions as comments.
    pub fn render(&self, format: DocumentFormat) -> Result<String> {
        match format {
            DocumentFormat::Yaml => Ok(self.render_yaml()),
            other => other.serialize(&self.defaults()),
        }
    }

    fn render_yaml(&self) -> String {
        let mut root = Node::default();
        for field in &self.fields {
            root.insert(&field.key, field);
        }
        let mut out = String::new();
        root.emit_yaml(0, &mut out);
        out
    }
}

#[derive(Default)]
struct Node<'a> {
    children: Vec<(String, Entry<'a>)>,
}

enum Entry<'a> {
    Leaf(&'a Field),
    Branch(Node<'a>),
}

impl<'a> Node<'a> {
    fn insert(&mut self, key: &str, field: &'a Field) {
        match key.split_once(document::KEY_SEPARATOR) {
            None => match self.children.iter_mut().find(|(name, _)| name == key) {
                Some((_, entry)) => *entry = Entry::Leaf(field),
                None => self.children.push((key.to_string(), Entry::Leaf(field))),
            },
            Some((head, rest)) => {
                let position = self.children.iter().position(|(name, _)| name == head);
                let index = match position {
                    Some(i) => i,
                    None => {
                        self.children
                            .push((head.to_string(), Entry::Branch(Node::default())));
                        self.children.len() - 1
                    }
                };
                let entry = &mut self.children[index].1;
                if matches!(entry, Entry::Leaf(_)) {
                    *entry = Entry::Branch(Node::default());
                }
                if let Entry::Branch(node) = entry {
                    node.insert(rest, field);
                }
            }
        }
    }

    fn emit_yaml(&self, indent: usize, out: &mut String) {
        let pad = " ".repeat(indent);
        for (name, entry) in &self.children {
            match entry {
                Entry::Branch(node) => {
                    out.push_str(&format!("{}{}:\n", pad, name));
                    node.emit_yaml(indent + 2, out);
                }
                Entry::Leaf(field) => {
                    for line in field.description.lines().filter(|l| !l.trim().is_empty()) {
                        out.push_str(&format!("{}# {}\n", pad, line.trim()));
                    }
                    emit_yaml_value(&pad, name, &field.default, out);
                }
            }
        }
    }
}

fn emit_yaml_value(pad: &str, name: &str, value: &Value, out: &mut String) {
    let is_empty_collection = match value {
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => true,
    };
    let rendered = serde_yaml::to_string(value).unwrap_or_else(|_| "null\n".to_string());

    if is_empty_collection {
        out.push_str(&format!("{}{}: {}\n", pad, name, rendered.trim_end()));
    } else {
        out.push_str(&format!("{}{}:\n", pad, name));
        for line in rendered.lines() {
            out.push_str(&format!("{}  {}\n", pad, line));
        }
    }
}
