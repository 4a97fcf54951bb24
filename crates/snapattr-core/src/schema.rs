//! Declarative field schemas for attribute extraction.
//!
//! A schema file is an ordered mapping of field name to an example shape.
//! The shape of each entry decides its [`FieldKind`] once, at load time:
//! a mapping with a `value` key is a scalar, a non-empty sequence is a
//! list, and a bare string marks freeform text.

use std::fmt;
use std::path::Path;

use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema file not found: {0}")]
    NotFound(std::path::PathBuf),

    #[error("unsupported schema file format: {0}")]
    UnsupportedFormat(String),

    #[error("schema field '{field}' has an unsupported shape")]
    UnsupportedShape { field: String },

    #[error("schema has no fields")]
    Empty,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Structural category of one schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Single value plus a confidence.
    Scalar,
    /// Ordered sequence of named sub-items, each with its own confidence.
    List,
    /// Plain text, no confidence. Only meaningful for the `notes` field.
    Freeform,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Scalar => "scalar",
            Self::List => "list",
            Self::Freeform => "freeform",
        };
        f.write_str(s)
    }
}

/// Ordered mapping of field name to [`FieldKind`], validated once at load.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    fields: IndexMap<String, FieldKind>,
}

impl FieldSchema {
    /// Build a schema from already-classified fields.
    pub fn new(fields: IndexMap<String, FieldKind>) -> Result<Self, SchemaError> {
        if fields.is_empty() {
            return Err(SchemaError::Empty);
        }
        Ok(Self { fields })
    }

    /// Load a schema from a `.yaml`/`.yml` or `.json` file.
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        if !path.exists() {
            return Err(SchemaError::NotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        let schema = match ext.as_str() {
            "yaml" | "yml" => Self::from_yaml_str(&text)?,
            "json" => Self::from_json_str(&text)?,
            other => return Err(SchemaError::UnsupportedFormat(other.to_string())),
        };
        tracing::debug!(path = %path.display(), fields = schema.len(), "loaded schema");
        Ok(schema)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, SchemaError> {
        let raw: IndexMap<String, Value> = serde_yaml::from_str(text)?;
        Self::from_raw(raw)
    }

    pub fn from_json_str(text: &str) -> Result<Self, SchemaError> {
        let raw: IndexMap<String, Value> = serde_json::from_str(text)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: IndexMap<String, Value>) -> Result<Self, SchemaError> {
        let mut fields = IndexMap::with_capacity(raw.len());
        for (name, shape) in raw {
            let kind = classify(&shape).ok_or_else(|| SchemaError::UnsupportedShape {
                field: name.clone(),
            })?;
            fields.insert(name, kind);
        }
        Self::new(fields)
    }

    pub fn kind(&self, name: &str) -> Option<FieldKind> {
        self.fields.get(name).copied()
    }

    /// Fields in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, FieldKind)> {
        self.fields.iter().map(|(name, kind)| (name.as_str(), *kind))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn classify(shape: &Value) -> Option<FieldKind> {
    match shape {
        Value::Object(map) if map.contains_key("value") => Some(FieldKind::Scalar),
        Value::Array(items) if !items.is_empty() => Some(FieldKind::List),
        Value::String(_) => Some(FieldKind::Freeform),
        _ => None,
    }
}
