//! Core data structures for the block structure

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Field name holding the block's category (defaults to its block type).
pub const FIELD_CATEGORY: &str = "category";
/// Field name holding the human-readable title.
pub const FIELD_DISPLAY_NAME: &str = "display_name";

/// Identifier of a block within a course: `(block_type, block_id)`.
///
/// Keys are immutable and never reused across structural versions. The
/// textual form is `type@id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockKey {
    pub block_type: String,
    pub block_id: String,
}

impl BlockKey {
    pub fn new(block_type: impl Into<String>, block_id: impl Into<String>) -> Self {
        BlockKey {
            block_type: block_type.into(),
            block_id: block_id.into(),
        }
    }
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.block_type, self.block_id)
    }
}

/// Error returned when a `type@id` string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid block key {0:?}: expected `type@id`")]
pub struct ParseBlockKeyError(pub String);

impl FromStr for BlockKey {
    type Err = ParseBlockKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('@') {
            Some((block_type, block_id)) if !block_type.is_empty() && !block_id.is_empty() => {
                Ok(BlockKey::new(block_type, block_id))
            }
            _ => Err(ParseBlockKeyError(s.to_string())),
        }
    }
}

/// Opaque identifier of a requesting user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        UserId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A value stored in a block's field map.
///
/// The set of scalar kinds is closed; anything else authoring hands us is
/// kept as raw JSON bytes in `Blob`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<String>),
    Blob(Vec<u8>),
}

impl FieldValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Convert an authoring JSON value into the closest field kind.
    pub fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Bool(b) => FieldValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Int(i),
                None => FieldValue::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => FieldValue::Text(s.clone()),
            Value::Array(items) if items.iter().all(Value::is_string) => FieldValue::List(
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
            ),
            other => FieldValue::Blob(other.to_string().into_bytes()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Int(i)
    }
}

/// A single block in the structure. Parents are not stored; see
/// [`GraphStore::parents`](crate::graph::GraphStore::parents).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockNode {
    pub key: BlockKey,
    /// Children in authoring order.
    pub children: Vec<BlockKey>,
    pub fields: BTreeMap<String, FieldValue>,
}

impl BlockNode {
    pub fn new(key: BlockKey) -> Self {
        BlockNode {
            key,
            children: Vec::new(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<BlockKey>) -> Self {
        self.children = children;
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// The block's category, falling back to its block type.
    pub fn category(&self) -> &str {
        self.field(FIELD_CATEGORY)
            .and_then(FieldValue::as_text)
            .unwrap_or(&self.key.block_type)
    }

    pub fn display_name(&self) -> &str {
        self.field(FIELD_DISPLAY_NAME)
            .and_then(FieldValue::as_text)
            .unwrap_or(&self.key.block_id)
    }
}
