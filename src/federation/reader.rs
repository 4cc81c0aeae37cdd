//! Store read interfaces consumed by the executor.
//!
//! Drivers live behind these two traits so the executor never sees connection
//! handling or wire formats. Both return flat records keyed by field name.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::schema_mapping::{GraphField, PathTemplate, StoreKind};

/// One flat record: field name to value.
pub type Record = serde_json::Map<String, Value>;

/// Opaque scalar identifying one logical account.
///
/// Anchors are compared by their canonical key, so the string `"7"` from one
/// store and the number `7` from the other name the same account.
#[derive(Debug, Clone)]
pub struct AnchorId(Value);

impl AnchorId {
    /// Accepts non-empty strings, numbers and booleans. Nulls, empty strings
    /// and composite values do not identify an anchor.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if s.is_empty() => None,
            Value::String(_) | Value::Number(_) | Value::Bool(_) => Some(AnchorId(value.clone())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn key(&self) -> String {
        match &self.0 {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl From<&str> for AnchorId {
    fn from(s: &str) -> Self {
        AnchorId(Value::String(s.to_string()))
    }
}

impl PartialEq for AnchorId {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for AnchorId {}

impl Hash for AnchorId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for AnchorId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AnchorId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl std::fmt::Display for AnchorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Row filter for document projections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentFilter {
    All,
    Anchors(Vec<AnchorId>),
}

/// What a graph read walks.
#[derive(Debug, Clone, PartialEq)]
pub enum Traversal {
    /// Every anchor node; projects the anchor id only.
    AnchorEnumeration,
    /// The anchor node itself, at most one record.
    AnchorNode,
    /// From the anchor node along a compiled path, zero or more records.
    Path(PathTemplate),
}

impl Traversal {
    pub fn name(&self) -> &str {
        match self {
            Traversal::AnchorEnumeration => "anchor-enumeration",
            Traversal::AnchorNode => "anchor-node",
            Traversal::Path(path) => path.label(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("{store} unavailable: {message}")]
    Unavailable { store: StoreKind, message: String },
    #[error("{store} call timed out after {millis}ms")]
    Timeout { store: StoreKind, millis: u64 },
    #[error("{store} returned an invalid response: {message}")]
    InvalidResponse { store: StoreKind, message: String },
}

impl StoreError {
    pub fn unavailable(store: StoreKind, message: impl Into<String>) -> Self {
        StoreError::Unavailable {
            store,
            message: message.into(),
        }
    }

    pub fn invalid_response(store: StoreKind, message: impl Into<String>) -> Self {
        StoreError::InvalidResponse {
            store,
            message: message.into(),
        }
    }
}

/// Flat per-account records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentReader: Send + Sync {
    /// Project `fields` from every record matching `filter`. Absent fields may
    /// be omitted from a record; the executor fills them with null.
    async fn fetch_projected(
        &self,
        fields: &[String],
        filter: &DocumentFilter,
    ) -> Result<Vec<Record>, StoreError>;
}

/// Account nodes and the nodes related to them.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GraphReader: Send + Sync {
    /// Run `traversal` rooted at `anchor` and project `fields` of the target
    /// node, each returned under its field name.
    async fn run_traversal(
        &self,
        traversal: &Traversal,
        anchor: Option<AnchorId>,
        fields: &[GraphField],
    ) -> Result<Vec<Record>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeSet;

    #[test]
    fn test_anchor_id_rejects_falsy_values() {
        assert!(AnchorId::from_value(&Value::Null).is_none());
        assert!(AnchorId::from_value(&json!("")).is_none());
        assert!(AnchorId::from_value(&json!(["A1"])).is_none());
        assert!(AnchorId::from_value(&json!({"id": "A1"})).is_none());
        assert!(AnchorId::from_value(&json!("A1")).is_some());
        assert!(AnchorId::from_value(&json!(42)).is_some());
    }

    #[test]
    fn test_anchor_id_matches_across_representations() {
        let from_documents = AnchorId::from_value(&json!("42")).unwrap();
        let from_graph = AnchorId::from_value(&json!(42)).unwrap();
        assert_eq!(from_documents, from_graph);

        let set: BTreeSet<_> = [from_documents, from_graph, AnchorId::from("A1")]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_anchor_id_keeps_original_value() {
        let anchor = AnchorId::from_value(&json!(42)).unwrap();
        assert_eq!(anchor.value(), &json!(42));
        assert_eq!(anchor.to_string(), "42");
    }
}
