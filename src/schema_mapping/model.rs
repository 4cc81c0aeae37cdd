//! Compiled field-routing tables.
//!
//! A [`SchemaMappingModel`] is immutable once built and is shared between
//! requests behind an `Arc`. It answers three questions for the planner and
//! executor:
//!
//! - which store owns a field ([`StoreKind`])
//! - for graph fields, which label and node property back it ([`GraphField`])
//! - for non-anchor labels, which traversal path reaches them ([`PathTemplate`])

use std::collections::BTreeMap;

use serde::Serialize;

use super::errors::SchemaParseError;
use super::path_template::PathTemplate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StoreKind {
    Document,
    Graph,
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreKind::Document => write!(f, "document store"),
            StoreKind::Graph => write!(f, "graph store"),
        }
    }
}

/// A graph-store field: the label that owns it and the node property it reads.
///
/// `field` and `property` differ only for namespaced ids (`payment_id` reads `id`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct GraphField {
    pub field: String,
    pub label: String,
    pub property: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaMappingModel {
    anchor_label: String,
    anchor_id_field: String,
    stores: BTreeMap<String, StoreKind>,
    graph_fields: BTreeMap<String, GraphField>,
    paths: BTreeMap<String, PathTemplate>,
    /// Graph labels in declaration order.
    labels: Vec<String>,
}

impl SchemaMappingModel {
    pub fn builder(
        anchor_label: impl Into<String>,
        anchor_id_field: impl Into<String>,
    ) -> SchemaMappingBuilder {
        SchemaMappingBuilder {
            model: SchemaMappingModel {
                anchor_label: anchor_label.into(),
                anchor_id_field: anchor_id_field.into(),
                stores: BTreeMap::new(),
                graph_fields: BTreeMap::new(),
                paths: BTreeMap::new(),
                labels: Vec::new(),
            },
            strict: false,
        }
    }

    pub fn anchor_label(&self) -> &str {
        &self.anchor_label
    }

    pub fn anchor_id_field(&self) -> &str {
        &self.anchor_id_field
    }

    pub fn is_anchor_label(&self, label: &str) -> bool {
        self.anchor_label == label
    }

    /// Owning store of `field`, `None` when the field is unroutable.
    pub fn store_of(&self, field: &str) -> Option<StoreKind> {
        self.stores.get(field).copied()
    }

    pub fn graph_field(&self, field: &str) -> Option<&GraphField> {
        self.graph_fields.get(field)
    }

    pub fn label_of(&self, field: &str) -> Option<&str> {
        self.graph_fields.get(field).map(|g| g.label.as_str())
    }

    pub fn path_for(&self, label: &str) -> Option<&PathTemplate> {
        self.paths.get(label)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn document_fields(&self) -> impl Iterator<Item = &str> {
        self.stores
            .iter()
            .filter(|(_, kind)| **kind == StoreKind::Document)
            .map(|(field, _)| field.as_str())
    }

    pub fn graph_fields_for(&self, label: &str) -> impl Iterator<Item = &GraphField> {
        let label = label.to_string();
        self.graph_fields
            .values()
            .filter(move |g| g.label == label)
    }

    pub fn field_count(&self) -> usize {
        self.stores.len()
    }

    /// JSON-friendly view of the routing table.
    pub fn summary(&self) -> MappingSummary {
        MappingSummary {
            anchor_label: self.anchor_label.clone(),
            anchor_id_field: self.anchor_id_field.clone(),
            document_fields: self.document_fields().map(str::to_string).collect(),
            graph_labels: self
                .labels
                .iter()
                .map(|label| LabelSummary {
                    label: label.clone(),
                    path: self.paths.get(label).map(|p| p.pattern().to_string()),
                    fields: self
                        .graph_fields_for(label)
                        .map(|g| g.field.clone())
                        .collect(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MappingSummary {
    pub anchor_label: String,
    pub anchor_id_field: String,
    pub document_fields: Vec<String>,
    pub graph_labels: Vec<LabelSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LabelSummary {
    pub label: String,
    pub path: Option<String>,
    pub fields: Vec<String>,
}

/// Accumulates declarations while a mapping document is walked.
///
/// The first declaration of a field wins. Later declarations are logged and
/// ignored, or rejected when the builder is strict.
#[derive(Debug)]
pub struct SchemaMappingBuilder {
    model: SchemaMappingModel,
    strict: bool,
}

impl SchemaMappingBuilder {
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn document_field(&mut self, field: &str) -> Result<&mut Self, SchemaParseError> {
        if self.claim(field, "document store")? {
            self.model
                .stores
                .insert(field.to_string(), StoreKind::Document);
        }
        Ok(self)
    }

    pub fn label(&mut self, label: &str) -> &mut Self {
        if !self.model.labels.iter().any(|l| l == label) {
            self.model.labels.push(label.to_string());
        }
        self
    }

    pub fn path(&mut self, path: PathTemplate) -> &mut Self {
        self.label(path.label());
        self.model.paths.insert(path.label().to_string(), path);
        self
    }

    pub fn graph_field(
        &mut self,
        label: &str,
        field: &str,
        property: &str,
    ) -> Result<&mut Self, SchemaParseError> {
        self.label(label);
        if self.claim(field, &format!("graph label `{}`", label))? {
            self.model
                .stores
                .insert(field.to_string(), StoreKind::Graph);
            self.model.graph_fields.insert(
                field.to_string(),
                GraphField {
                    field: field.to_string(),
                    label: label.to_string(),
                    property: property.to_string(),
                },
            );
        }
        Ok(self)
    }

    pub fn build(self) -> SchemaMappingModel {
        self.model
    }

    /// Returns `true` when `field` is not yet owned by any store.
    fn claim(&self, field: &str, owner: &str) -> Result<bool, SchemaParseError> {
        let Some(existing) = self.model.stores.get(field) else {
            return Ok(true);
        };
        // Both stores key the anchor by this field; it is never a duplicate.
        if field == self.model.anchor_id_field {
            log::debug!("Anchor id `{}` also declared by {}", field, owner);
            return Ok(false);
        }
        let first = match existing {
            StoreKind::Document => "document store".to_string(),
            StoreKind::Graph => format!(
                "graph label `{}`",
                self.model
                    .graph_fields
                    .get(field)
                    .map(|g| g.label.as_str())
                    .unwrap_or_default()
            ),
        };
        if self.strict {
            return Err(SchemaParseError::DuplicateField {
                field: field.to_string(),
                first,
                second: owner.to_string(),
            });
        }
        log::warn!(
            "Field `{}` declared by {} is already owned by {}; keeping the first declaration",
            field,
            owner,
            first
        );
        Ok(false)
    }
}
