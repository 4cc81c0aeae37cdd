//! Field-list planning.
//!
//! Partitions a requested field list across the two stores using a compiled
//! [`SchemaMappingModel`]. Graph fields are grouped by label. All groupings are
//! ordered collections so that a plan, and therefore the rows it produces, is
//! the same for the same input.

use std::collections::{BTreeMap, BTreeSet};

use crate::schema_mapping::{SchemaMappingModel, StoreKind};

pub use errors::QueryPlannerError;

mod errors;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub document_fields: BTreeSet<String>,
    pub graph_fields_by_label: BTreeMap<String, BTreeSet<String>>,
    /// Requested fields absent from the mapping, in request order.
    pub unroutable: Vec<String>,
    /// The anchor id field was named explicitly.
    pub anchor_requested: bool,
}

impl Plan {
    pub fn has_document_fields(&self) -> bool {
        !self.document_fields.is_empty()
    }

    pub fn has_graph_fields(&self) -> bool {
        !self.graph_fields_by_label.is_empty()
    }

    /// Labels in execution order: the anchor label first, then the rest by name.
    ///
    /// Anchor-label fields are merged into the anchor row before any expansion,
    /// so every expanded row carries them.
    pub fn labels_in_order<'a>(&'a self, anchor_label: &'a str) -> impl Iterator<Item = &'a str> {
        let anchor = self
            .graph_fields_by_label
            .contains_key(anchor_label)
            .then_some(anchor_label);
        anchor.into_iter().chain(
            self.graph_fields_by_label
                .keys()
                .map(String::as_str)
                .filter(move |label| *label != anchor_label),
        )
    }

    /// True when at least one requested graph label is not the anchor label.
    pub fn expands(&self, anchor_label: &str) -> bool {
        self.graph_fields_by_label
            .keys()
            .any(|label| label != anchor_label)
    }
}

/// Build a [`Plan`] for `requested`.
///
/// Unmapped fields are dropped, never reported as errors. The anchor id field
/// is always part of every row and is not routed to a store.
pub fn plan_fields<S: AsRef<str>>(
    requested: &[S],
    model: &SchemaMappingModel,
) -> Result<Plan, QueryPlannerError> {
    if requested.is_empty() {
        return Err(QueryPlannerError::EmptyFieldList);
    }

    let mut plan = Plan::default();
    for field in requested.iter().map(AsRef::as_ref) {
        if field == model.anchor_id_field() {
            plan.anchor_requested = true;
            continue;
        }
        match model.store_of(field) {
            Some(StoreKind::Document) => {
                plan.document_fields.insert(field.to_string());
            }
            Some(StoreKind::Graph) => {
                // Every graph field has a label by construction.
                if let Some(label) = model.label_of(field) {
                    plan.graph_fields_by_label
                        .entry(label.to_string())
                        .or_default()
                        .insert(field.to_string());
                }
            }
            None => {
                if !plan.unroutable.iter().any(|f| f == field) {
                    plan.unroutable.push(field.to_string());
                }
            }
        }
    }

    if !plan.unroutable.is_empty() {
        log::debug!("Dropping unroutable fields: {:?}", plan.unroutable);
    }
    Ok(plan)
}
