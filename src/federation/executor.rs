//! Cross-store federation.
//!
//! Execution of one request:
//!
//! 1. Plan the requested fields ([`plan_fields`]).
//! 2. Project document fields (plus the anchor id) from the document store.
//!    Anchors seen there are the anchors in scope.
//! 3. If that yields no anchors and graph fields were requested, enumerate
//!    anchors from the graph store instead.
//! 4. Per anchor, walk the requested labels: anchor-label fields merge into the
//!    anchor row, labels with a path expand into one row per related node,
//!    labels without a path emit the anchor row as it stands.
//! 5. Overlay document records onto the rows ([`ResultMerger`]).
//!
//! [`FederationExecutor::execute_scoped`] restricts both anchor sources to a
//! caller-supplied set of anchors.
//!
//! Anchors are expanded concurrently through an ordered buffer, so the output
//! order matches sequential execution. Any store failure fails the request.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt, TryStreamExt};
use serde_json::Value;

use super::errors::FederationError;
use super::merger::ResultMerger;
use super::reader::{
    AnchorId, DocumentFilter, DocumentReader, GraphReader, Record, StoreError, Traversal,
};
use super::ResultRow;
use crate::query_planner::{plan_fields, Plan};
use crate::schema_mapping::{GraphField, SchemaMappingModel, StoreKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorOptions {
    /// Upper bound for any single store call.
    pub store_timeout: Duration,
    /// Anchors expanded at the same time.
    pub max_concurrent_traversals: usize,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(10),
            max_concurrent_traversals: 8,
        }
    }
}

/// How one requested label is read for each anchor.
#[derive(Debug, Clone)]
enum LabelStep {
    AnchorNode { fields: Vec<GraphField> },
    Expand { traversal: Traversal, fields: Vec<GraphField> },
    MissingPath { label: String },
}

pub struct FederationExecutor {
    model: Arc<SchemaMappingModel>,
    documents: Arc<dyn DocumentReader>,
    graph: Arc<dyn GraphReader>,
    options: ExecutorOptions,
}

impl FederationExecutor {
    pub fn new(
        model: Arc<SchemaMappingModel>,
        documents: Arc<dyn DocumentReader>,
        graph: Arc<dyn GraphReader>,
        options: ExecutorOptions,
    ) -> Self {
        Self {
            model,
            documents,
            graph,
            options,
        }
    }

    pub fn model(&self) -> &SchemaMappingModel {
        &self.model
    }

    pub async fn execute<S: AsRef<str>>(
        &self,
        requested: &[S],
    ) -> Result<Vec<ResultRow>, FederationError> {
        self.execute_scoped(requested, None).await
    }

    /// Same as [`execute`](Self::execute), limited to `scope` when given.
    /// Anchors outside the scope never reach the result.
    pub async fn execute_scoped<S: AsRef<str>>(
        &self,
        requested: &[S],
        scope: Option<&[AnchorId]>,
    ) -> Result<Vec<ResultRow>, FederationError> {
        let plan = plan_fields(requested, &self.model)?;
        log::debug!(
            "Plan: {} document fields, graph labels {:?}, {} unroutable",
            plan.document_fields.len(),
            plan.graph_fields_by_label.keys().collect::<Vec<_>>(),
            plan.unroutable.len()
        );

        let documents = if self.needs_documents(&plan) {
            let filter = match scope {
                Some(anchors) => DocumentFilter::Anchors(anchors.to_vec()),
                None => DocumentFilter::All,
            };
            self.fetch_documents(&plan, &filter).await?
        } else {
            BTreeMap::new()
        };

        let anchors: Vec<AnchorId> = if !documents.is_empty() {
            documents.keys().cloned().collect()
        } else if plan.has_graph_fields() || plan.anchor_requested {
            log::info!("No anchors from the document store; enumerating anchors from the graph store");
            let mut anchors = self.enumerate_anchors().await?;
            if let Some(scope) = scope {
                anchors.retain(|anchor| scope.contains(anchor));
            }
            anchors
        } else {
            Vec::new()
        };

        let steps = self.label_steps(&plan);
        let expands = plan.expands(self.model.anchor_label());
        let limit = self.options.max_concurrent_traversals.max(1);

        let per_anchor: Vec<Vec<Record>> = stream::iter(anchors)
            .map(|anchor| self.expand_anchor(anchor, &steps, expands))
            .buffered(limit)
            .try_collect()
            .await?;
        let graph_rows: Vec<Record> = per_anchor.into_iter().flatten().collect();

        let rows = ResultMerger::new(self.model.anchor_id_field()).merge(graph_rows, &documents);
        log::debug!("Federated query produced {} rows", rows.len());
        Ok(rows)
    }

    /// Document presence is authoritative for anchors whenever a document field
    /// was asked for. A bare anchor-id request also reads the document store
    /// when that is where the anchor id lives.
    fn needs_documents(&self, plan: &Plan) -> bool {
        plan.has_document_fields()
            || (plan.anchor_requested
                && !plan.has_graph_fields()
                && self.model.store_of(self.model.anchor_id_field()) != Some(StoreKind::Graph))
    }

    async fn fetch_documents(
        &self,
        plan: &Plan,
        filter: &DocumentFilter,
    ) -> Result<BTreeMap<AnchorId, Record>, FederationError> {
        let anchor_field = self.model.anchor_id_field();
        let mut projection: Vec<String> = plan.document_fields.iter().cloned().collect();
        projection.push(anchor_field.to_string());

        let records = self
            .timed(
                StoreKind::Document,
                self.documents
                    .fetch_projected(&projection, filter),
            )
            .await?;

        let mut documents = BTreeMap::new();
        for record in records {
            let Some(anchor) = record.get(anchor_field).and_then(AnchorId::from_value) else {
                continue;
            };
            let partial: Record = plan
                .document_fields
                .iter()
                .map(|field| {
                    (
                        field.clone(),
                        record.get(field).cloned().unwrap_or(Value::Null),
                    )
                })
                .collect();
            if documents.insert(anchor.clone(), partial).is_some() {
                log::debug!("Document store returned anchor {} more than once", anchor);
            }
        }
        Ok(documents)
    }

    async fn enumerate_anchors(&self) -> Result<Vec<AnchorId>, FederationError> {
        let anchor_field = self.model.anchor_id_field();
        let projection = [GraphField {
            field: anchor_field.to_string(),
            label: self.model.anchor_label().to_string(),
            property: anchor_field.to_string(),
        }];
        let records = self
            .timed(
                StoreKind::Graph,
                self.graph
                    .run_traversal(&Traversal::AnchorEnumeration, None, &projection),
            )
            .await?;

        let mut anchors: Vec<AnchorId> = records
            .iter()
            .filter_map(|record| record.get(anchor_field).and_then(AnchorId::from_value))
            .collect();
        anchors.sort();
        anchors.dedup();
        Ok(anchors)
    }

    fn label_steps(&self, plan: &Plan) -> Vec<LabelStep> {
        plan.labels_in_order(self.model.anchor_label())
            .map(|label| {
                let fields: Vec<GraphField> = plan.graph_fields_by_label[label]
                    .iter()
                    .filter_map(|field| self.model.graph_field(field).cloned())
                    .collect();
                if self.model.is_anchor_label(label) {
                    LabelStep::AnchorNode { fields }
                } else if let Some(path) = self.model.path_for(label) {
                    LabelStep::Expand {
                        traversal: Traversal::Path(path.clone()),
                        fields,
                    }
                } else {
                    LabelStep::MissingPath {
                        label: label.to_string(),
                    }
                }
            })
            .collect()
    }

    async fn expand_anchor(
        &self,
        anchor: AnchorId,
        steps: &[LabelStep],
        expands: bool,
    ) -> Result<Vec<Record>, FederationError> {
        let mut row = Record::new();
        row.insert(
            self.model.anchor_id_field().to_string(),
            anchor.value().clone(),
        );
        let mut rows = Vec::new();

        for step in steps {
            match step {
                LabelStep::AnchorNode { fields } => {
                    let records = self
                        .timed(
                            StoreKind::Graph,
                            self.graph.run_traversal(
                                &Traversal::AnchorNode,
                                Some(anchor.clone()),
                                fields,
                            ),
                        )
                        .await?;
                    if let Some(record) = records.into_iter().next() {
                        overlay(&mut row, &record, fields);
                    }
                }
                LabelStep::Expand { traversal, fields } => {
                    let records = self
                        .timed(
                            StoreKind::Graph,
                            self.graph
                                .run_traversal(traversal, Some(anchor.clone()), fields),
                        )
                        .await?;
                    for record in records {
                        let mut expanded = row.clone();
                        overlay(&mut expanded, &record, fields);
                        rows.push(expanded);
                    }
                }
                LabelStep::MissingPath { label } => {
                    log::warn!(
                        "No traversal path for label `{}`; anchor {} keeps its row without those fields",
                        label,
                        anchor
                    );
                    rows.push(row.clone());
                }
            }
        }

        if !expands {
            rows.push(row);
        }
        Ok(rows)
    }

    async fn timed<T, F>(&self, store: StoreKind, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.options.store_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                log::error!("{} call failed: {}", store, e);
                Err(e)
            }
            Err(_) => {
                let millis = self.options.store_timeout.as_millis() as u64;
                log::error!("{} call timed out after {}ms", store, millis);
                Err(StoreError::Timeout { store, millis })
            }
        }
    }
}

fn overlay(row: &mut Record, record: &Record, fields: &[GraphField]) {
    for field in fields {
        row.insert(
            field.field.clone(),
            record.get(&field.field).cloned().unwrap_or(Value::Null),
        );
    }
}
