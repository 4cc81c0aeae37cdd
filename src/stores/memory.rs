//! In-memory stores.
//!
//! Back the server in fixture mode and the test suites. The graph store walks
//! compiled path hops directly instead of rendering Cypher.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::federation::{AnchorId, DocumentFilter, DocumentReader, GraphReader, Record, StoreError, Traversal};
use crate::schema_mapping::{Direction, GraphField, StoreKind};

/// On-disk fixture: documents plus a property graph.
///
/// ```json
/// {
///   "documents": [{"account_id": "A1", "name": "Alice"}],
///   "graph": {
///     "nodes": [{"id": "n1", "labels": ["Account"], "properties": {"account_id": "A1"}}],
///     "relationships": [{"from": "n1", "type": "MADE_PAYMENT", "to": "n2"}]
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreFixture {
    #[serde(default)]
    pub documents: Vec<Record>,
    #[serde(default)]
    pub graph: GraphFixture,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphFixture {
    #[serde(default)]
    pub nodes: Vec<NodeFixture>,
    #[serde(default)]
    pub relationships: Vec<RelationshipFixture>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeFixture {
    pub id: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub properties: Record,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelationshipFixture {
    pub from: String,
    #[serde(rename = "type")]
    pub rel_type: String,
    pub to: String,
}

impl StoreFixture {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn into_stores(
        self,
        anchor_label: &str,
        anchor_id_property: &str,
    ) -> anyhow::Result<(InMemoryDocumentStore, InMemoryGraphStore)> {
        let documents = InMemoryDocumentStore::new(anchor_id_property, self.documents);
        let mut graph = InMemoryGraphStore::new(anchor_label, anchor_id_property);
        for node in self.graph.nodes {
            graph.add_node(&node.id, node.labels, node.properties);
        }
        for rel in self.graph.relationships {
            graph.relate(&rel.from, &rel.rel_type, &rel.to)?;
        }
        Ok((documents, graph))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    anchor_id_field: String,
    records: Vec<Record>,
    calls: AtomicUsize,
}

impl InMemoryDocumentStore {
    pub fn new(anchor_id_field: &str, records: Vec<Record>) -> Self {
        Self {
            anchor_id_field: anchor_id_field.to_string(),
            records,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DocumentReader for InMemoryDocumentStore {
    async fn fetch_projected(
        &self,
        fields: &[String],
        filter: &DocumentFilter,
    ) -> Result<Vec<Record>, StoreError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let projected = self
            .records
            .iter()
            .filter(|record| match filter {
                DocumentFilter::All => true,
                DocumentFilter::Anchors(anchors) => record
                    .get(&self.anchor_id_field)
                    .and_then(AnchorId::from_value)
                    .is_some_and(|id| anchors.contains(&id)),
            })
            .map(|record| {
                fields
                    .iter()
                    .filter_map(|f| record.get(f).map(|v| (f.clone(), v.clone())))
                    .collect()
            })
            .collect();
        Ok(projected)
    }
}

#[derive(Debug, Clone)]
struct Node {
    labels: Vec<String>,
    properties: Record,
}

#[derive(Debug, Clone)]
struct Edge {
    from: usize,
    rel_type: String,
    to: usize,
}

#[derive(Debug)]
pub struct InMemoryGraphStore {
    anchor_label: String,
    anchor_id_property: String,
    nodes: Vec<Node>,
    node_index: HashMap<String, usize>,
    edges: Vec<Edge>,
    calls: AtomicUsize,
}

impl InMemoryGraphStore {
    pub fn new(anchor_label: &str, anchor_id_property: &str) -> Self {
        Self {
            anchor_label: anchor_label.to_string(),
            anchor_id_property: anchor_id_property.to_string(),
            nodes: Vec::new(),
            node_index: HashMap::new(),
            edges: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Adds a node under the fixture key `key`, replacing any earlier node with that key.
    pub fn add_node(&mut self, key: &str, labels: Vec<String>, properties: Record) -> &mut Self {
        let node = Node { labels, properties };
        match self.node_index.get(key).copied() {
            Some(idx) => self.nodes[idx] = node,
            None => {
                self.node_index.insert(key.to_string(), self.nodes.len());
                self.nodes.push(node);
            }
        }
        self
    }

    pub fn relate(&mut self, from: &str, rel_type: &str, to: &str) -> anyhow::Result<&mut Self> {
        let from = *self
            .node_index
            .get(from)
            .ok_or_else(|| anyhow::anyhow!("unknown node `{}`", from))?;
        let to = *self
            .node_index
            .get(to)
            .ok_or_else(|| anyhow::anyhow!("unknown node `{}`", to))?;
        self.edges.push(Edge {
            from,
            rel_type: rel_type.to_string(),
            to,
        });
        Ok(self)
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    fn has_label(&self, idx: usize, label: &str) -> bool {
        self.nodes[idx].labels.iter().any(|l| l == label)
    }

    fn anchor_nodes(&self, anchor: Option<&AnchorId>) -> Vec<usize> {
        (0..self.nodes.len())
            .filter(|&idx| self.has_label(idx, &self.anchor_label))
            .filter(|&idx| match anchor {
                None => true,
                Some(anchor) => self.nodes[idx]
                    .properties
                    .get(&self.anchor_id_property)
                    .and_then(AnchorId::from_value)
                    .is_some_and(|id| &id == anchor),
            })
            .collect()
    }

    fn step(&self, from: usize, rel_type: Option<&str>, direction: Direction) -> Vec<usize> {
        let type_matches = |edge: &Edge| rel_type.is_none_or(|t| edge.rel_type == t);
        let mut next = Vec::new();
        for edge in self.edges.iter().filter(|e| type_matches(e)) {
            if matches!(direction, Direction::Outgoing | Direction::Either) && edge.from == from {
                next.push(edge.to);
            }
            if matches!(direction, Direction::Incoming | Direction::Either) && edge.to == from {
                next.push(edge.from);
            }
        }
        next
    }

    fn project(&self, idx: usize, fields: &[GraphField]) -> Record {
        let properties = &self.nodes[idx].properties;
        fields
            .iter()
            .map(|f| {
                (
                    f.field.clone(),
                    properties.get(&f.property).cloned().unwrap_or(Value::Null),
                )
            })
            .collect()
    }
}

#[async_trait]
impl GraphReader for InMemoryGraphStore {
    async fn run_traversal(
        &self,
        traversal: &Traversal,
        anchor: Option<AnchorId>,
        fields: &[GraphField],
    ) -> Result<Vec<Record>, StoreError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let targets: Vec<usize> = match traversal {
            Traversal::AnchorEnumeration => self.anchor_nodes(None),
            Traversal::AnchorNode => {
                let anchor = anchor.ok_or_else(|| {
                    StoreError::invalid_response(StoreKind::Graph, "anchor-node read needs an anchor id")
                })?;
                self.anchor_nodes(Some(&anchor)).into_iter().take(1).collect()
            }
            Traversal::Path(path) => {
                let anchor = anchor.ok_or_else(|| {
                    StoreError::invalid_response(StoreKind::Graph, "path traversal needs an anchor id")
                })?;
                let mut frontier = self.anchor_nodes(Some(&anchor));
                for hop in path.hops() {
                    frontier = frontier
                        .into_iter()
                        .flat_map(|idx| self.step(idx, hop.rel_type.as_deref(), hop.direction))
                        .filter(|&idx| {
                            hop.node
                                .label
                                .as_deref()
                                .is_none_or(|label| self.has_label(idx, label))
                        })
                        .collect();
                }
                frontier
            }
        };
        Ok(targets
            .into_iter()
            .map(|idx| self.project(idx, fields))
            .collect())
    }
}
