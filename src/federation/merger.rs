//! Combines graph-perspective rows with document-store partial records.

use std::collections::BTreeMap;

use super::reader::{AnchorId, Record};
use super::ResultRow;

#[derive(Debug, Clone)]
pub struct ResultMerger {
    anchor_id_field: String,
}

impl ResultMerger {
    pub fn new(anchor_id_field: impl Into<String>) -> Self {
        Self {
            anchor_id_field: anchor_id_field.into(),
        }
    }

    /// Overlay each row's document record onto it, keeping row order.
    ///
    /// Document fields win on key collision. Rows whose anchor has no document
    /// record pass through unchanged.
    pub fn merge(
        &self,
        graph_rows: Vec<Record>,
        documents: &BTreeMap<AnchorId, Record>,
    ) -> Vec<ResultRow> {
        graph_rows
            .into_iter()
            .map(|mut row| {
                let document = row
                    .get(&self.anchor_id_field)
                    .and_then(AnchorId::from_value)
                    .and_then(|anchor| documents.get(&anchor));
                if let Some(document) = document {
                    for (field, value) in document {
                        row.insert(field.clone(), value.clone());
                    }
                }
                row
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_merge_overlays_documents_in_row_order() {
        let rows = vec![
            record(json!({"account_id": "A1", "payment_amount": 10})),
            record(json!({"account_id": "A2"})),
            record(json!({"account_id": "A1", "payment_amount": 20})),
        ];
        let mut documents = BTreeMap::new();
        documents.insert(
            AnchorId::from("A1"),
            record(json!({"name": "Alice", "balance": 100})),
        );

        let merged = ResultMerger::new("account_id").merge(rows, &documents);
        assert_eq!(
            merged,
            vec![
                record(json!({"account_id": "A1", "payment_amount": 10, "name": "Alice", "balance": 100})),
                record(json!({"account_id": "A2"})),
                record(json!({"account_id": "A1", "payment_amount": 20, "name": "Alice", "balance": 100})),
            ]
        );
    }

    #[test]
    fn test_document_fields_win_collisions() {
        let rows = vec![record(json!({"account_id": "A1", "status": "graph"}))];
        let mut documents = BTreeMap::new();
        documents.insert(AnchorId::from("A1"), record(json!({"status": "document"})));

        let merged = ResultMerger::new("account_id").merge(rows, &documents);
        assert_eq!(merged[0]["status"], json!("document"));
    }

    #[test]
    fn test_numeric_row_anchor_matches_string_document_anchor() {
        let rows = vec![record(json!({"account_id": 7}))];
        let mut documents = BTreeMap::new();
        documents.insert(AnchorId::from("7"), record(json!({"name": "Grace"})));

        let merged = ResultMerger::new("account_id").merge(rows, &documents);
        assert_eq!(merged[0]["name"], json!("Grace"));
        assert_eq!(merged[0]["account_id"], json!(7));
    }
}
