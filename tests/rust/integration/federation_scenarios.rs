use fedquery::federation::FederationError;
use fedquery::schema_mapping::StoreKind;
use serde_json::json;

use super::common::{harness, model, row};

#[tokio::test]
async fn test_empty_field_list_is_rejected_without_store_access() {
    let h = harness();
    let requested: Vec<String> = Vec::new();
    let err = h.executor.execute(requested.as_slice()).await.unwrap_err();

    assert!(matches!(err, FederationError::Validation(_)));
    assert_eq!(err.to_string(), "No fields provided");
    assert_eq!(h.documents.call_count(), 0);
    assert_eq!(h.graph.call_count(), 0);
}

#[tokio::test]
async fn test_document_only_request() {
    let h = harness();
    let rows = h.executor.execute(&["name"]).await.unwrap();

    assert_eq!(
        rows,
        vec![
            row(json!({"account_id": "A1", "name": "Alice"})),
            row(json!({"account_id": "A2", "name": "Bob"})),
        ]
    );
    assert_eq!(h.documents.call_count(), 1);
    assert_eq!(h.graph.call_count(), 0);
}

#[tokio::test]
async fn test_payments_expand_one_row_per_payment() {
    let h = harness();
    let rows = h
        .executor
        .execute(&["name", "balance", "payment_amount"])
        .await
        .unwrap();

    assert_eq!(
        rows,
        vec![
            row(json!({"account_id": "A1", "name": "Alice", "balance": 100, "payment_amount": 10})),
            row(json!({"account_id": "A1", "name": "Alice", "balance": 100, "payment_amount": 20})),
        ]
    );
}

#[tokio::test]
async fn test_graph_only_request_enumerates_anchors_from_graph() {
    let h = harness();
    let rows = h.executor.execute(&["payment_amount"]).await.unwrap();

    assert_eq!(
        rows,
        vec![
            row(json!({"account_id": "A1", "payment_amount": 10})),
            row(json!({"account_id": "A1", "payment_amount": 20})),
            row(json!({"account_id": "A3", "payment_amount": 5})),
        ]
    );
    assert_eq!(h.documents.call_count(), 0);
}

#[tokio::test]
async fn test_label_without_path_keeps_anchor_rows() {
    let h = harness();
    let rows = h
        .executor
        .execute(&["name", "merchant_name"])
        .await
        .unwrap();

    assert_eq!(
        rows,
        vec![
            row(json!({"account_id": "A1", "name": "Alice"})),
            row(json!({"account_id": "A2", "name": "Bob"})),
        ]
    );
    assert!(rows.iter().all(|r| !r.contains_key("merchant_name")));
}

#[tokio::test]
async fn test_unrouted_fields_never_appear() {
    let h = harness();
    let rows = h
        .executor
        .execute(&["name", "ssn", "payment_amount", "favourite_colour"])
        .await
        .unwrap();

    assert!(!rows.is_empty());
    for r in &rows {
        assert!(!r.contains_key("ssn"));
        assert!(!r.contains_key("favourite_colour"));
    }
}

#[tokio::test]
async fn test_anchor_label_fields_reach_every_expanded_row() {
    let h = harness();
    let rows = h
        .executor
        .execute(&["name", "risk_score", "payment_amount"])
        .await
        .unwrap();

    assert_eq!(rows.len(), 2);
    for r in &rows {
        assert_eq!(r["account_id"], json!("A1"));
        assert_eq!(r["name"], json!("Alice"));
        assert_eq!(r["risk_score"], json!(7));
    }
}

#[tokio::test]
async fn test_labels_are_not_cross_multiplied() {
    let h = harness();
    let rows = h
        .executor
        .execute(&["name", "payment_amount", "device_type"])
        .await
        .unwrap();

    assert_eq!(
        rows,
        vec![
            row(json!({"account_id": "A1", "payment_amount": 10, "name": "Alice"})),
            row(json!({"account_id": "A1", "payment_amount": 20, "name": "Alice"})),
            row(json!({"account_id": "A2", "device_type": "mobile", "name": "Bob"})),
        ]
    );
}

#[tokio::test]
async fn test_namespaced_id_reads_the_node_id_property() {
    let h = harness();
    let rows = h.executor.execute(&["payment_id"]).await.unwrap();
    let ids: Vec<_> = rows.iter().map(|r| r["payment_id"].clone()).collect();
    assert_eq!(ids, vec![json!("P1"), json!("P2"), json!("P3")]);
}

#[tokio::test]
async fn test_bare_anchor_id_request_lists_document_anchors() {
    let h = harness();
    let rows = h.executor.execute(&["account_id"]).await.unwrap();
    assert_eq!(
        rows,
        vec![row(json!({"account_id": "A1"})), row(json!({"account_id": "A2"}))]
    );
    assert_eq!(h.graph.call_count(), 0);
}

#[tokio::test]
async fn test_results_do_not_depend_on_request_order() {
    let first = harness()
        .executor
        .execute(&["payment_amount", "balance", "device_type", "name"])
        .await
        .unwrap();
    let second = harness()
        .executor
        .execute(&["name", "device_type", "balance", "payment_amount", "name"])
        .await
        .unwrap();
    assert_eq!(first, second);

    let again = harness()
        .executor
        .execute(&["payment_amount", "balance", "device_type", "name"])
        .await
        .unwrap();
    assert_eq!(first, again);
}

#[test]
fn test_every_mapped_field_has_exactly_one_store() {
    let model = model();
    for field in ["account_id", "name", "balance"] {
        assert_eq!(model.store_of(field), Some(StoreKind::Document), "{}", field);
    }
    for field in ["risk_score", "payment_amount", "payment_id", "device_type", "merchant_name"] {
        assert_eq!(model.store_of(field), Some(StoreKind::Graph), "{}", field);
    }
    assert_eq!(model.store_of("id"), None);
}
