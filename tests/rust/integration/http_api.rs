use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use fedquery::config::ServerConfig;
use fedquery::federation::{AnchorId, GraphReader, Record, StoreError, Traversal};
use fedquery::schema_mapping::{GraphField, SchemaCompiler, StoreKind};
use fedquery::server::{build_router, AppState, MappingRegistry};
use serde_json::{json, Value};
use tempfile::NamedTempFile;
use tower::ServiceExt;

use super::common::{stores, MAPPING};

fn mapping_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn app(mapping: &NamedTempFile) -> Router {
    let (documents, graph) = stores();
    build_router(AppState {
        registry: Arc::new(MappingRegistry::load(mapping.path(), SchemaCompiler::default())),
        documents,
        graph,
        config: ServerConfig::default(),
    })
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    send_raw(app, method, uri, body.map(|b| b.to_string()).unwrap_or_default()).await
}

async fn send_raw(app: &Router, method: &str, uri: &str, body: String) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn test_health() {
    let mapping = mapping_file(MAPPING);
    let (status, body) = send(&app(&mapping), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("healthy"));
}

#[tokio::test]
async fn test_query_data_returns_results() {
    let mapping = mapping_file(MAPPING);
    let (status, body) = send(
        &app(&mapping),
        "POST",
        "/query_data",
        Some(json!({"fields": ["name", "balance", "payment_amount"]})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"results": [
            {"account_id": "A1", "payment_amount": 10, "name": "Alice", "balance": 100},
            {"account_id": "A1", "payment_amount": 20, "name": "Alice", "balance": 100}
        ]})
    );
}

#[tokio::test]
async fn test_empty_or_missing_fields_are_rejected() {
    let mapping = mapping_file(MAPPING);
    let app = app(&mapping);

    let (status, body) = send(&app, "POST", "/query_data", Some(json!({"fields": []}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "No fields provided"}));

    let (status, body) = send(&app, "POST", "/query_data", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "No fields provided"}));
}

#[tokio::test]
async fn test_malformed_bodies_get_json_errors() {
    let mapping = mapping_file(MAPPING);
    let app = app(&mapping);

    let (status, body) = send_raw(&app, "POST", "/query_data", "{not json".to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = send(&app, "POST", "/query_data", Some(json!({"fields": 42}))).await;
    assert!(status.is_client_error());
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_anchor_ids_limit_the_answer() {
    let mapping = mapping_file(MAPPING);
    let app = app(&mapping);

    let (status, body) = send(
        &app,
        "POST",
        "/query_data",
        Some(json!({"fields": ["name"], "anchor_ids": ["A2"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"results": [{"account_id": "A2", "name": "Bob"}]}));

    let (status, body) = send(
        &app,
        "POST",
        "/query_data",
        Some(json!({"fields": ["payment_amount"], "anchor_ids": ["A3", null]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"results": [{"account_id": "A3", "payment_amount": 5}]})
    );
}

#[tokio::test]
async fn test_broken_mapping_fails_queries_until_reload() {
    let mapping = mapping_file("<xs:schema><xs:element name=\"MongoDBUser\">");
    let app = app(&mapping);

    let (status, body) = send(&app, "POST", "/query_data", Some(json!({"fields": ["name"]}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().starts_with("Schema mapping error"));

    std::fs::write(mapping.path(), MAPPING).unwrap();
    let (status, body) = send(&app, "POST", "/mapping/reload", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["graph_labels"], json!(4));

    let (status, body) = send(&app, "POST", "/query_data", Some(json!({"fields": ["name"]}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_failed_reload_keeps_serving_previous_mapping() {
    let mapping = mapping_file(MAPPING);
    let app = app(&mapping);

    std::fs::write(mapping.path(), "<xs:schema>").unwrap();
    let (status, body) = send(&app, "POST", "/mapping/reload", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());

    let (status, body) = send(&app, "GET", "/mapping", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["anchor_label"], json!("Account"));
    assert_eq!(body["document_fields"], json!(["account_id", "balance", "name"]));
    let payment = body["graph_labels"]
        .as_array()
        .unwrap()
        .iter()
        .find(|l| l["label"] == json!("Payment"))
        .cloned()
        .unwrap();
    assert_eq!(payment["path"], json!("(a:Account)-[:MADE_PAYMENT]->(p:Payment)"));
    assert_eq!(payment["fields"], json!(["payment_amount", "payment_id"]));
}

struct UnreachableGraph;

#[async_trait]
impl GraphReader for UnreachableGraph {
    async fn run_traversal(
        &self,
        _traversal: &Traversal,
        _anchor: Option<AnchorId>,
        _fields: &[GraphField],
    ) -> Result<Vec<Record>, StoreError> {
        Err(StoreError::unavailable(StoreKind::Graph, "connection refused"))
    }
}

#[tokio::test]
async fn test_store_failure_is_service_unavailable() {
    let mapping = mapping_file(MAPPING);
    let (documents, _) = stores();
    let app = build_router(AppState {
        registry: Arc::new(MappingRegistry::load(mapping.path(), SchemaCompiler::default())),
        documents,
        graph: Arc::new(UnreachableGraph),
        config: ServerConfig::default(),
    });

    let (status, body) = send(
        &app,
        "POST",
        "/query_data",
        Some(json!({"fields": ["name", "payment_amount"]})),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("connection refused"));
    assert!(body.get("results").is_none());
}
