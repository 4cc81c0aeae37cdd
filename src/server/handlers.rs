use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use validator::Validate;

use super::models::{ErrorResponse, QueryDataRequest, QueryDataResponse, ReloadResponse};
use super::AppState;
use crate::federation::{AnchorId, FederationError, FederationExecutor};
use crate::query_planner::QueryPlannerError;
use crate::schema_mapping::{MappingSummary, SchemaParseError};

type HandlerError = (StatusCode, Json<ErrorResponse>);

/// Simple health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "fedquery",
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn query_data_handler(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<QueryDataRequest>, JsonRejection>,
) -> Result<Json<QueryDataResponse>, HandlerError> {
    let start_time = Instant::now();
    let Json(payload) = payload.map_err(rejection_error)?;

    if payload.validate().is_err() {
        return Err(federation_error(FederationError::Validation(
            QueryPlannerError::EmptyFieldList,
        )));
    }

    let model = app_state
        .registry
        .current()
        .await
        .map_err(|e| federation_error(FederationError::Schema(e)))?;

    let executor = FederationExecutor::new(
        model,
        app_state.documents.clone(),
        app_state.graph.clone(),
        app_state.config.executor_options(),
    );
    let scope: Option<Vec<AnchorId>> = payload
        .anchor_ids
        .as_ref()
        .map(|ids| ids.iter().filter_map(AnchorId::from_value).collect());
    let results = executor
        .execute_scoped(payload.fields.as_slice(), scope.as_deref())
        .await
        .map_err(federation_error)?;

    log::info!(
        "query_data: {} fields -> {} rows in {:.3}ms",
        payload.fields.len(),
        results.len(),
        start_time.elapsed().as_secs_f64() * 1000.0
    );
    Ok(Json(QueryDataResponse { results }))
}

pub async fn get_mapping_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<MappingSummary>, HandlerError> {
    let model = app_state.registry.current().await.map_err(schema_error)?;
    Ok(Json(model.summary()))
}

pub async fn reload_mapping_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<ReloadResponse>, HandlerError> {
    let model = app_state.registry.reload().await.map_err(schema_error)?;
    Ok(Json(ReloadResponse {
        message: format!(
            "Schema mapping reloaded from {}",
            app_state.registry.path().display()
        ),
        fields: model.field_count(),
        graph_labels: model.labels().len(),
    }))
}

/// Malformed bodies get the same `{"error": ...}` shape as every other failure.
fn rejection_error(rejection: JsonRejection) -> HandlerError {
    log::debug!("Rejected request body: {}", rejection.body_text());
    (
        rejection.status(),
        Json(ErrorResponse::new(rejection.body_text())),
    )
}

fn schema_error(e: SchemaParseError) -> HandlerError {
    federation_error(FederationError::Schema(e))
}

/// Caller errors are 400, mapping errors 500, store failures 503.
pub(crate) fn federation_error(e: FederationError) -> HandlerError {
    let status = match &e {
        FederationError::Validation(_) => StatusCode::BAD_REQUEST,
        FederationError::Schema(_) => StatusCode::INTERNAL_SERVER_ERROR,
        FederationError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    if status.is_server_error() {
        log::error!("Request failed: {}", e);
    }
    (status, Json(ErrorResponse::new(e.to_string())))
}
