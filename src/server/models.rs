use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::federation::ResultRow;

#[derive(Debug, Default, Deserialize, Validate)]
pub struct QueryDataRequest {
    /// Requested field names; a missing key is treated as an empty list.
    #[serde(default)]
    #[validate(length(min = 1, message = "No fields provided"))]
    pub fields: Vec<String>,
    /// Optional anchor ids the answer is limited to. Null or empty ids match
    /// nothing.
    #[serde(default)]
    pub anchor_ids: Option<Vec<Value>>,
}

#[derive(Debug, Serialize)]
pub struct QueryDataResponse {
    pub results: Vec<ResultRow>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub message: String,
    pub fields: usize,
    pub graph_labels: usize,
}
