use thiserror::Error;

use super::reader::StoreError;
use crate::query_planner::QueryPlannerError;
use crate::schema_mapping::SchemaParseError;

/// Request-level failures. Unroutable fields and missing paths are not errors:
/// they degrade the result by omission.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FederationError {
    #[error("{0}")]
    Validation(#[from] QueryPlannerError),
    #[error("Schema mapping error: {0}")]
    Schema(#[from] SchemaParseError),
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

impl FederationError {
    pub fn is_caller_error(&self) -> bool {
        matches!(self, FederationError::Validation(_))
    }
}
