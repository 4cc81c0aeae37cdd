use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryPlannerError {
    #[error("No fields provided")]
    EmptyFieldList,
}
