//! # Schema Mapping Error Types
//!
//! Errors raised while compiling a schema-mapping document. Every variant is
//! fatal for the compilation: there is no partially compiled mapping.
//!
//! ## Error Categories
//!
//! - **Document Errors**: the XML itself is malformed or unreadable
//! - **Structure Errors**: a required container or `name` attribute is missing
//! - **Path Errors**: a `path:` annotation does not satisfy the traversal grammar
//!   or the node-variable convention
//! - **Ownership Errors**: a field is declared twice (strict mode only)

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchemaParseError {
    #[error("Failed to read mapping document `{path}`: {error}")]
    Io { path: String, error: String },
    #[error("Malformed mapping document at byte {position}: {error}")]
    Xml { position: usize, error: String },
    #[error("Mapping document is missing `{element}` under `{parent}`")]
    MissingElement { element: String, parent: String },
    #[error("Element `{element}` under `{parent}` has no `name` attribute")]
    MissingAttribute { element: String, parent: String },
    #[error("Invalid path for label `{label}`: {message}")]
    InvalidPath { label: String, message: String },
    #[error("Field `{field}` is declared by both {first} and {second}")]
    DuplicateField {
        field: String,
        first: String,
        second: String,
    },
}

impl SchemaParseError {
    pub fn missing_element(element: impl Into<String>, parent: impl Into<String>) -> Self {
        SchemaParseError::MissingElement {
            element: element.into(),
            parent: parent.into(),
        }
    }

    pub fn invalid_path(label: impl Into<String>, message: impl Into<String>) -> Self {
        SchemaParseError::InvalidPath {
            label: label.into(),
            message: message.into(),
        }
    }
}
