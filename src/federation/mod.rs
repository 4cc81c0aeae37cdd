pub mod errors;
pub mod executor;
pub mod merger;
pub mod reader;

pub use errors::FederationError;
pub use executor::{ExecutorOptions, FederationExecutor};
pub use merger::ResultMerger;
pub use reader::{
    AnchorId, DocumentFilter, DocumentReader, GraphReader, Record, StoreError, Traversal,
};

/// One row of the final answer: always carries the anchor id field.
pub type ResultRow = Record;
