//! Store adapters implementing the federation read traits.

pub mod clickhouse_document;
pub mod memory;
pub mod neo4j_http;

pub use clickhouse_document::ClickHouseDocumentReader;
pub use memory::{InMemoryDocumentStore, InMemoryGraphStore, StoreFixture};
pub use neo4j_http::Neo4jHttpGraphReader;
