//! fedquery - field-level federation over a document store and a graph store
//!
//! A schema-mapping document declares which store owns each field. This crate:
//! - compiles that document into a routing table
//! - partitions a requested field list across the stores
//! - reads both stores and expands one row per related graph node
//! - merges the partial records by account identity

pub mod config;
pub mod federation;
pub mod query_planner;
pub mod schema_mapping;
pub mod server;
pub mod stores;
