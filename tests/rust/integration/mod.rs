//! Integration tests - the compiled mapping, the executor and the HTTP surface
//! wired together over in-memory stores.

mod common;
mod federation_scenarios;
mod http_api;
