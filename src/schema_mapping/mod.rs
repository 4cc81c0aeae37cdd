pub mod compiler;
pub mod document;
pub mod errors;
pub mod model;
pub mod path_template;

pub use compiler::{CompilerOptions, SchemaCompiler};
pub use errors::SchemaParseError;
pub use model::{GraphField, MappingSummary, SchemaMappingModel, StoreKind};
pub use path_template::{Direction, Hop, NodeStep, PathTemplate};
