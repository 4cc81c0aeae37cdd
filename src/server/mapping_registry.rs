use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::schema_mapping::{SchemaCompiler, SchemaMappingModel, SchemaParseError};

/// Holds the compiled mapping shared by all requests.
///
/// The slot starts out as whatever the first compile produced. A later reload
/// only replaces a good model with another good one; a failure is stored only
/// when there is no good model to keep.
pub struct MappingRegistry {
    path: PathBuf,
    compiler: SchemaCompiler,
    current: RwLock<Result<Arc<SchemaMappingModel>, SchemaParseError>>,
}

impl MappingRegistry {
    /// Compile `path` and build the registry. A compile failure is logged and
    /// kept, not returned.
    pub fn load<P: AsRef<Path>>(path: P, compiler: SchemaCompiler) -> Self {
        let path = path.as_ref().to_path_buf();
        let initial = compile(&compiler, &path);
        match &initial {
            Ok(model) => log::info!(
                "Loaded schema mapping from {}: {} fields, {} graph labels",
                path.display(),
                model.field_count(),
                model.labels().len()
            ),
            Err(e) => log::error!(
                "Failed to compile schema mapping {}: {}. Queries fail until a reload succeeds.",
                path.display(),
                e
            ),
        }
        Self {
            path,
            compiler,
            current: RwLock::new(initial),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn current(&self) -> Result<Arc<SchemaMappingModel>, SchemaParseError> {
        self.current.read().await.clone()
    }

    /// Recompile from disk. On failure the previous good model stays in place
    /// and the error is returned.
    pub async fn reload(&self) -> Result<Arc<SchemaMappingModel>, SchemaParseError> {
        let compiled = compile(&self.compiler, &self.path);
        let mut slot = self.current.write().await;
        match compiled {
            Ok(model) => {
                log::info!(
                    "Reloaded schema mapping from {}: {} fields",
                    self.path.display(),
                    model.field_count()
                );
                *slot = Ok(model.clone());
                Ok(model)
            }
            Err(e) => {
                log::warn!("Schema mapping reload failed: {}", e);
                if slot.is_err() {
                    *slot = Err(e.clone());
                } else {
                    log::warn!("Keeping the previously loaded schema mapping");
                }
                Err(e)
            }
        }
    }
}

fn compile(compiler: &SchemaCompiler, path: &Path) -> Result<Arc<SchemaMappingModel>, SchemaParseError> {
    compiler.compile_file(path).map(Arc::new)
}
