use std::sync::Arc;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use handlers::{get_mapping_handler, health_check, query_data_handler, reload_mapping_handler};
use tokio::net::TcpListener;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, limit::RequestBodyLimitLayer};

use crate::config::ServerConfig;
use crate::federation::{DocumentReader, GraphReader};
use crate::schema_mapping::SchemaCompiler;
use crate::stores::{ClickHouseDocumentReader, Neo4jHttpGraphReader, StoreFixture};

pub mod handlers;
pub mod mapping_registry;
pub mod models;

pub use mapping_registry::MappingRegistry;

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<MappingRegistry>,
    pub documents: Arc<dyn DocumentReader>,
    pub graph: Arc<dyn GraphReader>,
    pub config: ServerConfig,
}

impl AppState {
    /// Compile the mapping and open both stores as configured.
    pub fn from_config(config: ServerConfig) -> anyhow::Result<Self> {
        let (documents, graph) = build_stores(&config)?;
        let registry = MappingRegistry::load(
            &config.mapping_path,
            SchemaCompiler::new(config.compiler_options()),
        );
        Ok(Self {
            registry: Arc::new(registry),
            documents,
            graph,
            config,
        })
    }
}

/// Store readers for `config`: a fixture file backs both stores, otherwise
/// both the ClickHouse and the Neo4j URL must be set.
pub fn build_stores(
    config: &ServerConfig,
) -> anyhow::Result<(Arc<dyn DocumentReader>, Arc<dyn GraphReader>)> {
    if let Some(fixture_path) = config.fixture_path.as_deref() {
        let fixture = StoreFixture::from_json_file(fixture_path)
            .with_context(|| format!("failed to load store fixture {}", fixture_path))?;
        let (documents, graph) =
            fixture.into_stores(&config.anchor_label, &config.anchor_id_field)?;
        log::info!("Using in-memory stores from fixture {}", fixture_path);
        return Ok((Arc::new(documents), Arc::new(graph)));
    }

    let documents = ClickHouseDocumentReader::from_config(config).context(
        "no document store configured (set FEDQUERY_CLICKHOUSE_URL or FEDQUERY_FIXTURE_PATH)",
    )?;
    let graph = Neo4jHttpGraphReader::from_config(config)?.context(
        "no graph store configured (set FEDQUERY_NEO4J_URL or FEDQUERY_FIXTURE_PATH)",
    )?;
    Ok((Arc::new(documents), Arc::new(graph)))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/query_data", post(query_data_handler))
        .route("/mapping", get(get_mapping_handler))
        .route("/mapping/reload", post(reload_mapping_handler))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CatchPanicLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

pub async fn run_with_config(config: ServerConfig) -> anyhow::Result<()> {
    log::info!(
        "Server configuration: http={}:{}, mapping={}",
        config.http_host,
        config.http_port,
        config.mapping_path
    );

    let http_bind_address = format!("{}:{}", config.http_host, config.http_port);
    let app = build_router(AppState::from_config(config)?);

    let http_listener = TcpListener::bind(&http_bind_address)
        .await
        .with_context(|| format!("failed to bind HTTP listener to {}", http_bind_address))?;
    log::info!("Successfully bound HTTP listener to {}", http_bind_address);

    axum::serve(http_listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    log::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => log::info!("Received SIGTERM, shutting down..."),
                    _ = tokio::signal::ctrl_c() => log::info!("Received SIGINT, shutting down..."),
                }
            }
            Err(e) => {
                log::error!("Failed to register SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                log::info!("Received SIGINT, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        log::info!("Received shutdown signal, shutting down...");
    }
}
