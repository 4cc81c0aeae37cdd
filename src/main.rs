use clap::Parser;
use fedquery::{config, server};

/// fedquery - field-level federation over a document store and a graph store
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Load the whole configuration from a YAML file instead of flags
    #[arg(long)]
    config: Option<String>,

    /// HTTP server host address
    #[arg(long, env = "FEDQUERY_HOST", default_value = "0.0.0.0")]
    http_host: String,

    /// HTTP server port
    #[arg(long, env = "FEDQUERY_PORT", default_value_t = 8080)]
    http_port: u16,

    /// Schema-mapping XSD document
    #[arg(long, env = "FEDQUERY_MAPPING_PATH", default_value = "schema_mapping.xsd")]
    mapping_path: String,

    /// Label of the anchor node in the graph store
    #[arg(long, env = "FEDQUERY_ANCHOR_LABEL", default_value = "Account")]
    anchor_label: String,

    /// Field identifying an anchor in both stores
    #[arg(long, env = "FEDQUERY_ANCHOR_ID_FIELD", default_value = "account_id")]
    anchor_id_field: String,

    /// Mapping section listing document-store fields
    #[arg(long, env = "FEDQUERY_DOCUMENT_SECTION", default_value = "MongoDBUser")]
    document_section: String,

    /// Mapping section listing graph labels
    #[arg(long, env = "FEDQUERY_GRAPH_SECTION", default_value = "Neo4jNodes")]
    graph_section: String,

    /// Reject mappings that declare a field more than once
    #[arg(long, env = "FEDQUERY_STRICT_FIELD_OWNERSHIP")]
    strict_field_ownership: bool,

    /// Timeout for a single store call, in milliseconds
    #[arg(long, env = "FEDQUERY_STORE_TIMEOUT_MS", default_value_t = 10_000)]
    store_timeout_ms: u64,

    /// Anchors expanded concurrently per request
    #[arg(long, env = "FEDQUERY_MAX_CONCURRENT_TRAVERSALS", default_value_t = 8)]
    max_concurrent_traversals: usize,

    /// JSON fixture served from in-memory stores
    #[arg(long, env = "FEDQUERY_FIXTURE_PATH")]
    fixture_path: Option<String>,

    /// ClickHouse HTTP URL of the document store
    #[arg(long, env = "FEDQUERY_CLICKHOUSE_URL")]
    clickhouse_url: Option<String>,

    #[arg(long, env = "FEDQUERY_CLICKHOUSE_DATABASE", default_value = "default")]
    clickhouse_database: String,

    #[arg(long, env = "FEDQUERY_CLICKHOUSE_TABLE", default_value = "users")]
    clickhouse_table: String,

    /// Neo4j HTTP URL of the graph store
    #[arg(long, env = "FEDQUERY_NEO4J_URL")]
    neo4j_url: Option<String>,

    #[arg(long, env = "FEDQUERY_NEO4J_DATABASE", default_value = "neo4j")]
    neo4j_database: String,
}

impl From<Cli> for config::CliConfig {
    fn from(cli: Cli) -> Self {
        config::CliConfig {
            http_host: cli.http_host,
            http_port: cli.http_port,
            mapping_path: cli.mapping_path,
            anchor_label: cli.anchor_label,
            anchor_id_field: cli.anchor_id_field,
            document_section: cli.document_section,
            graph_section: cli.graph_section,
            strict_field_ownership: cli.strict_field_ownership,
            store_timeout_ms: cli.store_timeout_ms,
            max_concurrent_traversals: cli.max_concurrent_traversals,
            fixture_path: cli.fixture_path,
            clickhouse_url: cli.clickhouse_url,
            clickhouse_database: cli.clickhouse_database,
            clickhouse_table: cli.clickhouse_table,
            neo4j_url: cli.neo4j_url,
            neo4j_database: cli.neo4j_database,
        }
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Defaults to INFO level, can be overridden with RUST_LOG env var
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    log::info!("fedquery v{}", env!("CARGO_PKG_VERSION"));

    let config = match cli.config.clone() {
        Some(path) => config::ServerConfig::from_yaml_file(path),
        None => config::ServerConfig::from_cli(cli.into()),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server::run_with_config(config).await {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}
