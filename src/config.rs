use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use thiserror::Error;
use validator::{Validate, ValidationError};

use crate::federation::ExecutorOptions;
use crate::schema_mapping::CompilerOptions;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Server configuration with validation
#[derive(Clone, Debug, Validate, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP server host address
    #[validate(length(min = 1, message = "HTTP host cannot be empty"))]
    pub http_host: String,

    /// HTTP server port (1-65535)
    #[validate(range(
        min = 1,
        max = 65535,
        message = "HTTP port must be between 1 and 65535"
    ))]
    pub http_port: u16,

    /// Schema-mapping XSD document
    #[validate(length(min = 1, message = "Mapping path cannot be empty"))]
    pub mapping_path: String,

    #[validate(custom(function = "validate_identifier"))]
    pub anchor_label: String,

    #[validate(custom(function = "validate_identifier"))]
    pub anchor_id_field: String,

    /// complexType holding the document-store fields
    #[validate(length(min = 1, message = "Document section cannot be empty"))]
    pub document_section: String,

    /// complexType holding the graph labels
    #[validate(length(min = 1, message = "Graph section cannot be empty"))]
    pub graph_section: String,

    /// Reject mappings that declare a field more than once
    pub strict_field_ownership: bool,

    /// Upper bound for a single store call, in milliseconds
    #[validate(range(
        min = 1,
        max = 600000,
        message = "Store timeout must be between 1 and 600000 ms"
    ))]
    pub store_timeout_ms: u64,

    /// Anchors expanded concurrently per request
    #[validate(range(
        min = 1,
        max = 256,
        message = "Max concurrent traversals must be between 1 and 256"
    ))]
    pub max_concurrent_traversals: usize,

    /// JSON fixture loaded into in-memory stores instead of real backends
    pub fixture_path: Option<String>,

    pub clickhouse_url: Option<String>,
    pub clickhouse_user: String,
    #[serde(skip_serializing)]
    pub clickhouse_password: Option<String>,
    pub clickhouse_database: String,
    #[validate(length(min = 1, message = "ClickHouse table cannot be empty"))]
    pub clickhouse_table: String,

    pub neo4j_url: Option<String>,
    pub neo4j_user: String,
    #[serde(skip_serializing)]
    pub neo4j_password: Option<String>,
    pub neo4j_database: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_host: "0.0.0.0".to_string(),
            http_port: 8080,
            mapping_path: "schema_mapping.xsd".to_string(),
            anchor_label: "Account".to_string(),
            anchor_id_field: "account_id".to_string(),
            document_section: "MongoDBUser".to_string(),
            graph_section: "Neo4jNodes".to_string(),
            strict_field_ownership: false,
            store_timeout_ms: 10_000,
            max_concurrent_traversals: 8,
            fixture_path: None,
            clickhouse_url: None,
            clickhouse_user: "default".to_string(),
            clickhouse_password: None,
            clickhouse_database: "default".to_string(),
            clickhouse_table: "users".to_string(),
            neo4j_url: None,
            neo4j_user: "neo4j".to_string(),
            neo4j_password: None,
            neo4j_database: "neo4j".to_string(),
        }
    }
}

impl ServerConfig {
    /// Create configuration from CLI arguments with validation.
    /// Store credentials are not taken on the command line; they come from
    /// the environment.
    pub fn from_cli(cli: CliConfig) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
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
            clickhouse_user: env::var("FEDQUERY_CLICKHOUSE_USER")
                .unwrap_or(defaults.clickhouse_user),
            clickhouse_password: env::var("FEDQUERY_CLICKHOUSE_PASSWORD").ok(),
            clickhouse_database: cli.clickhouse_database,
            clickhouse_table: cli.clickhouse_table,
            neo4j_url: cli.neo4j_url,
            neo4j_user: env::var("FEDQUERY_NEO4J_USER").unwrap_or(defaults.neo4j_user),
            neo4j_password: env::var("FEDQUERY_NEO4J_PASSWORD").ok(),
            neo4j_database: cli.neo4j_database,
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from YAML file. Missing keys take their defaults.
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: "file read failed".to_string(),
            source: Box::new(e),
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            field: "yaml_content".to_string(),
            value: content,
            source: Box::new(e),
        })?;

        config.validate()?;
        Ok(config)
    }

    pub fn compiler_options(&self) -> CompilerOptions {
        CompilerOptions {
            anchor_label: self.anchor_label.clone(),
            anchor_id_field: self.anchor_id_field.clone(),
            document_section: self.document_section.clone(),
            graph_section: self.graph_section.clone(),
            strict_field_ownership: self.strict_field_ownership,
        }
    }

    pub fn executor_options(&self) -> ExecutorOptions {
        ExecutorOptions {
            store_timeout: Duration::from_millis(self.store_timeout_ms),
            max_concurrent_traversals: self.max_concurrent_traversals,
        }
    }
}

/// CLI configuration (parsed from command line arguments)
#[derive(Clone, Debug)]
pub struct CliConfig {
    pub http_host: String,
    pub http_port: u16,
    pub mapping_path: String,
    pub anchor_label: String,
    pub anchor_id_field: String,
    pub document_section: String,
    pub graph_section: String,
    pub strict_field_ownership: bool,
    pub store_timeout_ms: u64,
    pub max_concurrent_traversals: usize,
    pub fixture_path: Option<String>,
    pub clickhouse_url: Option<String>,
    pub clickhouse_database: String,
    pub clickhouse_table: String,
    pub neo4j_url: Option<String>,
    pub neo4j_database: String,
}

/// Labels and field names end up as Cypher and SQL identifiers.
fn validate_identifier(value: &str) -> Result<(), ValidationError> {
    let mut chars = value.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("identifier")
            .with_message("must be a plain identifier (letters, digits, underscore)".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.anchor_label, "Account");
        assert_eq!(config.anchor_id_field, "account_id");
        assert_eq!(config.executor_options(), ExecutorOptions::default());
    }

    #[test]
    fn test_invalid_port_range() {
        let config = ServerConfig {
            http_port: 0, // Invalid
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_store_timeout() {
        let config = ServerConfig {
            store_timeout_ms: 600_001,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ServerConfig {
            store_timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_concurrency() {
        let config = ServerConfig {
            max_concurrent_traversals: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_anchor_names_must_be_identifiers() {
        let config = ServerConfig {
            anchor_label: "Account) DETACH DELETE (x".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ServerConfig {
            anchor_id_field: "".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_compiler_options_follow_config() {
        let config = ServerConfig {
            anchor_label: "Customer".to_string(),
            strict_field_ownership: true,
            ..Default::default()
        };
        let options = config.compiler_options();
        assert_eq!(options.anchor_label, "Customer");
        assert_eq!(options.document_section, "MongoDBUser");
        assert!(options.strict_field_ownership);
    }

    #[test]
    fn test_yaml_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "http_port: 9090\nmapping_path: /etc/fedquery/mapping.xsd").unwrap();

        let config = ServerConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.http_port, 9090);
        assert_eq!(config.mapping_path, "/etc/fedquery/mapping.xsd");
        assert_eq!(config.graph_section, "Neo4jNodes");
        assert_eq!(config.max_concurrent_traversals, 8);
    }

    #[test]
    fn test_yaml_file_is_validated() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_concurrent_traversals: 1000").unwrap();
        assert!(matches!(
            ServerConfig::from_yaml_file(file.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    fn cli() -> CliConfig {
        let defaults = ServerConfig::default();
        CliConfig {
            http_host: defaults.http_host,
            http_port: 9191,
            mapping_path: defaults.mapping_path,
            anchor_label: defaults.anchor_label,
            anchor_id_field: defaults.anchor_id_field,
            document_section: defaults.document_section,
            graph_section: defaults.graph_section,
            strict_field_ownership: true,
            store_timeout_ms: defaults.store_timeout_ms,
            max_concurrent_traversals: defaults.max_concurrent_traversals,
            fixture_path: None,
            clickhouse_url: None,
            clickhouse_database: defaults.clickhouse_database,
            clickhouse_table: defaults.clickhouse_table,
            neo4j_url: Some("http://neo4j:7474".to_string()),
            neo4j_database: defaults.neo4j_database,
        }
    }

    #[test]
    #[serial]
    fn test_from_cli_takes_credentials_from_env() {
        env::set_var("FEDQUERY_NEO4J_USER", "reader");
        env::set_var("FEDQUERY_NEO4J_PASSWORD", "s3cret");
        let config = ServerConfig::from_cli(cli());
        env::remove_var("FEDQUERY_NEO4J_USER");
        env::remove_var("FEDQUERY_NEO4J_PASSWORD");

        let config = config.unwrap();
        assert_eq!(config.http_port, 9191);
        assert!(config.strict_field_ownership);
        assert_eq!(config.neo4j_url.as_deref(), Some("http://neo4j:7474"));
        assert_eq!(config.neo4j_user, "reader");
        assert_eq!(config.neo4j_password.as_deref(), Some("s3cret"));
        assert_eq!(config.clickhouse_user, "default");
        assert_eq!(config.clickhouse_password, None);
    }

    #[test]
    #[serial]
    fn test_from_cli_is_validated() {
        let cli = CliConfig {
            max_concurrent_traversals: 0,
            ..cli()
        };
        assert!(matches!(
            ServerConfig::from_cli(cli),
            Err(ConfigError::Validation(_))
        ));
    }
}
