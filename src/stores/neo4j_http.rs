//! Graph store reached through the Neo4j HTTP transactional endpoint.
//!
//! Every traversal becomes a single auto-committed statement. Identifiers in
//! the statement come from the compiled mapping; the anchor id is the only
//! parameter, bound as its canonical key and compared against the stringified
//! node property so `"7"` and `7` match the same node.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::ServerConfig;
use crate::federation::{AnchorId, GraphReader, Record, StoreError, Traversal};
use crate::schema_mapping::path_template::{quote_identifier, ANCHOR_PARAMETER, ANCHOR_VARIABLE};
use crate::schema_mapping::{GraphField, StoreKind};

#[derive(Debug, Serialize)]
struct CommitRequest<'a> {
    statements: [Statement<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Statement<'a> {
    statement: &'a str,
    parameters: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
struct CommitResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    #[serde(default)]
    errors: Vec<Neo4jError>,
}

#[derive(Debug, Default, Deserialize)]
struct StatementResult {
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    data: Vec<DataRow>,
}

#[derive(Debug, Deserialize)]
struct DataRow {
    #[serde(default)]
    row: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Neo4jError {
    code: String,
    message: String,
}

pub struct Neo4jHttpGraphReader {
    client: Client,
    endpoint: String,
    user: String,
    password: Option<String>,
    anchor_label: String,
    anchor_id_property: String,
}

impl Neo4jHttpGraphReader {
    pub fn new(
        client: Client,
        base_url: &str,
        database: &str,
        anchor_label: &str,
        anchor_id_property: &str,
    ) -> Self {
        Self {
            client,
            endpoint: format!("{}/db/{}/tx/commit", base_url.trim_end_matches('/'), database),
            user: String::new(),
            password: None,
            anchor_label: anchor_label.to_string(),
            anchor_id_property: anchor_id_property.to_string(),
        }
    }

    pub fn with_credentials(mut self, user: &str, password: Option<&str>) -> Self {
        self.user = user.to_string();
        self.password = password.map(str::to_string);
        self
    }

    /// Returns `Ok(None)` unless a Neo4j URL is configured.
    pub fn from_config(config: &ServerConfig) -> anyhow::Result<Option<Self>> {
        let Some(url) = config.neo4j_url.as_deref() else {
            return Ok(None);
        };
        let client = Client::builder()
            .timeout(Duration::from_millis(config.store_timeout_ms))
            .build()?;
        log::info!("Graph store: Neo4j {} database {}", url, config.neo4j_database);
        Ok(Some(
            Self::new(
                client,
                url,
                &config.neo4j_database,
                &config.anchor_label,
                &config.anchor_id_field,
            )
            .with_credentials(&config.neo4j_user, config.neo4j_password.as_deref()),
        ))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Render the Cypher statement for `traversal`, projecting each field's
    /// property of the target node under the field name.
    pub fn statement(&self, traversal: &Traversal, fields: &[GraphField]) -> String {
        let anchor_match = format!(
            "MATCH ({}:{})",
            ANCHOR_VARIABLE,
            quote_identifier(&self.anchor_label)
        );
        let anchor_filter = format!(
            "WHERE toString({}.{}) = ${}",
            ANCHOR_VARIABLE,
            quote_identifier(&self.anchor_id_property),
            ANCHOR_PARAMETER
        );
        match traversal {
            Traversal::AnchorEnumeration => format!(
                "{} RETURN DISTINCT {}",
                anchor_match,
                projection(ANCHOR_VARIABLE, fields)
            ),
            Traversal::AnchorNode => format!(
                "{} {} RETURN {} LIMIT 1",
                anchor_match,
                anchor_filter,
                projection(ANCHOR_VARIABLE, fields)
            ),
            Traversal::Path(path) => format!(
                "MATCH {} {} RETURN {}",
                path.pattern(),
                anchor_filter,
                projection(path.target_variable(), fields)
            ),
        }
    }

    async fn commit(&self, statement: &str, parameters: Map<String, Value>) -> Result<CommitResponse, StoreError> {
        let request = CommitRequest {
            statements: [Statement {
                statement,
                parameters,
            }],
        };
        let mut builder = self.client.post(&self.endpoint).json(&request);
        if !self.user.is_empty() {
            builder = builder.basic_auth(&self.user, self.password.as_deref());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                StoreError::unavailable(StoreKind::Graph, format!("request timed out: {}", e))
            } else {
                StoreError::unavailable(StoreKind::Graph, e.to_string())
            }
        })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::unavailable(
                StoreKind::Graph,
                format!("HTTP {}: {}", status, body),
            ));
        }
        response
            .json::<CommitResponse>()
            .await
            .map_err(|e| StoreError::invalid_response(StoreKind::Graph, e.to_string()))
    }
}

fn projection(variable: &str, fields: &[GraphField]) -> String {
    if fields.is_empty() {
        return format!("id({}) AS node_id", variable);
    }
    fields
        .iter()
        .map(|f| {
            format!(
                "{}.{} AS {}",
                variable,
                quote_identifier(&f.property),
                quote_identifier(&f.field)
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn parameters(traversal: &Traversal, anchor: Option<&AnchorId>) -> Result<Map<String, Value>, StoreError> {
    let mut parameters = Map::new();
    match (traversal, anchor) {
        (Traversal::AnchorEnumeration, _) => {}
        (_, Some(anchor)) => {
            parameters.insert(ANCHOR_PARAMETER.to_string(), Value::String(anchor.key()));
        }
        (_, None) => {
            return Err(StoreError::invalid_response(
                StoreKind::Graph,
                format!("traversal `{}` needs an anchor id", traversal.name()),
            ))
        }
    }
    Ok(parameters)
}

/// Turn the first statement result into records keyed by column name.
fn into_records(response: CommitResponse) -> Result<Vec<Record>, StoreError> {
    if let Some(error) = response.errors.first() {
        return Err(StoreError::unavailable(
            StoreKind::Graph,
            format!("{}: {}", error.code, error.message),
        ));
    }
    let Some(result) = response.results.into_iter().next() else {
        return Ok(Vec::new());
    };
    result
        .data
        .into_iter()
        .map(|data| {
            if data.row.len() != result.columns.len() {
                return Err(StoreError::invalid_response(
                    StoreKind::Graph,
                    format!(
                        "row has {} values for {} columns",
                        data.row.len(),
                        result.columns.len()
                    ),
                ));
            }
            Ok(result.columns.iter().cloned().zip(data.row).collect())
        })
        .collect()
}

#[async_trait]
impl GraphReader for Neo4jHttpGraphReader {
    async fn run_traversal(
        &self,
        traversal: &Traversal,
        anchor: Option<AnchorId>,
        fields: &[GraphField],
    ) -> Result<Vec<Record>, StoreError> {
        let parameters = parameters(traversal, anchor.as_ref())?;
        let statement = self.statement(traversal, fields);
        log::debug!("Executing Cypher ({}):\n{}", traversal.name(), statement);
        let response = self.commit(&statement, parameters).await?;
        let records = into_records(response)?;
        log::debug!("Traversal `{}` returned {} records", traversal.name(), records.len());
        Ok(records)
    }
}

impl std::fmt::Debug for Neo4jHttpGraphReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Neo4jHttpGraphReader")
            .field("endpoint", &self.endpoint)
            .field("user", &self.user)
            .field("anchor_label", &self.anchor_label)
            .finish()
    }
}
