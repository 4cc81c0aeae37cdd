use async_trait::async_trait;
use clickhouse::Client;
use serde_json::Value;
use tokio::io::AsyncBufReadExt;

use crate::config::ServerConfig;
use crate::federation::{AnchorId, DocumentFilter, DocumentReader, Record, StoreError};
use crate::schema_mapping::StoreKind;

/// Document store backed by one ClickHouse table, one row per account.
pub struct ClickHouseDocumentReader {
    client: Client,
    table: String,
    anchor_id_field: String,
}

impl ClickHouseDocumentReader {
    pub fn new(client: Client, table: &str, anchor_id_field: &str) -> Self {
        Self {
            client,
            table: table.to_string(),
            anchor_id_field: anchor_id_field.to_string(),
        }
    }

    /// Returns `None` unless a ClickHouse URL is configured.
    pub fn from_config(config: &ServerConfig) -> Option<Self> {
        let url = config.clickhouse_url.as_deref()?;
        let mut client = Client::default()
            .with_url(url)
            .with_user(config.clickhouse_user.as_str())
            .with_database(config.clickhouse_database.as_str());
        if let Some(password) = config.clickhouse_password.as_deref() {
            client = client.with_password(password);
        }
        log::info!(
            "Document store: ClickHouse {} table {}.{}",
            url,
            config.clickhouse_database,
            config.clickhouse_table
        );
        Some(Self::new(client, &config.clickhouse_table, &config.anchor_id_field))
    }

    /// Render the projection query. Anchor keys are bound as a single array
    /// parameter; identifiers come from the compiled mapping and are quoted.
    pub fn build_query(&self, fields: &[String], filter: &DocumentFilter) -> String {
        let columns = if fields.is_empty() {
            quote_column(&self.anchor_id_field)
        } else {
            fields
                .iter()
                .map(|f| quote_column(f))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let mut sql = format!("SELECT {} FROM {}", columns, quote_column(&self.table));
        if let DocumentFilter::Anchors(_) = filter {
            sql.push_str(&format!(
                " WHERE has(?, toString({}))",
                quote_column(&self.anchor_id_field)
            ));
        }
        sql.push_str(&format!(" ORDER BY {}", quote_column(&self.anchor_id_field)));
        sql
    }
}

/// Backtick-quote a ClickHouse identifier. `?` is doubled so the client does
/// not read it as a bind placeholder.
fn quote_column(ident: &str) -> String {
    format!(
        "`{}`",
        ident.replace('\\', "\\\\").replace('`', "\\`").replace('?', "??")
    )
}

#[async_trait]
impl DocumentReader for ClickHouseDocumentReader {
    async fn fetch_projected(
        &self,
        fields: &[String],
        filter: &DocumentFilter,
    ) -> Result<Vec<Record>, StoreError> {
        if let DocumentFilter::Anchors(anchors) = filter {
            if anchors.is_empty() {
                return Ok(Vec::new());
            }
        }

        let sql = self.build_query(fields, filter);
        log::debug!("Executing document projection:\n{}", sql);

        let mut query = self.client.query(&sql);
        if let DocumentFilter::Anchors(anchors) = filter {
            let keys: Vec<String> = anchors.iter().map(AnchorId::key).collect();
            query = query.bind(keys);
        }

        let mut lines = query
            .fetch_bytes("JSONEachRow")
            .map_err(|e| {
                log::error!("ClickHouse query failed. SQL was:\n{}\nError: {}", sql, e);
                StoreError::unavailable(StoreKind::Document, e.to_string())
            })?
            .lines();

        let mut records = Vec::new();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| StoreError::unavailable(StoreKind::Document, e.to_string()))?
        {
            match serde_json::from_str::<Value>(&line) {
                Ok(Value::Object(record)) => records.push(record),
                Ok(other) => {
                    return Err(StoreError::invalid_response(
                        StoreKind::Document,
                        format!("expected a JSON object per row, got {}", other),
                    ))
                }
                Err(e) => {
                    return Err(StoreError::invalid_response(
                        StoreKind::Document,
                        e.to_string(),
                    ))
                }
            }
        }
        Ok(records)
    }
}
