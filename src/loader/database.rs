use async_trait::async_trait;
use diesel::sql_types::Text;
use diesel_async::{
    pooled_connection::{deadpool::Pool, AsyncDieselConnectionManager},
    AsyncPgConnection, RunQueryDsl,
};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use super::{with_timeout, SourceLoader, SourceTables, DEFAULT_SOURCE_TIMEOUT};
use crate::catalog::DataSource;
use crate::error::AnalysisError;
use crate::models::{JsonRow, SourceColumn};
use crate::normalize::{normalize_table, RawTable};
use crate::schema::{TableKind, DATABASE_RENAMES};

const SOURCE_NAME: &str = "database";

const COLUMNS_QUERY: &str = "SELECT column_name::text AS column_name \
     FROM information_schema.columns \
     WHERE table_schema = current_schema() AND table_name = $1 \
     ORDER BY ordinal_position";

/// Reads the `transactions`, `households` and `products` tables from
/// PostgreSQL.
#[derive(Clone)]
pub struct DatabaseLoader {
    pool: Pool<AsyncPgConnection>,
    timeout: Duration,
}

impl DatabaseLoader {
    /// Builds the pool without connecting; connection failures surface on
    /// [`SourceLoader::load`].
    pub fn new(database_url: &str) -> Result<Self, AnalysisError> {
        let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
        let pool = Pool::builder(config)
            .build()
            .map_err(|e| AnalysisError::ConfigError {
                message: format!("Failed to create database pool: {}", e),
            })?;

        Ok(Self {
            pool,
            timeout: DEFAULT_SOURCE_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn fetch_table(&self, kind: TableKind) -> Result<RawTable, AnalysisError> {
        let mut conn = self.pool.get().await.map_err(|e| {
            AnalysisError::source_unavailable(
                SOURCE_NAME,
                format!("Failed to get database connection: {}", e),
            )
        })?;

        let columns: Vec<String> = diesel::sql_query(COLUMNS_QUERY)
            .bind::<Text, _>(kind.as_str())
            .load::<SourceColumn>(&mut conn)
            .await?
            .into_iter()
            .map(|c| c.column_name)
            .collect();

        if columns.is_empty() {
            return Err(AnalysisError::source_unavailable(
                SOURCE_NAME,
                format!("Table {} not found", kind),
            ));
        }

        let rows = diesel::sql_query(format!(
            "SELECT row_to_json(t)::text AS row FROM \"{}\" t",
            kind.as_str()
        ))
        .load::<JsonRow>(&mut conn)
        .await?;

        debug!("Fetched {} rows from {} table", rows.len(), kind);
        raw_table_from_json(kind, columns, &rows)
    }

    async fn load_tables(&self) -> Result<SourceTables, AnalysisError> {
        info!("Loading source tables from database");

        let transactions = self.fetch_table(TableKind::Transactions).await?;
        let households = self.fetch_table(TableKind::Households).await?;
        let products = self.fetch_table(TableKind::Products).await?;

        Ok(SourceTables {
            transactions: normalize_table(&transactions, DATABASE_RENAMES)?,
            households: normalize_table(&households, DATABASE_RENAMES)?,
            products: normalize_table(&products, DATABASE_RENAMES)?,
        })
    }
}

#[async_trait]
impl SourceLoader for DatabaseLoader {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn source(&self) -> DataSource {
        DataSource::Database
    }

    async fn load(&self) -> Result<SourceTables, AnalysisError> {
        with_timeout(self.name(), self.timeout, self.load_tables()).await
    }
}

/// SQL NULL renders as the literal `null`, the same text the delimited
/// exports carry.
fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "null".to_string(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

pub(crate) fn raw_table_from_json(
    kind: TableKind,
    columns: Vec<String>,
    rows: &[JsonRow],
) -> Result<RawTable, AnalysisError> {
    let mut cells = Vec::with_capacity(rows.len());
    for json_row in rows {
        let object = match serde_json::from_str::<Value>(&json_row.row)? {
            Value::Object(object) => object,
            other => {
                return Err(AnalysisError::InvalidInput {
                    message: format!("Expected a JSON object for {} row, got {}", kind, other),
                })
            }
        };
        cells.push(
            columns
                .iter()
                .map(|column| cell_text(object.get(column)))
                .collect(),
        );
    }
    Ok(RawTable::new(kind, columns, cells))
}
