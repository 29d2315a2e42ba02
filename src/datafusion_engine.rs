use datafusion::arrow::array::{Array, ArrayRef, StringArray};
use datafusion::arrow::compute::cast;
use datafusion::arrow::datatypes::DataType;
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::common::cast::{as_float64_array, as_int64_array, as_string_array};
use datafusion::datasource::MemTable;
use datafusion::execution::config::SessionConfig;
use datafusion::execution::context::SessionContext;
use datafusion::execution::runtime_env::{RuntimeEnv, RuntimeEnvBuilder};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::{sort_canonical, JoinReport, UnifiedRecord};
use crate::error::AnalysisError;
use crate::loader::SourceTables;
use crate::normalize::NormalizedTable;
use crate::schema::{
    TableKind, BASKET_NUM, CANONICAL_COLUMNS, COMMODITY, DEPARTMENT, HH_SIZE, HSHD_NUM,
    PRODUCT_NUM, PURCHASE_DATE, SPEND,
};

const JOIN_COLUMNS: &str = r#"
    t."HSHD_NUM" AS "HSHD_NUM",
    t."BASKET_NUM" AS "BASKET_NUM",
    t."PURCHASE_DATE" AS "PURCHASE_DATE",
    t."PRODUCT_NUM" AS "PRODUCT_NUM",
    t."SPEND" AS "SPEND",
    p."DEPARTMENT" AS "DEPARTMENT",
    p."COMMODITY" AS "COMMODITY",
    h."HH_SIZE" AS "HH_SIZE""#;

const JOIN_FROM: &str = r#"
FROM transactions t
INNER JOIN products p ON t."PRODUCT_NUM" = p."PRODUCT_NUM"
INNER JOIN households h ON t."HSHD_NUM" = h."HSHD_NUM"
"#;

const UNMATCHED_QUERY: &str = r#"
SELECT COUNT(*) AS "UNMATCHED"
FROM transactions t
LEFT JOIN (SELECT DISTINCT "PRODUCT_NUM" FROM products) p ON t."PRODUCT_NUM" = p."PRODUCT_NUM"
LEFT JOIN (SELECT DISTINCT "HSHD_NUM" FROM households) h ON t."HSHD_NUM" = h."HSHD_NUM"
WHERE p."PRODUCT_NUM" IS NULL OR h."HSHD_NUM" IS NULL
"#;

/// Output of one join: canonical rows plus what the joins discarded.
#[derive(Debug, Clone)]
pub struct JoinOutput {
    pub records: Vec<UnifiedRecord>,
    pub report: JoinReport,
}

/// Joins the three normalized tables with DataFusion.
pub struct DataFusionEngine {
    runtime: Arc<RuntimeEnv>,
}

impl DataFusionEngine {
    pub fn new(memory_limit_bytes: usize) -> Result<Self, AnalysisError> {
        info!(
            "Initializing DataFusion join engine with {} MiB memory limit",
            memory_limit_bytes / (1024 * 1024)
        );

        let memory_fraction = 0.8;
        let runtime = RuntimeEnvBuilder::new()
            .with_memory_limit(memory_limit_bytes, memory_fraction)
            .build()
            .map_err(|e| AnalysisError::ConfigError {
                message: format!("Failed to build DataFusion runtime environment: {}", e),
            })?;

        Ok(Self {
            runtime: Arc::new(runtime),
        })
    }

    /// Each join runs in its own session so concurrent loads never see each
    /// other's tables.
    fn session(&self) -> SessionContext {
        SessionContext::new_with_config_rt(SessionConfig::new(), self.runtime.clone())
    }

    pub async fn join(&self, tables: &SourceTables) -> Result<JoinOutput, AnalysisError> {
        let start_time = std::time::Instant::now();

        for table in tables.iter() {
            check_columns(table)?;
        }

        let ctx = self.session();
        for table in tables.iter() {
            let schema = table.batch.schema();
            let provider = MemTable::try_new(schema, vec![vec![table.batch.clone()]])?;
            ctx.register_table(table.kind.as_str(), Arc::new(provider))?;
            debug!(
                "Registered {} table with {} rows",
                table.kind,
                table.num_rows()
            );
        }

        let (query, extra_columns) = join_query(tables);
        let batches = ctx
            .sql(&query)
            .await?
            .collect()
            .await
            .map_err(|e| AnalysisError::InternalError {
                message: format!("Join execution failed: {}", e),
            })?;

        let mut records = Vec::new();
        for batch in &batches {
            decode_batch(batch, &extra_columns, &mut records)?;
        }
        sort_canonical(&mut records);

        let unmatched = ctx.sql(UNMATCHED_QUERY).await?.collect().await?;
        let dropped_rows = count_value(&unmatched)?;

        let report = JoinReport {
            transaction_rows: tables.transactions.num_rows(),
            joined_rows: records.len(),
            dropped_rows,
        };

        if report.dropped_rows > 0 {
            warn!(
                "Inner join dropped {} of {} transaction rows without a matching product or household",
                report.dropped_rows, report.transaction_rows
            );
        }
        info!(
            "Join completed with {} rows in {}ms",
            report.joined_rows,
            start_time.elapsed().as_millis()
        );

        Ok(JoinOutput { records, report })
    }

    pub async fn health_check(&self) -> Result<(), AnalysisError> {
        let _ = self.session().sql("SELECT 1 as health_check").await?;
        Ok(())
    }
}

fn check_columns(table: &NormalizedTable) -> Result<(), AnalysisError> {
    for key in table.kind.join_keys() {
        if !table.has_column(key) {
            return Err(AnalysisError::JoinKeyMissing {
                table: table.kind.to_string(),
                column: key.to_string(),
            });
        }
    }
    for column in table.kind.required_columns() {
        if !table.has_column(column) {
            return Err(AnalysisError::MissingColumn {
                table: table.kind.to_string(),
                column: column.to_string(),
            });
        }
    }
    Ok(())
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Builds the inner join selecting the canonical columns plus every other
/// column of the three tables. A pass-through name present in several
/// tables is taken from the first of transactions, products, households.
fn join_query(tables: &SourceTables) -> (String, Vec<String>) {
    let mut query = format!("SELECT{}", JOIN_COLUMNS);
    let mut extra_columns: Vec<String> = Vec::new();

    for (kind, alias) in [
        (TableKind::Transactions, "t"),
        (TableKind::Products, "p"),
        (TableKind::Households, "h"),
    ] {
        let schema = tables.get(kind).batch.schema();
        for field in schema.fields() {
            let name = field.name();
            if CANONICAL_COLUMNS.contains(&name.as_str()) || extra_columns.contains(name) {
                continue;
            }
            let quoted = quote_ident(name);
            query.push_str(&format!(",\n    {}.{} AS {}", alias, quoted, quoted));
            extra_columns.push(name.clone());
        }
    }

    query.push_str(JOIN_FROM);
    (query, extra_columns)
}

fn column(batch: &RecordBatch, name: &str, data_type: &DataType) -> Result<ArrayRef, AnalysisError> {
    let array = batch
        .column_by_name(name)
        .ok_or_else(|| AnalysisError::MissingColumn {
            table: "joined".to_string(),
            column: name.to_string(),
        })?;
    Ok(cast(array, data_type)?)
}

fn decode_batch(
    batch: &RecordBatch,
    extra_columns: &[String],
    records: &mut Vec<UnifiedRecord>,
) -> Result<(), AnalysisError> {
    let households = column(batch, HSHD_NUM, &DataType::Int64)?;
    let baskets = column(batch, BASKET_NUM, &DataType::Int64)?;
    let dates = column(batch, PURCHASE_DATE, &DataType::Utf8)?;
    let products = column(batch, PRODUCT_NUM, &DataType::Int64)?;
    let spends = column(batch, SPEND, &DataType::Float64)?;
    let departments = column(batch, DEPARTMENT, &DataType::Utf8)?;
    let commodities = column(batch, COMMODITY, &DataType::Utf8)?;
    let sizes = column(batch, HH_SIZE, &DataType::Int64)?;

    let households = as_int64_array(&households)?;
    let baskets = as_int64_array(&baskets)?;
    let dates = as_string_array(&dates)?;
    let products = as_int64_array(&products)?;
    let spends = as_float64_array(&spends)?;
    let departments = as_string_array(&departments)?;
    let commodities = as_string_array(&commodities)?;
    let sizes = as_int64_array(&sizes)?;

    let extra_arrays = extra_columns
        .iter()
        .map(|name| column(batch, name, &DataType::Utf8))
        .collect::<Result<Vec<_>, _>>()?;
    let extras = extra_columns
        .iter()
        .zip(&extra_arrays)
        .map(|(name, array)| as_string_array(array.as_ref()).map(|array| (name.as_str(), array)))
        .collect::<Result<Vec<_>, _>>()?;

    let text = |array: &StringArray, row: usize| {
        if array.is_null(row) {
            String::new()
        } else {
            array.value(row).to_string()
        }
    };

    records.reserve(batch.num_rows());
    for row in 0..batch.num_rows() {
        if baskets.is_null(row) {
            return Err(AnalysisError::InvalidInput {
                message: format!(
                    "Transaction for household {} has no {}",
                    households.value(row),
                    BASKET_NUM
                ),
            });
        }
        records.push(UnifiedRecord {
            household_id: households.value(row),
            basket_id: baskets.value(row),
            purchase_date: text(dates, row),
            product_id: products.value(row),
            department: text(departments, row),
            commodity: text(commodities, row),
            spend: spends.value(row),
            household_size: sizes.value(row),
            extra: extras
                .iter()
                .map(|&(name, array)| (name.to_string(), text(array, row)))
                .collect(),
        });
    }
    Ok(())
}

fn count_value(batches: &[RecordBatch]) -> Result<usize, AnalysisError> {
    let batch = match batches.iter().find(|b| b.num_rows() > 0) {
        Some(batch) => batch,
        None => return Ok(0),
    };
    let counts = cast(batch.column(0), &DataType::Int64)?;
    let counts = as_int64_array(&counts)?;
    Ok(counts.value(0).max(0) as usize)
}
