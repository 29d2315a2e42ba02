use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use super::{with_timeout, SourceLoader, SourceTables, DEFAULT_SOURCE_TIMEOUT};
use crate::catalog::DataSource;
use crate::error::AnalysisError;
use crate::normalize::{normalize_table, RawTable};
use crate::schema::{TableKind, FILE_RENAMES};

/// Reads the three tables from comma-delimited files with header rows.
#[derive(Debug, Clone)]
pub struct FileLoader {
    transactions: PathBuf,
    households: PathBuf,
    products: PathBuf,
    timeout: Duration,
}

impl FileLoader {
    pub fn new(
        transactions: impl Into<PathBuf>,
        households: impl Into<PathBuf>,
        products: impl Into<PathBuf>,
    ) -> Self {
        Self {
            transactions: transactions.into(),
            households: households.into(),
            products: products.into(),
            timeout: DEFAULT_SOURCE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn path(&self, kind: TableKind) -> &Path {
        match kind {
            TableKind::Transactions => &self.transactions,
            TableKind::Households => &self.households,
            TableKind::Products => &self.products,
        }
    }

    async fn load_files(&self) -> Result<SourceTables, AnalysisError> {
        let mut tables = Vec::with_capacity(3);
        for kind in TableKind::ALL {
            let path = self.path(kind).to_path_buf();
            info!("Reading {} from {}", kind, path.display());
            let raw = tokio::task::spawn_blocking(move || read_delimited(kind, &path)).await??;
            debug!("Read {} rows from {} file", raw.rows.len(), kind);
            tables.push(normalize_table(&raw, FILE_RENAMES)?);
        }

        let mut tables = tables.into_iter();
        match (tables.next(), tables.next(), tables.next()) {
            (Some(transactions), Some(households), Some(products)) => Ok(SourceTables {
                transactions,
                households,
                products,
            }),
            _ => Err(AnalysisError::InternalError {
                message: "File loader produced fewer than three tables".to_string(),
            }),
        }
    }
}

#[async_trait]
impl SourceLoader for FileLoader {
    fn name(&self) -> &str {
        "files"
    }

    fn source(&self) -> DataSource {
        DataSource::Files
    }

    async fn load(&self) -> Result<SourceTables, AnalysisError> {
        with_timeout(self.name(), self.timeout, self.load_files()).await
    }
}

fn read_delimited(kind: TableKind, path: &Path) -> Result<RawTable, AnalysisError> {
    let csv_error = |e: csv::Error| {
        if e.is_io_error() {
            AnalysisError::source_unavailable(
                "files",
                format!("Cannot read {} file {}: {}", kind, path.display(), e),
            )
        } else {
            AnalysisError::InvalidInput {
                message: format!("Malformed {} file {}: {}", kind, path.display(), e),
            }
        }
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(csv_error)?;

    let columns = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(String::from)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        rows.push(record.iter().map(String::from).collect());
    }

    Ok(RawTable::new(kind, columns, rows))
}
