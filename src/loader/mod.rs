//! Source loading strategies. Each strategy yields the three normalized
//! tables; which strategies run, and in what order, is the caller's call.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

use crate::catalog::DataSource;
use crate::error::AnalysisError;
use crate::normalize::NormalizedTable;
use crate::schema::TableKind;

pub mod database;
pub mod file;

pub use database::DatabaseLoader;
pub use file::FileLoader;

pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct SourceTables {
    pub transactions: NormalizedTable,
    pub households: NormalizedTable,
    pub products: NormalizedTable,
}

impl SourceTables {
    pub fn get(&self, kind: TableKind) -> &NormalizedTable {
        match kind {
            TableKind::Transactions => &self.transactions,
            TableKind::Households => &self.households,
            TableKind::Products => &self.products,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &NormalizedTable> {
        TableKind::ALL.into_iter().map(move |kind| self.get(kind))
    }
}

#[async_trait]
pub trait SourceLoader: Send + Sync {
    /// Label used in logs and `SourceUnavailable` errors.
    fn name(&self) -> &str;

    fn source(&self) -> DataSource;

    async fn load(&self) -> Result<SourceTables, AnalysisError>;
}

/// Bounds a source call, turning an elapsed deadline into `SourceUnavailable`.
pub(crate) async fn with_timeout<T, F>(
    source_name: &str,
    timeout: Duration,
    future: F,
) -> Result<T, AnalysisError>
where
    F: Future<Output = Result<T, AnalysisError>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(AnalysisError::source_unavailable(
            source_name,
            format!("no response within {}ms", timeout.as_millis()),
        )),
    }
}
