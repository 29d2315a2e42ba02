use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::info;

use crate::catalog::Dataset;
use crate::domain::UnifiedRecord;

/// Holds the dataset currently in effect.
///
/// Readers clone the `Arc` under a short read lock and work on that snapshot
/// without further locking. `replace` swaps the pointer under the write lock,
/// so a reader sees either the old or the new dataset in full.
pub struct DatasetManager {
    current: RwLock<Arc<Dataset>>,
    ingest: Mutex<()>,
}

impl Default for DatasetManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetManager {
    pub fn new() -> Self {
        Self::with_dataset(Dataset::empty())
    }

    pub fn with_dataset(dataset: Dataset) -> Self {
        Self {
            current: RwLock::new(Arc::new(dataset)),
            ingest: Mutex::new(()),
        }
    }

    pub async fn current_snapshot(&self) -> Arc<Dataset> {
        self.current.read().await.clone()
    }

    /// Publishes `dataset` and returns the snapshot it replaced.
    pub async fn replace(&self, dataset: Dataset) -> Arc<Dataset> {
        let next = Arc::new(dataset);
        let mut current = self.current.write().await;
        let previous = std::mem::replace(&mut *current, next.clone());
        info!(
            "Replaced dataset {} ({} rows) with {} ({} rows from {})",
            previous.id(),
            previous.len(),
            next.id(),
            next.len(),
            next.info().source
        );
        previous
    }

    /// Serializes whole rebuilds (load, join, replace) so concurrent
    /// ingests publish in the order they acquired this guard.
    pub async fn begin_ingest(&self) -> MutexGuard<'_, ()> {
        self.ingest.lock().await
    }
}

/// All rows of `snapshot` for one household, in canonical order.
pub fn filter_by_household(snapshot: &Dataset, household_id: i64) -> Vec<UnifiedRecord> {
    snapshot
        .records()
        .iter()
        .filter(|record| record.household_id == household_id)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DataSource;
    use crate::domain::JoinReport;

    fn record(household_id: i64, basket_id: i64) -> UnifiedRecord {
        UnifiedRecord {
            household_id,
            basket_id,
            purchase_date: "2018-01-01".to_string(),
            product_id: 1,
            department: "FOOD".to_string(),
            commodity: "DAIRY".to_string(),
            spend: 1.0,
            household_size: 2,
            extra: Default::default(),
        }
    }

    fn dataset(records: Vec<UnifiedRecord>) -> Dataset {
        Dataset::new(DataSource::Files, records, JoinReport::default())
    }

    #[tokio::test]
    async fn starts_empty() {
        let manager = DatasetManager::new();
        let snapshot = manager.current_snapshot().await;
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.info().source, DataSource::Empty);
    }

    #[tokio::test]
    async fn snapshot_outlives_replace() {
        let manager = DatasetManager::with_dataset(dataset(vec![record(1, 1)]));
        let before = manager.current_snapshot().await;

        manager
            .replace(dataset(vec![record(2, 1), record(2, 2)]))
            .await;

        assert_eq!(before.len(), 1);
        assert_eq!(manager.current_snapshot().await.len(), 2);
    }

    #[test]
    fn filter_returns_matching_rows_only() {
        let snapshot = dataset(vec![record(1, 1), record(2, 1), record(2, 2)]);
        assert_eq!(filter_by_household(&snapshot, 2).len(), 2);
        assert!(filter_by_household(&snapshot, 99).is_empty());
    }
}
