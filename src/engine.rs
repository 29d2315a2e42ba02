use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::aggregate::aggregate;
use crate::catalog::Dataset;
use crate::config::ServiceConfig;
use crate::correlation::size_spend_correlation;
use crate::datafusion_engine::DataFusionEngine;
use crate::dataset_manager::{filter_by_household, DatasetManager};
use crate::domain::DatasetView;
use crate::error::AnalysisError;
use crate::loader::{FileLoader, SourceLoader};

pub struct AnalysisEngine {
    datafusion: DataFusionEngine,
    datasets: DatasetManager,
    source_timeout: Duration,
}

impl AnalysisEngine {
    pub fn new(config: &ServiceConfig) -> Result<Self, AnalysisError> {
        info!("Initializing Analysis Engine");

        let datafusion = DataFusionEngine::new(config.join_memory_limit_bytes)?;

        Ok(Self {
            datafusion,
            datasets: DatasetManager::new(),
            source_timeout: config.source_timeout,
        })
    }

    pub fn datasets(&self) -> &DatasetManager {
        &self.datasets
    }

    pub async fn current_snapshot(&self) -> Arc<Dataset> {
        self.datasets.current_snapshot().await
    }

    /// Loads and joins without publishing anything.
    async fn build_dataset(&self, loader: &dyn SourceLoader) -> Result<Dataset, AnalysisError> {
        let tables = loader.load().await?;
        let joined = self.datafusion.join(&tables).await?;
        Ok(Dataset::new(loader.source(), joined.records, joined.report))
    }

    /// Tries `loaders` in order and publishes the first dataset that builds.
    /// When every loader fails the current dataset stays in effect and the
    /// last failure is returned.
    pub async fn load_initial(
        &self,
        loaders: &[Box<dyn SourceLoader>],
    ) -> Result<Arc<Dataset>, AnalysisError> {
        let _guard = self.datasets.begin_ingest().await;

        let mut last_error = None;
        for loader in loaders {
            match self.build_dataset(loader.as_ref()).await {
                Ok(dataset) => {
                    info!(
                        "Initial dataset loaded from {} with {} rows",
                        loader.name(),
                        dataset.len()
                    );
                    self.datasets.replace(dataset).await;
                    return Ok(self.datasets.current_snapshot().await);
                }
                Err(e) if e.is_source_unavailable() => {
                    warn!("Source {} unavailable, trying next: {}", loader.name(), e);
                    last_error = Some(e);
                }
                Err(e) => {
                    error!("Source {} produced an unusable dataset: {}", loader.name(), e);
                    last_error = Some(e);
                }
            }
        }

        let err = last_error.unwrap_or_else(|| AnalysisError::ConfigError {
            message: "No source loaders configured".to_string(),
        });
        error!("Initial load failed, keeping current dataset: {}", err);
        Err(err)
    }

    /// Rebuilds from `loader` and publishes the result. A failure leaves the
    /// previous dataset in effect.
    pub async fn ingest(&self, loader: &dyn SourceLoader) -> Result<Arc<Dataset>, AnalysisError> {
        let _guard = self.datasets.begin_ingest().await;

        match self.build_dataset(loader).await {
            Ok(dataset) => {
                self.datasets.replace(dataset).await;
                Ok(self.datasets.current_snapshot().await)
            }
            Err(e) => {
                error!("Ingest from {} failed, keeping current dataset: {}", loader.name(), e);
                Err(e)
            }
        }
    }

    pub async fn ingest_upload(
        &self,
        transactions_path: impl AsRef<Path>,
        households_path: impl AsRef<Path>,
        products_path: impl AsRef<Path>,
    ) -> Result<Arc<Dataset>, AnalysisError> {
        let loader = FileLoader::new(
            transactions_path.as_ref(),
            households_path.as_ref(),
            products_path.as_ref(),
        )
        .with_timeout(self.source_timeout);

        self.ingest(&loader).await
    }

    pub async fn view(&self, household_id: Option<i64>) -> DatasetView {
        let snapshot = self.current_snapshot().await;
        build_view(&snapshot, household_id)
    }

    pub async fn health_check(&self) -> Result<(), AnalysisError> {
        self.datafusion.health_check().await
    }
}

/// Aggregates, correlates and filters one snapshot. Without a requested
/// household the smallest household id is selected.
pub fn build_view(snapshot: &Dataset, household_id: Option<i64>) -> DatasetView {
    let (_, households) = aggregate(snapshot.records());
    let correlation = size_spend_correlation(&households);
    let selected_household = household_id.or_else(|| snapshot.min_household_id());
    let filtered_rows = selected_household
        .map(|id| filter_by_household(snapshot, id))
        .unwrap_or_default();

    DatasetView {
        snapshot: snapshot.info().clone(),
        plot_points: households,
        correlation,
        household_ids: snapshot.household_ids(),
        selected_household,
        filtered_rows,
    }
}
