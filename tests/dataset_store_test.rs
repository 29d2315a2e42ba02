mod common;

use common::{init_test_logging, scenario_sources};
use futures::future::join_all;
use household_analytics::catalog::{DataSource, Dataset};
use household_analytics::config::ServiceConfig;
use household_analytics::dataset_manager::DatasetManager;
use household_analytics::domain::{JoinReport, UnifiedRecord};
use household_analytics::AnalysisEngine;
use std::sync::Arc;

/// A dataset whose every row carries `version` as its household id and which
/// has exactly `version` rows, so any mix of two versions is detectable.
fn versioned_dataset(version: i64) -> Dataset {
    let records = (0..version)
        .map(|basket| UnifiedRecord {
            household_id: version,
            basket_id: basket,
            purchase_date: "01-JAN-18".to_string(),
            product_id: 1,
            department: "FOOD".to_string(),
            commodity: "DAIRY".to_string(),
            spend: 1.0,
            household_size: 2,
            extra: Default::default(),
        })
        .collect();
    Dataset::new(DataSource::Files, records, JoinReport::default())
}

fn assert_consistent(snapshot: &Dataset) {
    let version = snapshot.len() as i64;
    assert!(
        snapshot.records().iter().all(|r| r.household_id == version),
        "snapshot {} mixes rows from different datasets",
        snapshot.id()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_never_observe_a_partial_replace() {
    init_test_logging();

    // Given: a store serving version 1
    let manager = Arc::new(DatasetManager::with_dataset(versioned_dataset(1)));

    // When: a writer publishes versions 2..=60 while readers snapshot continuously
    let writer = {
        let manager = manager.clone();
        tokio::spawn(async move {
            for version in 2..=60 {
                manager.replace(versioned_dataset(version)).await;
                tokio::task::yield_now().await;
            }
        })
    };

    let readers: Vec<_> = (0..8).map(|_| {
        let manager = manager.clone();
        tokio::spawn(async move {
            let mut last_seen = 0;
            for _ in 0..200 {
                let snapshot = manager.current_snapshot().await;
                assert_consistent(&snapshot);
                // versions only move forward
                assert!(snapshot.len() >= last_seen);
                last_seen = snapshot.len();
                tokio::task::yield_now().await;
            }
        })
    })
    .collect();

    writer.await.expect("writer task");
    for reader in join_all(readers).await {
        reader.expect("reader task");
    }

    // Then: the last replace is visible to a fresh snapshot
    assert_eq!(manager.current_snapshot().await.len(), 60);
}

#[tokio::test]
async fn test_snapshot_taken_before_replace_stays_whole() {
    init_test_logging();

    // Given
    let manager = DatasetManager::with_dataset(versioned_dataset(3));
    let in_flight = manager.current_snapshot().await;

    // When
    let previous = manager.replace(versioned_dataset(7)).await;

    // Then: the reader still holds the complete old dataset
    assert_eq!(previous.id(), in_flight.id());
    assert_eq!(in_flight.len(), 3);
    assert_consistent(&in_flight);
    assert_eq!(manager.current_snapshot().await.len(), 7);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_views_during_ingest() {
    init_test_logging();

    // Given: an engine and the scenario upload
    let engine = Arc::new(AnalysisEngine::new(&ServiceConfig::default()).expect("engine"));
    let files = scenario_sources();

    // When: views run while the upload is ingested
    let viewers: Vec<_> = (0..4).map(|_| {
        let engine = engine.clone();
        tokio::spawn(async move {
            let mut row_counts = Vec::new();
            for _ in 0..25 {
                let view = engine.view(None).await;
                assert_eq!(view.snapshot.row_count, view.filtered_rows.len());
                row_counts.push(view.snapshot.row_count);
                tokio::task::yield_now().await;
            }
            row_counts
        })
    })
    .collect();
    let ingest = engine.ingest_upload(&files.transactions, &files.households, &files.products);

    let (ingested, views) = tokio::join!(ingest, join_all(viewers));

    // Then: every view saw either the empty or the complete dataset
    assert_eq!(ingested.expect("ingest").len(), 3);
    for counts in views {
        assert!(counts.expect("viewer task").iter().all(|c| *c == 0 || *c == 3));
    }
}
