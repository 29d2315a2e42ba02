use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::domain::{JoinReport, UnifiedRecord};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DataSource {
    #[serde(rename = "empty")]
    Empty,
    #[serde(rename = "database")]
    Database,
    #[serde(rename = "files")]
    Files,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Empty => "empty",
            DataSource::Database => "database",
            DataSource::Files => "files",
        }
    }
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotInfo {
    pub id: String,
    pub source: DataSource,
    pub loaded_at: DateTime<Utc>,
    pub row_count: usize,
    pub join: JoinReport,
}

/// An immutable unified record set together with where it came from.
#[derive(Debug, Clone)]
pub struct Dataset {
    info: SnapshotInfo,
    records: Vec<UnifiedRecord>,
}

impl Dataset {
    /// `records` must already be in canonical order.
    pub fn new(source: DataSource, records: Vec<UnifiedRecord>, join: JoinReport) -> Self {
        let info = SnapshotInfo {
            id: format!("ds_{}", Uuid::new_v4().simple()),
            source,
            loaded_at: Utc::now(),
            row_count: records.len(),
            join,
        };
        Self { info, records }
    }

    pub fn empty() -> Self {
        Self::new(DataSource::Empty, Vec::new(), JoinReport::default())
    }

    pub fn info(&self) -> &SnapshotInfo {
        &self.info
    }

    pub fn id(&self) -> &str {
        &self.info.id
    }

    pub fn records(&self) -> &[UnifiedRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct household ids, ascending.
    pub fn household_ids(&self) -> Vec<i64> {
        self.records
            .iter()
            .map(|r| r.household_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn min_household_id(&self) -> Option<i64> {
        self.records.iter().map(|r| r.household_id).min()
    }
}
