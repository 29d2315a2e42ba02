//! Schema normalization: header cleanup, canonical renames and typed
//! coercion of the columns the pipeline reads.

use datafusion::arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use datafusion::arrow::datatypes::{DataType, Field, Schema};
use datafusion::arrow::record_batch::RecordBatch;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

use crate::error::AnalysisError;
use crate::schema::{column_kind, ColumnKind, TableKind};

/// Sentinel household sizes, checked before the integer parse.
const HOUSEHOLD_SIZE_SENTINELS: &[(&str, i64)] = &[("null", 0), ("5+", 5)];

/// Tabular input as read from a source, every cell still text.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub kind: TableKind,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(kind: TableKind, columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            kind,
            columns,
            rows,
        }
    }
}

/// A table with canonical column names and typed key, spend and size columns.
#[derive(Debug, Clone)]
pub struct NormalizedTable {
    pub kind: TableKind,
    pub batch: RecordBatch,
}

impl NormalizedTable {
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.batch.schema().column_with_name(name).is_some()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    #[error("empty value")]
    Empty,
    #[error("not an integer")]
    NotInteger,
    #[error("not a finite number")]
    NotNumber,
    #[error("household size cannot be negative")]
    NegativeSize,
}

/// Maps a raw household size to its integer value.
pub fn normalize_household_size(raw: &str) -> Result<i64, ValueError> {
    let value = raw.trim();
    if let Some((_, size)) = HOUSEHOLD_SIZE_SENTINELS
        .iter()
        .find(|(sentinel, _)| *sentinel == value)
    {
        return Ok(*size);
    }
    if value.is_empty() {
        return Err(ValueError::Empty);
    }
    let size = value.parse::<i64>().map_err(|_| ValueError::NotInteger)?;
    if size < 0 {
        return Err(ValueError::NegativeSize);
    }
    Ok(size)
}

/// Parses an identifier cell. Empty and `null` cells are null and never
/// match a join.
pub fn parse_identifier(raw: &str) -> Result<Option<i64>, ValueError> {
    let value = raw.trim();
    if value.is_empty() || value == "null" {
        return Ok(None);
    }
    if let Ok(id) = value.parse::<i64>() {
        return Ok(Some(id));
    }
    // numeric SQL columns can render as "10.0"
    match value.parse::<f64>() {
        Ok(float)
            if float.is_finite()
                && float.fract() == 0.0
                && float >= i64::MIN as f64
                && float <= i64::MAX as f64 =>
        {
            Ok(Some(float as i64))
        }
        _ => Err(ValueError::NotInteger),
    }
}

pub fn parse_spend(raw: &str) -> Result<f64, ValueError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ValueError::Empty);
    }
    match value.parse::<f64>() {
        Ok(spend) if spend.is_finite() => Ok(spend),
        _ => Err(ValueError::NotNumber),
    }
}

/// Trims and uppercases every identifier, then applies `renames`.
/// Canonical input passes through unchanged. PostgreSQL reports unquoted
/// identifiers in lowercase.
pub fn normalize_headers(columns: &[String], renames: &[(&str, &str)]) -> Vec<String> {
    columns
        .iter()
        .map(|column| {
            let cleaned = column.trim_start_matches('\u{feff}').trim().to_uppercase();
            renames
                .iter()
                .find(|(raw, _)| *raw == cleaned)
                .map(|(_, canonical)| canonical.to_string())
                .unwrap_or(cleaned)
        })
        .collect()
}

/// Normalizes headers and coerces known columns into a typed batch.
pub fn normalize_table(
    raw: &RawTable,
    renames: &[(&str, &str)],
) -> Result<NormalizedTable, AnalysisError> {
    let table = raw.kind.as_str();
    let columns = normalize_headers(&raw.columns, renames);

    if columns.is_empty() {
        return Err(AnalysisError::JoinKeyMissing {
            table: table.to_string(),
            column: raw.kind.join_keys()[0].to_string(),
        });
    }

    let mut seen = HashSet::new();
    for column in &columns {
        if !seen.insert(column.as_str()) {
            return Err(AnalysisError::InvalidInput {
                message: format!("Duplicate column {} in {} table", column, table),
            });
        }
    }

    for (index, row) in raw.rows.iter().enumerate() {
        if row.len() != columns.len() {
            return Err(AnalysisError::InvalidInput {
                message: format!(
                    "Row {} of {} table has {} cells, expected {}",
                    index,
                    table,
                    row.len(),
                    columns.len()
                ),
            });
        }
    }

    let mut fields = Vec::with_capacity(columns.len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(columns.len());

    for (position, name) in columns.iter().enumerate() {
        let cells = raw.rows.iter().map(|row| row[position].as_str());
        let failure = |row: usize, value: &str, err: ValueError| AnalysisError::NormalizationFailed {
            table: table.to_string(),
            column: name.clone(),
            row,
            value: value.to_string(),
            reason: err.to_string(),
        };

        match column_kind(name) {
            ColumnKind::Identifier => {
                let values = cells
                    .enumerate()
                    .map(|(row, cell)| parse_identifier(cell).map_err(|e| failure(row, cell, e)))
                    .collect::<Result<Vec<_>, _>>()?;
                fields.push(Field::new(name, DataType::Int64, true));
                arrays.push(Arc::new(Int64Array::from(values)));
            }
            ColumnKind::Spend => {
                let values = cells
                    .enumerate()
                    .map(|(row, cell)| parse_spend(cell).map_err(|e| failure(row, cell, e)))
                    .collect::<Result<Vec<_>, _>>()?;
                fields.push(Field::new(name, DataType::Float64, false));
                arrays.push(Arc::new(Float64Array::from(values)));
            }
            ColumnKind::HouseholdSize => {
                let values = cells
                    .enumerate()
                    .map(|(row, cell)| {
                        normalize_household_size(cell).map_err(|e| failure(row, cell, e))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                fields.push(Field::new(name, DataType::Int64, false));
                arrays.push(Arc::new(Int64Array::from(values)));
            }
            ColumnKind::Text => {
                fields.push(Field::new(name, DataType::Utf8, true));
                arrays.push(Arc::new(StringArray::from(cells.collect::<Vec<_>>())));
            }
        }
    }

    let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;

    Ok(NormalizedTable {
        kind: raw.kind,
        batch,
    })
}
