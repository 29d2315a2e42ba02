use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::catalog::SnapshotInfo;
use crate::correlation::Correlation;

/// One transaction line joined with its product and household.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedRecord {
    pub household_id: i64,
    pub basket_id: i64,
    pub purchase_date: String,
    pub product_id: i64,
    pub department: String,
    pub commodity: String,
    pub spend: f64,
    pub household_size: i64,
    /// Remaining source columns (store region, units, demographics, ...)
    /// as text, keyed by canonical column name.
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl UnifiedRecord {
    /// Canonical order: household, basket, purchase date, product,
    /// department, commodity. Spend, size and the pass-through columns
    /// break the remaining ties so the order is total.
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.household_id
            .cmp(&other.household_id)
            .then_with(|| self.basket_id.cmp(&other.basket_id))
            .then_with(|| self.purchase_date.cmp(&other.purchase_date))
            .then_with(|| self.product_id.cmp(&other.product_id))
            .then_with(|| self.department.cmp(&other.department))
            .then_with(|| self.commodity.cmp(&other.commodity))
            .then_with(|| self.spend.total_cmp(&other.spend))
            .then_with(|| self.household_size.cmp(&other.household_size))
            .then_with(|| self.extra.cmp(&other.extra))
    }
}

pub fn sort_canonical(records: &mut [UnifiedRecord]) {
    records.sort_by(UnifiedRecord::canonical_cmp);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasketAggregate {
    pub household_id: i64,
    pub basket_id: i64,
    pub household_size: i64,
    pub total_spend: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseholdAggregate {
    pub household_id: i64,
    pub household_size: i64,
    pub total_spend: f64,
}

/// Rows lost to the inner joins, kept for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinReport {
    pub transaction_rows: usize,
    pub joined_rows: usize,
    pub dropped_rows: usize,
}

/// Everything a presentation layer needs for one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetView {
    pub snapshot: SnapshotInfo,
    /// Household size against total spend, one point per household.
    pub plot_points: Vec<HouseholdAggregate>,
    pub correlation: Correlation,
    pub household_ids: Vec<i64>,
    pub selected_household: Option<i64>,
    pub filtered_rows: Vec<UnifiedRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(household_id: i64, basket_id: i64, date: &str, product_id: i64, spend: f64) -> UnifiedRecord {
        UnifiedRecord {
            household_id,
            basket_id,
            purchase_date: date.to_string(),
            product_id,
            department: "FOOD".to_string(),
            commodity: "PRODUCE".to_string(),
            spend,
            household_size: 2,
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn canonical_sort_orders_by_compound_key() {
        let mut records = vec![
            record(2, 1, "2018-01-01", 1, 1.0),
            record(1, 2, "2018-01-01", 1, 1.0),
            record(1, 1, "2018-01-02", 1, 1.0),
            record(1, 1, "2018-01-01", 9, 1.0),
            record(1, 1, "2018-01-01", 3, 1.0),
        ];

        sort_canonical(&mut records);

        let keys: Vec<_> = records
            .iter()
            .map(|r| (r.household_id, r.basket_id, r.purchase_date.as_str(), r.product_id))
            .collect();
        assert_eq!(
            keys,
            vec![
                (1, 1, "2018-01-01", 3),
                (1, 1, "2018-01-01", 9),
                (1, 1, "2018-01-02", 1),
                (1, 2, "2018-01-01", 1),
                (2, 1, "2018-01-01", 1),
            ]
        );
    }

    #[test]
    fn canonical_sort_is_repeatable_with_key_ties() {
        let mut first = vec![
            record(1, 1, "d", 1, 7.0),
            record(1, 1, "d", 1, 2.0),
            record(1, 1, "d", 1, 7.0),
        ];
        let mut second = vec![first[2].clone(), first[0].clone(), first[1].clone()];

        sort_canonical(&mut first);
        sort_canonical(&mut second);

        assert_eq!(first, second);
        assert_eq!(first[0].spend, 2.0);
    }
}
