//! Basket and household rollups over a unified record set.
//!
//! Spend is summed per basket first and only then per household, so a basket
//! spanning several product lines contributes its lines exactly once.

use std::collections::BTreeMap;

use crate::domain::{BasketAggregate, HouseholdAggregate, UnifiedRecord};

/// Groups by (household, basket). Household size is the first value seen in
/// record order.
pub fn basket_aggregates(records: &[UnifiedRecord]) -> Vec<BasketAggregate> {
    let mut baskets: BTreeMap<(i64, i64), BasketAggregate> = BTreeMap::new();
    for record in records {
        baskets
            .entry((record.household_id, record.basket_id))
            .or_insert_with(|| BasketAggregate {
                household_id: record.household_id,
                basket_id: record.basket_id,
                household_size: record.household_size,
                total_spend: 0.0,
            })
            .total_spend += record.spend;
    }
    baskets.into_values().collect()
}

/// Groups baskets by household and drops households whose size is unknown
/// (zero or less).
pub fn household_aggregates(baskets: &[BasketAggregate]) -> Vec<HouseholdAggregate> {
    let mut households: BTreeMap<i64, HouseholdAggregate> = BTreeMap::new();
    for basket in baskets {
        households
            .entry(basket.household_id)
            .or_insert_with(|| HouseholdAggregate {
                household_id: basket.household_id,
                household_size: basket.household_size,
                total_spend: 0.0,
            })
            .total_spend += basket.total_spend;
    }
    households
        .into_values()
        .filter(|household| household.household_size > 0)
        .collect()
}

/// Both rollup stages in order.
pub fn aggregate(records: &[UnifiedRecord]) -> (Vec<BasketAggregate>, Vec<HouseholdAggregate>) {
    let baskets = basket_aggregates(records);
    let households = household_aggregates(&baskets);
    (baskets, households)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(household_id: i64, basket_id: i64, product_id: i64, spend: f64, size: i64) -> UnifiedRecord {
        UnifiedRecord {
            household_id,
            basket_id,
            purchase_date: "2018-08-17".to_string(),
            product_id,
            department: "FOOD".to_string(),
            commodity: "DAIRY".to_string(),
            spend,
            household_size: size,
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn baskets_sum_lines_and_households_sum_baskets() {
        let records = vec![
            line(1, 1, 1, 10.0, 3),
            line(1, 1, 2, 5.0, 3),
            line(1, 2, 1, 20.0, 3),
        ];

        let (baskets, households) = aggregate(&records);

        assert_eq!(
            baskets,
            vec![
                BasketAggregate { household_id: 1, basket_id: 1, household_size: 3, total_spend: 15.0 },
                BasketAggregate { household_id: 1, basket_id: 2, household_size: 3, total_spend: 20.0 },
            ]
        );
        assert_eq!(
            households,
            vec![HouseholdAggregate { household_id: 1, household_size: 3, total_spend: 35.0 }]
        );
    }

    #[test]
    fn household_spend_matches_line_spend() {
        let records = vec![
            line(1, 1, 1, 1.25, 2),
            line(1, 1, 2, 2.5, 2),
            line(1, 3, 2, 4.0, 2),
            line(2, 1, 1, 8.0, 4),
            line(2, 2, 1, 0.75, 4),
        ];

        let (baskets, households) = aggregate(&records);

        for household in &households {
            let from_baskets: f64 = baskets
                .iter()
                .filter(|b| b.household_id == household.household_id)
                .map(|b| b.total_spend)
                .sum();
            let from_lines: f64 = records
                .iter()
                .filter(|r| r.household_id == household.household_id)
                .map(|r| r.spend)
                .sum();
            assert!((household.total_spend - from_baskets).abs() < 1e-9);
            assert!((household.total_spend - from_lines).abs() < 1e-9);
        }
    }

    #[test]
    fn unknown_household_sizes_are_filtered() {
        let records = vec![line(1, 1, 1, 10.0, 0), line(2, 1, 1, 3.0, 1)];

        let (baskets, households) = aggregate(&records);

        assert_eq!(baskets.len(), 2);
        assert_eq!(households.len(), 1);
        assert_eq!(households[0].household_id, 2);
    }

    #[test]
    fn household_size_is_first_value_in_record_order() {
        let records = vec![line(1, 1, 1, 1.0, 2), line(1, 1, 2, 1.0, 5)];

        let baskets = basket_aggregates(&records);

        assert_eq!(baskets[0].household_size, 2);
    }

    #[test]
    fn empty_input_yields_empty_rollups() {
        let (baskets, households) = aggregate(&[]);
        assert!(baskets.is_empty());
        assert!(households.is_empty());
    }
}
