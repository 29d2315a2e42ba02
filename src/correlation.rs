use serde::{Deserialize, Serialize};

use crate::domain::HouseholdAggregate;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndefinedReason {
    InsufficientRows,
    ZeroSizeVariance,
    ZeroSpendVariance,
}

/// Pearson coefficient between household size and total spend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Correlation {
    Defined { value: f64 },
    Undefined { reason: UndefinedReason },
}

impl Correlation {
    pub fn value(&self) -> Option<f64> {
        match self {
            Correlation::Defined { value } => Some(*value),
            Correlation::Undefined { .. } => None,
        }
    }
}

impl std::fmt::Display for Correlation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Correlation::Defined { value } => write!(f, "{:.4}", value),
            Correlation::Undefined { .. } => write!(f, "undefined"),
        }
    }
}

pub fn size_spend_correlation(households: &[HouseholdAggregate]) -> Correlation {
    let sizes: Vec<f64> = households.iter().map(|h| h.household_size as f64).collect();
    let spends: Vec<f64> = households.iter().map(|h| h.total_spend).collect();
    pearson(&sizes, &spends)
}

pub fn pearson(xs: &[f64], ys: &[f64]) -> Correlation {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return Correlation::Undefined {
            reason: UndefinedReason::InsufficientRows,
        };
    }
    let (xs, ys) = (&xs[..n], &ys[..n]);

    // constant columns are checked exactly; a computed variance of a
    // constant like 0.1 can come out slightly above zero
    if is_constant(xs) {
        return Correlation::Undefined {
            reason: UndefinedReason::ZeroSizeVariance,
        };
    }
    if is_constant(ys) {
        return Correlation::Undefined {
            reason: UndefinedReason::ZeroSpendVariance,
        };
    }

    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;

    let mut covariance = 0.0;
    let mut variance_x = 0.0;
    let mut variance_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        covariance += dx * dy;
        variance_x += dx * dx;
        variance_y += dy * dy;
    }

    if variance_x == 0.0 {
        return Correlation::Undefined {
            reason: UndefinedReason::ZeroSizeVariance,
        };
    }
    if variance_y == 0.0 {
        return Correlation::Undefined {
            reason: UndefinedReason::ZeroSpendVariance,
        };
    }

    let value = covariance / (variance_x.sqrt() * variance_y.sqrt());
    Correlation::Defined {
        value: value.clamp(-1.0, 1.0),
    }
}

fn is_constant(values: &[f64]) -> bool {
    values.iter().all(|v| *v == values[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn household(household_id: i64, household_size: i64, total_spend: f64) -> HouseholdAggregate {
        HouseholdAggregate {
            household_id,
            household_size,
            total_spend,
        }
    }

    #[test]
    fn perfectly_linear_data_correlates_to_one() {
        let households = vec![household(1, 1, 10.0), household(2, 2, 20.0), household(3, 3, 30.0)];
        let value = size_spend_correlation(&households).value().unwrap();
        assert!((value - 1.0).abs() < 1e-12);
    }

    #[test]
    fn inverse_data_correlates_to_minus_one() {
        let households = vec![household(1, 1, 30.0), household(2, 2, 20.0), household(3, 3, 10.0)];
        let value = size_spend_correlation(&households).value().unwrap();
        assert!((value + 1.0).abs() < 1e-12);
    }

    #[test]
    fn correlation_is_bounded_and_symmetric() {
        let xs = [1.0, 2.0, 2.0, 4.0, 5.0];
        let ys = [12.5, 3.0, 40.0, 7.25, 19.0];
        let forward = pearson(&xs, &ys).value().unwrap();
        let backward = pearson(&ys, &xs).value().unwrap();
        assert!((-1.0..=1.0).contains(&forward));
        assert!((forward - backward).abs() < 1e-12);
    }

    #[test]
    fn identical_sizes_are_undefined() {
        let households = vec![household(1, 2, 10.0), household(2, 2, 50.0)];
        assert_eq!(
            size_spend_correlation(&households),
            Correlation::Undefined { reason: UndefinedReason::ZeroSizeVariance }
        );
    }

    #[test]
    fn identical_spend_is_undefined() {
        let households = vec![household(1, 1, 10.0), household(2, 3, 10.0)];
        assert_eq!(
            size_spend_correlation(&households),
            Correlation::Undefined { reason: UndefinedReason::ZeroSpendVariance }
        );
    }

    #[test]
    fn constant_inexact_spend_is_undefined() {
        let households = vec![household(1, 1, 0.1), household(2, 2, 0.1), household(3, 3, 0.1)];
        assert_eq!(
            size_spend_correlation(&households),
            Correlation::Undefined { reason: UndefinedReason::ZeroSpendVariance }
        );
    }

    #[test]
    fn fewer_than_two_rows_is_undefined() {
        assert_eq!(
            size_spend_correlation(&[household(1, 3, 35.0)]),
            Correlation::Undefined { reason: UndefinedReason::InsufficientRows }
        );
        assert_eq!(size_spend_correlation(&[]).value(), None);
    }
}
