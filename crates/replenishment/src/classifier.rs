//! Movement-velocity and aging classification.
//!
//! Pure functions over turnover and stock-age numbers. The thresholds are
//! the standard optical-retail defaults; callers tune them through
//! [`ClassifierConfig`].

use serde::{Deserialize, Serialize};

use optistock_core::{StockError, StockResult};

/// A/B/C movement class by annualized turnover.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    /// Fast mover; stock these deep.
    A,
    /// Steady mover.
    B,
    /// Slow mover; candidate for markdown or return-to-vendor.
    C,
}

/// Turnover thresholds separating the A/B/C classes.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub a_threshold: f64,
    pub c_threshold: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            a_threshold: 8.0,
            c_threshold: 2.0,
        }
    }
}

impl ClassifierConfig {
    pub fn new(a_threshold: f64, c_threshold: f64) -> StockResult<Self> {
        if !(a_threshold.is_finite() && c_threshold.is_finite()) {
            return Err(StockError::validation("classifier thresholds must be finite"));
        }
        if c_threshold <= 0.0 || a_threshold <= c_threshold {
            return Err(StockError::validation(
                "classifier thresholds must satisfy a_threshold > c_threshold > 0",
            ));
        }
        Ok(Self {
            a_threshold,
            c_threshold,
        })
    }

    /// Boundary values resolve upward: exactly `a_threshold` is A, exactly
    /// `c_threshold` is B.
    pub fn classify(&self, turnover: f64) -> Classification {
        if turnover >= self.a_threshold {
            Classification::A
        } else if turnover < self.c_threshold {
            Classification::C
        } else {
            Classification::B
        }
    }
}

/// Annualized turnover: units sold per year over average on-hand.
///
/// Returns 0 when average on-hand is not positive; a shelf that holds
/// nothing turns nothing.
pub fn turnover_rate(annual_units_sold: f64, average_on_hand: f64) -> f64 {
    if average_on_hand <= 0.0 {
        return 0.0;
    }
    annual_units_sold / average_on_hand
}

/// How long the current stock has sat since the last restock.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgeBucket {
    #[serde(rename = "0-30")]
    Days0To30,
    #[serde(rename = "31-60")]
    Days31To60,
    #[serde(rename = "61-90")]
    Days61To90,
    #[serde(rename = "91-180")]
    Days91To180,
    #[serde(rename = "180+")]
    Over180,
}

impl AgeBucket {
    pub fn from_days(days_in_stock: i64) -> Self {
        match days_in_stock {
            i64::MIN..=30 => AgeBucket::Days0To30,
            31..=60 => AgeBucket::Days31To60,
            61..=90 => AgeBucket::Days61To90,
            91..=180 => AgeBucket::Days91To180,
            _ => AgeBucket::Over180,
        }
    }
}

impl core::fmt::Display for AgeBucket {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let label = match self {
            AgeBucket::Days0To30 => "0-30",
            AgeBucket::Days31To60 => "31-60",
            AgeBucket::Days61To90 => "61-90",
            AgeBucket::Days91To180 => "91-180",
            AgeBucket::Over180 => "180+",
        };
        f.write_str(label)
    }
}

/// Health of a position relative to its reorder point. Orthogonal to the
/// A/B/C class: a fast mover can be healthy and a slow mover critical.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    Healthy,
    Low,
    Critical,
    OutOfStock,
    /// No policy (or no velocity data) exists for the position yet.
    /// Never produced by [`StockStatus::evaluate`].
    Uncomputed,
}

impl StockStatus {
    pub fn evaluate(available: i64, reorder_point: i64) -> Self {
        if available <= 0 {
            StockStatus::OutOfStock
        } else if (available as f64) <= reorder_point as f64 * 0.5 {
            StockStatus::Critical
        } else if available <= reorder_point {
            StockStatus::Low
        } else {
            StockStatus::Healthy
        }
    }

    /// Statuses that warrant action on the replenishment dashboard.
    pub fn is_actionable(&self) -> bool {
        matches!(
            self,
            StockStatus::Low | StockStatus::Critical | StockStatus::OutOfStock
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_fast_steady_and_slow_movers() {
        let config = ClassifierConfig::default();
        assert_eq!(config.classify(9.0), Classification::A);
        assert_eq!(config.classify(5.0), Classification::B);
        assert_eq!(config.classify(1.5), Classification::C);
    }

    #[test]
    fn threshold_boundaries_resolve_upward() {
        let config = ClassifierConfig::default();
        assert_eq!(config.classify(8.0), Classification::A);
        assert_eq!(config.classify(2.0), Classification::B);
        assert_eq!(config.classify(1.999), Classification::C);
    }

    #[test]
    fn config_rejects_inverted_or_non_positive_thresholds() {
        assert!(matches!(
            ClassifierConfig::new(2.0, 8.0).unwrap_err(),
            StockError::Validation(_)
        ));
        assert!(matches!(
            ClassifierConfig::new(8.0, 0.0).unwrap_err(),
            StockError::Validation(_)
        ));
        assert!(matches!(
            ClassifierConfig::new(8.0, 8.0).unwrap_err(),
            StockError::Validation(_)
        ));
        assert!(ClassifierConfig::new(8.0, 2.0).is_ok());
    }

    #[test]
    fn turnover_is_zero_without_stock_on_hand() {
        assert_eq!(turnover_rate(365.0, 0.0), 0.0);
        assert_eq!(turnover_rate(365.0, -1.0), 0.0);
        assert!((turnover_rate(365.0, 40.0) - 9.125).abs() < f64::EPSILON);
    }

    #[test]
    fn age_buckets_have_fixed_boundaries() {
        assert_eq!(AgeBucket::from_days(0), AgeBucket::Days0To30);
        assert_eq!(AgeBucket::from_days(30), AgeBucket::Days0To30);
        assert_eq!(AgeBucket::from_days(31), AgeBucket::Days31To60);
        assert_eq!(AgeBucket::from_days(60), AgeBucket::Days31To60);
        assert_eq!(AgeBucket::from_days(61), AgeBucket::Days61To90);
        assert_eq!(AgeBucket::from_days(90), AgeBucket::Days61To90);
        assert_eq!(AgeBucket::from_days(91), AgeBucket::Days91To180);
        assert_eq!(AgeBucket::from_days(95), AgeBucket::Days91To180);
        assert_eq!(AgeBucket::from_days(180), AgeBucket::Days91To180);
        assert_eq!(AgeBucket::from_days(181), AgeBucket::Over180);
    }

    #[test]
    fn stock_status_follows_the_reorder_point() {
        // reorder point 26: critical at or below 13, low at or below 26.
        assert_eq!(StockStatus::evaluate(0, 26), StockStatus::OutOfStock);
        assert_eq!(StockStatus::evaluate(13, 26), StockStatus::Critical);
        assert_eq!(StockStatus::evaluate(14, 26), StockStatus::Low);
        assert_eq!(StockStatus::evaluate(26, 26), StockStatus::Low);
        assert_eq!(StockStatus::evaluate(27, 26), StockStatus::Healthy);
    }

    #[test]
    fn zero_reorder_point_only_flags_empty_positions() {
        assert_eq!(StockStatus::evaluate(0, 0), StockStatus::OutOfStock);
        assert_eq!(StockStatus::evaluate(1, 0), StockStatus::Healthy);
    }

    #[test]
    fn serializes_buckets_and_statuses_with_stable_names() {
        assert_eq!(
            serde_json::to_value(AgeBucket::Days91To180).unwrap(),
            serde_json::json!("91-180")
        );
        assert_eq!(
            serde_json::to_value(StockStatus::OutOfStock).unwrap(),
            serde_json::json!("out_of_stock")
        );
    }
}
