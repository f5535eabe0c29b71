//! Dashboard row types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use optistock_core::{LocationId, ProductId};
use optistock_replenishment::{AgeBucket, Classification, StockStatus};

/// One product × location row on the replenishment dashboard.
///
/// Policy- and velocity-derived fields are `None` when the respective data
/// has not been computed for the position; such rows carry
/// `StockStatus::Uncomputed` and are listed anyway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplenishmentCandidate {
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub product_name: String,
    pub location_name: String,
    pub on_hand: i64,
    pub reserved: i64,
    pub available: i64,
    pub reorder_point: Option<i64>,
    pub reorder_quantity: Option<i64>,
    /// Order that tops the position back up to `max_stock`, never less than
    /// `reorder_quantity`. Only computed for actionable statuses.
    pub suggested_order_qty: Option<i64>,
    pub stock_status: StockStatus,
    pub classification: Option<Classification>,
    pub age_bucket: Option<AgeBucket>,
    pub average_daily_sales: Option<f64>,
    /// Whole days until `available` runs out at the current velocity.
    pub days_until_stockout: Option<i64>,
    pub unit_cost_cents: Option<i64>,
    pub estimated_cost_cents: Option<i64>,
}

/// Narrowing options for [`DashboardService::list_candidates`].
///
/// [`DashboardService::list_candidates`]: crate::service::DashboardService::list_candidates
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateFilter {
    pub location: Option<LocationId>,
    pub status: Option<StockStatus>,
    pub class: Option<Classification>,
    /// Keep only rows whose status warrants action (low, critical or out of
    /// stock). Uncomputed rows are dropped by this flag.
    pub only_actionable: bool,
}

impl CandidateFilter {
    pub fn matches(&self, candidate: &ReplenishmentCandidate) -> bool {
        if let Some(location) = self.location {
            if candidate.location_id != location {
                return false;
            }
        }
        if let Some(status) = self.status {
            if candidate.stock_status != status {
                return false;
            }
        }
        if let Some(class) = self.class {
            if candidate.classification != Some(class) {
                return false;
            }
        }
        if self.only_actionable && !candidate.stock_status.is_actionable() {
            return false;
        }
        true
    }
}

/// One line of a purchase request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseLine {
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub product_name: String,
    pub quantity: i64,
    pub unit_cost_cents: Option<i64>,
}

/// Purchase request handed to the purchasing gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseBatch {
    pub lines: Vec<PurchaseLine>,
    /// Sum over lines with a known unit cost; lines without one contribute
    /// nothing.
    pub total_estimated_cost_cents: i64,
}

/// Raised for positions that are critical or already empty. Generation only;
/// delivery belongs to the notification collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockAlert {
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub product_name: String,
    pub location_name: String,
    pub status: StockStatus,
    pub available: i64,
    pub reorder_point: Option<i64>,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: StockStatus, classification: Option<Classification>) -> ReplenishmentCandidate {
        ReplenishmentCandidate {
            product_id: ProductId::new(),
            location_id: LocationId::new(),
            product_name: "Aviator Frame".to_string(),
            location_name: "High Street Store".to_string(),
            on_hand: 10,
            reserved: 2,
            available: 8,
            reorder_point: Some(26),
            reorder_quantity: Some(93),
            suggested_order_qty: None,
            stock_status: status,
            classification,
            age_bucket: None,
            average_daily_sales: Some(2.5),
            days_until_stockout: Some(3),
            unit_cost_cents: None,
            estimated_cost_cents: None,
        }
    }

    #[test]
    fn class_filter_drops_rows_without_a_classification() {
        let filter = CandidateFilter {
            class: Some(Classification::A),
            ..CandidateFilter::default()
        };
        assert!(filter.matches(&row(StockStatus::Low, Some(Classification::A))));
        assert!(!filter.matches(&row(StockStatus::Low, Some(Classification::C))));
        assert!(!filter.matches(&row(StockStatus::Low, None)));
    }

    #[test]
    fn only_actionable_excludes_healthy_and_uncomputed_rows() {
        let filter = CandidateFilter {
            only_actionable: true,
            ..CandidateFilter::default()
        };
        assert!(filter.matches(&row(StockStatus::OutOfStock, None)));
        assert!(filter.matches(&row(StockStatus::Low, None)));
        assert!(!filter.matches(&row(StockStatus::Healthy, None)));
        assert!(!filter.matches(&row(StockStatus::Uncomputed, None)));
    }

    #[test]
    fn uncomputed_fields_serialize_as_nulls_not_zeroes() {
        let json = serde_json::to_value(row(StockStatus::Uncomputed, None)).unwrap();
        assert_eq!(json["stock_status"], "uncomputed");
        assert_eq!(json["suggested_order_qty"], serde_json::Value::Null);
        assert_eq!(json["classification"], serde_json::Value::Null);
    }
}
