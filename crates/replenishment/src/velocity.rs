//! Sales-velocity profiles built from the external sales feed.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use optistock_core::{LocationId, ProductId, StockResult};
use optistock_ledger::StockRecord;

use crate::classifier::{AgeBucket, Classification, ClassifierConfig, turnover_rate};

/// One completed sale reported by the POS collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesEvent {
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub quantity: i64,
    pub sold_at: DateTime<Utc>,
}

/// Read-only port onto the POS sales history.
///
/// Implementations return events with `from <= sold_at <= to`, ascending by
/// `sold_at`.
pub trait SalesFeed: Send + Sync {
    fn sales_between(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<SalesEvent>;
}

impl<F> SalesFeed for Arc<F>
where
    F: SalesFeed + ?Sized,
{
    fn sales_between(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<SalesEvent> {
        (**self).sales_between(product_id, location_id, from, to)
    }
}

/// Sales-velocity summary for one product at one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityProfile {
    pub product_id: ProductId,
    pub location_id: LocationId,
    /// Units per day over the trailing 30 days.
    pub average_daily_sales: f64,
    pub sales_last_30_days: i64,
    pub sales_last_90_days: i64,
    /// Annualized units per year over average on-hand.
    pub turnover_rate: f64,
    /// Days since the last restock at this location.
    pub days_in_stock: i64,
    pub last_sale_date: Option<DateTime<Utc>>,
    pub classification: Classification,
    pub age_bucket: AgeBucket,
    pub computed_at: DateTime<Utc>,
}

/// Cache port for refreshed profiles; the dashboard reads from here and
/// never recomputes inline.
pub trait VelocityStore: Send + Sync {
    fn get(&self, product_id: ProductId, location_id: LocationId) -> Option<VelocityProfile>;
    fn put(&self, profile: VelocityProfile) -> StockResult<()>;
    fn list(&self) -> Vec<VelocityProfile>;
}

impl<S> VelocityStore for Arc<S>
where
    S: VelocityStore + ?Sized,
{
    fn get(&self, product_id: ProductId, location_id: LocationId) -> Option<VelocityProfile> {
        (**self).get(product_id, location_id)
    }

    fn put(&self, profile: VelocityProfile) -> StockResult<()> {
        (**self).put(profile)
    }

    fn list(&self) -> Vec<VelocityProfile> {
        (**self).list()
    }
}

/// Builds velocity profiles from the sales feed and a stock record.
///
/// Deterministic: the same feed contents, record and `as_of` always produce
/// the same profile.
#[derive(Debug)]
pub struct VelocityAnalyzer<F> {
    feed: F,
    config: ClassifierConfig,
}

impl<F: SalesFeed> VelocityAnalyzer<F> {
    pub fn new(feed: F) -> Self {
        Self {
            feed,
            config: ClassifierConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ClassifierConfig) -> Self {
        self.config = config;
        self
    }

    /// Profile the position described by `record` as of `as_of`.
    ///
    /// Turnover uses the trailing 365 days of sales when at least a full
    /// year of history exists, otherwise the annualized 90-day window.
    /// Current on-hand stands in for average on-hand.
    pub fn profile(&self, record: &StockRecord, as_of: DateTime<Utc>) -> VelocityProfile {
        let history = self.feed.sales_between(
            record.product_id(),
            record.location_id(),
            DateTime::<Utc>::MIN_UTC,
            as_of,
        );

        let sold_since = |cutoff: DateTime<Utc>| -> i64 {
            history
                .iter()
                .filter(|e| e.sold_at >= cutoff)
                .map(|e| e.quantity)
                .sum()
        };

        let sales_last_30_days = sold_since(as_of - Duration::days(30));
        let sales_last_90_days = sold_since(as_of - Duration::days(90));
        let sales_last_365_days = sold_since(as_of - Duration::days(365));

        let full_year_of_history = history
            .first()
            .map(|e| (as_of - e.sold_at).num_days() >= 365)
            .unwrap_or(false);
        let annual_units = if full_year_of_history {
            sales_last_365_days as f64
        } else {
            sales_last_90_days as f64 * (365.0 / 90.0)
        };

        let turnover = turnover_rate(annual_units, record.on_hand() as f64);
        let days_in_stock = record
            .last_restocked_at()
            .map(|t| (as_of - t).num_days().max(0))
            .unwrap_or(0);

        VelocityProfile {
            product_id: record.product_id(),
            location_id: record.location_id(),
            average_daily_sales: sales_last_30_days as f64 / 30.0,
            sales_last_30_days,
            sales_last_90_days,
            turnover_rate: turnover,
            days_in_stock,
            last_sale_date: history.last().map(|e| e.sold_at),
            classification: self.config.classify(turnover),
            age_bucket: AgeBucket::from_days(days_in_stock),
            computed_at: as_of,
        }
    }
}
