//! Reorder-point policy computation and the policy engine.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use optistock_core::{LocationId, ProductId, StockError, StockResult};

use crate::velocity::VelocityProfile;

/// Whether a policy tracks velocity automatically or is pinned by hand.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyMode {
    /// Recomputed whenever the velocity profile refreshes.
    Auto,
    /// Operator-set numbers; untouched by refreshes until edited.
    Manual,
}

/// Supplier-facing inputs to the reorder computation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyParams {
    /// Days between placing an order and stock arriving. Must be positive.
    pub lead_time_days: u32,
    /// Days between reorder reviews; the order must cover lead time plus one
    /// full review cycle.
    pub review_period_days: u32,
    /// Extra days of demand held back against supplier variance.
    pub safety_buffer_days: u32,
}

impl PolicyParams {
    pub fn for_lead_time(lead_time_days: u32) -> Self {
        Self {
            lead_time_days,
            review_period_days: 30,
            safety_buffer_days: 3,
        }
    }
}

impl Default for PolicyParams {
    fn default() -> Self {
        Self::for_lead_time(7)
    }
}

/// Output of the pure reorder computation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyComputation {
    pub lead_time_stock: i64,
    pub safety_stock: i64,
    pub reorder_point: i64,
    pub reorder_quantity: i64,
    pub max_stock: i64,
}

/// Compute reorder numbers from a demand rate and supplier parameters.
///
/// Demand over a window is rounded up to whole units per window, so the
/// reorder point covers lead-time demand plus the safety buffer, and the
/// reorder quantity covers lead time plus one review period (at least one
/// unit, so even dormant products can be topped up).
pub fn compute_policy(avg_daily_sales: f64, params: &PolicyParams) -> StockResult<PolicyComputation> {
    if params.lead_time_days == 0 {
        return Err(StockError::policy("lead_time_days must be positive"));
    }
    if !avg_daily_sales.is_finite() || avg_daily_sales < 0.0 {
        return Err(StockError::policy(
            "average daily sales must be a non-negative number",
        ));
    }

    let demand_over = |days: u32| (avg_daily_sales * f64::from(days)).ceil() as i64;

    let lead_time_stock = demand_over(params.lead_time_days);
    let safety_stock = demand_over(params.safety_buffer_days);
    let reorder_point = lead_time_stock + safety_stock;
    let reorder_quantity = demand_over(params.lead_time_days + params.review_period_days).max(1);
    let max_stock = reorder_point + reorder_quantity;

    Ok(PolicyComputation {
        lead_time_stock,
        safety_stock,
        reorder_point,
        reorder_quantity,
        max_stock,
    })
}

/// Reorder policy for one product at one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplenishmentPolicy {
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub reorder_point: i64,
    pub reorder_quantity: i64,
    pub max_stock: i64,
    pub lead_time_days: u32,
    pub review_period_days: u32,
    pub safety_buffer_days: u32,
    pub mode: PolicyMode,
    pub computed_at: DateTime<Utc>,
}

impl ReplenishmentPolicy {
    /// Auto policy from a computed result.
    pub fn auto(
        product_id: ProductId,
        location_id: LocationId,
        computation: PolicyComputation,
        params: &PolicyParams,
        computed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            product_id,
            location_id,
            reorder_point: computation.reorder_point,
            reorder_quantity: computation.reorder_quantity,
            max_stock: computation.max_stock,
            lead_time_days: params.lead_time_days,
            review_period_days: params.review_period_days,
            safety_buffer_days: params.safety_buffer_days,
            mode: PolicyMode::Auto,
            computed_at,
        }
    }

    /// Operator-set policy. Validates the same bounds `validate` checks.
    pub fn manual(
        product_id: ProductId,
        location_id: LocationId,
        reorder_point: i64,
        reorder_quantity: i64,
        max_stock: i64,
        params: &PolicyParams,
        computed_at: DateTime<Utc>,
    ) -> StockResult<Self> {
        let policy = Self {
            product_id,
            location_id,
            reorder_point,
            reorder_quantity,
            max_stock,
            lead_time_days: params.lead_time_days,
            review_period_days: params.review_period_days,
            safety_buffer_days: params.safety_buffer_days,
            mode: PolicyMode::Manual,
            computed_at,
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn params(&self) -> PolicyParams {
        PolicyParams {
            lead_time_days: self.lead_time_days,
            review_period_days: self.review_period_days,
            safety_buffer_days: self.safety_buffer_days,
        }
    }

    pub fn validate(&self) -> StockResult<()> {
        if self.lead_time_days == 0 {
            return Err(StockError::policy("lead_time_days must be positive"));
        }
        if self.reorder_point < 0 || self.reorder_quantity < 0 || self.max_stock < 0 {
            return Err(StockError::policy("policy quantities cannot be negative"));
        }
        if self.max_stock < self.reorder_point {
            return Err(StockError::policy(format!(
                "max_stock {} is below reorder_point {}",
                self.max_stock, self.reorder_point
            )));
        }
        Ok(())
    }
}

/// Persistence port for policies.
pub trait PolicyStore: Send + Sync {
    fn get(&self, product_id: ProductId, location_id: LocationId) -> Option<ReplenishmentPolicy>;
    fn put(&self, policy: ReplenishmentPolicy) -> StockResult<()>;
    fn list(&self) -> Vec<ReplenishmentPolicy>;
}

impl<S> PolicyStore for Arc<S>
where
    S: PolicyStore + ?Sized,
{
    fn get(&self, product_id: ProductId, location_id: LocationId) -> Option<ReplenishmentPolicy> {
        (**self).get(product_id, location_id)
    }

    fn put(&self, policy: ReplenishmentPolicy) -> StockResult<()> {
        (**self).put(policy)
    }

    fn list(&self) -> Vec<ReplenishmentPolicy> {
        (**self).list()
    }
}

/// Stores and recomputes reorder policies.
///
/// Policies never touch transfers or the stock ledger; editing one while
/// transfers are in flight is always safe.
#[derive(Debug)]
pub struct PolicyEngine<S> {
    store: S,
}

impl<S: PolicyStore> PolicyEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn get(
        &self,
        product_id: ProductId,
        location_id: LocationId,
    ) -> Option<ReplenishmentPolicy> {
        self.store.get(product_id, location_id)
    }

    pub fn list(&self) -> Vec<ReplenishmentPolicy> {
        self.store.list()
    }

    /// Store an operator-set policy. The stored mode is always `Manual`.
    pub fn set_manual(&self, mut policy: ReplenishmentPolicy) -> StockResult<ReplenishmentPolicy> {
        policy.mode = PolicyMode::Manual;
        policy.validate()?;
        self.store.put(policy.clone())?;
        tracing::debug!(
            product_id = %policy.product_id,
            location_id = %policy.location_id,
            reorder_point = policy.reorder_point,
            "manual replenishment policy stored"
        );
        Ok(policy)
    }

    /// Recompute the policy for a freshly refreshed velocity profile.
    ///
    /// Manual policies are left untouched (`Ok(None)`). An existing auto
    /// policy keeps its own supplier parameters; `fallback` seeds positions
    /// that have no policy yet.
    pub fn refresh_auto(
        &self,
        profile: &VelocityProfile,
        fallback: &PolicyParams,
        as_of: DateTime<Utc>,
    ) -> StockResult<Option<ReplenishmentPolicy>> {
        let params = match self.store.get(profile.product_id, profile.location_id) {
            Some(existing) if existing.mode == PolicyMode::Manual => return Ok(None),
            Some(existing) => existing.params(),
            None => *fallback,
        };

        let computation = compute_policy(profile.average_daily_sales, &params)?;
        let policy = ReplenishmentPolicy::auto(
            profile.product_id,
            profile.location_id,
            computation,
            &params,
            as_of,
        );
        self.store.put(policy.clone())?;
        Ok(Some(policy))
    }

    /// Flip a stored policy between `Auto` and `Manual`.
    pub fn set_mode(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        mode: PolicyMode,
    ) -> StockResult<ReplenishmentPolicy> {
        let mut policy = self
            .store
            .get(product_id, location_id)
            .ok_or(StockError::NotFound)?;
        policy.mode = mode;
        self.store.put(policy.clone())?;
        tracing::debug!(
            product_id = %product_id,
            location_id = %location_id,
            ?mode,
            "replenishment policy mode changed"
        );
        Ok(policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{AgeBucket, Classification};
    use proptest::prelude::*;
    use std::collections::HashMap;
    use std::sync::RwLock;

    #[derive(Default)]
    struct MemoryPolicies(RwLock<HashMap<(ProductId, LocationId), ReplenishmentPolicy>>);

    impl PolicyStore for MemoryPolicies {
        fn get(
            &self,
            product_id: ProductId,
            location_id: LocationId,
        ) -> Option<ReplenishmentPolicy> {
            self.0.read().unwrap().get(&(product_id, location_id)).cloned()
        }

        fn put(&self, policy: ReplenishmentPolicy) -> StockResult<()> {
            self.0
                .write()
                .unwrap()
                .insert((policy.product_id, policy.location_id), policy);
            Ok(())
        }

        fn list(&self) -> Vec<ReplenishmentPolicy> {
            self.0.read().unwrap().values().cloned().collect()
        }
    }

    fn test_profile(avg_daily_sales: f64) -> VelocityProfile {
        VelocityProfile {
            product_id: ProductId::new(),
            location_id: LocationId::new(),
            average_daily_sales: avg_daily_sales,
            sales_last_30_days: (avg_daily_sales * 30.0) as i64,
            sales_last_90_days: (avg_daily_sales * 90.0) as i64,
            turnover_rate: 0.0,
            days_in_stock: 10,
            last_sale_date: None,
            classification: Classification::B,
            age_bucket: AgeBucket::Days0To30,
            computed_at: Utc::now(),
        }
    }

    #[test]
    fn computes_the_reference_example_exactly() {
        // avg 2.5/day, lead 7, safety 3, review 30.
        let params = PolicyParams::for_lead_time(7);
        let c = compute_policy(2.5, &params).unwrap();
        assert_eq!(c.lead_time_stock, 18);
        assert_eq!(c.safety_stock, 8);
        assert_eq!(c.reorder_point, 26);
        assert_eq!(c.reorder_quantity, 93);
        assert_eq!(c.max_stock, 119);
    }

    #[test]
    fn zero_velocity_still_orders_one_unit() {
        let c = compute_policy(0.0, &PolicyParams::for_lead_time(7)).unwrap();
        assert_eq!(c.reorder_point, 0);
        assert_eq!(c.reorder_quantity, 1);
        assert_eq!(c.max_stock, 1);
    }

    #[test]
    fn rejects_zero_lead_time_and_negative_velocity() {
        let zero_lead = PolicyParams {
            lead_time_days: 0,
            ..PolicyParams::default()
        };
        assert!(matches!(
            compute_policy(2.5, &zero_lead).unwrap_err(),
            StockError::PolicyValidation(_)
        ));
        assert!(matches!(
            compute_policy(-0.1, &PolicyParams::default()).unwrap_err(),
            StockError::PolicyValidation(_)
        ));
    }

    #[test]
    fn manual_policy_must_keep_max_stock_above_reorder_point() {
        let params = PolicyParams::for_lead_time(7);
        let err = ReplenishmentPolicy::manual(
            ProductId::new(),
            LocationId::new(),
            50,
            10,
            40,
            &params,
            Utc::now(),
        )
        .unwrap_err();
        match err {
            StockError::PolicyValidation(msg) => {
                assert!(msg.contains("below reorder_point"))
            }
            _ => panic!("Expected PolicyValidation"),
        }
    }

    #[test]
    fn refresh_auto_leaves_manual_policies_untouched() {
        let engine = PolicyEngine::new(MemoryPolicies::default());
        let profile = test_profile(2.5);
        let manual = ReplenishmentPolicy::manual(
            profile.product_id,
            profile.location_id,
            40,
            60,
            100,
            &PolicyParams::for_lead_time(14),
            Utc::now(),
        )
        .unwrap();
        engine.set_manual(manual.clone()).unwrap();

        let refreshed = engine
            .refresh_auto(&profile, &PolicyParams::default(), Utc::now())
            .unwrap();
        assert!(refreshed.is_none());
        assert_eq!(
            engine.get(profile.product_id, profile.location_id).unwrap(),
            manual
        );
    }

    #[test]
    fn refresh_auto_keeps_the_existing_supplier_parameters() {
        let engine = PolicyEngine::new(MemoryPolicies::default());
        let profile = test_profile(2.5);

        // Seed with lead time 7 via the fallback.
        engine
            .refresh_auto(&profile, &PolicyParams::for_lead_time(7), Utc::now())
            .unwrap()
            .unwrap();

        // A later refresh with a different fallback must keep lead time 7.
        let refreshed = engine
            .refresh_auto(&profile, &PolicyParams::for_lead_time(99), Utc::now())
            .unwrap()
            .unwrap();
        assert_eq!(refreshed.lead_time_days, 7);
        assert_eq!(refreshed.reorder_point, 26);
        assert_eq!(refreshed.mode, PolicyMode::Auto);
    }

    #[test]
    fn set_mode_requires_an_existing_policy() {
        let engine = PolicyEngine::new(MemoryPolicies::default());
        let err = engine
            .set_mode(ProductId::new(), LocationId::new(), PolicyMode::Auto)
            .unwrap_err();
        assert!(matches!(err, StockError::NotFound));
    }

    #[test]
    fn set_mode_back_to_auto_allows_recomputation() {
        let engine = PolicyEngine::new(MemoryPolicies::default());
        let profile = test_profile(1.0);
        let manual = ReplenishmentPolicy::manual(
            profile.product_id,
            profile.location_id,
            5,
            5,
            10,
            &PolicyParams::for_lead_time(3),
            Utc::now(),
        )
        .unwrap();
        engine.set_manual(manual).unwrap();
        engine
            .set_mode(profile.product_id, profile.location_id, PolicyMode::Auto)
            .unwrap();

        let refreshed = engine
            .refresh_auto(&profile, &PolicyParams::default(), Utc::now())
            .unwrap()
            .unwrap();
        // Recomputed from the profile with the policy's own lead time of 3.
        assert_eq!(refreshed.lead_time_days, 3);
        assert_eq!(refreshed.reorder_point, 6);
    }

    proptest! {
        /// Faster-selling products never get a lower reorder point or a
        /// smaller reorder quantity.
        #[test]
        fn policy_grows_with_velocity(
            low in 0.0f64..500.0,
            bump in 0.0f64..500.0,
            lead in 1u32..60,
            review in 0u32..90,
            safety in 0u32..30,
        ) {
            let params = PolicyParams { lead_time_days: lead, review_period_days: review, safety_buffer_days: safety };
            let a = compute_policy(low, &params).unwrap();
            let b = compute_policy(low + bump, &params).unwrap();
            prop_assert!(b.reorder_point >= a.reorder_point);
            prop_assert!(b.reorder_quantity >= a.reorder_quantity);
            prop_assert!(b.max_stock >= a.max_stock);
        }

        /// Computed policies always leave room to order: max_stock covers the
        /// reorder point plus at least one unit.
        #[test]
        fn computed_max_stock_dominates_reorder_point(
            avg in 0.0f64..1000.0,
            lead in 1u32..60,
        ) {
            let c = compute_policy(avg, &PolicyParams::for_lead_time(lead)).unwrap();
            prop_assert!(c.max_stock >= c.reorder_point + 1);
            prop_assert!(c.reorder_quantity >= 1);
        }
    }
}
