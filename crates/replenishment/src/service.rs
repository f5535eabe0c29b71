//! Scheduler-facing refresh of velocity profiles and auto policies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use optistock_core::{LocationId, ProductId, StockResult};
use optistock_ledger::{StockLedger, StockRecord};

use crate::policy::{PolicyEngine, PolicyParams, PolicyStore};
use crate::velocity::{SalesFeed, VelocityAnalyzer, VelocityStore};

/// Outcome of one refresh pass.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshSummary {
    pub profiles_refreshed: usize,
    pub policies_recomputed: usize,
    pub failures: usize,
}

/// Rebuilds cached velocity profiles and recomputes auto policies.
///
/// Driven by an external scheduler; one call profiles every requested
/// (product, location) pair. A failed policy recomputation is logged and
/// counted, never fatal to the rest of the pass.
pub struct VelocityService<F, L, V, P> {
    analyzer: VelocityAnalyzer<F>,
    ledger: L,
    velocity: V,
    policies: PolicyEngine<P>,
}

impl<F, L, V, P> VelocityService<F, L, V, P>
where
    F: SalesFeed,
    L: StockLedger,
    V: VelocityStore,
    P: PolicyStore,
{
    pub fn new(analyzer: VelocityAnalyzer<F>, ledger: L, velocity: V, policies: PolicyEngine<P>) -> Self {
        Self {
            analyzer,
            ledger,
            velocity,
            policies,
        }
    }

    /// Profile every pair as of `as_of` and recompute auto policies from the
    /// fresh profiles. `fallback` seeds policies for positions that have none
    /// yet; positions with an existing policy keep their own parameters.
    pub fn refresh(
        &self,
        pairs: &[(ProductId, LocationId)],
        fallback: &PolicyParams,
        as_of: DateTime<Utc>,
    ) -> StockResult<RefreshSummary> {
        let mut summary = RefreshSummary::default();

        for (product_id, location_id) in pairs {
            let record = self
                .ledger
                .get(*product_id, *location_id)
                .unwrap_or_else(|| StockRecord::empty(*product_id, *location_id));
            let profile = self.analyzer.profile(&record, as_of);
            self.velocity.put(profile.clone())?;
            summary.profiles_refreshed += 1;

            match self.policies.refresh_auto(&profile, fallback, as_of) {
                Ok(Some(_)) => summary.policies_recomputed += 1,
                Ok(None) => {}
                Err(err) => {
                    summary.failures += 1;
                    tracing::warn!(
                        product_id = %product_id,
                        location_id = %location_id,
                        error = %err,
                        "policy recomputation failed during velocity refresh"
                    );
                }
            }
        }

        tracing::info!(
            profiles = summary.profiles_refreshed,
            policies = summary.policies_recomputed,
            failures = summary.failures,
            "velocity refresh complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{PolicyMode, ReplenishmentPolicy};
    use crate::velocity::{SalesEvent, VelocityProfile};
    use chrono::{Duration, TimeZone};
    use optistock_core::StockError;
    use optistock_ledger::InMemoryStockLedger;
    use std::collections::HashMap;
    use std::sync::{Arc, RwLock};

    struct FixedFeed(Vec<SalesEvent>);

    impl SalesFeed for FixedFeed {
        fn sales_between(
            &self,
            product_id: ProductId,
            location_id: LocationId,
            from: DateTime<Utc>,
            to: DateTime<Utc>,
        ) -> Vec<SalesEvent> {
            let mut hits: Vec<SalesEvent> = self
                .0
                .iter()
                .filter(|e| {
                    e.product_id == product_id
                        && e.location_id == location_id
                        && e.sold_at >= from
                        && e.sold_at <= to
                })
                .cloned()
                .collect();
            hits.sort_by_key(|e| e.sold_at);
            hits
        }
    }

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

    #[derive(Default)]
    struct MemoryVelocity(RwLock<HashMap<(ProductId, LocationId), VelocityProfile>>);

    impl VelocityStore for MemoryVelocity {
        fn get(&self, product_id: ProductId, location_id: LocationId) -> Option<VelocityProfile> {
            self.0.read().unwrap().get(&(product_id, location_id)).cloned()
        }

        fn put(&self, profile: VelocityProfile) -> StockResult<()> {
            self.0
                .write()
                .unwrap()
                .insert((profile.product_id, profile.location_id), profile);
            Ok(())
        }

        fn list(&self) -> Vec<VelocityProfile> {
            self.0.read().unwrap().values().cloned().collect()
        }
    }

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn sale(product: ProductId, location: LocationId, qty: i64, days_ago: i64) -> SalesEvent {
        SalesEvent {
            product_id: product,
            location_id: location,
            quantity: qty,
            sold_at: as_of() - Duration::days(days_ago),
        }
    }

    fn service(
        events: Vec<SalesEvent>,
        ledger: Arc<InMemoryStockLedger>,
        velocity: Arc<MemoryVelocity>,
        policies: Arc<MemoryPolicies>,
    ) -> VelocityService<FixedFeed, Arc<InMemoryStockLedger>, Arc<MemoryVelocity>, Arc<MemoryPolicies>>
    {
        VelocityService::new(
            VelocityAnalyzer::new(FixedFeed(events)),
            ledger,
            velocity,
            PolicyEngine::new(policies),
        )
    }

    #[test]
    fn refresh_caches_the_profile_and_seeds_an_auto_policy() {
        let product = ProductId::new();
        let location = LocationId::new();
        let ledger = Arc::new(InMemoryStockLedger::new());
        ledger.receive(product, location, 40, as_of()).unwrap();
        let velocity = Arc::new(MemoryVelocity::default());
        let policies = Arc::new(MemoryPolicies::default());

        // 75 units over the last 30 days: avg 2.5/day.
        let events = (0..30)
            .flat_map(|d| {
                let p = product;
                let l = location;
                std::iter::once(sale(p, l, 2, d + 1)).chain(if d % 2 == 0 {
                    Some(sale(p, l, 1, d + 1))
                } else {
                    None
                })
            })
            .collect();
        let svc = service(events, Arc::clone(&ledger), Arc::clone(&velocity), Arc::clone(&policies));

        let summary = svc
            .refresh(&[(product, location)], &PolicyParams::for_lead_time(7), as_of())
            .unwrap();
        assert_eq!(summary.profiles_refreshed, 1);
        assert_eq!(summary.policies_recomputed, 1);
        assert_eq!(summary.failures, 0);

        let profile = velocity.get(product, location).unwrap();
        assert_eq!(profile.sales_last_30_days, 75);

        let policy = policies.get(product, location).unwrap();
        assert_eq!(policy.mode, PolicyMode::Auto);
        assert_eq!(policy.reorder_point, 26);
        assert_eq!(policy.reorder_quantity, 93);
    }

    #[test]
    fn refresh_skips_manual_policies_but_still_caches_profiles() {
        let product = ProductId::new();
        let location = LocationId::new();
        let ledger = Arc::new(InMemoryStockLedger::new());
        let velocity = Arc::new(MemoryVelocity::default());
        let policies = Arc::new(MemoryPolicies::default());
        policies
            .put(
                ReplenishmentPolicy::manual(
                    product,
                    location,
                    40,
                    60,
                    100,
                    &PolicyParams::for_lead_time(14),
                    as_of(),
                )
                .unwrap(),
            )
            .unwrap();

        let svc = service(Vec::new(), ledger, Arc::clone(&velocity), Arc::clone(&policies));
        let summary = svc
            .refresh(&[(product, location)], &PolicyParams::default(), as_of())
            .unwrap();

        assert_eq!(summary.profiles_refreshed, 1);
        assert_eq!(summary.policies_recomputed, 0);
        assert!(velocity.get(product, location).is_some());
        assert_eq!(policies.get(product, location).unwrap().reorder_point, 40);
    }

    #[test]
    fn one_bad_position_does_not_sink_the_whole_pass() {
        let returns_product = ProductId::new();
        let healthy_product = ProductId::new();
        let location = LocationId::new();
        let ledger = Arc::new(InMemoryStockLedger::new());
        let velocity = Arc::new(MemoryVelocity::default());
        let policies = Arc::new(MemoryPolicies::default());

        // Net-negative 30-day sales (a bulk return) cannot produce a policy.
        let events = vec![
            sale(returns_product, location, -5, 3),
            sale(healthy_product, location, 3, 2),
        ];
        let svc = service(events, ledger, Arc::clone(&velocity), Arc::clone(&policies));

        let summary = svc
            .refresh(
                &[(returns_product, location), (healthy_product, location)],
                &PolicyParams::default(),
                as_of(),
            )
            .unwrap();

        assert_eq!(summary.profiles_refreshed, 2);
        assert_eq!(summary.policies_recomputed, 1);
        assert_eq!(summary.failures, 1);
        assert!(velocity.get(returns_product, location).is_some());
        assert!(policies.get(returns_product, location).is_none());
        assert!(policies.get(healthy_product, location).is_some());
    }

    #[test]
    fn unknown_positions_profile_from_an_empty_record() {
        let product = ProductId::new();
        let location = LocationId::new();
        let svc = service(
            Vec::new(),
            Arc::new(InMemoryStockLedger::new()),
            Arc::new(MemoryVelocity::default()),
            Arc::new(MemoryPolicies::default()),
        );

        let summary = svc
            .refresh(&[(product, location)], &PolicyParams::default(), as_of())
            .unwrap();
        assert_eq!(summary.profiles_refreshed, 1);
        // Zero velocity still seeds a policy with the one-unit floor.
        assert_eq!(summary.policies_recomputed, 1);
        assert_eq!(summary.failures, 0);
    }

    #[test]
    fn store_failures_propagate() {
        struct FailingVelocity;
        impl VelocityStore for FailingVelocity {
            fn get(&self, _: ProductId, _: LocationId) -> Option<VelocityProfile> {
                None
            }
            fn put(&self, _: VelocityProfile) -> StockResult<()> {
                Err(StockError::invariant("velocity store unavailable"))
            }
            fn list(&self) -> Vec<VelocityProfile> {
                Vec::new()
            }
        }

        let svc = VelocityService::new(
            VelocityAnalyzer::new(FixedFeed(Vec::new())),
            Arc::new(InMemoryStockLedger::new()),
            FailingVelocity,
            PolicyEngine::new(Arc::new(MemoryPolicies::default())),
        );
        let err = svc
            .refresh(
                &[(ProductId::new(), LocationId::new())],
                &PolicyParams::default(),
                as_of(),
            )
            .unwrap_err();
        assert!(matches!(err, StockError::InvariantViolation(_)));
    }
}
