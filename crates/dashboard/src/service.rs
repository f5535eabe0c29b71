use chrono::{DateTime, Utc};

use optistock_core::{LocationId, ProductId, StockError, StockResult};
use optistock_ledger::{StockLedger, StockRecord};
use optistock_replenishment::{PolicyStore, StockStatus, VelocityStore};

use crate::candidate::{
    CandidateFilter, LowStockAlert, PurchaseBatch, PurchaseLine, ReplenishmentCandidate,
};
use crate::ports::{LocationDirectory, ProductCatalog, PurchasingGateway};

/// Read-only aggregation over the ledger, policy store and velocity cache.
pub struct DashboardService<L, P, V, C, D, G> {
    ledger: L,
    policies: P,
    velocity: V,
    catalog: C,
    directory: D,
    purchasing: G,
}

impl<L, P, V, C, D, G> DashboardService<L, P, V, C, D, G>
where
    L: StockLedger,
    P: PolicyStore,
    V: VelocityStore,
    C: ProductCatalog,
    D: LocationDirectory,
    G: PurchasingGateway,
{
    pub fn new(ledger: L, policies: P, velocity: V, catalog: C, directory: D, purchasing: G) -> Self {
        Self {
            ledger,
            policies,
            velocity,
            catalog,
            directory,
            purchasing,
        }
    }

    /// All candidate rows matching `filter`, sorted by (product, location).
    ///
    /// Positions without a policy or velocity profile are listed as
    /// `Uncomputed` rather than dropped; stale reads are acceptable here.
    pub fn list_candidates(&self, filter: &CandidateFilter) -> Vec<ReplenishmentCandidate> {
        let records = match filter.location {
            Some(location) => self.ledger.records_at(location),
            None => self.ledger.snapshot(),
        };
        records
            .iter()
            .map(|record| self.candidate_for(record))
            .filter(|candidate| filter.matches(candidate))
            .collect()
    }

    /// Alerts for every critical or out-of-stock position, across all
    /// locations. Generation only; delivery is the caller's concern.
    pub fn low_stock_alerts(&self, as_of: DateTime<Utc>) -> Vec<LowStockAlert> {
        let alerts: Vec<LowStockAlert> = self
            .ledger
            .snapshot()
            .iter()
            .map(|record| self.candidate_for(record))
            .filter(|c| {
                matches!(
                    c.stock_status,
                    StockStatus::Critical | StockStatus::OutOfStock
                )
            })
            .map(|c| LowStockAlert {
                product_id: c.product_id,
                location_id: c.location_id,
                product_name: c.product_name,
                location_name: c.location_name,
                status: c.stock_status,
                available: c.available,
                reorder_point: c.reorder_point,
                generated_at: as_of,
            })
            .collect();

        tracing::info!(alerts = alerts.len(), "low-stock alert sweep complete");
        alerts
    }

    /// Batch the selected positions into one purchase request and hand it to
    /// the purchasing gateway.
    ///
    /// Every selection must be a known position with a computed, actionable
    /// suggestion; the dashboard refuses to guess quantities for positions
    /// it cannot evaluate.
    pub fn build_purchase_batch(
        &self,
        selections: &[(ProductId, LocationId)],
    ) -> StockResult<PurchaseBatch> {
        if selections.is_empty() {
            return Err(StockError::validation("selection cannot be empty"));
        }

        let mut lines = Vec::with_capacity(selections.len());
        let mut total = 0;
        for (product_id, location_id) in selections {
            let record = self
                .ledger
                .get(*product_id, *location_id)
                .ok_or(StockError::NotFound)?;
            let candidate = self.candidate_for(&record);
            let quantity = candidate.suggested_order_qty.ok_or_else(|| {
                StockError::validation(format!(
                    "no order suggestion for product {product_id} at location {location_id}"
                ))
            })?;

            total += candidate.estimated_cost_cents.unwrap_or(0);
            lines.push(PurchaseLine {
                product_id: *product_id,
                location_id: *location_id,
                product_name: candidate.product_name,
                quantity,
                unit_cost_cents: candidate.unit_cost_cents,
            });
        }

        let batch = PurchaseBatch {
            lines,
            total_estimated_cost_cents: total,
        };
        self.purchasing.submit(&batch)?;
        tracing::info!(
            lines = batch.lines.len(),
            total_estimated_cost_cents = batch.total_estimated_cost_cents,
            "purchase batch submitted"
        );
        Ok(batch)
    }

    fn candidate_for(&self, record: &StockRecord) -> ReplenishmentCandidate {
        let product_id = record.product_id();
        let location_id = record.location_id();
        let policy = self.policies.get(product_id, location_id);
        let profile = self.velocity.get(product_id, location_id);
        let info = self.catalog.product_info(product_id);

        let available = record.available();
        let stock_status = policy
            .as_ref()
            .map(|p| StockStatus::evaluate(available, p.reorder_point))
            .unwrap_or(StockStatus::Uncomputed);

        // Top back up to max_stock, never ordering less than one reorder
        // quantity; only positions that need action get a suggestion.
        let suggested_order_qty = policy.as_ref().and_then(|p| {
            stock_status
                .is_actionable()
                .then(|| (p.max_stock - available).max(p.reorder_quantity))
        });

        let average_daily_sales = profile.as_ref().map(|p| p.average_daily_sales);
        let days_until_stockout = average_daily_sales.and_then(|avg| {
            if avg > 0.0 {
                Some((available as f64 / avg).floor() as i64)
            } else {
                None
            }
        });

        let unit_cost_cents = info.as_ref().and_then(|i| i.unit_cost_cents);
        let estimated_cost_cents = match (suggested_order_qty, unit_cost_cents) {
            (Some(qty), Some(cost)) => Some(qty * cost),
            _ => None,
        };

        ReplenishmentCandidate {
            product_id,
            location_id,
            product_name: info
                .map(|i| i.name)
                .unwrap_or_else(|| "(unknown)".to_string()),
            location_name: self
                .directory
                .location_name(location_id)
                .unwrap_or_else(|| "(unknown)".to_string()),
            on_hand: record.on_hand(),
            reserved: record.reserved(),
            available,
            reorder_point: policy.as_ref().map(|p| p.reorder_point),
            reorder_quantity: policy.as_ref().map(|p| p.reorder_quantity),
            suggested_order_qty,
            stock_status,
            classification: profile.as_ref().map(|p| p.classification),
            age_bucket: profile.as_ref().map(|p| p.age_bucket),
            average_daily_sales,
            days_until_stockout,
            unit_cost_cents,
            estimated_cost_cents,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::ProductInfo;
    use optistock_ledger::InMemoryStockLedger;
    use optistock_replenishment::{
        AgeBucket, Classification, PolicyParams, ReplenishmentPolicy, VelocityProfile,
    };
    use std::collections::HashMap;
    use std::sync::{Arc, RwLock};

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

    #[derive(Default)]
    struct MemoryCatalog(HashMap<ProductId, ProductInfo>);

    impl ProductCatalog for MemoryCatalog {
        fn product_info(&self, product_id: ProductId) -> Option<ProductInfo> {
            self.0.get(&product_id).cloned()
        }
    }

    #[derive(Default)]
    struct MemoryDirectory(HashMap<LocationId, String>);

    impl LocationDirectory for MemoryDirectory {
        fn location_name(&self, location_id: LocationId) -> Option<String> {
            self.0.get(&location_id).cloned()
        }

        fn known_locations(&self) -> Vec<LocationId> {
            self.0.keys().copied().collect()
        }
    }

    #[derive(Default)]
    struct CapturingGateway(RwLock<Vec<PurchaseBatch>>);

    impl PurchasingGateway for CapturingGateway {
        fn submit(&self, batch: &PurchaseBatch) -> StockResult<()> {
            self.0.write().unwrap().push(batch.clone());
            Ok(())
        }
    }

    struct Fixture {
        ledger: Arc<InMemoryStockLedger>,
        policies: Arc<MemoryPolicies>,
        velocity: Arc<MemoryVelocity>,
        gateway: Arc<CapturingGateway>,
        product: ProductId,
        location: LocationId,
    }

    type TestService = DashboardService<
        Arc<InMemoryStockLedger>,
        Arc<MemoryPolicies>,
        Arc<MemoryVelocity>,
        Arc<MemoryCatalog>,
        Arc<MemoryDirectory>,
        Arc<CapturingGateway>,
    >;

    fn fixture() -> (Fixture, TestService) {
        let product = ProductId::new();
        let location = LocationId::new();
        let ledger = Arc::new(InMemoryStockLedger::new());
        let policies = Arc::new(MemoryPolicies::default());
        let velocity = Arc::new(MemoryVelocity::default());
        let catalog = Arc::new(MemoryCatalog(HashMap::from([(
            product,
            ProductInfo {
                name: "Titanium Half-Rim Frame".to_string(),
                unit_cost_cents: Some(5_000),
            },
        )])));
        let directory = Arc::new(MemoryDirectory(HashMap::from([(
            location,
            "Downtown Store".to_string(),
        )])));
        let gateway = Arc::new(CapturingGateway::default());

        let service = DashboardService::new(
            Arc::clone(&ledger),
            Arc::clone(&policies),
            Arc::clone(&velocity),
            catalog,
            directory,
            Arc::clone(&gateway),
        );
        (
            Fixture {
                ledger,
                policies,
                velocity,
                gateway,
                product,
                location,
            },
            service,
        )
    }

    fn seed_policy(f: &Fixture, reorder_point: i64, reorder_quantity: i64, max_stock: i64) {
        f.policies
            .put(
                ReplenishmentPolicy::manual(
                    f.product,
                    f.location,
                    reorder_point,
                    reorder_quantity,
                    max_stock,
                    &PolicyParams::for_lead_time(7),
                    Utc::now(),
                )
                .unwrap(),
            )
            .unwrap();
    }

    fn seed_profile(f: &Fixture, average_daily_sales: f64) {
        f.velocity
            .put(VelocityProfile {
                product_id: f.product,
                location_id: f.location,
                average_daily_sales,
                sales_last_30_days: (average_daily_sales * 30.0) as i64,
                sales_last_90_days: (average_daily_sales * 90.0) as i64,
                turnover_rate: 9.0,
                days_in_stock: 95,
                last_sale_date: None,
                classification: Classification::A,
                age_bucket: AgeBucket::Days91To180,
                computed_at: Utc::now(),
            })
            .unwrap();
    }

    #[test]
    fn joins_ledger_policy_velocity_and_catalog_into_one_row() {
        let (f, service) = fixture();
        f.ledger.receive(f.product, f.location, 20, Utc::now()).unwrap();
        f.ledger.reserve(f.product, f.location, 5, Utc::now()).unwrap();
        seed_policy(&f, 26, 93, 119);
        seed_profile(&f, 2.5);

        let rows = service.list_candidates(&CandidateFilter::default());
        assert_eq!(rows.len(), 1);
        let row = &rows[0];

        assert_eq!(row.product_name, "Titanium Half-Rim Frame");
        assert_eq!(row.location_name, "Downtown Store");
        assert_eq!(row.on_hand, 20);
        assert_eq!(row.reserved, 5);
        assert_eq!(row.available, 15);
        assert_eq!(row.reorder_point, Some(26));
        // 15 available against a reorder point of 26 is low, not critical.
        assert_eq!(row.stock_status, StockStatus::Low);
        // Top up to 119 from 15: 104, which dominates the reorder quantity.
        assert_eq!(row.suggested_order_qty, Some(104));
        assert_eq!(row.classification, Some(Classification::A));
        assert_eq!(row.age_bucket, Some(AgeBucket::Days91To180));
        // 15 / 2.5 per day = 6 whole days of cover.
        assert_eq!(row.days_until_stockout, Some(6));
        assert_eq!(row.unit_cost_cents, Some(5_000));
        assert_eq!(row.estimated_cost_cents, Some(520_000));
    }

    #[test]
    fn positions_without_policy_or_profile_are_uncomputed_not_missing() {
        let (f, service) = fixture();
        f.ledger.receive(f.product, f.location, 4, Utc::now()).unwrap();

        let rows = service.list_candidates(&CandidateFilter::default());
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.stock_status, StockStatus::Uncomputed);
        assert_eq!(row.reorder_point, None);
        assert_eq!(row.suggested_order_qty, None);
        assert_eq!(row.classification, None);
        assert_eq!(row.days_until_stockout, None);
    }

    #[test]
    fn healthy_positions_get_no_order_suggestion() {
        let (f, service) = fixture();
        f.ledger.receive(f.product, f.location, 200, Utc::now()).unwrap();
        seed_policy(&f, 26, 93, 119);

        let rows = service.list_candidates(&CandidateFilter::default());
        assert_eq!(rows[0].stock_status, StockStatus::Healthy);
        assert_eq!(rows[0].suggested_order_qty, None);
        assert_eq!(rows[0].estimated_cost_cents, None);
    }

    #[test]
    fn filters_narrow_by_location_status_and_actionability() {
        let (f, service) = fixture();
        let other_location = LocationId::new();
        f.ledger.receive(f.product, f.location, 20, Utc::now()).unwrap();
        f.ledger
            .receive(f.product, other_location, 500, Utc::now())
            .unwrap();
        seed_policy(&f, 26, 93, 119);

        let all = service.list_candidates(&CandidateFilter::default());
        assert_eq!(all.len(), 2);

        let here = service.list_candidates(&CandidateFilter {
            location: Some(f.location),
            ..CandidateFilter::default()
        });
        assert_eq!(here.len(), 1);
        assert_eq!(here[0].location_id, f.location);

        let low = service.list_candidates(&CandidateFilter {
            status: Some(StockStatus::Low),
            ..CandidateFilter::default()
        });
        assert_eq!(low.len(), 1);

        // The other location has no policy: uncomputed, so not actionable.
        let actionable = service.list_candidates(&CandidateFilter {
            only_actionable: true,
            ..CandidateFilter::default()
        });
        assert_eq!(actionable.len(), 1);
        assert_eq!(actionable[0].location_id, f.location);
    }

    #[test]
    fn purchase_batch_submits_the_selected_positions() {
        let (f, service) = fixture();
        f.ledger.receive(f.product, f.location, 10, Utc::now()).unwrap();
        seed_policy(&f, 26, 93, 119);

        let batch = service
            .build_purchase_batch(&[(f.product, f.location)])
            .unwrap();
        assert_eq!(batch.lines.len(), 1);
        assert_eq!(batch.lines[0].quantity, 109); // 119 - 10
        assert_eq!(batch.total_estimated_cost_cents, 545_000);

        let submitted = f.gateway.0.read().unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0], batch);
    }

    #[test]
    fn purchase_batch_rejects_empty_unknown_and_unactionable_selections() {
        let (f, service) = fixture();

        assert!(matches!(
            service.build_purchase_batch(&[]).unwrap_err(),
            StockError::Validation(_)
        ));

        assert!(matches!(
            service
                .build_purchase_batch(&[(f.product, f.location)])
                .unwrap_err(),
            StockError::NotFound
        ));

        // Healthy position: no suggestion, nothing to order.
        f.ledger.receive(f.product, f.location, 200, Utc::now()).unwrap();
        seed_policy(&f, 26, 93, 119);
        let err = service
            .build_purchase_batch(&[(f.product, f.location)])
            .unwrap_err();
        match err {
            StockError::Validation(msg) => assert!(msg.contains("no order suggestion")),
            _ => panic!("Expected Validation error"),
        }
        assert!(f.gateway.0.read().unwrap().is_empty());
    }

    #[test]
    fn low_stock_alerts_cover_critical_and_empty_positions_only() {
        let (f, service) = fixture();
        let healthy_product = ProductId::new();
        f.ledger.receive(f.product, f.location, 13, Utc::now()).unwrap();
        f.ledger
            .receive(healthy_product, f.location, 500, Utc::now())
            .unwrap();
        seed_policy(&f, 26, 93, 119);

        let alerts = service.low_stock_alerts(Utc::now());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].product_id, f.product);
        assert_eq!(alerts[0].status, StockStatus::Critical);
        assert_eq!(alerts[0].available, 13);
    }
}
