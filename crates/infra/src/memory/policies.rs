use std::collections::HashMap;
use std::sync::RwLock;

use optistock_core::{LocationId, ProductId, StockError, StockResult};
use optistock_replenishment::{PolicyStore, ReplenishmentPolicy};

/// In-memory [`PolicyStore`] keyed by (product, location).
#[derive(Debug, Default)]
pub struct InMemoryPolicyStore {
    inner: RwLock<HashMap<(ProductId, LocationId), ReplenishmentPolicy>>,
}

impl InMemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PolicyStore for InMemoryPolicyStore {
    fn get(&self, product_id: ProductId, location_id: LocationId) -> Option<ReplenishmentPolicy> {
        let map = self.inner.read().ok()?;
        map.get(&(product_id, location_id)).cloned()
    }

    fn put(&self, policy: ReplenishmentPolicy) -> StockResult<()> {
        let mut map = self
            .inner
            .write()
            .map_err(|_| StockError::invariant("policy store lock poisoned"))?;
        map.insert((policy.product_id, policy.location_id), policy);
        Ok(())
    }

    fn list(&self) -> Vec<ReplenishmentPolicy> {
        let map = match self.inner.read() {
            Ok(m) => m,
            Err(_) => return Vec::new(),
        };
        let mut policies: Vec<ReplenishmentPolicy> = map.values().cloned().collect();
        policies.sort_by_key(|p| (*p.product_id.as_uuid(), *p.location_id.as_uuid()));
        policies
    }
}
