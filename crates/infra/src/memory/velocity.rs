use std::collections::HashMap;
use std::sync::RwLock;

use optistock_core::{LocationId, ProductId, StockError, StockResult};
use optistock_replenishment::{VelocityProfile, VelocityStore};

/// In-memory cache of computed [`VelocityProfile`]s.
#[derive(Debug, Default)]
pub struct InMemoryVelocityStore {
    inner: RwLock<HashMap<(ProductId, LocationId), VelocityProfile>>,
}

impl InMemoryVelocityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VelocityStore for InMemoryVelocityStore {
    fn get(&self, product_id: ProductId, location_id: LocationId) -> Option<VelocityProfile> {
        let map = self.inner.read().ok()?;
        map.get(&(product_id, location_id)).cloned()
    }

    fn put(&self, profile: VelocityProfile) -> StockResult<()> {
        let mut map = self
            .inner
            .write()
            .map_err(|_| StockError::invariant("velocity store lock poisoned"))?;
        map.insert((profile.product_id, profile.location_id), profile);
        Ok(())
    }

    fn list(&self) -> Vec<VelocityProfile> {
        let map = match self.inner.read() {
            Ok(m) => m,
            Err(_) => return Vec::new(),
        };
        let mut profiles: Vec<VelocityProfile> = map.values().cloned().collect();
        profiles.sort_by_key(|p| (*p.product_id.as_uuid(), *p.location_id.as_uuid()));
        profiles
    }
}
