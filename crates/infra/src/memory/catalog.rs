use std::collections::HashMap;
use std::sync::RwLock;

use optistock_core::{LocationId, ProductId};
use optistock_dashboard::{LocationDirectory, ProductCatalog, ProductInfo};

/// In-memory [`ProductCatalog`].
#[derive(Debug, Default)]
pub struct InMemoryProductCatalog {
    products: RwLock<HashMap<ProductId, ProductInfo>>,
}

impl InMemoryProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        product_id: ProductId,
        name: impl Into<String>,
        unit_cost_cents: Option<i64>,
    ) {
        if let Ok(mut products) = self.products.write() {
            products.insert(
                product_id,
                ProductInfo {
                    name: name.into(),
                    unit_cost_cents,
                },
            );
        }
    }
}

impl ProductCatalog for InMemoryProductCatalog {
    fn product_info(&self, product_id: ProductId) -> Option<ProductInfo> {
        let map = self.products.read().ok()?;
        map.get(&product_id).cloned()
    }
}

/// In-memory [`LocationDirectory`].
#[derive(Debug, Default)]
pub struct InMemoryLocationDirectory {
    locations: RwLock<HashMap<LocationId, String>>,
}

impl InMemoryLocationDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, location_id: LocationId, name: impl Into<String>) {
        if let Ok(mut locations) = self.locations.write() {
            locations.insert(location_id, name.into());
        }
    }
}

impl LocationDirectory for InMemoryLocationDirectory {
    fn location_name(&self, location_id: LocationId) -> Option<String> {
        let map = self.locations.read().ok()?;
        map.get(&location_id).cloned()
    }

    fn known_locations(&self) -> Vec<LocationId> {
        let map = match self.locations.read() {
            Ok(m) => m,
            Err(_) => return Vec::new(),
        };
        let mut locations: Vec<LocationId> = map.keys().copied().collect();
        locations.sort_by_key(|l| *l.as_uuid());
        locations
    }
}
