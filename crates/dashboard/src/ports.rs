//! External collaborators the dashboard reads from and hands work to.

use std::sync::Arc;

use optistock_core::{LocationId, ProductId, StockResult};

use crate::candidate::PurchaseBatch;

/// Catalog data for one product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductInfo {
    pub name: String,
    /// Smallest currency unit; `None` when purchasing has no cost on file.
    pub unit_cost_cents: Option<i64>,
}

/// Read-only product catalog.
pub trait ProductCatalog: Send + Sync {
    fn product_info(&self, product_id: ProductId) -> Option<ProductInfo>;
}

impl<C> ProductCatalog for Arc<C>
where
    C: ProductCatalog + ?Sized,
{
    fn product_info(&self, product_id: ProductId) -> Option<ProductInfo> {
        (**self).product_info(product_id)
    }
}

/// Read-only directory of stores and warehouses.
pub trait LocationDirectory: Send + Sync {
    fn location_name(&self, location_id: LocationId) -> Option<String>;

    fn known_locations(&self) -> Vec<LocationId>;
}

impl<D> LocationDirectory for Arc<D>
where
    D: LocationDirectory + ?Sized,
{
    fn location_name(&self, location_id: LocationId) -> Option<String> {
        (**self).location_name(location_id)
    }

    fn known_locations(&self) -> Vec<LocationId> {
        (**self).known_locations()
    }
}

/// Hand-off to the external purchase-order system. Submission is the end of
/// the dashboard's responsibility; order tracking lives elsewhere.
pub trait PurchasingGateway: Send + Sync {
    fn submit(&self, batch: &PurchaseBatch) -> StockResult<()>;
}

impl<G> PurchasingGateway for Arc<G>
where
    G: PurchasingGateway + ?Sized,
{
    fn submit(&self, batch: &PurchaseBatch) -> StockResult<()> {
        (**self).submit(batch)
    }
}
