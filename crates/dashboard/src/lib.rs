//! Read-only replenishment dashboard.
//!
//! Joins the stock ledger snapshot with cached policies and velocity
//! profiles into [`ReplenishmentCandidate`] rows, raises low-stock alerts,
//! and batches selected candidates into a purchase request for the external
//! purchasing system. The dashboard never writes to the ledger.

pub mod candidate;
pub mod ports;
pub mod service;

pub use candidate::{
    CandidateFilter, LowStockAlert, PurchaseBatch, PurchaseLine, ReplenishmentCandidate,
};
pub use ports::{LocationDirectory, ProductCatalog, ProductInfo, PurchasingGateway};
pub use service::DashboardService;
