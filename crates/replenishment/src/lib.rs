//! Replenishment policy engine and velocity/aging classifier.
//!
//! Policies decide *when* to reorder (`reorder_point`) and *how much*
//! (`reorder_quantity`, capped by `max_stock`). Velocity profiles summarize
//! recent sales per product and location and drive both the A/B/C movement
//! classification and automatic policy recomputation.
//!
//! Everything here is pure computation over inputs handed in by the caller;
//! the sales history arrives through the [`SalesFeed`] port and results are
//! cached through the [`PolicyStore`] and [`VelocityStore`] ports.

pub mod classifier;
pub mod policy;
pub mod service;
pub mod velocity;

pub use classifier::{AgeBucket, Classification, ClassifierConfig, StockStatus, turnover_rate};
pub use policy::{
    PolicyComputation, PolicyEngine, PolicyMode, PolicyParams, PolicyStore, ReplenishmentPolicy,
    compute_policy,
};
pub use service::{RefreshSummary, VelocityService};
pub use velocity::{SalesEvent, SalesFeed, VelocityAnalyzer, VelocityProfile, VelocityStore};
