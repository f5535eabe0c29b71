//! In-memory adapters for tests, demos and single-process deployments.

mod catalog;
mod policies;
mod purchasing;
mod sales;
mod transfers;
mod velocity;

pub use catalog::{InMemoryLocationDirectory, InMemoryProductCatalog};
pub use policies::InMemoryPolicyStore;
pub use purchasing::RecordingPurchasingGateway;
pub use sales::InMemorySalesFeed;
pub use transfers::InMemoryTransferStore;
pub use velocity::InMemoryVelocityStore;
