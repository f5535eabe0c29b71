//! Stock ledger: per (product, location) on-hand and reserved quantity.
//!
//! The ledger is the single source of truth for availability and the only
//! shared mutable resource in the engine. Mutations are serialized per
//! (product, location) key through optimistic version checks; reads are
//! advisory snapshots.
//!
//! Business rules live in pure [`StockRecord`] transition functions; the
//! store only loads, applies and swaps.

pub mod movement;
pub mod record;
pub mod store;

pub use movement::{MovementKind, StockMovement};
pub use record::{StockKey, StockRecord};
pub use store::{InMemoryStockLedger, StockLedger};
