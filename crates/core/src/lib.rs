//! `optistock-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! typed identifiers, the shared error taxonomy, and the aggregate/event traits
//! used by the stock ledger and the transfer state machine.

pub mod aggregate;
pub mod error;
pub mod event;
pub mod id;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{StockError, StockResult};
pub use event::Event;
pub use id::{AggregateId, LocationId, ProductId, UserId};
