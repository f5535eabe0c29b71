use std::sync::Arc;

use optistock_core::{ExpectedVersion, StockResult};

use crate::transfer::{Transfer, TransferId};

/// Persistence port for transfers.
///
/// `save` must compare the stored version (0 for unknown ids) against
/// `expected` — the version the caller loaded — and fail with
/// `ConcurrentModification` on a mismatch, so two clerks acting on the same
/// transfer cannot silently overwrite each other.
pub trait TransferStore: Send + Sync {
    fn get(&self, id: TransferId) -> Option<Transfer>;

    fn save(&self, transfer: Transfer, expected: ExpectedVersion) -> StockResult<()>;

    /// Next human-readable transfer number (e.g. `TRF-000042`). Monotonic,
    /// never reused.
    fn next_transfer_number(&self) -> StockResult<String>;

    fn list(&self) -> Vec<Transfer>;

    fn find_by_number(&self, transfer_number: &str) -> Option<Transfer>;
}

impl<S> TransferStore for Arc<S>
where
    S: TransferStore + ?Sized,
{
    fn get(&self, id: TransferId) -> Option<Transfer> {
        (**self).get(id)
    }

    fn save(&self, transfer: Transfer, expected: ExpectedVersion) -> StockResult<()> {
        (**self).save(transfer, expected)
    }

    fn next_transfer_number(&self) -> StockResult<String> {
        (**self).next_transfer_number()
    }

    fn list(&self) -> Vec<Transfer> {
        (**self).list()
    }

    fn find_by_number(&self, transfer_number: &str) -> Option<Transfer> {
        (**self).find_by_number(transfer_number)
    }
}
