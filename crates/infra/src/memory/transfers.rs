use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use optistock_core::{AggregateRoot, ExpectedVersion, StockError, StockResult};
use optistock_transfers::{Transfer, TransferId, TransferStore};

/// In-memory [`TransferStore`] with optimistic version checks and a
/// process-local transfer number sequence.
#[derive(Debug, Default)]
pub struct InMemoryTransferStore {
    transfers: RwLock<HashMap<TransferId, Transfer>>,
    sequence: AtomicU64,
}

impl InMemoryTransferStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransferStore for InMemoryTransferStore {
    fn get(&self, id: TransferId) -> Option<Transfer> {
        let map = self.transfers.read().ok()?;
        map.get(&id).cloned()
    }

    fn save(&self, transfer: Transfer, expected: ExpectedVersion) -> StockResult<()> {
        let mut map = self
            .transfers
            .write()
            .map_err(|_| StockError::invariant("transfer store lock poisoned"))?;
        let stored = map
            .get(&transfer.id_typed())
            .map(Transfer::version)
            .unwrap_or(0);
        expected.check(stored)?;
        map.insert(transfer.id_typed(), transfer);
        Ok(())
    }

    fn next_transfer_number(&self) -> StockResult<String> {
        let n = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("TRF-{n:06}"))
    }

    fn list(&self) -> Vec<Transfer> {
        let map = match self.transfers.read() {
            Ok(m) => m,
            Err(_) => return Vec::new(),
        };
        let mut transfers: Vec<Transfer> = map.values().cloned().collect();
        transfers.sort_by(|a, b| a.transfer_number().cmp(b.transfer_number()));
        transfers
    }

    fn find_by_number(&self, transfer_number: &str) -> Option<Transfer> {
        let map = self.transfers.read().ok()?;
        map.values()
            .find(|t| t.transfer_number() == transfer_number)
            .cloned()
    }
}
