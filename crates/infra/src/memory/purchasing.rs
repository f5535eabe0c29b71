use std::sync::RwLock;

use optistock_core::{StockError, StockResult};
use optistock_dashboard::{PurchaseBatch, PurchasingGateway};

/// Purchasing gateway that records batches instead of sending them anywhere.
///
/// Stand-in for a supplier integration: demos and tests read back what the
/// dashboard submitted.
#[derive(Debug, Default)]
pub struct RecordingPurchasingGateway {
    batches: RwLock<Vec<PurchaseBatch>>,
}

impl RecordingPurchasingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every batch submitted so far, oldest first.
    pub fn submitted(&self) -> Vec<PurchaseBatch> {
        match self.batches.read() {
            Ok(batches) => batches.clone(),
            Err(_) => Vec::new(),
        }
    }
}

impl PurchasingGateway for RecordingPurchasingGateway {
    fn submit(&self, batch: &PurchaseBatch) -> StockResult<()> {
        let mut batches = self
            .batches
            .write()
            .map_err(|_| StockError::invariant("purchasing gateway lock poisoned"))?;
        batches.push(batch.clone());
        tracing::debug!(lines = batch.lines.len(), "purchase batch recorded");
        Ok(())
    }
}
