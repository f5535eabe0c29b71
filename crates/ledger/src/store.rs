use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};

use optistock_core::{ExpectedVersion, LocationId, ProductId, StockError, StockResult};

use crate::movement::{MovementKind, StockMovement};
use crate::record::{StockKey, StockRecord};

/// Single source of truth for on-hand and reserved quantities.
///
/// All mutating operations take an explicit `occurred_at` so callers control
/// the clock; the ledger itself never reads wall time.
pub trait StockLedger: Send + Sync {
    /// Current record for a key, if the ledger has ever seen it.
    fn get(&self, product_id: ProductId, location_id: LocationId) -> Option<StockRecord>;

    /// Available quantity (on-hand minus reserved); 0 for unknown keys.
    fn get_available(&self, product_id: ProductId, location_id: LocationId) -> i64 {
        self.get(product_id, location_id)
            .map(|r| r.available())
            .unwrap_or(0)
    }

    /// Book arriving units into on-hand and stamp the restock time.
    fn receive(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        qty: i64,
        occurred_at: DateTime<Utc>,
    ) -> StockResult<StockRecord>;

    /// Earmark units for an outgoing transfer.
    fn reserve(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        qty: i64,
        occurred_at: DateTime<Utc>,
    ) -> StockResult<StockRecord>;

    /// Return reserved units to availability.
    fn release(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        qty: i64,
        occurred_at: DateTime<Utc>,
    ) -> StockResult<StockRecord>;

    /// Confirm reserved units physically left the location.
    fn commit(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        qty: i64,
        occurred_at: DateTime<Utc>,
    ) -> StockResult<StockRecord>;

    /// Signed manual correction with an operator-supplied reason.
    fn adjust(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        delta: i64,
        reason: &str,
        occurred_at: DateTime<Utc>,
    ) -> StockResult<StockRecord>;

    /// Reserve several products at one location atomically: either every
    /// line is reserved or none is.
    fn reserve_batch(
        &self,
        location_id: LocationId,
        lines: &[(ProductId, i64)],
        occurred_at: DateTime<Utc>,
    ) -> StockResult<Vec<StockRecord>>;

    /// All records, sorted by (product, location) for deterministic output.
    fn snapshot(&self) -> Vec<StockRecord>;

    /// All records at one location, sorted by product.
    fn records_at(&self, location_id: LocationId) -> Vec<StockRecord>;

    /// Journal entries for one key, in append order.
    fn movements(&self, product_id: ProductId, location_id: LocationId) -> Vec<StockMovement>;
}

impl<S> StockLedger for Arc<S>
where
    S: StockLedger + ?Sized,
{
    fn get(&self, product_id: ProductId, location_id: LocationId) -> Option<StockRecord> {
        (**self).get(product_id, location_id)
    }

    fn receive(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        qty: i64,
        occurred_at: DateTime<Utc>,
    ) -> StockResult<StockRecord> {
        (**self).receive(product_id, location_id, qty, occurred_at)
    }

    fn reserve(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        qty: i64,
        occurred_at: DateTime<Utc>,
    ) -> StockResult<StockRecord> {
        (**self).reserve(product_id, location_id, qty, occurred_at)
    }

    fn release(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        qty: i64,
        occurred_at: DateTime<Utc>,
    ) -> StockResult<StockRecord> {
        (**self).release(product_id, location_id, qty, occurred_at)
    }

    fn commit(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        qty: i64,
        occurred_at: DateTime<Utc>,
    ) -> StockResult<StockRecord> {
        (**self).commit(product_id, location_id, qty, occurred_at)
    }

    fn adjust(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        delta: i64,
        reason: &str,
        occurred_at: DateTime<Utc>,
    ) -> StockResult<StockRecord> {
        (**self).adjust(product_id, location_id, delta, reason, occurred_at)
    }

    fn reserve_batch(
        &self,
        location_id: LocationId,
        lines: &[(ProductId, i64)],
        occurred_at: DateTime<Utc>,
    ) -> StockResult<Vec<StockRecord>> {
        (**self).reserve_batch(location_id, lines, occurred_at)
    }

    fn snapshot(&self) -> Vec<StockRecord> {
        (**self).snapshot()
    }

    fn records_at(&self, location_id: LocationId) -> Vec<StockRecord> {
        (**self).records_at(location_id)
    }

    fn movements(&self, product_id: ProductId, location_id: LocationId) -> Vec<StockMovement> {
        (**self).movements(product_id, location_id)
    }
}

/// In-memory stock ledger with per-key optimistic concurrency.
///
/// Writers read the current record, compute the next state with a pure
/// transition, then swap it in only if the version is unchanged. A lost
/// race retries up to `max_attempts` times before surfacing
/// `ConcurrentModification` to the caller.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug)]
pub struct InMemoryStockLedger {
    records: RwLock<HashMap<StockKey, StockRecord>>,
    journal: RwLock<Vec<StockMovement>>,
    max_attempts: u32,
    retry_backoff: Duration,
}

impl Default for InMemoryStockLedger {
    fn default() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            journal: RwLock::new(Vec::new()),
            max_attempts: 3,
            retry_backoff: Duration::from_millis(1),
        }
    }
}

impl InMemoryStockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    fn current(&self, key: StockKey) -> StockResult<StockRecord> {
        let records = self
            .records
            .read()
            .map_err(|_| StockError::invariant("stock ledger lock poisoned"))?;
        Ok(records
            .get(&key)
            .cloned()
            .unwrap_or_else(|| StockRecord::empty(key.product_id, key.location_id)))
    }

    /// Swap `next` in for the record at its key, provided the stored version
    /// still matches `expected`. The journal entry is appended under the same
    /// lock, so journal order agrees with version order per key.
    pub fn try_apply(
        &self,
        expected: ExpectedVersion,
        next: StockRecord,
        movement: StockMovement,
    ) -> StockResult<StockRecord> {
        let mut records = self
            .records
            .write()
            .map_err(|_| StockError::invariant("stock ledger lock poisoned"))?;
        let current_version = records.get(&next.key()).map(|r| r.version()).unwrap_or(0);
        expected.check(current_version)?;

        records.insert(next.key(), next.clone());
        let mut journal = self
            .journal
            .write()
            .map_err(|_| StockError::invariant("stock ledger lock poisoned"))?;
        journal.push(movement);
        Ok(next)
    }

    /// Read-transition-swap loop. Only lost version races are retried;
    /// domain rejections (insufficient stock, invariant violations) surface
    /// on the first attempt.
    fn apply<F>(
        &self,
        key: StockKey,
        transition: F,
        movement: impl Fn(&StockRecord) -> StockMovement,
    ) -> StockResult<StockRecord>
    where
        F: Fn(&StockRecord) -> StockResult<StockRecord>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let current = self.current(key)?;
            let next = transition(&current)?;
            let entry = movement(&next);
            match self.try_apply(ExpectedVersion::Exact(current.version()), next, entry) {
                Ok(record) => return Ok(record),
                Err(StockError::ConcurrentModification(msg)) => {
                    if attempt >= self.max_attempts {
                        tracing::warn!(
                            product_id = %key.product_id,
                            location_id = %key.location_id,
                            attempts = attempt,
                            "stock ledger write lost the race on every attempt"
                        );
                        return Err(StockError::concurrency(msg));
                    }
                    tracing::debug!(
                        product_id = %key.product_id,
                        location_id = %key.location_id,
                        attempt,
                        "stock ledger write lost a version race, retrying"
                    );
                    std::thread::sleep(self.retry_backoff);
                }
                Err(other) => return Err(other),
            }
        }
    }
}

impl StockLedger for InMemoryStockLedger {
    fn get(&self, product_id: ProductId, location_id: LocationId) -> Option<StockRecord> {
        self.records
            .read()
            .ok()?
            .get(&StockKey::new(product_id, location_id))
            .cloned()
    }

    fn receive(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        qty: i64,
        occurred_at: DateTime<Utc>,
    ) -> StockResult<StockRecord> {
        self.apply(
            StockKey::new(product_id, location_id),
            |r| r.receive(qty, occurred_at),
            |_| {
                StockMovement::new(
                    product_id,
                    location_id,
                    MovementKind::Received,
                    qty,
                    occurred_at,
                )
            },
        )
    }

    fn reserve(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        qty: i64,
        occurred_at: DateTime<Utc>,
    ) -> StockResult<StockRecord> {
        self.apply(
            StockKey::new(product_id, location_id),
            |r| r.reserve(qty),
            |_| {
                StockMovement::new(
                    product_id,
                    location_id,
                    MovementKind::Reserved,
                    qty,
                    occurred_at,
                )
            },
        )
    }

    fn release(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        qty: i64,
        occurred_at: DateTime<Utc>,
    ) -> StockResult<StockRecord> {
        self.apply(
            StockKey::new(product_id, location_id),
            |r| r.release(qty),
            |_| {
                StockMovement::new(
                    product_id,
                    location_id,
                    MovementKind::Released,
                    qty,
                    occurred_at,
                )
            },
        )
    }

    fn commit(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        qty: i64,
        occurred_at: DateTime<Utc>,
    ) -> StockResult<StockRecord> {
        self.apply(
            StockKey::new(product_id, location_id),
            |r| r.commit(qty),
            |_| {
                StockMovement::new(
                    product_id,
                    location_id,
                    MovementKind::Committed,
                    qty,
                    occurred_at,
                )
            },
        )
    }

    fn adjust(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        delta: i64,
        reason: &str,
        occurred_at: DateTime<Utc>,
    ) -> StockResult<StockRecord> {
        self.apply(
            StockKey::new(product_id, location_id),
            |r| r.adjust(delta),
            |_| {
                StockMovement::new(
                    product_id,
                    location_id,
                    MovementKind::Adjusted,
                    delta,
                    occurred_at,
                )
                .with_note(reason.to_string())
            },
        )
    }

    fn reserve_batch(
        &self,
        location_id: LocationId,
        lines: &[(ProductId, i64)],
        occurred_at: DateTime<Utc>,
    ) -> StockResult<Vec<StockRecord>> {
        if lines.is_empty() {
            return Err(StockError::validation("batch must contain at least one line"));
        }

        // Validate and swap under one critical section so the batch is
        // all-or-nothing even against concurrent single-key writers.
        let mut records = self
            .records
            .write()
            .map_err(|_| StockError::invariant("stock ledger lock poisoned"))?;

        let mut staged = Vec::with_capacity(lines.len());
        for (product_id, qty) in lines {
            let key = StockKey::new(*product_id, location_id);
            // Chain within the batch so repeated products compose.
            let current = staged
                .iter()
                .rev()
                .find(|r: &&StockRecord| r.key() == key)
                .cloned()
                .or_else(|| records.get(&key).cloned())
                .unwrap_or_else(|| StockRecord::empty(*product_id, location_id));
            staged.push(current.reserve(*qty)?);
        }

        for record in &staged {
            records.insert(record.key(), record.clone());
        }
        let mut journal = self
            .journal
            .write()
            .map_err(|_| StockError::invariant("stock ledger lock poisoned"))?;
        for (product_id, qty) in lines {
            journal.push(StockMovement::new(
                *product_id,
                location_id,
                MovementKind::Reserved,
                *qty,
                occurred_at,
            ));
        }
        Ok(staged)
    }

    fn snapshot(&self) -> Vec<StockRecord> {
        let mut all: Vec<StockRecord> = self
            .records
            .read()
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default();
        all.sort_by_key(|r| (*r.product_id().as_uuid(), *r.location_id().as_uuid()));
        all
    }

    fn records_at(&self, location_id: LocationId) -> Vec<StockRecord> {
        let mut at: Vec<StockRecord> = self
            .records
            .read()
            .map(|records| {
                records
                    .values()
                    .filter(|r| r.location_id() == location_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        at.sort_by_key(|r| *r.product_id().as_uuid());
        at
    }

    fn movements(&self, product_id: ProductId, location_id: LocationId) -> Vec<StockMovement> {
        self.journal
            .read()
            .map(|journal| {
                journal
                    .iter()
                    .filter(|m| m.product_id == product_id && m.location_id == location_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}
