use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use optistock_core::{LocationId, ProductId, StockError, StockResult};

/// Key of a stock record: one product at one location.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub product_id: ProductId,
    pub location_id: LocationId,
}

impl StockKey {
    pub fn new(product_id: ProductId, location_id: LocationId) -> Self {
        Self {
            product_id,
            location_id,
        }
    }
}

/// Stock position for one product at one location.
///
/// Invariants: `on_hand >= 0` and `0 <= reserved <= on_hand`, so
/// `available()` is never negative. Records are never deleted, only zeroed,
/// to keep history queryable.
///
/// All mutation goes through the pure transition functions below, which
/// return the next state and bump `version` by one. The store compares
/// `version` when swapping states in, which serializes writers per key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    product_id: ProductId,
    location_id: LocationId,
    on_hand: i64,
    reserved: i64,
    last_restocked_at: Option<DateTime<Utc>>,
    version: u64,
}

impl StockRecord {
    /// Empty record (no stock, no reservations) at version 0.
    ///
    /// This is the basis for the first transition on a key the ledger has
    /// never seen; it is never stored as-is.
    pub fn empty(product_id: ProductId, location_id: LocationId) -> Self {
        Self {
            product_id,
            location_id,
            on_hand: 0,
            reserved: 0,
            last_restocked_at: None,
            version: 0,
        }
    }

    pub fn key(&self) -> StockKey {
        StockKey::new(self.product_id, self.location_id)
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn location_id(&self) -> LocationId {
        self.location_id
    }

    pub fn on_hand(&self) -> i64 {
        self.on_hand
    }

    pub fn reserved(&self) -> i64 {
        self.reserved
    }

    /// On-hand minus reserved; what can be newly committed. Never negative.
    pub fn available(&self) -> i64 {
        self.on_hand - self.reserved
    }

    pub fn last_restocked_at(&self) -> Option<DateTime<Utc>> {
        self.last_restocked_at
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    fn bumped(mut self) -> Self {
        self.version += 1;
        self
    }

    /// Earmark `qty` units for an outgoing transfer.
    pub fn reserve(&self, qty: i64) -> StockResult<Self> {
        ensure_positive(qty)?;
        let available = self.available();
        if qty > available {
            return Err(StockError::insufficient(
                self.product_id,
                self.location_id,
                qty,
                available,
            ));
        }
        let mut next = self.clone();
        next.reserved += qty;
        Ok(next.bumped())
    }

    /// Return `qty` reserved units to availability (cancellation path).
    pub fn release(&self, qty: i64) -> StockResult<Self> {
        ensure_positive(qty)?;
        if qty > self.reserved {
            return Err(StockError::invariant(format!(
                "release of {qty} would make reserved negative (reserved {})",
                self.reserved
            )));
        }
        let mut next = self.clone();
        next.reserved -= qty;
        Ok(next.bumped())
    }

    /// Confirm that `qty` reserved units physically left this location:
    /// decrements both on-hand and reserved.
    pub fn commit(&self, qty: i64) -> StockResult<Self> {
        ensure_positive(qty)?;
        if qty > self.reserved {
            return Err(StockError::invariant(format!(
                "commit of {qty} exceeds reserved quantity {}",
                self.reserved
            )));
        }
        let mut next = self.clone();
        next.on_hand -= qty;
        next.reserved -= qty;
        Ok(next.bumped())
    }

    /// Book `qty` arriving units into on-hand and stamp the restock time.
    pub fn receive(&self, qty: i64, occurred_at: DateTime<Utc>) -> StockResult<Self> {
        ensure_positive(qty)?;
        let mut next = self.clone();
        next.on_hand += qty;
        next.last_restocked_at = Some(occurred_at);
        Ok(next.bumped())
    }

    /// Signed manual correction (cycle count, shrinkage, external sales
    /// import). On-hand must stay non-negative and must keep covering the
    /// reserved quantity.
    pub fn adjust(&self, delta: i64) -> StockResult<Self> {
        if delta == 0 {
            return Err(StockError::validation("delta cannot be zero"));
        }
        let new_on_hand = self.on_hand + delta;
        if new_on_hand < 0 {
            return Err(StockError::invariant("stock cannot go negative"));
        }
        if new_on_hand < self.reserved {
            return Err(StockError::invariant(format!(
                "adjustment would leave on-hand {new_on_hand} below reserved {}",
                self.reserved
            )));
        }
        let mut next = self.clone();
        next.on_hand = new_on_hand;
        Ok(next.bumped())
    }
}

fn ensure_positive(qty: i64) -> StockResult<()> {
    if qty <= 0 {
        return Err(StockError::validation("quantity must be positive"));
    }
    Ok(())
}
