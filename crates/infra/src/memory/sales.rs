use std::sync::RwLock;

use chrono::{DateTime, Utc};

use optistock_core::{LocationId, ProductId};
use optistock_replenishment::{SalesEvent, SalesFeed};

/// In-memory [`SalesFeed`] backed by an append-only event list.
///
/// Events may be recorded in any order; queries always come back sorted by
/// sale time, as the feed contract requires.
#[derive(Debug, Default)]
pub struct InMemorySalesFeed {
    events: RwLock<Vec<SalesEvent>>,
}

impl InMemorySalesFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: SalesEvent) {
        if let Ok(mut events) = self.events.write() {
            events.push(event);
        }
    }

    pub fn extend(&self, new_events: impl IntoIterator<Item = SalesEvent>) {
        if let Ok(mut events) = self.events.write() {
            events.extend(new_events);
        }
    }
}

impl SalesFeed for InMemorySalesFeed {
    fn sales_between(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<SalesEvent> {
        let events = match self.events.read() {
            Ok(e) => e,
            Err(_) => return Vec::new(),
        };
        let mut matching: Vec<SalesEvent> = events
            .iter()
            .filter(|e| {
                e.product_id == product_id
                    && e.location_id == location_id
                    && e.sold_at >= from
                    && e.sold_at <= to
            })
            .cloned()
            .collect();
        matching.sort_by_key(|e| e.sold_at);
        matching
    }
}
