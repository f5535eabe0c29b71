use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use optistock_core::{Event, LocationId, ProductId};

/// What kind of stock movement a journal entry records.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Reserved,
    Released,
    Committed,
    Received,
    Adjusted,
}

/// Journal entry appended by the ledger for every successful mutation.
///
/// `quantity` is positive except for `Adjusted`, which carries the signed
/// delta as given. The journal is append-only; rebuilding a record by
/// replaying its movements yields the current position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub kind: MovementKind,
    pub quantity: i64,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl StockMovement {
    pub fn new(
        product_id: ProductId,
        location_id: LocationId,
        kind: MovementKind,
        quantity: i64,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            product_id,
            location_id,
            kind,
            quantity,
            note: None,
            occurred_at,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

impl Event for StockMovement {
    fn event_type(&self) -> &'static str {
        match self.kind {
            MovementKind::Reserved => "stock.reserved",
            MovementKind::Released => "stock.released",
            MovementKind::Committed => "stock.committed",
            MovementKind::Received => "stock.received",
            MovementKind::Adjusted => "stock.adjusted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_follows_kind() {
        let movement = StockMovement::new(
            ProductId::new(),
            LocationId::new(),
            MovementKind::Committed,
            4,
            Utc::now(),
        );
        assert_eq!(movement.event_type(), "stock.committed");
        assert_eq!(movement.version(), 1);
    }

    #[test]
    fn serializes_kind_in_snake_case() {
        let movement = StockMovement::new(
            ProductId::new(),
            LocationId::new(),
            MovementKind::Adjusted,
            -3,
            Utc::now(),
        )
        .with_note("cycle count");
        let json = serde_json::to_value(&movement).unwrap();
        assert_eq!(json["kind"], "adjusted");
        assert_eq!(json["quantity"], -3);
        assert_eq!(json["note"], "cycle count");
    }
}
