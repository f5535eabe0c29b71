use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use optistock_core::{
    Aggregate, AggregateId, AggregateRoot, Event, LocationId, ProductId, StockError, UserId,
};

/// Transfer identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferId(pub AggregateId);

impl TransferId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for TransferId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Transfer status lifecycle. Transitions are monotonic: no event ever moves
/// a transfer to an earlier status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Pending,
    Sent,
    InTransit,
    Received,
    PartiallyReceived,
    Cancelled,
}

impl core::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let label = match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Sent => "sent",
            TransferStatus::InTransit => "in_transit",
            TransferStatus::Received => "received",
            TransferStatus::PartiallyReceived => "partially_received",
            TransferStatus::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// What happened to the unreceived remainder of a partially received
/// transfer. `Pending` keeps the transfer open; the other two close it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemainderDisposition {
    Pending,
    /// Remainder returned to availability at the source.
    Restocked,
    /// Remainder committed as a loss (damaged or missing in transit).
    WrittenOff,
}

/// One product line on a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferItem {
    pub product_id: ProductId,
    pub requested_qty: i64,
    pub received_qty: i64,
}

impl TransferItem {
    /// Requested but not yet received; still reserved at the source.
    pub fn outstanding(&self) -> i64 {
        self.requested_qty - self.received_qty
    }
}

/// Requested line on a new transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRequest {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// One line of a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Aggregate root: a stock transfer between two locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    id: TransferId,
    transfer_number: String,
    from_location_id: LocationId,
    to_location_id: LocationId,
    items: Vec<TransferItem>,
    status: TransferStatus,
    remainder: RemainderDisposition,
    created_by: Option<UserId>,
    created_at: Option<DateTime<Utc>>,
    sent_at: Option<DateTime<Utc>>,
    received_at: Option<DateTime<Utc>>,
    notes: Option<String>,
    cancel_reason: Option<String>,
    version: u64,
    created: bool,
}

impl Transfer {
    /// Empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: TransferId) -> Self {
        Self {
            id,
            transfer_number: String::new(),
            from_location_id: LocationId::from_uuid(uuid::Uuid::nil()),
            to_location_id: LocationId::from_uuid(uuid::Uuid::nil()),
            items: Vec::new(),
            status: TransferStatus::Pending,
            remainder: RemainderDisposition::Pending,
            created_by: None,
            created_at: None,
            sent_at: None,
            received_at: None,
            notes: None,
            cancel_reason: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> TransferId {
        self.id
    }

    pub fn transfer_number(&self) -> &str {
        &self.transfer_number
    }

    pub fn from_location_id(&self) -> LocationId {
        self.from_location_id
    }

    pub fn to_location_id(&self) -> LocationId {
        self.to_location_id
    }

    pub fn items(&self) -> &[TransferItem] {
        &self.items
    }

    pub fn status(&self) -> TransferStatus {
        self.status
    }

    pub fn remainder(&self) -> RemainderDisposition {
        self.remainder
    }

    pub fn created_by(&self) -> Option<UserId> {
        self.created_by
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        self.sent_at
    }

    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        self.received_at
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }

    /// Lines still reserved at the source, one per item with outstanding
    /// quantity.
    pub fn outstanding_lines(&self) -> Vec<ReceiptLine> {
        self.items
            .iter()
            .filter(|i| i.outstanding() > 0)
            .map(|i| ReceiptLine {
                product_id: i.product_id,
                quantity: i.outstanding(),
            })
            .collect()
    }

    pub fn outstanding_total(&self) -> i64 {
        self.items.iter().map(|i| i.outstanding()).sum()
    }

    /// Whether any further command can move this transfer.
    pub fn is_terminal(&self) -> bool {
        match self.status {
            TransferStatus::Received | TransferStatus::Cancelled => true,
            TransferStatus::PartiallyReceived => self.remainder != RemainderDisposition::Pending,
            _ => false,
        }
    }

    fn can_receive(&self) -> bool {
        match self.status {
            TransferStatus::Sent | TransferStatus::InTransit => true,
            TransferStatus::PartiallyReceived => self.remainder == RemainderDisposition::Pending,
            _ => false,
        }
    }
}

impl AggregateRoot for Transfer {
    type Id = TransferId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateTransfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTransfer {
    pub transfer_id: TransferId,
    pub transfer_number: String,
    pub from_location_id: LocationId,
    pub to_location_id: LocationId,
    pub items: Vec<ItemRequest>,
    pub created_by: UserId,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkSent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkSent {
    pub transfer_id: TransferId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkInTransit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkInTransit {
    pub transfer_id: TransferId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReceiveFull — receive everything still outstanding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveFull {
    pub transfer_id: TransferId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReceivePartial — receive explicit per-product quantities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivePartial {
    pub transfer_id: TransferId,
    pub lines: Vec<ReceiptLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelTransfer — only before any receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelTransfer {
    pub transfer_id: TransferId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelRemainder — return the unreceived remainder of a partially
/// received transfer to availability at the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelRemainder {
    pub transfer_id: TransferId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: WriteOffRemainder — book the unreceived remainder as a loss.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOffRemainder {
    pub transfer_id: TransferId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferCommand {
    CreateTransfer(CreateTransfer),
    MarkSent(MarkSent),
    MarkInTransit(MarkInTransit),
    ReceiveFull(ReceiveFull),
    ReceivePartial(ReceivePartial),
    CancelTransfer(CancelTransfer),
    CancelRemainder(CancelRemainder),
    WriteOffRemainder(WriteOffRemainder),
}

/// Event: TransferCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferCreated {
    pub transfer_id: TransferId,
    pub transfer_number: String,
    pub from_location_id: LocationId,
    pub to_location_id: LocationId,
    pub items: Vec<ItemRequest>,
    pub created_by: UserId,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransferSent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferSent {
    pub transfer_id: TransferId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransferInTransit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferInTransit {
    pub transfer_id: TransferId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemsReceived. Covers both full and partial receipts; `complete`
/// is true when nothing is outstanding afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemsReceived {
    pub transfer_id: TransferId,
    pub lines: Vec<ReceiptLine>,
    pub complete: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransferCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferCancelled {
    pub transfer_id: TransferId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RemainderRestocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemainderRestocked {
    pub transfer_id: TransferId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RemainderWrittenOff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemainderWrittenOff {
    pub transfer_id: TransferId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferEvent {
    TransferCreated(TransferCreated),
    TransferSent(TransferSent),
    TransferInTransit(TransferInTransit),
    ItemsReceived(ItemsReceived),
    TransferCancelled(TransferCancelled),
    RemainderRestocked(RemainderRestocked),
    RemainderWrittenOff(RemainderWrittenOff),
}

impl Event for TransferEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TransferEvent::TransferCreated(_) => "transfer.created",
            TransferEvent::TransferSent(_) => "transfer.sent",
            TransferEvent::TransferInTransit(_) => "transfer.in_transit",
            TransferEvent::ItemsReceived(_) => "transfer.items_received",
            TransferEvent::TransferCancelled(_) => "transfer.cancelled",
            TransferEvent::RemainderRestocked(_) => "transfer.remainder_restocked",
            TransferEvent::RemainderWrittenOff(_) => "transfer.remainder_written_off",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TransferEvent::TransferCreated(e) => e.occurred_at,
            TransferEvent::TransferSent(e) => e.occurred_at,
            TransferEvent::TransferInTransit(e) => e.occurred_at,
            TransferEvent::ItemsReceived(e) => e.occurred_at,
            TransferEvent::TransferCancelled(e) => e.occurred_at,
            TransferEvent::RemainderRestocked(e) => e.occurred_at,
            TransferEvent::RemainderWrittenOff(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Transfer {
    type Command = TransferCommand;
    type Event = TransferEvent;
    type Error = StockError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TransferEvent::TransferCreated(e) => {
                self.id = e.transfer_id;
                self.transfer_number = e.transfer_number.clone();
                self.from_location_id = e.from_location_id;
                self.to_location_id = e.to_location_id;
                self.items = e
                    .items
                    .iter()
                    .map(|i| TransferItem {
                        product_id: i.product_id,
                        requested_qty: i.quantity,
                        received_qty: 0,
                    })
                    .collect();
                self.status = TransferStatus::Pending;
                self.remainder = RemainderDisposition::Pending;
                self.created_by = Some(e.created_by);
                self.created_at = Some(e.occurred_at);
                self.notes = e.notes.clone();
                self.created = true;
            }
            TransferEvent::TransferSent(e) => {
                self.status = TransferStatus::Sent;
                self.sent_at = Some(e.occurred_at);
            }
            TransferEvent::TransferInTransit(_) => {
                self.status = TransferStatus::InTransit;
            }
            TransferEvent::ItemsReceived(e) => {
                for line in &e.lines {
                    if let Some(item) = self
                        .items
                        .iter_mut()
                        .find(|i| i.product_id == line.product_id)
                    {
                        item.received_qty += line.quantity;
                    }
                }
                if e.complete {
                    self.status = TransferStatus::Received;
                    self.received_at = Some(e.occurred_at);
                } else {
                    self.status = TransferStatus::PartiallyReceived;
                }
            }
            TransferEvent::TransferCancelled(e) => {
                self.status = TransferStatus::Cancelled;
                self.cancel_reason = Some(e.reason.clone());
            }
            TransferEvent::RemainderRestocked(e) => {
                self.remainder = RemainderDisposition::Restocked;
                self.cancel_reason = Some(e.reason.clone());
            }
            TransferEvent::RemainderWrittenOff(e) => {
                self.remainder = RemainderDisposition::WrittenOff;
                self.cancel_reason = Some(e.reason.clone());
            }
        }

        // Version advances by one per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TransferCommand::CreateTransfer(cmd) => self.handle_create(cmd),
            TransferCommand::MarkSent(cmd) => self.handle_mark_sent(cmd),
            TransferCommand::MarkInTransit(cmd) => self.handle_mark_in_transit(cmd),
            TransferCommand::ReceiveFull(cmd) => self.handle_receive_full(cmd),
            TransferCommand::ReceivePartial(cmd) => self.handle_receive_partial(cmd),
            TransferCommand::CancelTransfer(cmd) => self.handle_cancel(cmd),
            TransferCommand::CancelRemainder(cmd) => self.handle_cancel_remainder(cmd),
            TransferCommand::WriteOffRemainder(cmd) => self.handle_write_off_remainder(cmd),
        }
    }
}

impl Transfer {
    fn ensure_exists(&self) -> Result<(), StockError> {
        if !self.created {
            return Err(StockError::NotFound);
        }
        Ok(())
    }

    fn ensure_transfer_id(&self, transfer_id: TransferId) -> Result<(), StockError> {
        if self.id != transfer_id {
            return Err(StockError::invariant("transfer_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateTransfer) -> Result<Vec<TransferEvent>, StockError> {
        if self.created {
            return Err(StockError::concurrency("transfer already exists"));
        }
        if cmd.transfer_number.is_empty() {
            return Err(StockError::validation("transfer number cannot be empty"));
        }
        if cmd.from_location_id == cmd.to_location_id {
            return Err(StockError::validation(
                "source and destination locations must differ",
            ));
        }
        if cmd.items.is_empty() {
            return Err(StockError::validation(
                "transfer must contain at least one item",
            ));
        }
        for (idx, item) in cmd.items.iter().enumerate() {
            if item.quantity <= 0 {
                return Err(StockError::validation("quantity must be positive"));
            }
            if cmd.items[..idx].iter().any(|p| p.product_id == item.product_id) {
                return Err(StockError::validation(format!(
                    "duplicate product {} in transfer items",
                    item.product_id
                )));
            }
        }

        Ok(vec![TransferEvent::TransferCreated(TransferCreated {
            transfer_id: cmd.transfer_id,
            transfer_number: cmd.transfer_number.clone(),
            from_location_id: cmd.from_location_id,
            to_location_id: cmd.to_location_id,
            items: cmd.items.clone(),
            created_by: cmd.created_by,
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_sent(&self, cmd: &MarkSent) -> Result<Vec<TransferEvent>, StockError> {
        self.ensure_exists()?;
        self.ensure_transfer_id(cmd.transfer_id)?;

        if self.status != TransferStatus::Pending {
            return Err(StockError::invalid_transition(self.status.to_string(), "send"));
        }

        Ok(vec![TransferEvent::TransferSent(TransferSent {
            transfer_id: cmd.transfer_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_in_transit(
        &self,
        cmd: &MarkInTransit,
    ) -> Result<Vec<TransferEvent>, StockError> {
        self.ensure_exists()?;
        self.ensure_transfer_id(cmd.transfer_id)?;

        if self.status != TransferStatus::Sent {
            return Err(StockError::invalid_transition(
                self.status.to_string(),
                "mark in transit",
            ));
        }

        Ok(vec![TransferEvent::TransferInTransit(TransferInTransit {
            transfer_id: cmd.transfer_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_receive_full(&self, cmd: &ReceiveFull) -> Result<Vec<TransferEvent>, StockError> {
        self.ensure_exists()?;
        self.ensure_transfer_id(cmd.transfer_id)?;

        if !self.can_receive() {
            return Err(StockError::invalid_transition(
                self.status.to_string(),
                "receive",
            ));
        }

        Ok(vec![TransferEvent::ItemsReceived(ItemsReceived {
            transfer_id: cmd.transfer_id,
            lines: self.outstanding_lines(),
            complete: true,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_receive_partial(
        &self,
        cmd: &ReceivePartial,
    ) -> Result<Vec<TransferEvent>, StockError> {
        self.ensure_exists()?;
        self.ensure_transfer_id(cmd.transfer_id)?;

        if !self.can_receive() {
            return Err(StockError::invalid_transition(
                self.status.to_string(),
                "receive",
            ));
        }
        if cmd.lines.is_empty() {
            return Err(StockError::invalid_receipt(
                "receipt must contain at least one line",
            ));
        }

        let mut outstanding_after: i64 = self.outstanding_total();
        for (idx, line) in cmd.lines.iter().enumerate() {
            if cmd.lines[..idx].iter().any(|p| p.product_id == line.product_id) {
                return Err(StockError::invalid_receipt(format!(
                    "duplicate product {} in receipt",
                    line.product_id
                )));
            }
            let item = self
                .items
                .iter()
                .find(|i| i.product_id == line.product_id)
                .ok_or_else(|| {
                    StockError::invalid_receipt(format!(
                        "product {} is not on this transfer",
                        line.product_id
                    ))
                })?;
            if line.quantity <= 0 {
                return Err(StockError::invalid_receipt(format!(
                    "receipt quantity for product {} must be positive",
                    line.product_id
                )));
            }
            if line.quantity > item.outstanding() {
                return Err(StockError::invalid_receipt(format!(
                    "receipt of {} exceeds outstanding {} for product {}",
                    line.quantity,
                    item.outstanding(),
                    line.product_id
                )));
            }
            outstanding_after -= line.quantity;
        }

        Ok(vec![TransferEvent::ItemsReceived(ItemsReceived {
            transfer_id: cmd.transfer_id,
            lines: cmd.lines.clone(),
            complete: outstanding_after == 0,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelTransfer) -> Result<Vec<TransferEvent>, StockError> {
        self.ensure_exists()?;
        self.ensure_transfer_id(cmd.transfer_id)?;

        // Once anything has been received, cancellation is no longer a clean
        // undo; the remainder commands reconcile instead.
        match self.status {
            TransferStatus::Pending | TransferStatus::Sent | TransferStatus::InTransit => {}
            _ => {
                return Err(StockError::invalid_transition(
                    self.status.to_string(),
                    "cancel",
                ));
            }
        }

        Ok(vec![TransferEvent::TransferCancelled(TransferCancelled {
            transfer_id: cmd.transfer_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel_remainder(
        &self,
        cmd: &CancelRemainder,
    ) -> Result<Vec<TransferEvent>, StockError> {
        self.ensure_exists()?;
        self.ensure_transfer_id(cmd.transfer_id)?;

        if self.status != TransferStatus::PartiallyReceived
            || self.remainder != RemainderDisposition::Pending
        {
            return Err(StockError::invalid_transition(
                self.status.to_string(),
                "restock the remainder of",
            ));
        }

        Ok(vec![TransferEvent::RemainderRestocked(RemainderRestocked {
            transfer_id: cmd.transfer_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_write_off_remainder(
        &self,
        cmd: &WriteOffRemainder,
    ) -> Result<Vec<TransferEvent>, StockError> {
        self.ensure_exists()?;
        self.ensure_transfer_id(cmd.transfer_id)?;

        if self.status != TransferStatus::PartiallyReceived
            || self.remainder != RemainderDisposition::Pending
        {
            return Err(StockError::invalid_transition(
                self.status.to_string(),
                "write off the remainder of",
            ));
        }

        Ok(vec![TransferEvent::RemainderWrittenOff(RemainderWrittenOff {
            transfer_id: cmd.transfer_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
