//! Transfer orchestration: pairs the pure aggregate with ledger effects.
//!
//! Every mutating call follows the same pipeline: load the transfer, let the
//! aggregate decide (pure), apply the ledger effects, then persist with an
//! optimistic version check. The ledger moves before persistence; when
//! persistence fails the ledger work of this call is unwound, so a transfer
//! that was never saved leaves no reservation behind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use optistock_core::{
    Aggregate, AggregateId, AggregateRoot, ExpectedVersion, LocationId, ProductId, StockError,
    StockResult, UserId,
};
use optistock_ledger::StockLedger;

use crate::store::TransferStore;
use crate::transfer::{
    CancelRemainder, CancelTransfer, CreateTransfer, ItemRequest, MarkInTransit, MarkSent,
    ReceiptLine, ReceiveFull, ReceivePartial, Transfer, TransferCommand, TransferEvent, TransferId,
    WriteOffRemainder,
};

/// Input to [`TransferOrchestrator::create`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTransferRequest {
    pub from_location_id: LocationId,
    pub to_location_id: LocationId,
    pub items: Vec<ItemRequest>,
    pub created_by: UserId,
    pub notes: Option<String>,
}

/// Which side of a location a transfer touches.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    Outgoing,
    Incoming,
    Both,
}

/// Drives transfers through their lifecycle while keeping the stock ledger
/// consistent with the transfer state.
pub struct TransferOrchestrator<L, S> {
    ledger: L,
    store: S,
}

impl<L, S> TransferOrchestrator<L, S>
where
    L: StockLedger,
    S: TransferStore,
{
    pub fn new(ledger: L, store: S) -> Self {
        Self { ledger, store }
    }

    /// Create a transfer and reserve every requested line at the source.
    ///
    /// The reservation is all-or-nothing: any invalid item or insufficient
    /// position fails the whole call and leaves the ledger untouched.
    pub fn create(
        &self,
        request: CreateTransferRequest,
        occurred_at: DateTime<Utc>,
    ) -> StockResult<Transfer> {
        let transfer_number = self.store.next_transfer_number()?;
        let transfer_id = TransferId::new(AggregateId::new());
        let mut transfer = Transfer::empty(transfer_id);

        let events = transfer.handle(&TransferCommand::CreateTransfer(CreateTransfer {
            transfer_id,
            transfer_number,
            from_location_id: request.from_location_id,
            to_location_id: request.to_location_id,
            items: request.items.clone(),
            created_by: request.created_by,
            notes: request.notes.clone(),
            occurred_at,
        }))?;

        let lines: Vec<(ProductId, i64)> = request
            .items
            .iter()
            .map(|i| (i.product_id, i.quantity))
            .collect();
        self.ledger
            .reserve_batch(request.from_location_id, &lines, occurred_at)?;

        for event in &events {
            transfer.apply(event);
        }
        if let Err(err) = self
            .store
            .save(transfer.clone(), ExpectedVersion::Exact(0))
        {
            for (product_id, quantity) in &lines {
                if let Err(release_err) = self.ledger.release(
                    *product_id,
                    request.from_location_id,
                    *quantity,
                    occurred_at,
                ) {
                    tracing::error!(
                        product_id = %product_id,
                        location_id = %request.from_location_id,
                        error = %release_err,
                        "failed to release a reservation while unwinding transfer creation"
                    );
                }
            }
            return Err(err);
        }

        tracing::info!(
            transfer_number = %transfer.transfer_number(),
            from_location_id = %request.from_location_id,
            to_location_id = %request.to_location_id,
            lines = lines.len(),
            "transfer created"
        );
        Ok(transfer)
    }

    pub fn mark_sent(&self, id: TransferId, occurred_at: DateTime<Utc>) -> StockResult<Transfer> {
        self.transition(id, |t| {
            TransferCommand::MarkSent(MarkSent {
                transfer_id: t.id_typed(),
                occurred_at,
            })
        })
    }

    pub fn mark_in_transit(
        &self,
        id: TransferId,
        occurred_at: DateTime<Utc>,
    ) -> StockResult<Transfer> {
        self.transition(id, |t| {
            TransferCommand::MarkInTransit(MarkInTransit {
                transfer_id: t.id_typed(),
                occurred_at,
            })
        })
    }

    /// Receive everything still outstanding at the destination.
    pub fn receive_full(
        &self,
        id: TransferId,
        occurred_at: DateTime<Utc>,
    ) -> StockResult<Transfer> {
        self.receive_with(id, occurred_at, |t| {
            TransferCommand::ReceiveFull(ReceiveFull {
                transfer_id: t.id_typed(),
                occurred_at,
            })
        })
    }

    /// Receive explicit per-product quantities; the rest stays reserved at
    /// the source.
    pub fn receive_partial(
        &self,
        id: TransferId,
        lines: Vec<ReceiptLine>,
        occurred_at: DateTime<Utc>,
    ) -> StockResult<Transfer> {
        self.receive_with(id, occurred_at, move |t| {
            TransferCommand::ReceivePartial(ReceivePartial {
                transfer_id: t.id_typed(),
                lines,
                occurred_at,
            })
        })
    }

    /// Cancel a transfer that has received nothing, releasing the full
    /// reservation at the source.
    pub fn cancel(
        &self,
        id: TransferId,
        reason: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) -> StockResult<Transfer> {
        let mut transfer = self.store.get(id).ok_or(StockError::NotFound)?;
        let loaded_version = transfer.version();
        let events = transfer.handle(&TransferCommand::CancelTransfer(CancelTransfer {
            transfer_id: id,
            reason: reason.into(),
            occurred_at,
        }))?;

        let lines = transfer.outstanding_lines();
        self.release_lines(&transfer, &lines, occurred_at)?;

        for event in &events {
            transfer.apply(event);
        }
        if let Err(err) = self
            .store
            .save(transfer.clone(), ExpectedVersion::Exact(loaded_version))
        {
            self.re_reserve_lines(&transfer, &lines, occurred_at);
            return Err(err);
        }

        tracing::info!(
            transfer_number = %transfer.transfer_number(),
            released = transfer.outstanding_total(),
            "transfer cancelled"
        );
        Ok(transfer)
    }

    /// Return the unreceived remainder of a partially received transfer to
    /// availability at the source and close the transfer.
    pub fn cancel_remainder(
        &self,
        id: TransferId,
        reason: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) -> StockResult<Transfer> {
        let mut transfer = self.store.get(id).ok_or(StockError::NotFound)?;
        let loaded_version = transfer.version();
        let events = transfer.handle(&TransferCommand::CancelRemainder(CancelRemainder {
            transfer_id: id,
            reason: reason.into(),
            occurred_at,
        }))?;

        let lines = transfer.outstanding_lines();
        self.release_lines(&transfer, &lines, occurred_at)?;

        for event in &events {
            transfer.apply(event);
        }
        if let Err(err) = self
            .store
            .save(transfer.clone(), ExpectedVersion::Exact(loaded_version))
        {
            self.re_reserve_lines(&transfer, &lines, occurred_at);
            return Err(err);
        }

        tracing::info!(
            transfer_number = %transfer.transfer_number(),
            restocked = lines.iter().map(|l| l.quantity).sum::<i64>(),
            "transfer remainder restocked at source"
        );
        Ok(transfer)
    }

    /// Book the unreceived remainder as a loss: the source commits the
    /// outstanding quantity and no location receives it.
    pub fn write_off_remainder(
        &self,
        id: TransferId,
        reason: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) -> StockResult<Transfer> {
        let mut transfer = self.store.get(id).ok_or(StockError::NotFound)?;
        let loaded_version = transfer.version();
        let events = transfer.handle(&TransferCommand::WriteOffRemainder(WriteOffRemainder {
            transfer_id: id,
            reason: reason.into(),
            occurred_at,
        }))?;

        let lines = transfer.outstanding_lines();
        self.commit_lines(&transfer, &lines, occurred_at)?;

        for event in &events {
            transfer.apply(event);
        }
        if let Err(err) = self
            .store
            .save(transfer.clone(), ExpectedVersion::Exact(loaded_version))
        {
            self.uncommit_lines(&transfer, &lines, occurred_at);
            return Err(err);
        }

        tracing::warn!(
            transfer_number = %transfer.transfer_number(),
            written_off = lines.iter().map(|l| l.quantity).sum::<i64>(),
            "transfer remainder written off as a loss"
        );
        Ok(transfer)
    }

    pub fn get(&self, id: TransferId) -> Option<Transfer> {
        self.store.get(id)
    }

    pub fn find_by_number(&self, transfer_number: &str) -> Option<Transfer> {
        self.store.find_by_number(transfer_number)
    }

    /// Transfers touching a location, sorted by transfer number.
    pub fn list_by_location(
        &self,
        location_id: LocationId,
        direction: TransferDirection,
    ) -> Vec<Transfer> {
        let mut transfers: Vec<Transfer> = self
            .store
            .list()
            .into_iter()
            .filter(|t| match direction {
                TransferDirection::Outgoing => t.from_location_id() == location_id,
                TransferDirection::Incoming => t.to_location_id() == location_id,
                TransferDirection::Both => {
                    t.from_location_id() == location_id || t.to_location_id() == location_id
                }
            })
            .collect();
        transfers.sort_by(|a, b| a.transfer_number().cmp(b.transfer_number()));
        transfers
    }

    /// Load → handle → apply → save for commands with no ledger effect.
    fn transition(
        &self,
        id: TransferId,
        build: impl FnOnce(&Transfer) -> TransferCommand,
    ) -> StockResult<Transfer> {
        let mut transfer = self.store.get(id).ok_or(StockError::NotFound)?;
        let loaded_version = transfer.version();
        let events = transfer.handle(&build(&transfer))?;
        for event in &events {
            transfer.apply(event);
        }
        self.store
            .save(transfer.clone(), ExpectedVersion::Exact(loaded_version))?;
        Ok(transfer)
    }

    fn receive_with(
        &self,
        id: TransferId,
        occurred_at: DateTime<Utc>,
        build: impl FnOnce(&Transfer) -> TransferCommand,
    ) -> StockResult<Transfer> {
        let mut transfer = self.store.get(id).ok_or(StockError::NotFound)?;
        let loaded_version = transfer.version();
        let events = transfer.handle(&build(&transfer))?;
        let lines = match events.as_slice() {
            [TransferEvent::ItemsReceived(e)] => e.lines.clone(),
            _ => return Err(StockError::invariant("receipt produced unexpected events")),
        };

        self.move_lines(&transfer, &lines, occurred_at)?;

        for event in &events {
            transfer.apply(event);
        }
        if let Err(err) = self
            .store
            .save(transfer.clone(), ExpectedVersion::Exact(loaded_version))
        {
            self.unmove_lines(&transfer, &lines, occurred_at);
            return Err(err);
        }

        tracing::info!(
            transfer_number = %transfer.transfer_number(),
            received = lines.iter().map(|l| l.quantity).sum::<i64>(),
            outstanding = transfer.outstanding_total(),
            status = %transfer.status(),
            "transfer receipt booked"
        );
        Ok(transfer)
    }

    /// Commit each line at the source and receive it at the destination.
    /// A mid-flight failure unwinds the lines already moved.
    fn move_lines(
        &self,
        transfer: &Transfer,
        lines: &[ReceiptLine],
        occurred_at: DateTime<Utc>,
    ) -> StockResult<()> {
        self.commit_lines(transfer, lines, occurred_at)?;

        let destination = transfer.to_location_id();
        for (idx, line) in lines.iter().enumerate() {
            if let Err(err) =
                self.ledger
                    .receive(line.product_id, destination, line.quantity, occurred_at)
            {
                self.unreceive_lines(transfer, &lines[..idx], occurred_at);
                self.uncommit_lines(transfer, lines, occurred_at);
                return Err(err);
            }
        }
        Ok(())
    }

    fn commit_lines(
        &self,
        transfer: &Transfer,
        lines: &[ReceiptLine],
        occurred_at: DateTime<Utc>,
    ) -> StockResult<()> {
        let source = transfer.from_location_id();
        for (idx, line) in lines.iter().enumerate() {
            if let Err(err) =
                self.ledger
                    .commit(line.product_id, source, line.quantity, occurred_at)
            {
                self.uncommit_lines(transfer, &lines[..idx], occurred_at);
                return Err(err);
            }
        }
        Ok(())
    }

    fn release_lines(
        &self,
        transfer: &Transfer,
        lines: &[ReceiptLine],
        occurred_at: DateTime<Utc>,
    ) -> StockResult<()> {
        let source = transfer.from_location_id();
        for (idx, line) in lines.iter().enumerate() {
            if let Err(err) =
                self.ledger
                    .release(line.product_id, source, line.quantity, occurred_at)
            {
                self.re_reserve_lines(transfer, &lines[..idx], occurred_at);
                return Err(err);
            }
        }
        Ok(())
    }

    /// Best-effort inverse of `commit_lines`: restore on-hand and the
    /// reservation at the source.
    fn uncommit_lines(&self, transfer: &Transfer, lines: &[ReceiptLine], occurred_at: DateTime<Utc>) {
        let source = transfer.from_location_id();
        for line in lines {
            let restored = self
                .ledger
                .receive(line.product_id, source, line.quantity, occurred_at)
                .and_then(|_| {
                    self.ledger
                        .reserve(line.product_id, source, line.quantity, occurred_at)
                });
            if let Err(err) = restored {
                tracing::error!(
                    transfer_number = %transfer.transfer_number(),
                    product_id = %line.product_id,
                    error = %err,
                    "failed to restore a committed line while unwinding a receipt"
                );
            }
        }
    }

    /// Best-effort inverse of a destination receive.
    fn unreceive_lines(&self, transfer: &Transfer, lines: &[ReceiptLine], occurred_at: DateTime<Utc>) {
        let destination = transfer.to_location_id();
        for line in lines {
            if let Err(err) = self.ledger.adjust(
                line.product_id,
                destination,
                -line.quantity,
                "receipt unwound",
                occurred_at,
            ) {
                tracing::error!(
                    transfer_number = %transfer.transfer_number(),
                    product_id = %line.product_id,
                    error = %err,
                    "failed to remove received stock while unwinding a receipt"
                );
            }
        }
    }

    fn unmove_lines(&self, transfer: &Transfer, lines: &[ReceiptLine], occurred_at: DateTime<Utc>) {
        self.unreceive_lines(transfer, lines, occurred_at);
        self.uncommit_lines(transfer, lines, occurred_at);
    }

    /// Best-effort inverse of `release_lines`.
    fn re_reserve_lines(&self, transfer: &Transfer, lines: &[ReceiptLine], occurred_at: DateTime<Utc>) {
        let source = transfer.from_location_id();
        for line in lines {
            if let Err(err) =
                self.ledger
                    .reserve(line.product_id, source, line.quantity, occurred_at)
            {
                tracing::error!(
                    transfer_number = %transfer.transfer_number(),
                    product_id = %line.product_id,
                    error = %err,
                    "failed to re-reserve a released line while unwinding a cancellation"
                );
            }
        }
    }
}
