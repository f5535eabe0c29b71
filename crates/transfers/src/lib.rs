//! Cross-location stock transfers.
//!
//! The [`Transfer`] aggregate is a pure state machine: commands in, events
//! out, no IO. The [`TransferOrchestrator`] pairs it with the stock ledger so
//! that every transition keeps quantity conserved between the source and
//! destination locations: reserve on create, commit + receive on receipt,
//! release on cancellation.

pub mod orchestrator;
pub mod store;
pub mod transfer;

pub use orchestrator::{CreateTransferRequest, TransferDirection, TransferOrchestrator};
pub use store::TransferStore;
pub use transfer::{
    CancelRemainder, CancelTransfer, CreateTransfer, ItemRequest, MarkInTransit, MarkSent,
    ReceiptLine, ReceiveFull, ReceivePartial, RemainderDisposition, Transfer, TransferCommand,
    TransferEvent, TransferId, TransferItem, TransferStatus, WriteOffRemainder,
};
