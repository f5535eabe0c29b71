//! Domain error model.

use thiserror::Error;

use crate::id::{LocationId, ProductId};

/// Result type used across the domain layer.
pub type StockResult<T> = Result<T, StockError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, state-machine misuse). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StockError {
    /// Requested quantity exceeds what is available at a specific
    /// product/location. Recoverable: the caller can reduce the quantity or
    /// pick another source location.
    #[error(
        "insufficient stock for product {product_id} at location {location_id}: \
         requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        location_id: LocationId,
        requested: i64,
        available: i64,
    },

    /// Attempted state change not permitted by the transfer state machine.
    /// Usage error; not retried.
    #[error("invalid transition: cannot {action} a transfer in status {from}")]
    InvalidTransition { from: String, action: String },

    /// Receipt quantity out of bounds, or receipt for a product not on the
    /// transfer.
    #[error("invalid receipt: {0}")]
    InvalidReceipt(String),

    /// A manual policy edit violates a policy constraint
    /// (e.g. `max_stock < reorder_point`).
    #[error("policy validation failed: {0}")]
    PolicyValidation(String),

    /// Lost an optimistic race after bounded retries. The caller should retry
    /// the whole operation.
    #[error("concurrent modification: {0}")]
    ConcurrentModification(String),

    /// A domain invariant was violated. Internal bug signal; should never
    /// surface in correct operation.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// A value failed validation (e.g. non-positive quantity, malformed id).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A requested resource was not found (domain-level).
    #[error("not found")]
    NotFound,
}

impl StockError {
    pub fn insufficient(
        product_id: ProductId,
        location_id: LocationId,
        requested: i64,
        available: i64,
    ) -> Self {
        Self::InsufficientStock {
            product_id,
            location_id,
            requested,
            available,
        }
    }

    pub fn invalid_transition(from: impl Into<String>, action: impl Into<String>) -> Self {
        Self::InvalidTransition {
            from: from.into(),
            action: action.into(),
        }
    }

    pub fn invalid_receipt(msg: impl Into<String>) -> Self {
        Self::InvalidReceipt(msg.into())
    }

    pub fn policy(msg: impl Into<String>) -> Self {
        Self::PolicyValidation(msg.into())
    }

    pub fn concurrency(msg: impl Into<String>) -> Self {
        Self::ConcurrentModification(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    /// Whether the caller can reasonably retry or adjust and resubmit.
    ///
    /// `InsufficientStock` and `ConcurrentModification` are recoverable;
    /// everything else signals misuse or an internal bug.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InsufficientStock { .. } | Self::ConcurrentModification(_)
        )
    }
}
