//! Unified error handling
//!
//! Every failure a caller can recover from gets its own variant and a
//! stable machine-readable kind, so a client can decide whether to retry
//! automatically (`CONCURRENCY_CONFLICT`) or prompt the user
//! (`INSUFFICIENT_STOCK`, `EXPIRED`). Errors propagate unmodified from the
//! component that detected them; none of them are process-fatal.

use crate::storage::StorageError;
use shared::OrderStatus;

/// Core error type for all fulfillment operations
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    // ========== Lookup ==========
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    // ========== Validation ==========
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Cart is empty")]
    CartEmpty,

    // ========== Business Rules ==========
    #[error("Insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: String,
        requested: u32,
        available: i64,
    },

    #[error("Cart expired: {cart_id}")]
    CartExpired { cart_id: String },

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidStateTransition { from: OrderStatus, to: OrderStatus },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // ========== Concurrency ==========
    /// A concurrent writer changed the record between our read and write.
    /// Retry the whole logical operation with fresh state.
    #[error("Concurrency conflict on {entity} {id}")]
    ConcurrencyConflict { entity: &'static str, id: String },

    // ========== System ==========
    #[error("Storage error: {0}")]
    Storage(StorageError),
}

impl CoreError {
    /// Stable machine-readable kind for API responses and logs
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::NotFound { .. } => "NOT_FOUND",
            CoreError::AlreadyExists(_) => "ALREADY_EXISTS",
            CoreError::InvalidInput(_) | CoreError::CartEmpty => "INVALID_INPUT",
            CoreError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            CoreError::CartExpired { .. } => "EXPIRED",
            CoreError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            CoreError::Unauthorized(_) => "UNAUTHORIZED",
            CoreError::ConcurrencyConflict { .. } => "CONCURRENCY_CONFLICT",
            CoreError::Storage(_) => "STORAGE",
        }
    }

    /// Whether re-running the whole logical operation can succeed without
    /// any user intervention
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::ConcurrencyConflict { .. })
    }
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::VersionConflict { entity, id } => {
                CoreError::ConcurrencyConflict { entity, id }
            }
            StorageError::DuplicateKey { entity, id } => {
                CoreError::AlreadyExists(format!("{entity} {id}"))
            }
            other => CoreError::Storage(other),
        }
    }
}

impl From<validator::ValidationErrors> for CoreError {
    fn from(err: validator::ValidationErrors) -> Self {
        CoreError::InvalidInput(err.to_string())
    }
}

/// Result type for all fulfillment operations
pub type CoreResult<T> = Result<T, CoreError>;
