//! Inventory error types.

use stock_store::{ProductId, StockId, StoreError, Version};
use thiserror::Error;

use crate::publisher::PublishError;

/// Classification of an [`InventoryError`] that callers map to a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidRequest,
    Validation,
    VersionMismatch,
    Unauthorized,
    /// Transient; the request may be retried.
    Unavailable,
    Internal,
}

/// Errors that can occur during inventory operations.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// The referenced entity does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The request conflicts with the current state.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No stock row can cover the requested quantity.
    #[error("Insufficient stock for product {product_id}: requested {requested}")]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
    },

    /// The request is malformed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The caller's version of a stock row is stale.
    #[error("Version mismatch for stock {stock_id}: expected version {expected}")]
    VersionMismatch { stock_id: StockId, expected: Version },

    /// The caller does not own the entity.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A lock could not be acquired in time.
    #[error("Temporarily unavailable: {0}")]
    Unavailable(String),

    /// The availability feed rejected a message.
    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    /// An error occurred in the stock store.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl InventoryError {
    /// Returns the kind of the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            InventoryError::NotFound(_) => ErrorKind::NotFound,
            InventoryError::InvalidRequest(_) | InventoryError::InsufficientStock { .. } => {
                ErrorKind::InvalidRequest
            }
            InventoryError::Validation(_) => ErrorKind::Validation,
            InventoryError::VersionMismatch { .. } => ErrorKind::VersionMismatch,
            InventoryError::Unauthorized(_) => ErrorKind::Unauthorized,
            InventoryError::Unavailable(_) => ErrorKind::Unavailable,
            InventoryError::Publish(_) | InventoryError::Store(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        InventoryError::Validation(message.into())
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        InventoryError::InvalidRequest(message.into())
    }
}

impl From<StoreError> for InventoryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => InventoryError::NotFound(err.to_string()),
            StoreError::VersionMismatch { stock_id, expected } => {
                InventoryError::VersionMismatch { stock_id, expected }
            }
            StoreError::Conflict(constraint) => {
                InventoryError::InvalidRequest(format!("conflicting write ({constraint})"))
            }
            StoreError::LockTimeout => InventoryError::Unavailable(err.to_string()),
            StoreError::QuantityOverflow { .. } => {
                InventoryError::InvalidRequest(err.to_string())
            }
            other => InventoryError::Store(other),
        }
    }
}

/// Result type for inventory operations.
pub type Result<T> = std::result::Result<T, InventoryError>;
