use thiserror::Error;

use crate::{ProductId, StockId, Version};

/// SQLSTATE raised when `lock_timeout` expires while waiting for a row lock.
const LOCK_NOT_AVAILABLE: &str = "55P03";
/// SQLSTATE for unique constraint violations.
const UNIQUE_VIOLATION: &str = "23505";
/// SQLSTATE for check constraint violations.
const CHECK_VIOLATION: &str = "23514";
/// SQLSTATE for foreign key violations.
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Errors that can occur when interacting with the stock store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// An optimistic write found a different version than expected.
    #[error("Version mismatch for stock {stock_id}: expected version {expected}")]
    VersionMismatch { stock_id: StockId, expected: Version },

    /// A uniqueness, check or foreign key constraint rejected the write.
    #[error("Constraint violation: {0}")]
    Conflict(String),

    /// Summing the stock of a product overflowed.
    #[error("Stock totals of product {product_id} overflow")]
    QuantityOverflow { product_id: ProductId },

    /// A row lock could not be acquired within the configured timeout.
    #[error("Timed out waiting for a row lock")]
    LockTimeout,

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, id: impl Into<i64>) -> Self {
        StoreError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            match db_err.code().as_deref() {
                Some(LOCK_NOT_AVAILABLE) => return StoreError::LockTimeout,
                Some(UNIQUE_VIOLATION | CHECK_VIOLATION | FOREIGN_KEY_VIOLATION) => {
                    let detail = db_err
                        .constraint()
                        .map(str::to_string)
                        .unwrap_or_else(|| db_err.message().to_string());
                    return StoreError::Conflict(detail);
                }
                _ => {}
            }
        }
        StoreError::Database(err)
    }
}

/// Result type for stock store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_stays_a_database_error() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Database(_)));
    }

    #[test]
    fn not_found_message_names_entity() {
        let err = StoreError::not_found("stock", StockId::new(9));
        assert_eq!(err.to_string(), "stock not found: 9");
    }
}
