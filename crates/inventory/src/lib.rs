//! Stock consistency engine: reservations, manual adjustments and warehouse
//! status changes, each executed as one store transaction that publishes the
//! product's new availability before committing.

use std::time::Instant;

use stock_store::MAX_QUANTITY;

pub mod error;
pub mod publisher;
pub mod reservation;
pub mod stock;
pub mod warehouse;

pub use error::{ErrorKind, InventoryError, Result};
#[cfg(feature = "redis")]
pub use publisher::RedisPublisher;
pub use publisher::{
    AvailabilityPublisher, InMemoryPublisher, LoggingPublisher, PublishError, StockMessage,
    publish_availability,
};
pub use reservation::ReservationService;
pub use stock::StockService;
pub use warehouse::WarehouseService;

/// Records how long a committed inventory transaction took.
pub fn record_transaction(operation: &'static str, started: Instant) {
    metrics::histogram!("inventory_transaction_duration_seconds", "operation" => operation)
        .record(started.elapsed().as_secs_f64());
}

/// Rejects identifiers and quantities that are not strictly positive.
pub fn ensure_positive(value: i64, field: &str) -> Result<()> {
    if value <= 0 {
        return Err(InventoryError::validation(format!(
            "{field} must be greater than zero"
        )));
    }
    Ok(())
}

/// Rejects quantities a stock row could never hold.
pub fn ensure_within_limit(quantity: i64) -> Result<()> {
    if quantity > MAX_QUANTITY {
        return Err(InventoryError::validation(format!(
            "quantity must not exceed {MAX_QUANTITY}"
        )));
    }
    Ok(())
}
