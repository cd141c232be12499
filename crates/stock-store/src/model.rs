use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{OrderId, ProductId, ReservationId, ShopId, StockId, TransferId, WarehouseId};

/// Version number of a stock row, used for optimistic concurrency control.
///
/// Versions start at 1 when the row is created and increment by 1 on every
/// quantity write.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the version of a freshly created row.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Error returned when a status column holds an unknown value.
#[derive(Debug, Clone, Error)]
#[error("unknown {kind} status: {value}")]
pub struct ParseStatusError {
    kind: &'static str,
    value: String,
}

/// A physical location owned by a shop that holds stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub shop_id: ShopId,
    pub name: String,
    pub location: String,
    /// Only active warehouses contribute to availability and placement.
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a warehouse. New warehouses start active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWarehouse {
    pub shop_id: ShopId,
    pub name: String,
    pub location: String,
}

/// On-hand quantity of one product in one warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stock {
    pub id: StockId,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
    pub version: Version,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a zero-quantity stock row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewStock {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
}

/// Lifecycle of a reservation.
///
/// ```text
/// Active -> Completed
///        -> Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Active,
    Completed,
    Cancelled,
}

impl ReservationStatus {
    /// Returns true if the reservation can no longer change status.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReservationStatus::Active)
    }

    /// Returns true if a reservation in this status still holds stock.
    pub fn is_active(&self) -> bool {
        matches!(self, ReservationStatus::Active)
    }

    /// Returns the status as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Active => "active",
            ReservationStatus::Completed => "completed",
            ReservationStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ReservationStatus::Active),
            "completed" => Ok(ReservationStatus::Completed),
            "cancelled" => Ok(ReservationStatus::Cancelled),
            other => Err(ParseStatusError {
                kind: "reservation",
                value: other.to_string(),
            }),
        }
    }
}

/// A quantity of one stock row held for one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub stock_id: StockId,
    pub order_id: OrderId,
    pub quantity: i64,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for recording an active reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewReservation {
    pub stock_id: StockId,
    pub order_id: OrderId,
    pub quantity: i64,
}

/// Lifecycle of a stock transfer.
///
/// ```text
/// NotStarted -> InProgress -> Completed
///                          -> Reverted
///                          -> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    NotStarted,
    InProgress,
    Completed,
    Reverted,
    Failed,
}

impl TransferStatus {
    /// Returns true if the transfer has finished.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferStatus::Completed | TransferStatus::Reverted | TransferStatus::Failed
        )
    }

    /// Returns the status as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::NotStarted => "not_started",
            TransferStatus::InProgress => "in_progress",
            TransferStatus::Completed => "completed",
            TransferStatus::Reverted => "reverted",
            TransferStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransferStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(TransferStatus::NotStarted),
            "in_progress" => Ok(TransferStatus::InProgress),
            "completed" => Ok(TransferStatus::Completed),
            "reverted" => Ok(TransferStatus::Reverted),
            "failed" => Ok(TransferStatus::Failed),
            other => Err(ParseStatusError {
                kind: "transfer",
                value: other.to_string(),
            }),
        }
    }
}

/// A request to move a quantity of one product between two warehouses.
///
/// The stock rows involved are found by (product, warehouse) when the
/// transfer changes state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTransfer {
    pub id: TransferId,
    pub product_id: ProductId,
    pub from_warehouse_id: WarehouseId,
    pub to_warehouse_id: WarehouseId,
    pub quantity: i64,
    pub status: TransferStatus,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a transfer in `NotStarted`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransfer {
    pub product_id: ProductId,
    pub from_warehouse_id: WarehouseId,
    pub to_warehouse_id: WarehouseId,
    pub quantity: i64,
    pub description: Option<String>,
}

/// A stock row together with what is held against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    #[serde(flatten)]
    pub stock: Stock,
    pub warehouse_active: bool,
    /// Sum of active reservations on the row.
    pub reserved: i64,
}

impl StockLevel {
    /// Returns the unreserved quantity of the row.
    pub fn available(&self) -> i64 {
        crate::availability::available(self.stock.quantity, self.reserved)
    }
}
