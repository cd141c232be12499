//! Persistence for warehouses, stock rows, reservations and transfers.
//!
//! [`StockStore`] serves lock-free reads; every quantity change runs in a
//! [`StoreTx`] that holds row locks until commit. Two backends are provided:
//! [`InMemoryStore`] and [`PostgresStore`].

pub mod availability;
pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod query;
pub mod store;

pub use availability::{Availability, MAX_QUANTITY};
pub use common::{OrderId, ProductId, ReservationId, ShopId, StockId, TransferId, WarehouseId};
pub use error::{Result, StoreError};
pub use memory::{DEFAULT_LOCK_TIMEOUT, InMemoryStore, InMemoryTx};
pub use model::{
    NewReservation, NewStock, NewTransfer, NewWarehouse, ParseStatusError, Reservation,
    ReservationStatus, Stock, StockLevel, StockTransfer, TransferStatus, Version, Warehouse,
};
pub use postgres::{PostgresStore, PostgresTx};
pub use query::{
    DEFAULT_LIMIT, Page, Pagination, SortOrder, StockQuery, StockSort, TransferQuery, TransferSort,
    WarehouseQuery, WarehouseSort,
};
pub use store::{StockStore, StoreTx};
