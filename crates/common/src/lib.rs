//! Identifier types shared by every crate of the inventory engine.

mod types;

pub use types::{OrderId, ProductId, ReservationId, ShopId, StockId, TransferId, WarehouseId};
