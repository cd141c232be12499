use std::collections::HashMap;

use async_trait::async_trait;

use crate::{
    Availability, NewReservation, NewStock, NewTransfer, NewWarehouse, OrderId, Page, ProductId,
    Reservation, ReservationId, ReservationStatus, Result, ShopId, Stock, StockId, StockLevel,
    StockQuery, StockTransfer, TransferId, TransferQuery, TransferStatus, Version, Warehouse,
    WarehouseId, WarehouseQuery,
};

/// Core trait for stock store implementations.
///
/// Methods on the store itself read the last committed state without taking
/// row locks. Every change to a stock quantity goes through a [`StoreTx`]
/// opened with [`StockStore::begin`].
#[async_trait]
pub trait StockStore: Clone + Send + Sync + 'static {
    /// The transaction type of this backend.
    type Tx: StoreTx + 'static;

    /// Opens a transaction bounded by the store's lock timeout.
    async fn begin(&self) -> Result<Self::Tx>;

    /// Creates an active warehouse.
    async fn insert_warehouse(&self, warehouse: NewWarehouse) -> Result<Warehouse>;

    async fn get_warehouse(&self, id: WarehouseId) -> Result<Warehouse>;

    /// Returns the shop's warehouses ordered by id.
    async fn warehouses_by_shop(&self, shop_id: ShopId) -> Result<Vec<Warehouse>>;

    async fn list_warehouses(&self, shop_id: ShopId, query: &WarehouseQuery)
    -> Result<Page<Warehouse>>;

    async fn get_stock(&self, id: StockId) -> Result<Stock>;

    async fn stock_by_product_and_warehouse(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> Result<Stock>;

    /// Returns every stock row of a warehouse ordered by id.
    async fn stocks_by_warehouse(&self, warehouse_id: WarehouseId) -> Result<Vec<Stock>>;

    /// Returns every row of a product with its warehouse flag and reserved
    /// total, ordered by warehouse id then stock id.
    async fn stock_levels_by_product(&self, product_id: ProductId) -> Result<Vec<StockLevel>>;

    /// Lists the shop's stock rows in active warehouses.
    async fn list_stocks(&self, shop_id: ShopId, query: &StockQuery) -> Result<Page<Stock>>;

    /// Aggregates a product's availability over active warehouses.
    async fn available_by_product(&self, product_id: ProductId) -> Result<Availability>;

    /// Batched form of [`available_by_product`](Self::available_by_product).
    ///
    /// Products without rows in any active warehouse are absent.
    async fn available_by_products(
        &self,
        product_ids: &[ProductId],
    ) -> Result<HashMap<ProductId, Availability>>;

    async fn reservation_by_order(&self, order_id: OrderId) -> Result<Reservation>;

    /// Sum of active reservations held against a stock row.
    async fn total_active_by_stock(&self, stock_id: StockId) -> Result<i64>;

    /// Creates a transfer in `NotStarted`.
    async fn insert_transfer(&self, transfer: NewTransfer) -> Result<StockTransfer>;

    async fn get_transfer(&self, id: TransferId) -> Result<StockTransfer>;

    /// Lists transfers whose source warehouse belongs to the shop.
    async fn list_transfers(&self, shop_id: ShopId, query: &TransferQuery)
    -> Result<Page<StockTransfer>>;
}

/// A unit of work against a stock store.
///
/// Locks taken through a transaction are held until it is committed or
/// dropped. Dropping without [`commit`](StoreTx::commit) rolls back every
/// write made through it.
#[async_trait]
pub trait StoreTx: Send {
    /// Inserts zero-quantity rows. A duplicate (product, warehouse) pair
    /// fails the whole batch with [`StoreError::Conflict`](crate::StoreError::Conflict).
    async fn insert_stocks(&mut self, stocks: &[NewStock]) -> Result<Vec<Stock>>;

    async fn get_warehouse(&mut self, id: WarehouseId) -> Result<Warehouse>;

    /// Locks a warehouse row and returns its current state.
    async fn lock_warehouse(&mut self, id: WarehouseId) -> Result<Warehouse>;

    async fn set_warehouse_active(&mut self, id: WarehouseId, active: bool) -> Result<Warehouse>;

    /// Locks a stock row and returns its current state.
    async fn lock_stock(&mut self, id: StockId) -> Result<Stock>;

    /// Locks a stock row found by (product, warehouse).
    async fn lock_stock_by_product_and_warehouse(
        &mut self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> Result<Stock>;

    /// Locks every stock row of a warehouse in ascending id order.
    async fn lock_stocks_by_warehouse(&mut self, warehouse_id: WarehouseId) -> Result<Vec<Stock>>;

    /// Writes a new quantity if the row is still at `expected`.
    ///
    /// Returns the row with its incremented version, or
    /// [`StoreError::VersionMismatch`](crate::StoreError::VersionMismatch).
    async fn update_quantity(
        &mut self,
        id: StockId,
        quantity: i64,
        expected: Version,
    ) -> Result<Stock>;

    async fn total_active_by_stock(&mut self, stock_id: StockId) -> Result<i64>;

    /// Batched form of [`total_active_by_stock`](Self::total_active_by_stock).
    /// Rows without active reservations are absent.
    async fn total_active_by_stocks(
        &mut self,
        stock_ids: &[StockId],
    ) -> Result<HashMap<StockId, i64>>;

    /// Availability as seen by this transaction, including its own writes.
    async fn available_by_product(&mut self, product_id: ProductId) -> Result<Availability>;

    /// Records an active reservation. Capacity is not re-checked here.
    async fn insert_reservation(&mut self, reservation: NewReservation) -> Result<Reservation>;

    async fn reservation_by_order(&mut self, order_id: OrderId) -> Result<Reservation>;

    async fn set_reservation_status(
        &mut self,
        id: ReservationId,
        status: ReservationStatus,
    ) -> Result<Reservation>;

    /// Locks a transfer row and returns its current state.
    async fn lock_transfer(&mut self, id: TransferId) -> Result<StockTransfer>;

    /// Sets a transfer's status. `None` keeps the stored description.
    async fn set_transfer_status(
        &mut self,
        id: TransferId,
        status: TransferStatus,
        description: Option<String>,
    ) -> Result<StockTransfer>;

    /// Makes every write of the transaction visible and releases its locks.
    async fn commit(self) -> Result<()>;
}
