use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::{
    Availability, MAX_QUANTITY, NewReservation, NewStock, NewTransfer, NewWarehouse, OrderId, Page, ProductId,
    Reservation, ReservationId, ReservationStatus, Result, ShopId, Stock, StockId, StockLevel,
    StockQuery, StockSort, StockTransfer, StoreError, TransferId, TransferQuery, TransferSort,
    TransferStatus, Version, Warehouse, WarehouseId, WarehouseQuery, WarehouseSort,
    store::{StockStore, StoreTx},
};

/// Lock timeout used when none is configured.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// In-memory stock store implementation for tests and local runs.
///
/// Write transactions are serialized by a single writer lock and work on a
/// private copy of the tables that replaces the committed state on commit.
/// Lock-free reads see the last committed state.
#[derive(Clone)]
pub struct InMemoryStore {
    committed: Arc<RwLock<Tables>>,
    writer: Arc<Mutex<()>>,
    lock_timeout: Duration,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    /// Creates an empty store whose transactions wait at most `lock_timeout`
    /// for the writer lock.
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            committed: Arc::new(RwLock::new(Tables::default())),
            writer: Arc::new(Mutex::new(())),
            lock_timeout,
        }
    }

    async fn write<T, F>(&self, apply: F) -> Result<T>
    where
        F: FnOnce(&mut Tables) -> Result<T> + Send,
        T: Send,
    {
        let mut tx = self.begin().await?;
        let value = apply(&mut tx.working)?;
        tx.commit().await?;
        Ok(value)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// A write transaction on an [`InMemoryStore`].
pub struct InMemoryTx {
    working: Tables,
    committed: Arc<RwLock<Tables>>,
    _guard: OwnedMutexGuard<()>,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    warehouses: BTreeMap<WarehouseId, Warehouse>,
    stocks: BTreeMap<StockId, Stock>,
    reservations: BTreeMap<ReservationId, Reservation>,
    transfers: BTreeMap<TransferId, StockTransfer>,
    sequences: Sequences,
}

#[derive(Debug, Clone, Copy, Default)]
struct Sequences {
    warehouse: i64,
    stock: i64,
    reservation: i64,
    transfer: i64,
}

fn next(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

impl Tables {
    fn warehouse(&self, id: WarehouseId) -> Result<&Warehouse> {
        self.warehouses
            .get(&id)
            .ok_or_else(|| StoreError::not_found("warehouse", id))
    }

    fn stock(&self, id: StockId) -> Result<&Stock> {
        self.stocks
            .get(&id)
            .ok_or_else(|| StoreError::not_found("stock", id))
    }

    fn stock_by_pair(&self, product_id: ProductId, warehouse_id: WarehouseId) -> Result<&Stock> {
        self.stocks
            .values()
            .find(|s| s.product_id == product_id && s.warehouse_id == warehouse_id)
            .ok_or_else(|| StoreError::not_found("stock for product", product_id))
    }

    fn stocks_of_warehouse(&self, warehouse_id: WarehouseId) -> Vec<Stock> {
        self.stocks
            .values()
            .filter(|s| s.warehouse_id == warehouse_id)
            .cloned()
            .collect()
    }

    fn transfer(&self, id: TransferId) -> Result<&StockTransfer> {
        self.transfers
            .get(&id)
            .ok_or_else(|| StoreError::not_found("stock transfer", id))
    }

    fn reservation_by_order(&self, order_id: OrderId) -> Result<&Reservation> {
        self.reservations
            .values()
            .find(|r| r.order_id == order_id)
            .ok_or_else(|| StoreError::not_found("reservation for order", order_id))
    }

    fn is_active(&self, warehouse_id: WarehouseId) -> bool {
        self.warehouses
            .get(&warehouse_id)
            .is_some_and(|w| w.active)
    }

    fn belongs_to(&self, warehouse_id: WarehouseId, shop_id: ShopId) -> bool {
        self.warehouses
            .get(&warehouse_id)
            .is_some_and(|w| w.shop_id == shop_id)
    }

    fn reserved(&self, stock_id: StockId) -> i64 {
        self.reservations
            .values()
            .filter(|r| r.stock_id == stock_id && r.status.is_active())
            .map(|r| r.quantity)
            .sum()
    }

    fn reserved_by_stocks(&self, stock_ids: &[StockId]) -> HashMap<StockId, i64> {
        let mut totals = HashMap::new();
        for r in self.reservations.values() {
            if r.status.is_active() && stock_ids.contains(&r.stock_id) {
                *totals.entry(r.stock_id).or_insert(0) += r.quantity;
            }
        }
        totals
    }

    fn levels(&self, product_id: ProductId) -> Vec<StockLevel> {
        let mut levels: Vec<StockLevel> = self
            .stocks
            .values()
            .filter(|s| s.product_id == product_id)
            .map(|s| StockLevel {
                stock: s.clone(),
                warehouse_active: self.is_active(s.warehouse_id),
                reserved: self.reserved(s.id),
            })
            .collect();
        levels.sort_by_key(|l| (l.stock.warehouse_id, l.stock.id));
        levels
    }

    fn availability(&self, product_id: ProductId) -> Result<Option<Availability>> {
        let levels = self.levels(product_id);
        if !levels.iter().any(|l| l.warehouse_active) {
            return Ok(None);
        }
        Availability::aggregate(product_id, &levels).map(Some)
    }

    fn insert_warehouse(&mut self, new: NewWarehouse) -> Warehouse {
        let now = Utc::now();
        let warehouse = Warehouse {
            id: WarehouseId::new(next(&mut self.sequences.warehouse)),
            shop_id: new.shop_id,
            name: new.name,
            location: new.location,
            active: true,
            created_at: now,
            updated_at: now,
        };
        self.warehouses.insert(warehouse.id, warehouse.clone());
        warehouse
    }

    fn insert_stocks(&mut self, new: &[NewStock]) -> Result<Vec<Stock>> {
        for (i, row) in new.iter().enumerate() {
            self.warehouse(row.warehouse_id)?;
            let repeated = new[..i]
                .iter()
                .any(|r| r.product_id == row.product_id && r.warehouse_id == row.warehouse_id);
            if repeated || self.stock_by_pair(row.product_id, row.warehouse_id).is_ok() {
                return Err(StoreError::Conflict(
                    "stocks_product_id_warehouse_id_key".to_string(),
                ));
            }
        }

        let now = Utc::now();
        let mut created = Vec::with_capacity(new.len());
        for row in new {
            let stock = Stock {
                id: StockId::new(next(&mut self.sequences.stock)),
                product_id: row.product_id,
                warehouse_id: row.warehouse_id,
                quantity: 0,
                version: Version::first(),
                created_at: now,
                updated_at: now,
            };
            self.stocks.insert(stock.id, stock.clone());
            created.push(stock);
        }
        Ok(created)
    }

    fn update_quantity(&mut self, id: StockId, quantity: i64, expected: Version) -> Result<Stock> {
        if !(0..=MAX_QUANTITY).contains(&quantity) {
            return Err(StoreError::Conflict("stocks_quantity_check".to_string()));
        }
        let stock = self
            .stocks
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("stock", id))?;
        if stock.version != expected {
            return Err(StoreError::VersionMismatch {
                stock_id: id,
                expected,
            });
        }
        stock.quantity = quantity;
        stock.version = stock.version.next();
        stock.updated_at = Utc::now();
        Ok(stock.clone())
    }

    fn insert_reservation(&mut self, new: NewReservation) -> Result<Reservation> {
        self.stock(new.stock_id)?;
        if self.reservation_by_order(new.order_id).is_ok() {
            return Err(StoreError::Conflict(
                "reserved_stocks_order_id_key".to_string(),
            ));
        }
        let now = Utc::now();
        let reservation = Reservation {
            id: ReservationId::new(next(&mut self.sequences.reservation)),
            stock_id: new.stock_id,
            order_id: new.order_id,
            quantity: new.quantity,
            status: ReservationStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.reservations
            .insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    fn set_reservation_status(
        &mut self,
        id: ReservationId,
        status: ReservationStatus,
    ) -> Result<Reservation> {
        let reservation = self
            .reservations
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("reservation", id))?;
        reservation.status = status;
        reservation.updated_at = Utc::now();
        Ok(reservation.clone())
    }

    fn set_warehouse_active(&mut self, id: WarehouseId, active: bool) -> Result<Warehouse> {
        let warehouse = self
            .warehouses
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("warehouse", id))?;
        warehouse.active = active;
        warehouse.updated_at = Utc::now();
        Ok(warehouse.clone())
    }

    fn insert_transfer(&mut self, new: NewTransfer) -> Result<StockTransfer> {
        self.warehouse(new.from_warehouse_id)?;
        self.warehouse(new.to_warehouse_id)?;
        let now = Utc::now();
        let transfer = StockTransfer {
            id: TransferId::new(next(&mut self.sequences.transfer)),
            product_id: new.product_id,
            from_warehouse_id: new.from_warehouse_id,
            to_warehouse_id: new.to_warehouse_id,
            quantity: new.quantity,
            status: TransferStatus::NotStarted,
            description: new.description,
            created_at: now,
            updated_at: now,
        };
        self.transfers.insert(transfer.id, transfer.clone());
        Ok(transfer)
    }

    fn set_transfer_status(
        &mut self,
        id: TransferId,
        status: TransferStatus,
        description: Option<String>,
    ) -> Result<StockTransfer> {
        let transfer = self
            .transfers
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("stock transfer", id))?;
        transfer.status = status;
        if description.is_some() {
            transfer.description = description;
        }
        transfer.updated_at = Utc::now();
        Ok(transfer.clone())
    }

    fn list_warehouses(&self, shop_id: ShopId, query: &WarehouseQuery) -> Page<Warehouse> {
        let mut rows: Vec<Warehouse> = self
            .warehouses
            .values()
            .filter(|w| w.shop_id == shop_id)
            .filter(|w| query.active.is_none_or(|active| w.active == active))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            let ordering = match query.sort_by {
                WarehouseSort::Id => Ordering::Equal,
                WarehouseSort::Name => a.name.cmp(&b.name),
                WarehouseSort::CreatedAt => a.created_at.cmp(&b.created_at),
            };
            query.sort_order.apply(ordering.then(a.id.cmp(&b.id)))
        });
        Page::from_sorted(rows, query.pagination)
    }

    fn list_stocks(&self, shop_id: ShopId, query: &StockQuery) -> Page<Stock> {
        let mut rows: Vec<Stock> = self
            .stocks
            .values()
            .filter(|s| self.belongs_to(s.warehouse_id, shop_id) && self.is_active(s.warehouse_id))
            .filter(|s| query.product_id.is_none_or(|p| s.product_id == p))
            .filter(|s| query.warehouse_id.is_none_or(|w| s.warehouse_id == w))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            let ordering = match query.sort_by {
                StockSort::Id => Ordering::Equal,
                StockSort::ProductId => a.product_id.cmp(&b.product_id),
                StockSort::Quantity => a.quantity.cmp(&b.quantity),
                StockSort::CreatedAt => a.created_at.cmp(&b.created_at),
            };
            query.sort_order.apply(ordering.then(a.id.cmp(&b.id)))
        });
        Page::from_sorted(rows, query.pagination)
    }

    fn list_transfers(&self, shop_id: ShopId, query: &TransferQuery) -> Page<StockTransfer> {
        let mut rows: Vec<StockTransfer> = self
            .transfers
            .values()
            .filter(|t| self.belongs_to(t.from_warehouse_id, shop_id))
            .filter(|t| query.status.is_none_or(|status| t.status == status))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            let ordering = match query.sort_by {
                TransferSort::Id => Ordering::Equal,
                TransferSort::CreatedAt => a.created_at.cmp(&b.created_at),
            };
            query.sort_order.apply(ordering.then(a.id.cmp(&b.id)))
        });
        Page::from_sorted(rows, query.pagination)
    }
}

#[async_trait]
impl StockStore for InMemoryStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> Result<InMemoryTx> {
        let guard = tokio::time::timeout(self.lock_timeout, self.writer.clone().lock_owned())
            .await
            .map_err(|_| StoreError::LockTimeout)?;
        let working = self.committed.read().await.clone();
        Ok(InMemoryTx {
            working,
            committed: self.committed.clone(),
            _guard: guard,
        })
    }

    async fn insert_warehouse(&self, warehouse: NewWarehouse) -> Result<Warehouse> {
        self.write(|tables| Ok(tables.insert_warehouse(warehouse)))
            .await
    }

    async fn get_warehouse(&self, id: WarehouseId) -> Result<Warehouse> {
        self.committed.read().await.warehouse(id).cloned()
    }

    async fn warehouses_by_shop(&self, shop_id: ShopId) -> Result<Vec<Warehouse>> {
        let tables = self.committed.read().await;
        Ok(tables
            .warehouses
            .values()
            .filter(|w| w.shop_id == shop_id)
            .cloned()
            .collect())
    }

    async fn list_warehouses(
        &self,
        shop_id: ShopId,
        query: &WarehouseQuery,
    ) -> Result<Page<Warehouse>> {
        Ok(self.committed.read().await.list_warehouses(shop_id, query))
    }

    async fn get_stock(&self, id: StockId) -> Result<Stock> {
        self.committed.read().await.stock(id).cloned()
    }

    async fn stock_by_product_and_warehouse(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> Result<Stock> {
        self.committed
            .read()
            .await
            .stock_by_pair(product_id, warehouse_id)
            .cloned()
    }

    async fn stocks_by_warehouse(&self, warehouse_id: WarehouseId) -> Result<Vec<Stock>> {
        Ok(self.committed.read().await.stocks_of_warehouse(warehouse_id))
    }

    async fn stock_levels_by_product(&self, product_id: ProductId) -> Result<Vec<StockLevel>> {
        Ok(self.committed.read().await.levels(product_id))
    }

    async fn list_stocks(&self, shop_id: ShopId, query: &StockQuery) -> Result<Page<Stock>> {
        Ok(self.committed.read().await.list_stocks(shop_id, query))
    }

    async fn available_by_product(&self, product_id: ProductId) -> Result<Availability> {
        Ok(self
            .committed
            .read()
            .await
            .availability(product_id)?
            .unwrap_or_else(|| Availability::empty(product_id)))
    }

    async fn available_by_products(
        &self,
        product_ids: &[ProductId],
    ) -> Result<HashMap<ProductId, Availability>> {
        let tables = self.committed.read().await;
        let mut found = HashMap::new();
        for &id in product_ids {
            if let Some(availability) = tables.availability(id)? {
                found.insert(id, availability);
            }
        }
        Ok(found)
    }

    async fn reservation_by_order(&self, order_id: OrderId) -> Result<Reservation> {
        self.committed
            .read()
            .await
            .reservation_by_order(order_id)
            .cloned()
    }

    async fn total_active_by_stock(&self, stock_id: StockId) -> Result<i64> {
        Ok(self.committed.read().await.reserved(stock_id))
    }

    async fn insert_transfer(&self, transfer: NewTransfer) -> Result<StockTransfer> {
        self.write(|tables| tables.insert_transfer(transfer)).await
    }

    async fn get_transfer(&self, id: TransferId) -> Result<StockTransfer> {
        self.committed.read().await.transfer(id).cloned()
    }

    async fn list_transfers(
        &self,
        shop_id: ShopId,
        query: &TransferQuery,
    ) -> Result<Page<StockTransfer>> {
        Ok(self.committed.read().await.list_transfers(shop_id, query))
    }
}

#[async_trait]
impl StoreTx for InMemoryTx {
    async fn insert_stocks(&mut self, stocks: &[NewStock]) -> Result<Vec<Stock>> {
        self.working.insert_stocks(stocks)
    }

    async fn get_warehouse(&mut self, id: WarehouseId) -> Result<Warehouse> {
        self.working.warehouse(id).cloned()
    }

    async fn lock_warehouse(&mut self, id: WarehouseId) -> Result<Warehouse> {
        self.working.warehouse(id).cloned()
    }

    async fn set_warehouse_active(&mut self, id: WarehouseId, active: bool) -> Result<Warehouse> {
        self.working.set_warehouse_active(id, active)
    }

    async fn lock_stock(&mut self, id: StockId) -> Result<Stock> {
        self.working.stock(id).cloned()
    }

    async fn lock_stock_by_product_and_warehouse(
        &mut self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> Result<Stock> {
        self.working
            .stock_by_pair(product_id, warehouse_id)
            .cloned()
    }

    async fn lock_stocks_by_warehouse(&mut self, warehouse_id: WarehouseId) -> Result<Vec<Stock>> {
        Ok(self.working.stocks_of_warehouse(warehouse_id))
    }

    async fn update_quantity(
        &mut self,
        id: StockId,
        quantity: i64,
        expected: Version,
    ) -> Result<Stock> {
        self.working.update_quantity(id, quantity, expected)
    }

    async fn total_active_by_stock(&mut self, stock_id: StockId) -> Result<i64> {
        Ok(self.working.reserved(stock_id))
    }

    async fn total_active_by_stocks(
        &mut self,
        stock_ids: &[StockId],
    ) -> Result<HashMap<StockId, i64>> {
        Ok(self.working.reserved_by_stocks(stock_ids))
    }

    async fn available_by_product(&mut self, product_id: ProductId) -> Result<Availability> {
        Ok(self
            .working
            .availability(product_id)?
            .unwrap_or_else(|| Availability::empty(product_id)))
    }

    async fn insert_reservation(&mut self, reservation: NewReservation) -> Result<Reservation> {
        self.working.insert_reservation(reservation)
    }

    async fn reservation_by_order(&mut self, order_id: OrderId) -> Result<Reservation> {
        self.working.reservation_by_order(order_id).cloned()
    }

    async fn set_reservation_status(
        &mut self,
        id: ReservationId,
        status: ReservationStatus,
    ) -> Result<Reservation> {
        self.working.set_reservation_status(id, status)
    }

    async fn lock_transfer(&mut self, id: TransferId) -> Result<StockTransfer> {
        self.working.transfer(id).cloned()
    }

    async fn set_transfer_status(
        &mut self,
        id: TransferId,
        status: TransferStatus,
        description: Option<String>,
    ) -> Result<StockTransfer> {
        self.working.set_transfer_status(id, status, description)
    }

    async fn commit(self) -> Result<()> {
        let InMemoryTx {
            working,
            committed,
            _guard,
        } = self;
        *committed.write().await = working;
        Ok(())
    }
}
