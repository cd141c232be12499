//! Warehouse registry.

use std::sync::Arc;
use std::time::Instant;

use stock_store::{
    NewWarehouse, Page, ShopId, StockId, StockStore, StoreTx, Warehouse, WarehouseId,
    WarehouseQuery,
};

use crate::error::{InventoryError, Result};
use crate::publisher::{AvailabilityPublisher, publish_availability};
use crate::{ensure_positive, record_transaction};

/// Service for creating warehouses and switching them on and off.
pub struct WarehouseService<S: StockStore> {
    store: S,
    publisher: Arc<dyn AvailabilityPublisher>,
}

impl<S: StockStore> WarehouseService<S> {
    /// Creates a new warehouse service.
    pub fn new(store: S, publisher: Arc<dyn AvailabilityPublisher>) -> Self {
        Self { store, publisher }
    }

    /// Creates an active warehouse for a shop.
    #[tracing::instrument(skip(self))]
    pub async fn create(&self, shop_id: ShopId, name: &str, location: &str) -> Result<Warehouse> {
        ensure_positive(shop_id.as_i64(), "shop_id")?;
        let name = name.trim();
        let location = location.trim();
        if name.is_empty() {
            return Err(InventoryError::validation("name is required"));
        }
        if location.is_empty() {
            return Err(InventoryError::validation("location is required"));
        }

        let warehouse = self
            .store
            .insert_warehouse(NewWarehouse {
                shop_id,
                name: name.to_string(),
                location: location.to_string(),
            })
            .await?;
        tracing::info!(warehouse_id = %warehouse.id, "warehouse created");
        Ok(warehouse)
    }

    pub async fn get(&self, id: WarehouseId) -> Result<Warehouse> {
        Ok(self.store.get_warehouse(id).await?)
    }

    /// Returns every warehouse of a shop, failing if it has none.
    pub async fn by_shop(&self, shop_id: ShopId) -> Result<Vec<Warehouse>> {
        let warehouses = self.store.warehouses_by_shop(shop_id).await?;
        if warehouses.is_empty() {
            return Err(InventoryError::NotFound(format!(
                "no warehouses for shop {shop_id}"
            )));
        }
        Ok(warehouses)
    }

    pub async fn list(&self, shop_id: ShopId, query: &WarehouseQuery) -> Result<Page<Warehouse>> {
        Ok(self.store.list_warehouses(shop_id, query).await?)
    }

    /// Activates or deactivates a warehouse.
    ///
    /// The warehouse row and all of its stock rows stay locked while the
    /// availability of every product it holds is republished. Deactivation is
    /// refused while stock in the warehouse is reserved.
    #[tracing::instrument(skip(self))]
    pub async fn set_active(
        &self,
        id: WarehouseId,
        shop_id: ShopId,
        active: bool,
    ) -> Result<Warehouse> {
        let warehouse = self.store.get_warehouse(id).await?;
        if warehouse.shop_id != shop_id {
            tracing::warn!(%id, %shop_id, "warehouse belongs to another shop");
            return Err(InventoryError::Unauthorized(format!(
                "warehouse {id} does not belong to shop {shop_id}"
            )));
        }
        if warehouse.active == active {
            return Ok(warehouse);
        }

        let started = Instant::now();
        let mut tx = self.store.begin().await?;
        let locked = tx.lock_warehouse(id).await?;
        if locked.active == active {
            return Ok(locked);
        }

        let stocks = tx.lock_stocks_by_warehouse(id).await?;
        let held: Vec<_> = stocks.iter().filter(|s| s.quantity != 0).collect();

        if !active {
            let ids: Vec<StockId> = held.iter().map(|s| s.id).collect();
            let reserved = tx.total_active_by_stocks(&ids).await?;
            if let Some(stock) = held
                .iter()
                .find(|s| reserved.get(&s.id).copied().unwrap_or(0) != 0)
            {
                tracing::warn!(%id, stock_id = %stock.id, "warehouse still has reserved stock");
                return Err(InventoryError::invalid(format!(
                    "stock {} in warehouse {id} still has active reservations",
                    stock.id
                )));
            }
        }

        let updated = tx.set_warehouse_active(id, active).await?;
        for stock in &held {
            publish_availability(&mut tx, self.publisher.as_ref(), stock.product_id).await?;
        }
        tx.commit().await?;

        record_transaction("warehouse_status", started);
        tracing::info!(%id, active, products = held.len(), "warehouse status changed");
        Ok(updated)
    }
}
