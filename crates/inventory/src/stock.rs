//! Stock ledger operations: initialisation, availability reads and manual
//! quantity adjustment.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use stock_store::{
    Availability, NewStock, Page, ProductId, ShopId, Stock, StockId, StockLevel, StockQuery,
    StockStore, StoreError, StoreTx, Version,
};

use crate::error::{InventoryError, Result};
use crate::publisher::{AvailabilityPublisher, publish_availability};
use crate::{ensure_positive, ensure_within_limit, record_transaction};

/// Service for reading and adjusting stock rows.
pub struct StockService<S: StockStore> {
    store: S,
    publisher: Arc<dyn AvailabilityPublisher>,
}

impl<S: StockStore> StockService<S> {
    /// Creates a new stock service.
    pub fn new(store: S, publisher: Arc<dyn AvailabilityPublisher>) -> Self {
        Self { store, publisher }
    }

    /// Creates a zero-quantity row for the product in every active
    /// warehouse of the shop.
    #[tracing::instrument(skip(self))]
    pub async fn init_stock(&self, shop_id: ShopId, product_id: ProductId) -> Result<Vec<Stock>> {
        ensure_positive(shop_id.as_i64(), "shop_id")?;
        ensure_positive(product_id.as_i64(), "product_id")?;

        let rows: Vec<NewStock> = self
            .store
            .warehouses_by_shop(shop_id)
            .await?
            .into_iter()
            .filter(|w| w.active)
            .map(|w| NewStock {
                product_id,
                warehouse_id: w.id,
            })
            .collect();
        if rows.is_empty() {
            return Err(InventoryError::invalid(format!(
                "shop {shop_id} has no active warehouses"
            )));
        }

        let started = Instant::now();
        let mut tx = self.store.begin().await?;
        let created = tx.insert_stocks(&rows).await.map_err(|e| match e {
            StoreError::Conflict(_) => InventoryError::invalid("stock already initialized"),
            other => other.into(),
        })?;
        publish_availability(&mut tx, self.publisher.as_ref(), product_id).await?;
        tx.commit().await?;

        record_transaction("init_stock", started);
        tracing::info!(%product_id, rows = created.len(), "stock initialized");
        Ok(created)
    }

    /// Availability of a product over the active warehouses.
    pub async fn availability(&self, product_id: ProductId) -> Result<Availability> {
        ensure_positive(product_id.as_i64(), "product_id")?;
        Ok(self.store.available_by_product(product_id).await?)
    }

    /// Availability of several products. Products without stock in any
    /// active warehouse are absent from the result.
    pub async fn availabilities(
        &self,
        product_ids: &[ProductId],
    ) -> Result<HashMap<ProductId, Availability>> {
        Ok(self.store.available_by_products(product_ids).await?)
    }

    /// Every stock row of a product in placement order.
    pub async fn stock_levels(&self, product_id: ProductId) -> Result<Vec<StockLevel>> {
        ensure_positive(product_id.as_i64(), "product_id")?;
        Ok(self.store.stock_levels_by_product(product_id).await?)
    }

    pub async fn list_stocks(&self, shop_id: ShopId, query: &StockQuery) -> Result<Page<Stock>> {
        Ok(self.store.list_stocks(shop_id, query).await?)
    }

    /// Sets the on-hand quantity of a stock row.
    ///
    /// Setting the current quantity is a no-op. When `expected` is given the
    /// row must still be at that version. The new quantity may not drop below
    /// what is reserved on the row.
    #[tracing::instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        id: StockId,
        shop_id: ShopId,
        quantity: i64,
        expected: Option<Version>,
    ) -> Result<Stock> {
        if quantity < 0 {
            return Err(InventoryError::validation("quantity must not be negative"));
        }
        ensure_within_limit(quantity)?;

        let stock = self.store.get_stock(id).await?;
        let warehouse = self.store.get_warehouse(stock.warehouse_id).await?;
        if warehouse.shop_id != shop_id {
            tracing::warn!(%id, %shop_id, "stock belongs to another shop");
            return Err(InventoryError::Unauthorized(format!(
                "stock {id} does not belong to shop {shop_id}"
            )));
        }
        if stock.quantity == quantity {
            return Ok(stock);
        }

        let started = Instant::now();
        let mut tx = self.store.begin().await?;
        let locked = tx.lock_stock(id).await?;
        if let Some(expected) = expected
            && expected != locked.version
        {
            return Err(InventoryError::VersionMismatch {
                stock_id: id,
                expected,
            });
        }

        let reserved = tx.total_active_by_stock(id).await?;
        if quantity < reserved {
            tracing::warn!(%id, quantity, reserved, "adjustment below reserved quantity");
            return Err(InventoryError::invalid(format!(
                "quantity {quantity} is below the {reserved} reserved on stock {id}"
            )));
        }

        let updated = tx.update_quantity(id, quantity, locked.version).await?;
        publish_availability(&mut tx, self.publisher.as_ref(), updated.product_id).await?;
        tx.commit().await?;

        record_transaction("update_quantity", started);
        metrics::counter!("stock_adjustments_total").increment(1);
        tracing::info!(%id, from = locked.quantity, to = quantity, "stock quantity adjusted");
        Ok(updated)
    }
}
