//! Transfer orchestrator: creates transfers and drives them through the
//! state machine, moving stock between the two rows involved.

use std::sync::Arc;
use std::time::Instant;

use inventory::{
    AvailabilityPublisher, InventoryError, Result, ensure_positive, ensure_within_limit,
    publish_availability, record_transaction,
};
use stock_store::{
    MAX_QUANTITY, NewTransfer, Page, ShopId, Stock, StockStore, StockTransfer, StoreTx,
    TransferId, TransferQuery, TransferStatus,
};

use crate::state::{TransferEvent, transition};

/// Orchestrates stock transfers between warehouses of one shop.
pub struct TransferOrchestrator<S: StockStore> {
    store: S,
    publisher: Arc<dyn AvailabilityPublisher>,
}

impl<S: StockStore> TransferOrchestrator<S> {
    /// Creates a new transfer orchestrator.
    pub fn new(store: S, publisher: Arc<dyn AvailabilityPublisher>) -> Self {
        Self { store, publisher }
    }

    /// Records a transfer in `NotStarted`.
    ///
    /// Both warehouses must belong to `shop_id`. The source row must hold
    /// enough unreserved stock now; the check is repeated when the transfer
    /// begins.
    #[tracing::instrument(skip(self))]
    pub async fn create(&self, shop_id: ShopId, transfer: NewTransfer) -> Result<StockTransfer> {
        ensure_positive(transfer.product_id.as_i64(), "product_id")?;
        ensure_positive(transfer.quantity, "quantity")?;
        ensure_within_limit(transfer.quantity)?;
        if transfer.from_warehouse_id == transfer.to_warehouse_id {
            return Err(InventoryError::Validation(
                "source and destination warehouses must differ".into(),
            ));
        }

        for id in [transfer.from_warehouse_id, transfer.to_warehouse_id] {
            let warehouse = self.store.get_warehouse(id).await?;
            if warehouse.shop_id != shop_id {
                return Err(InventoryError::InvalidRequest(format!(
                    "warehouse {id} does not belong to shop {shop_id}"
                )));
            }
        }

        let source = self
            .store
            .stock_by_product_and_warehouse(transfer.product_id, transfer.from_warehouse_id)
            .await?;
        let reserved = self.store.total_active_by_stock(source.id).await?;
        if source.quantity - reserved < transfer.quantity {
            tracing::warn!(
                stock_id = %source.id,
                unreserved = source.quantity - reserved,
                requested = transfer.quantity,
                "not enough stock to transfer"
            );
            return Err(InventoryError::InvalidRequest(format!(
                "stock {} has {} unreserved, {} requested",
                source.id,
                source.quantity - reserved,
                transfer.quantity
            )));
        }

        let created = self.store.insert_transfer(transfer).await?;
        tracing::info!(transfer_id = %created.id, "transfer created");
        Ok(created)
    }

    /// Returns a transfer. When `shop_id` is given the source warehouse must
    /// belong to that shop.
    pub async fn get(&self, id: TransferId, shop_id: Option<ShopId>) -> Result<StockTransfer> {
        let transfer = self.store.get_transfer(id).await?;
        if let Some(shop_id) = shop_id {
            let source = self.store.get_warehouse(transfer.from_warehouse_id).await?;
            if source.shop_id != shop_id {
                return Err(InventoryError::InvalidRequest(format!(
                    "transfer {id} does not belong to shop {shop_id}"
                )));
            }
        }
        Ok(transfer)
    }

    pub async fn list(
        &self,
        shop_id: ShopId,
        query: &TransferQuery,
    ) -> Result<Page<StockTransfer>> {
        Ok(self.store.list_transfers(shop_id, query).await?)
    }

    /// Moves a transfer to `target`.
    ///
    /// Both stock rows are locked in ascending id order before the transfer
    /// row itself. A given `description` replaces the stored one.
    #[tracing::instrument(skip(self, description))]
    pub async fn apply(
        &self,
        id: TransferId,
        target: TransferStatus,
        description: Option<String>,
    ) -> Result<StockTransfer> {
        let event = TransferEvent::from_target(target).ok_or_else(|| {
            InventoryError::InvalidRequest(format!("cannot move a transfer to {target}"))
        })?;

        let transfer = self.store.get_transfer(id).await?;
        let mut rows = [
            self.store
                .stock_by_product_and_warehouse(transfer.product_id, transfer.from_warehouse_id)
                .await?,
            self.store
                .stock_by_product_and_warehouse(transfer.product_id, transfer.to_warehouse_id)
                .await?,
        ];
        rows.sort_by_key(|s| s.id);

        let started = Instant::now();
        let mut tx = self.store.begin().await?;
        let mut source: Option<Stock> = None;
        let mut destination: Option<Stock> = None;
        for row in &rows {
            let locked = tx
                .lock_stock_by_product_and_warehouse(row.product_id, row.warehouse_id)
                .await?;
            if locked.warehouse_id == transfer.from_warehouse_id {
                source = Some(locked);
            } else {
                destination = Some(locked);
            }
        }
        let (Some(source), Some(destination)) = (source, destination) else {
            return Err(InventoryError::NotFound(format!(
                "stock rows of transfer {id}"
            )));
        };

        let locked = tx.lock_transfer(id).await?;
        let Some(next) = transition(locked.status, event) else {
            tracing::warn!(%id, from = %locked.status, %event, "rejected transfer transition");
            return Err(InventoryError::InvalidRequest(format!(
                "cannot {event} a transfer in {}",
                locked.status
            )));
        };

        if event == TransferEvent::Begin {
            let reserved = tx.total_active_by_stock(source.id).await?;
            if source.quantity - reserved < locked.quantity {
                tracing::warn!(
                    %id,
                    unreserved = source.quantity - reserved,
                    requested = locked.quantity,
                    "not enough stock to begin transfer"
                );
                return Err(InventoryError::InvalidRequest(format!(
                    "stock {} has {} unreserved, transfer needs {}",
                    source.id,
                    source.quantity - reserved,
                    locked.quantity
                )));
            }
        }

        let (source_delta, destination_delta) = event.deltas(locked.quantity);
        if source_delta != 0 {
            let quantity = shifted(&source, source_delta)?;
            tx.update_quantity(source.id, quantity, source.version).await?;
        }
        if destination_delta != 0 {
            let quantity = shifted(&destination, destination_delta)?;
            tx.update_quantity(destination.id, quantity, destination.version)
                .await?;
        }

        let updated = tx.set_transfer_status(id, next, description).await?;
        if source_delta != 0 || destination_delta != 0 {
            publish_availability(&mut tx, self.publisher.as_ref(), locked.product_id).await?;
        }
        tx.commit().await?;

        record_transaction("transfer", started);
        metrics::counter!("transfer_transitions_total", "status" => next.as_str()).increment(1);
        tracing::info!(%id, from = %locked.status, to = %next, "transfer status changed");
        Ok(updated)
    }
}

/// Quantity of `stock` after applying `delta`, kept within what a row may hold.
fn shifted(stock: &Stock, delta: i64) -> Result<i64> {
    stock
        .quantity
        .checked_add(delta)
        .filter(|quantity| (0..=MAX_QUANTITY).contains(quantity))
        .ok_or_else(|| {
            InventoryError::InvalidRequest(format!(
                "moving {delta} would take stock {} outside 0..={MAX_QUANTITY}",
                stock.id
            ))
        })
}
