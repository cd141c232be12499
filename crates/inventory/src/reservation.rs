//! Reservation ledger: placing holds for orders and settling them.

use std::sync::Arc;
use std::time::Instant;

use stock_store::{
    NewReservation, OrderId, ProductId, Reservation, ReservationStatus, StockLevel, StockStore,
    StoreTx,
};

use crate::error::{InventoryError, Result};
use crate::publisher::{AvailabilityPublisher, publish_availability};
use crate::{ensure_positive, ensure_within_limit, record_transaction};

/// Picks the first row of an active warehouse that can cover `quantity`.
///
/// `levels` must be in placement order (warehouse id, then stock id).
pub fn select_stock(levels: &[StockLevel], quantity: i64) -> Option<&StockLevel> {
    levels
        .iter()
        .find(|level| level.warehouse_active && level.available() >= quantity)
}

/// Service for reserving stock on behalf of orders.
pub struct ReservationService<S: StockStore> {
    store: S,
    publisher: Arc<dyn AvailabilityPublisher>,
}

impl<S: StockStore> ReservationService<S> {
    /// Creates a new reservation service.
    pub fn new(store: S, publisher: Arc<dyn AvailabilityPublisher>) -> Self {
        Self { store, publisher }
    }

    /// Reserves `quantity` of a product for an order.
    ///
    /// A candidate row is chosen without locks, then locked and re-checked.
    /// If the candidate no longer fits once locked, the call fails with
    /// insufficient stock without trying later warehouses.
    #[tracing::instrument(skip(self))]
    pub async fn reserve(
        &self,
        product_id: ProductId,
        quantity: i64,
        order_id: OrderId,
    ) -> Result<Reservation> {
        ensure_positive(product_id.as_i64(), "product_id")?;
        ensure_positive(order_id.as_i64(), "order_id")?;
        ensure_positive(quantity, "quantity")?;
        ensure_within_limit(quantity)?;

        let levels = self.store.stock_levels_by_product(product_id).await?;
        let Some(candidate) = select_stock(&levels, quantity) else {
            return Err(self.rejected(product_id, quantity));
        };

        let started = Instant::now();
        let mut tx = self.store.begin().await?;
        let stock = tx.lock_stock(candidate.stock.id).await?;
        let warehouse = tx.get_warehouse(stock.warehouse_id).await?;
        let reserved = tx.total_active_by_stock(stock.id).await?;
        if !warehouse.active || stock.quantity - reserved < quantity {
            return Err(self.rejected(product_id, quantity));
        }

        let reservation = tx
            .insert_reservation(NewReservation {
                stock_id: stock.id,
                order_id,
                quantity,
            })
            .await?;
        publish_availability(&mut tx, self.publisher.as_ref(), product_id).await?;
        tx.commit().await?;

        record_transaction("reserve", started);
        metrics::counter!("reservations_created_total").increment(1);
        tracing::info!(
            reservation_id = %reservation.id,
            stock_id = %stock.id,
            "stock reserved"
        );
        Ok(reservation)
    }

    pub async fn get_by_order(&self, order_id: OrderId) -> Result<Reservation> {
        Ok(self.store.reservation_by_order(order_id).await?)
    }

    /// Moves a reservation to `completed` or `cancelled`.
    ///
    /// Completing consumes the reserved quantity from the stock row;
    /// cancelling only releases the hold. Re-sending the current status is a
    /// no-op.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: OrderId,
        status: ReservationStatus,
    ) -> Result<Reservation> {
        let current = self.store.reservation_by_order(order_id).await?;
        if current.status == status {
            return Ok(current);
        }

        let started = Instant::now();
        let mut tx = self.store.begin().await?;
        let stock = tx.lock_stock(current.stock_id).await?;
        let reservation = tx.reservation_by_order(order_id).await?;
        if reservation.status == status {
            return Ok(reservation);
        }
        if reservation.status.is_terminal() || status == ReservationStatus::Active {
            tracing::warn!(%order_id, from = %reservation.status, to = %status, "rejected reservation transition");
            return Err(InventoryError::invalid(format!(
                "cannot move reservation from {} to {status}",
                reservation.status
            )));
        }

        if status == ReservationStatus::Completed {
            tx.update_quantity(stock.id, stock.quantity - reservation.quantity, stock.version)
                .await?;
        }
        let updated = tx.set_reservation_status(reservation.id, status).await?;
        publish_availability(&mut tx, self.publisher.as_ref(), stock.product_id).await?;
        tx.commit().await?;

        record_transaction("reservation_status", started);
        metrics::counter!("reservation_status_updates_total", "status" => status.as_str())
            .increment(1);
        tracing::info!(%order_id, %status, "reservation status updated");
        Ok(updated)
    }

    fn rejected(&self, product_id: ProductId, requested: i64) -> InventoryError {
        metrics::counter!("reservations_rejected_total").increment(1);
        tracing::warn!(%product_id, requested, "insufficient stock");
        InventoryError::InsufficientStock {
            product_id,
            requested,
        }
    }
}
