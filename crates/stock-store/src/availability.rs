//! Availability arithmetic.
//!
//! Available quantity is always derived from on-hand quantity and active
//! reservations; it is never stored.

use serde::{Deserialize, Serialize};

use crate::{ProductId, Result, StockLevel, StoreError};

/// Largest on-hand quantity a single stock row may hold.
pub const MAX_QUANTITY: i64 = 1_000_000_000;

/// Returns the unreserved part of `quantity`, clamped at zero.
pub fn available(quantity: i64, reserved: i64) -> i64 {
    (quantity - reserved).max(0)
}

/// Availability of one product summed over its active warehouses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub product_id: ProductId,
    pub quantity: i64,
    pub reserved: i64,
    pub available: i64,
}

impl Availability {
    /// Availability of a product with no stock in any active warehouse.
    pub fn empty(product_id: ProductId) -> Self {
        Self {
            product_id,
            quantity: 0,
            reserved: 0,
            available: 0,
        }
    }

    /// Builds availability from summed totals.
    pub fn from_totals(product_id: ProductId, quantity: i64, reserved: i64) -> Self {
        Self {
            product_id,
            quantity,
            reserved,
            available: available(quantity, reserved),
        }
    }

    /// Aggregates stock levels of one product, skipping inactive warehouses.
    ///
    /// Totals that do not fit in an `i64` are reported as
    /// [`StoreError::QuantityOverflow`].
    pub fn aggregate<'a>(
        product_id: ProductId,
        levels: impl IntoIterator<Item = &'a StockLevel>,
    ) -> Result<Self> {
        let (quantity, reserved) = levels
            .into_iter()
            .filter(|level| level.warehouse_active && level.stock.product_id == product_id)
            .try_fold((0i64, 0i64), |(q, r), level| {
                Some((
                    q.checked_add(level.stock.quantity)?,
                    r.checked_add(level.reserved)?,
                ))
            })
            .ok_or(StoreError::QuantityOverflow { product_id })?;
        Ok(Self::from_totals(product_id, quantity, reserved))
    }
}
