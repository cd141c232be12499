use serde::{Deserialize, Serialize};

/// Declares an integer-backed identifier newtype.
///
/// Every row in the inventory schema is keyed by a 64-bit integer. Wrapping
/// each kind of key in its own type keeps a `StockId` from being passed where
/// a `WarehouseId` is expected.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Creates an identifier from a raw value.
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the raw value.
            pub const fn as_i64(&self) -> i64 {
                self.0
            }

            /// Returns true if the identifier is a valid (positive) key.
            pub const fn is_valid(&self) -> bool {
                self.0 > 0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(
    /// Identifier of a shop, the tenant that owns warehouses.
    ShopId
);
define_id!(
    /// Identifier of a warehouse.
    WarehouseId
);
define_id!(
    /// Identifier of a product. Products are owned by another service.
    ProductId
);
define_id!(
    /// Identifier of a stock row (one per product and warehouse).
    StockId
);
define_id!(
    /// Identifier of a reservation record.
    ReservationId
);
define_id!(
    /// Identifier of a stock transfer.
    TransferId
);
define_id!(
    /// Identifier of an order. Orders are owned by another service.
    OrderId
);
