use serde::{Deserialize, Serialize};

use crate::{ProductId, TransferStatus, WarehouseId};

/// Default page size for every listing.
pub const DEFAULT_LIMIT: u32 = 10;

/// Sort direction of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub(crate) fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    pub(crate) fn apply(&self, ordering: std::cmp::Ordering) -> std::cmp::Ordering {
        match self {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

/// Page number and page size, clamped to a listing's bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    /// Creates a pagination with `page >= 1` and `1 <= limit <= max_limit`.
    pub fn new(page: u32, limit: u32, max_limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, max_limit),
        }
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// One page of a listing plus the total number of matching rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

impl<T> Page<T> {
    pub(crate) fn new(items: Vec<T>, total: u64, pagination: Pagination) -> Self {
        Self {
            items,
            total,
            page: pagination.page,
            limit: pagination.limit,
        }
    }

    /// Slices an already filtered and sorted collection.
    pub(crate) fn from_sorted(all: Vec<T>, pagination: Pagination) -> Self {
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(pagination.offset() as usize)
            .take(pagination.limit as usize)
            .collect();
        Self::new(items, total, pagination)
    }

    /// Number of pages needed to show every matching row.
    pub fn total_pages(&self) -> u64 {
        self.total.div_ceil(u64::from(self.limit.max(1)))
    }
}

/// Sort column of a warehouse listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarehouseSort {
    Id,
    Name,
    #[default]
    CreatedAt,
}

impl WarehouseSort {
    pub(crate) fn column(&self) -> &'static str {
        match self {
            WarehouseSort::Id => "id",
            WarehouseSort::Name => "name",
            WarehouseSort::CreatedAt => "created_at",
        }
    }
}

/// Filters and ordering for listing a shop's warehouses.
#[derive(Debug, Clone, Default)]
pub struct WarehouseQuery {
    /// Filter by the active flag.
    pub active: Option<bool>,
    pub sort_by: WarehouseSort,
    pub sort_order: SortOrder,
    pub pagination: Pagination,
}

impl WarehouseQuery {
    pub const MAX_LIMIT: u32 = 100;

    /// Creates a query with default ordering (`created_at desc`).
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters by the active flag.
    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    /// Sets the sort column and direction.
    pub fn sort(mut self, by: WarehouseSort, order: SortOrder) -> Self {
        self.sort_by = by;
        self.sort_order = order;
        self
    }

    /// Sets the page and page size.
    pub fn paginate(mut self, page: u32, limit: u32) -> Self {
        self.pagination = Pagination::new(page, limit, Self::MAX_LIMIT);
        self
    }
}

/// Sort column of a stock listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockSort {
    Id,
    ProductId,
    Quantity,
    #[default]
    CreatedAt,
}

impl StockSort {
    pub(crate) fn column(&self) -> &'static str {
        match self {
            StockSort::Id => "s.id",
            StockSort::ProductId => "s.product_id",
            StockSort::Quantity => "s.quantity",
            StockSort::CreatedAt => "s.created_at",
        }
    }
}

/// Filters and ordering for listing a shop's stock rows in active warehouses.
#[derive(Debug, Clone, Default)]
pub struct StockQuery {
    pub product_id: Option<ProductId>,
    pub warehouse_id: Option<WarehouseId>,
    pub sort_by: StockSort,
    pub sort_order: SortOrder,
    pub pagination: Pagination,
}

impl StockQuery {
    pub const MAX_LIMIT: u32 = 100;

    pub fn new() -> Self {
        Self::default()
    }

    /// Filters by product.
    pub fn product(mut self, product_id: ProductId) -> Self {
        self.product_id = Some(product_id);
        self
    }

    /// Filters by warehouse.
    pub fn warehouse(mut self, warehouse_id: WarehouseId) -> Self {
        self.warehouse_id = Some(warehouse_id);
        self
    }

    pub fn sort(mut self, by: StockSort, order: SortOrder) -> Self {
        self.sort_by = by;
        self.sort_order = order;
        self
    }

    pub fn paginate(mut self, page: u32, limit: u32) -> Self {
        self.pagination = Pagination::new(page, limit, Self::MAX_LIMIT);
        self
    }
}

/// Sort column of a transfer listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferSort {
    Id,
    #[default]
    CreatedAt,
}

impl TransferSort {
    pub(crate) fn column(&self) -> &'static str {
        match self {
            TransferSort::Id => "t.id",
            TransferSort::CreatedAt => "t.created_at",
        }
    }
}

/// Filters and ordering for listing transfers out of a shop's warehouses.
#[derive(Debug, Clone, Default)]
pub struct TransferQuery {
    pub status: Option<TransferStatus>,
    pub sort_by: TransferSort,
    pub sort_order: SortOrder,
    pub pagination: Pagination,
}

impl TransferQuery {
    pub const MAX_LIMIT: u32 = 20;

    pub fn new() -> Self {
        Self::default()
    }

    /// Filters by status.
    pub fn status(mut self, status: TransferStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn sort(mut self, by: TransferSort, order: SortOrder) -> Self {
        self.sort_by = by;
        self.sort_order = order;
        self
    }

    pub fn paginate(mut self, page: u32, limit: u32) -> Self {
        self.pagination = Pagination::new(page, limit, Self::MAX_LIMIT);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_clamps_bounds() {
        let p = Pagination::new(0, 500, TransferQuery::MAX_LIMIT);
        assert_eq!(p.page, 1);
        assert_eq!(p.limit, 20);

        let p = Pagination::new(3, 0, StockQuery::MAX_LIMIT);
        assert_eq!(p.limit, 1);
        assert_eq!(p.offset(), 2);
    }

    #[test]
    fn default_query_sorts_newest_first() {
        let q = TransferQuery::new();
        assert_eq!(q.sort_by, TransferSort::CreatedAt);
        assert_eq!(q.sort_order, SortOrder::Desc);
        assert_eq!(q.pagination.limit, DEFAULT_LIMIT);
    }

    #[test]
    fn page_slices_and_counts_pages() {
        let pagination = Pagination::new(2, 3, 100);
        let page = Page::from_sorted((1..=7).collect::<Vec<_>>(), pagination);
        assert_eq!(page.items, vec![4, 5, 6]);
        assert_eq!(page.total, 7);
        assert_eq!(page.total_pages(), 3);
    }

    #[test]
    fn sort_order_reverses_ordering() {
        use std::cmp::Ordering;
        assert_eq!(SortOrder::Asc.apply(Ordering::Less), Ordering::Less);
        assert_eq!(SortOrder::Desc.apply(Ordering::Less), Ordering::Greater);
    }
}
