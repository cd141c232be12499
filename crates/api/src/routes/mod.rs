//! HTTP handlers and the shared state they run against.

pub mod health;
pub mod metrics;
pub mod reservations;
pub mod stocks;
pub mod transfers;
pub mod warehouses;

use std::sync::Arc;

use inventory::{AvailabilityPublisher, ReservationService, StockService, WarehouseService};
use serde::Serialize;
use stock_store::{DEFAULT_LIMIT, Page, StockStore};
use transfer::TransferOrchestrator;

/// Shared application state accessible from all handlers.
pub struct AppState<S: StockStore> {
    pub warehouses: WarehouseService<S>,
    pub stocks: StockService<S>,
    pub reservations: ReservationService<S>,
    pub transfers: TransferOrchestrator<S>,
}

impl<S: StockStore> AppState<S> {
    /// Builds every service over one store and one availability sink.
    pub fn new(store: S, publisher: Arc<dyn AvailabilityPublisher>) -> Self {
        Self {
            warehouses: WarehouseService::new(store.clone(), publisher.clone()),
            stocks: StockService::new(store.clone(), publisher.clone()),
            reservations: ReservationService::new(store.clone(), publisher.clone()),
            transfers: TransferOrchestrator::new(store, publisher),
        }
    }
}

/// Body of a successful single-item response.
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Paging metadata of a listing.
#[derive(Debug, Serialize)]
pub struct PageMeta {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

/// Body of a paginated listing.
#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

impl<T> From<Page<T>> for ListResponse<T> {
    fn from(page: Page<T>) -> Self {
        let meta = PageMeta {
            total: page.total,
            page: page.page,
            limit: page.limit,
            total_pages: page.total_pages(),
        };
        Self {
            data: page.items,
            meta,
        }
    }
}

/// Page and limit from a query string, before clamping.
pub(crate) fn page_and_limit(page: Option<u32>, limit: Option<u32>) -> (u32, u32) {
    (page.unwrap_or(1), limit.unwrap_or(DEFAULT_LIMIT))
}
