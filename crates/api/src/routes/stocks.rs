//! Stock endpoints: tenant listing and adjustment, internal initialisation
//! and availability reads.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use stock_store::{
    Availability, ProductId, ShopId, SortOrder, Stock, StockId, StockLevel, StockQuery, StockSort,
    StockStore, Version, WarehouseId,
};

use super::{AppState, DataResponse, ListResponse, page_and_limit};
use crate::auth::Tenant;
use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct ListStocksParams {
    pub product_id: Option<i64>,
    pub warehouse_id: Option<i64>,
    pub sort_by: Option<StockSort>,
    pub sort_order: Option<SortOrder>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ListStocksParams {
    fn into_query(self) -> StockQuery {
        let (page, limit) = page_and_limit(self.page, self.limit);
        let mut query = StockQuery::new()
            .sort(
                self.sort_by.unwrap_or_default(),
                self.sort_order.unwrap_or_default(),
            )
            .paginate(page, limit);
        if let Some(product_id) = self.product_id {
            query = query.product(ProductId::new(product_id));
        }
        if let Some(warehouse_id) = self.warehouse_id {
            query = query.warehouse(WarehouseId::new(warehouse_id));
        }
        query
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i64,
    /// Version the caller last saw; the update fails if the row moved on.
    pub version: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct InitStockRequest {
    pub shop_id: i64,
    pub product_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityRequest {
    pub product_ids: Vec<i64>,
}

/// GET /stocks — list the caller's stock rows in active warehouses.
#[tracing::instrument(skip(state, params))]
pub async fn list<S: StockStore>(
    State(state): State<Arc<AppState<S>>>,
    Tenant(shop_id): Tenant,
    params: Result<Query<ListStocksParams>, QueryRejection>,
) -> Result<Json<ListResponse<Stock>>, ApiError> {
    let Query(params) = params?;
    let page = state
        .stocks
        .list_stocks(shop_id, &params.into_query())
        .await?;
    Ok(Json(page.into()))
}

/// PATCH /stocks/:id — set the on-hand quantity of a stock row.
#[tracing::instrument(skip(state, payload))]
pub async fn update_quantity<S: StockStore>(
    State(state): State<Arc<AppState<S>>>,
    Tenant(shop_id): Tenant,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateQuantityRequest>, JsonRejection>,
) -> Result<Json<DataResponse<Stock>>, ApiError> {
    let Path(id) = path?;
    let Json(req) = payload?;
    let stock = state
        .stocks
        .update_quantity(
            StockId::new(id),
            shop_id,
            req.quantity,
            req.version.map(Version::new),
        )
        .await?;
    Ok(Json(DataResponse::new(stock)))
}

/// POST /internal/stocks — create empty rows for a product in every active
/// warehouse of a shop.
#[tracing::instrument(skip(state, payload))]
pub async fn init<S: StockStore>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<InitStockRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DataResponse<Vec<Stock>>>), ApiError> {
    let Json(req) = payload?;
    let stocks = state
        .stocks
        .init_stock(ShopId::new(req.shop_id), ProductId::new(req.product_id))
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(stocks))))
}

/// GET /internal/products/:product_id/stocks — every row of a product with
/// its reserved total.
#[tracing::instrument(skip(state))]
pub async fn levels<S: StockStore>(
    State(state): State<Arc<AppState<S>>>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<DataResponse<Vec<StockLevel>>>, ApiError> {
    let Path(product_id) = path?;
    let levels = state
        .stocks
        .stock_levels(ProductId::new(product_id))
        .await?;
    Ok(Json(DataResponse::new(levels)))
}

/// GET /internal/products/:product_id/availability
#[tracing::instrument(skip(state))]
pub async fn availability<S: StockStore>(
    State(state): State<Arc<AppState<S>>>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<DataResponse<Availability>>, ApiError> {
    let Path(product_id) = path?;
    let availability = state
        .stocks
        .availability(ProductId::new(product_id))
        .await?;
    Ok(Json(DataResponse::new(availability)))
}

/// POST /internal/products/availability — availability of several products,
/// in request order. Products without stock report zeros.
#[tracing::instrument(skip(state, payload))]
pub async fn availabilities<S: StockStore>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<AvailabilityRequest>, JsonRejection>,
) -> Result<Json<DataResponse<Vec<Availability>>>, ApiError> {
    let Json(req) = payload?;
    let ids: Vec<ProductId> = req.product_ids.into_iter().map(ProductId::new).collect();
    let found = state.stocks.availabilities(&ids).await?;
    let data = ids
        .iter()
        .map(|id| {
            found
                .get(id)
                .copied()
                .unwrap_or_else(|| Availability::empty(*id))
        })
        .collect();
    Ok(Json(DataResponse::new(data)))
}
