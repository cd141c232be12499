//! Warehouse endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use stock_store::{
    ShopId, SortOrder, StockStore, Warehouse, WarehouseId, WarehouseQuery, WarehouseSort,
};

use super::{AppState, DataResponse, ListResponse, page_and_limit};
use crate::auth::Tenant;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CreateWarehouseRequest {
    pub name: String,
    pub location: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub active: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListWarehousesParams {
    pub active: Option<bool>,
    pub sort_by: Option<WarehouseSort>,
    pub sort_order: Option<SortOrder>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ListWarehousesParams {
    fn into_query(self) -> WarehouseQuery {
        let (page, limit) = page_and_limit(self.page, self.limit);
        let mut query = WarehouseQuery::new()
            .sort(
                self.sort_by.unwrap_or_default(),
                self.sort_order.unwrap_or_default(),
            )
            .paginate(page, limit);
        if let Some(active) = self.active {
            query = query.active(active);
        }
        query
    }
}

/// POST /warehouses — create a warehouse for the caller's shop.
#[tracing::instrument(skip(state, payload))]
pub async fn create<S: StockStore>(
    State(state): State<Arc<AppState<S>>>,
    Tenant(shop_id): Tenant,
    payload: Result<Json<CreateWarehouseRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DataResponse<Warehouse>>), ApiError> {
    let Json(req) = payload?;
    let warehouse = state
        .warehouses
        .create(shop_id, &req.name, &req.location)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(warehouse))))
}

/// GET /shops/:shop_id/warehouses — list a shop's warehouses.
#[tracing::instrument(skip(state, _tenant, params))]
pub async fn list_by_shop<S: StockStore>(
    State(state): State<Arc<AppState<S>>>,
    _tenant: Tenant,
    path: Result<Path<i64>, PathRejection>,
    params: Result<Query<ListWarehousesParams>, QueryRejection>,
) -> Result<Json<ListResponse<Warehouse>>, ApiError> {
    let Path(shop_id) = path?;
    let shop_id = ShopId::new(shop_id);
    if !shop_id.is_valid() {
        return Err(ApiError::BadRequest(format!("invalid shop id {shop_id}")));
    }
    let Query(params) = params?;

    let page = state
        .warehouses
        .list(shop_id, &params.into_query())
        .await?;
    Ok(Json(page.into()))
}

/// PATCH /warehouses/:id/status — activate or deactivate a warehouse.
#[tracing::instrument(skip(state, payload))]
pub async fn set_status<S: StockStore>(
    State(state): State<Arc<AppState<S>>>,
    Tenant(shop_id): Tenant,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<DataResponse<Warehouse>>, ApiError> {
    let Path(id) = path?;
    let Json(req) = payload?;
    let warehouse = state
        .warehouses
        .set_active(WarehouseId::new(id), shop_id, req.active)
        .await?;
    Ok(Json(DataResponse::new(warehouse)))
}
