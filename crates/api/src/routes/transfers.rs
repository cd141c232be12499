//! Stock transfer endpoints. Transitions are restricted to warehouse admins.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use stock_store::{
    NewTransfer, ProductId, SortOrder, StockStore, StockTransfer, TransferId, TransferQuery,
    TransferSort, TransferStatus, WarehouseId,
};

use super::{AppState, DataResponse, ListResponse, page_and_limit};
use crate::auth::Tenant;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CreateTransferRequest {
    pub product_id: i64,
    pub from_warehouse_id: i64,
    pub to_warehouse_id: i64,
    pub quantity: i64,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTransferStatusRequest {
    pub status: TransferStatus,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListTransfersParams {
    pub status: Option<TransferStatus>,
    pub sort_by: Option<TransferSort>,
    pub sort_order: Option<SortOrder>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ListTransfersParams {
    fn into_query(self) -> TransferQuery {
        let (page, limit) = page_and_limit(self.page, self.limit);
        let mut query = TransferQuery::new()
            .sort(
                self.sort_by.unwrap_or_default(),
                self.sort_order.unwrap_or_default(),
            )
            .paginate(page, limit);
        if let Some(status) = self.status {
            query = query.status(status);
        }
        query
    }
}

/// POST /stock-transfers — request a transfer between two of the caller's
/// warehouses.
#[tracing::instrument(skip(state, payload))]
pub async fn create<S: StockStore>(
    State(state): State<Arc<AppState<S>>>,
    Tenant(shop_id): Tenant,
    payload: Result<Json<CreateTransferRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DataResponse<StockTransfer>>), ApiError> {
    let Json(req) = payload?;
    let transfer = state
        .transfers
        .create(
            shop_id,
            NewTransfer {
                product_id: ProductId::new(req.product_id),
                from_warehouse_id: WarehouseId::new(req.from_warehouse_id),
                to_warehouse_id: WarehouseId::new(req.to_warehouse_id),
                quantity: req.quantity,
                description: req.description,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(transfer))))
}

/// GET /stock-transfers — list transfers out of the caller's warehouses.
#[tracing::instrument(skip(state, params))]
pub async fn list<S: StockStore>(
    State(state): State<Arc<AppState<S>>>,
    Tenant(shop_id): Tenant,
    params: Result<Query<ListTransfersParams>, QueryRejection>,
) -> Result<Json<ListResponse<StockTransfer>>, ApiError> {
    let Query(params) = params?;
    let page = state
        .transfers
        .list(shop_id, &params.into_query())
        .await?;
    Ok(Json(page.into()))
}

/// GET /stock-transfers/:id
#[tracing::instrument(skip(state))]
pub async fn get<S: StockStore>(
    State(state): State<Arc<AppState<S>>>,
    Tenant(shop_id): Tenant,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<DataResponse<StockTransfer>>, ApiError> {
    let Path(id) = path?;
    let transfer = state
        .transfers
        .get(TransferId::new(id), Some(shop_id))
        .await?;
    Ok(Json(DataResponse::new(transfer)))
}

/// PATCH /admin/stock-transfers/:id — move a transfer to a new status.
#[tracing::instrument(skip(state, payload))]
pub async fn update_status<S: StockStore>(
    State(state): State<Arc<AppState<S>>>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateTransferStatusRequest>, JsonRejection>,
) -> Result<Json<DataResponse<StockTransfer>>, ApiError> {
    let Path(id) = path?;
    let Json(req) = payload?;
    let transfer = state
        .transfers
        .apply(TransferId::new(id), req.status, req.description)
        .await?;
    Ok(Json(DataResponse::new(transfer)))
}
