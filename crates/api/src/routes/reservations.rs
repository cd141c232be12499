//! Internal reservation endpoints called by the order service.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use stock_store::{OrderId, ProductId, Reservation, ReservationStatus, StockStore};

use super::{AppState, DataResponse};
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ReserveRequest {
    pub product_id: i64,
    pub quantity: i64,
    pub order_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateReservationStatusRequest {
    pub status: ReservationStatus,
}

/// POST /internal/reserved-stocks — reserve stock for an order.
#[tracing::instrument(skip(state, payload))]
pub async fn reserve<S: StockStore>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<ReserveRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DataResponse<Reservation>>), ApiError> {
    let Json(req) = payload?;
    let reservation = state
        .reservations
        .reserve(
            ProductId::new(req.product_id),
            req.quantity,
            OrderId::new(req.order_id),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(reservation))))
}

/// GET /internal/orders/:order_id/reserved-stocks
#[tracing::instrument(skip(state))]
pub async fn get_by_order<S: StockStore>(
    State(state): State<Arc<AppState<S>>>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<DataResponse<Reservation>>, ApiError> {
    let Path(order_id) = path?;
    let reservation = state
        .reservations
        .get_by_order(OrderId::new(order_id))
        .await?;
    Ok(Json(DataResponse::new(reservation)))
}

/// PATCH /internal/orders/:order_id/reserved-stocks/status — complete or
/// cancel an order's reservation.
#[tracing::instrument(skip(state, payload))]
pub async fn update_status<S: StockStore>(
    State(state): State<Arc<AppState<S>>>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateReservationStatusRequest>, JsonRejection>,
) -> Result<Json<DataResponse<Reservation>>, ApiError> {
    let Path(order_id) = path?;
    let Json(req) = payload?;
    let reservation = state
        .reservations
        .update_status(OrderId::new(order_id), req.status)
        .await?;
    Ok(Json(DataResponse::new(reservation)))
}
