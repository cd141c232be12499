//! HTTP API server for the stock reservation engine.
//!
//! Tenant routes act for the shop named in `X-Shop-Id`. Routes under
//! `/internal` are called by other services and require `X-Internal-Auth`;
//! routes under `/admin` require `X-Warehouse-Admin-Auth`.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::Request;
use axum::middleware;
use axum::routing::{get, patch, post};
use metrics_exporter_prometheus::PrometheusHandle;
use stock_store::StockStore;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;

use auth::AuthTokens;
use routes::AppState;

/// Assigns a random UUID to requests that arrive without `x-request-id`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = uuid::Uuid::new_v4().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: StockStore>(
    state: Arc<AppState<S>>,
    tokens: AuthTokens,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    let tenant = Router::new()
        .route("/warehouses", post(routes::warehouses::create::<S>))
        .route(
            "/shops/{shop_id}/warehouses",
            get(routes::warehouses::list_by_shop::<S>),
        )
        .route(
            "/warehouses/{id}/status",
            patch(routes::warehouses::set_status::<S>),
        )
        .route("/stocks", get(routes::stocks::list::<S>))
        .route("/stocks/{id}", patch(routes::stocks::update_quantity::<S>))
        .route(
            "/stock-transfers",
            post(routes::transfers::create::<S>).get(routes::transfers::list::<S>),
        )
        .route("/stock-transfers/{id}", get(routes::transfers::get::<S>));

    let internal = Router::new()
        .route("/stocks", post(routes::stocks::init::<S>))
        .route(
            "/products/{product_id}/stocks",
            get(routes::stocks::levels::<S>),
        )
        .route(
            "/products/{product_id}/availability",
            get(routes::stocks::availability::<S>),
        )
        .route(
            "/products/availability",
            post(routes::stocks::availabilities::<S>),
        )
        .route("/reserved-stocks", post(routes::reservations::reserve::<S>))
        .route(
            "/orders/{order_id}/reserved-stocks",
            get(routes::reservations::get_by_order::<S>),
        )
        .route(
            "/orders/{order_id}/reserved-stocks/status",
            patch(routes::reservations::update_status::<S>),
        )
        .route_layer(middleware::from_fn_with_state(
            tokens.clone(),
            auth::require_internal,
        ));

    let admin = Router::new()
        .route(
            "/stock-transfers/{id}",
            patch(routes::transfers::update_status::<S>),
        )
        .route_layer(middleware::from_fn_with_state(tokens, auth::require_admin));

    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
        let request_id = request
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");
        tracing::info_span!(
            "http_request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    });

    Router::new()
        .route("/health", get(routes::health::check))
        .merge(tenant)
        .nest("/internal", internal)
        .nest("/admin", admin)
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(trace)
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
}

/// Creates the application state over a store and an availability sink.
pub fn create_state<S: StockStore>(
    store: S,
    publisher: Arc<dyn inventory::AvailabilityPublisher>,
) -> Arc<AppState<S>> {
    Arc::new(AppState::new(store, publisher))
}
