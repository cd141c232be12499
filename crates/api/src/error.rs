//! API error types with HTTP response mapping.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use inventory::{ErrorKind, InventoryError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// The request could not be parsed.
    BadRequest(String),
    /// Missing or wrong credentials.
    Unauthorized(String),
    /// Error raised by an inventory operation.
    Inventory(InventoryError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Inventory(err) => match err.kind() {
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::InvalidRequest | ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::VersionMismatch => StatusCode::CONFLICT,
                ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
                ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
                ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::BadRequest(msg) | ApiError::Unauthorized(msg) => msg,
            ApiError::Inventory(err) if status == StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!(error = %err, "internal server error");
                "internal server error".to_string()
            }
            ApiError::Inventory(err) => err.to_string(),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<InventoryError> for ApiError {
    fn from(err: InventoryError) -> Self {
        ApiError::Inventory(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use stock_store::{ProductId, StockId, Version};

    use super::*;

    fn status_of(err: InventoryError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn inventory_errors_map_to_status_codes() {
        assert_eq!(
            status_of(InventoryError::NotFound("stock 1".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(InventoryError::InsufficientStock {
                product_id: ProductId::new(1),
                requested: 3,
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(InventoryError::VersionMismatch {
                stock_id: StockId::new(1),
                expected: Version::new(2),
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(InventoryError::Unauthorized("shop".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(InventoryError::Unavailable("lock".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let err = InventoryError::Publish(inventory::PublishError::Broker("down".into()));
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "internal server error");
    }
}
