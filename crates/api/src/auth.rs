//! Request authentication: the tenant header and the shared-secret headers
//! guarding the internal and admin routes.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use stock_store::ShopId;

use crate::error::ApiError;

/// Header carrying the caller's shop, set by the upstream gateway.
pub const SHOP_ID_HEADER: &str = "x-shop-id";
/// Header carrying the secret of service-to-service calls.
pub const INTERNAL_AUTH_HEADER: &str = "x-internal-auth";
/// Header carrying the secret of warehouse administrators.
pub const ADMIN_AUTH_HEADER: &str = "x-warehouse-admin-auth";

/// The shop a tenant request acts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tenant(pub ShopId);

impl<S: Send + Sync> FromRequestParts<S> for Tenant {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let shop_id = parts
            .headers
            .get(SHOP_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok())
            .map(ShopId::new)
            .filter(ShopId::is_valid)
            .ok_or_else(|| ApiError::Unauthorized("missing or invalid shop id".into()))?;
        Ok(Tenant(shop_id))
    }
}

/// Secrets expected on the internal and admin route groups.
#[derive(Debug, Clone)]
pub struct AuthTokens {
    pub internal: String,
    pub admin: String,
}

/// Rejects internal requests without the internal secret.
pub async fn require_internal(
    State(tokens): State<AuthTokens>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    check_header(&request, INTERNAL_AUTH_HEADER, &tokens.internal)?;
    Ok(next.run(request).await)
}

/// Rejects admin requests without the admin secret.
pub async fn require_admin(
    State(tokens): State<AuthTokens>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    check_header(&request, ADMIN_AUTH_HEADER, &tokens.admin)?;
    Ok(next.run(request).await)
}

fn check_header(request: &Request, header: &str, expected: &str) -> Result<(), ApiError> {
    let provided = request
        .headers()
        .get(header)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if provided.is_empty() || provided != expected {
        tracing::warn!(header, uri = %request.uri(), "rejected unauthenticated request");
        return Err(ApiError::Unauthorized("unauthorized".into()));
    }
    Ok(())
}
