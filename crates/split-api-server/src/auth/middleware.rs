use axum::{
    extract::Request,
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::auth::jwt::JwtManager;
use crate::utils::error::ApiError;

/// The authenticated principal for owner-facing routes.
#[derive(Debug, Clone, Copy)]
pub struct AuthOwner(pub Uuid);

/// Owner gate - resolves the bearer token into an [`AuthOwner`] extension or
/// answers 401.
pub async fn require_owner(mut request: Request, next: Next) -> Result<Response, ApiError> {
    let jwt_manager = request
        .extensions()
        .get::<Arc<JwtManager>>()
        .ok_or_else(|| ApiError::Internal("JWT manager not configured".to_string()))?
        .clone();

    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;

    let claims = jwt_manager
        .validate_token(token)
        .map_err(|e| {
            debug!("Token validation failed: {}", e);
            ApiError::Unauthorized("invalid or expired token".to_string())
        })?;

    let owner_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| ApiError::Unauthorized("malformed token subject".to_string()))?;

    request.extensions_mut().insert(AuthOwner(owner_id));

    Ok(next.run(request).await)
}
