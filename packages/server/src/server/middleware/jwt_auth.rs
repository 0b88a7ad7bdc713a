use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::debug;

use crate::common::UserId;
use crate::domains::auth::JwtService;

/// Authenticated caller, taken from a verified bearer token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: UserId,
}

/// JWT authentication middleware
///
/// Verifies the bearer token when present and stores the [`AuthUser`] in the
/// request extensions. Requests without a valid token continue anonymously;
/// handlers that need a caller reject them through the extractor.
pub async fn jwt_auth_middleware(
    jwt_service: Arc<JwtService>,
    mut request: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    match extract_auth_user(request.headers(), &jwt_service) {
        Some(user) => {
            debug!(user_id = %user.user_id, "authenticated request");
            request.extensions_mut().insert(user);
        }
        None => debug!("no valid authentication token"),
    }

    next.run(request).await
}

/// Reads `Authorization: Bearer <token>` (or a bare token) and verifies it.
pub fn extract_auth_user(
    headers: &axum::http::HeaderMap,
    jwt_service: &JwtService,
) -> Option<AuthUser> {
    let auth_str = headers.get("authorization")?.to_str().ok()?;
    let token = auth_str.strip_prefix("Bearer ").unwrap_or(auth_str);

    let claims = jwt_service.verify_token(token).ok()?;
    Some(AuthUser {
        user_id: claims.user_id(),
    })
}

/// Returned when a protected route is hit without a valid token.
#[derive(Debug)]
pub struct Unauthenticated;

impl IntoResponse for Unauthenticated {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "unauthenticated",
                "error_description": "A valid bearer token is required.",
            })),
        )
            .into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Unauthenticated;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .copied()
            .ok_or(Unauthenticated)
    }
}
