//! Principal extraction.
//!
//! Identity is an external collaborator: the platform's gateway
//! authenticates the caller and forwards the resolved principal in trusted
//! headers. This module turns those headers into a request extension and an
//! extractor; it never issues or validates credentials itself.

use axum::{
    extract::{FromRequestParts, Request},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::model::ApiError;

pub const HEADER_USER_ID: &str = "X-User-Id";
pub const HEADER_COMPANY_ID: &str = "X-Company-Id";
pub const HEADER_ROLE: &str = "X-Role";

/// The authenticated caller, as resolved by the identity layer.
#[derive(Debug, Clone)]
pub struct AuthPrincipal {
    pub user_id: String,
    pub company_id: Option<String>,
    pub role: String,
}

fn unauthorized(message: &str) -> Response {
    let error = ApiError {
        error: "UNAUTHORIZED".to_string(),
        message: message.to_string(),
        details: None,
    };
    (StatusCode::UNAUTHORIZED, Json(error)).into_response()
}

fn header_value(req: &Request, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .filter(|v| !v.is_empty())
}

/// Middleware: lift the gateway's principal headers into an
/// [`AuthPrincipal`] extension, rejecting requests with no identity.
pub async fn gateway_auth(mut req: Request, next: Next) -> Response {
    let Some(user_id) = header_value(&req, HEADER_USER_ID) else {
        return unauthorized("Missing authenticated principal");
    };

    let principal = AuthPrincipal {
        user_id,
        company_id: header_value(&req, HEADER_COMPANY_ID),
        role: header_value(&req, HEADER_ROLE).unwrap_or_else(|| "user".to_string()),
    };

    req.extensions_mut().insert(principal);
    next.run(req).await
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthPrincipal
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthPrincipal>()
            .cloned()
            .ok_or_else(|| unauthorized("Missing authenticated principal"))
    }
}
