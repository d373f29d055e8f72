//! Authentication middleware.

use axum::{
    body::Body,
    extract::State,
    http::{Request, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::api::extractors::CurrentUser;
use crate::api::state::AppState;
use crate::error::AppError;

/// Extract bearer token from Authorization header.
fn extract_bearer_token(req: &Request<Body>) -> Option<&str> {
    let auth_header = req.headers().get(AUTHORIZATION)?.to_str().ok()?;

    auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Middleware that requires a valid bearer token.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = extract_bearer_token(&req) else {
        return AppError::Unauthorized("Missing or invalid Authorization header.".to_string())
            .into_response();
    };

    let user = match state
        .services()
        .tokens()
        .verify(token)
        .and_then(CurrentUser::try_from)
    {
        Ok(user) => user,
        Err(err) => {
            tracing::debug!(error = %err, "Bearer token rejected");
            return err.into_response();
        }
    };

    // Add caller to request extensions
    req.extensions_mut().insert(user);

    next.run(req).await
}
