//! Health check handlers.

use axum::{
    extract::State,
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};

use crate::api::state::AppState;
use crate::domain::{ApiResponse, ErrorModel, HealthResponse, ReadyComponents, ReadyResponse};
use crate::error::{AppError, ErrorCode, ErrorReport};

/// Liveness probe - always returns 200 if the service is running.
pub async fn health() -> ApiResponse<HealthResponse> {
    ApiResponse::ok(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness probe - checks if the service can serve requests.
pub async fn ready(State(state): State<AppState>) -> Response {
    let storage = state.services().storage();
    let backend = storage.backend_name().to_string();

    match storage.health_check().await {
        Ok(()) => ApiResponse::ok(ReadyResponse {
            ready: true,
            components: ReadyComponents {
                storage: true,
                backend,
            },
        })
        .into_response(),
        Err(err) => ErrorReport {
            status: StatusCode::SERVICE_UNAVAILABLE,
            code: ErrorCode::DatabaseError,
            message: "Service unavailable".to_string(),
            details: ErrorModel::new("StorageError", format!("{backend} is not reachable"))
                .with_inner(err.to_string()),
        }
        .into_response(),
    }
}

/// Prometheus metrics endpoint.
pub async fn metrics(State(state): State<AppState>) -> Result<Response, AppError> {
    let Some(handle) = state.metrics.as_ref() else {
        return Err(AppError::NotFound("Metrics are disabled.".to_string()));
    };

    Ok((
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    )
        .into_response())
}
