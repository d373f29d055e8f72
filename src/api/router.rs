//! Router setup and configuration.

use std::any::Any;

use axum::{
    Router,
    http::{HeaderName, Request},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::api::handlers::{auth, courses, enrollments, health, users};
use crate::api::middleware::{REQUEST_ID_HEADER, normalize_errors, require_auth};
use crate::api::state::AppState;
use crate::error::AppError;

/// Generates a UUID v4 request id when the client sent none.
#[derive(Clone, Copy, Default)]
struct XRequestId;

impl MakeRequestId for XRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        Uuid::new_v4().to_string().parse().ok().map(RequestId::new)
    }
}

/// Render a handler panic as a 500 envelope.
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(detail, "Handler panicked");

    AppError::Internal("An unexpected error occurred.".to_string()).into_response()
}

async fn not_found() -> AppError {
    AppError::NotFound("The requested resource was not found.".to_string())
}

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    // Health and metrics routes (no auth required)
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/metrics", get(health::metrics));

    let auth_routes = Router::new().route("/login", post(auth::login));

    // Resource routes (bearer token required)
    let resource_routes = Router::new()
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/paged", get(users::page_users))
        .route(
            "/users/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route(
            "/courses",
            get(courses::list_courses).post(courses::create_course),
        )
        .route("/courses/paged", get(courses::page_courses))
        .route(
            "/courses/{id}",
            get(courses::get_course)
                .put(courses::update_course)
                .delete(courses::delete_course),
        )
        .route(
            "/enrollment",
            get(enrollments::list_enrollments).post(enrollments::create_enrollment),
        )
        .route("/enrollment/paged", get(enrollments::page_enrollments))
        .route(
            "/enrollment/{id}",
            get(enrollments::get_enrollment)
                .put(enrollments::update_enrollment)
                .delete(enrollments::delete_enrollment),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .merge(resource_routes);

    // Layers run bottom-up on the way in: the request id exists before
    // tracing and error rendering see the request.
    Router::new()
        .merge(health_routes)
        .nest("/api", api_routes)
        .fallback(not_found)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            normalize_errors,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(SetRequestIdLayer::new(request_id, XRequestId))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::StatusCode;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::config::AppConfig;
    use crate::domain::{ApiResponse, Outcome};
    use crate::error::{ErrorCode, Result};
    use crate::pipeline::{Normalized, wrap_response};
    use crate::service::test_support::services;

    async fn call(uri: &str, request_id: Option<&str>) -> (StatusCode, Option<String>, Value) {
        let (services, _temp) = services();
        let router = create_router(AppState::new(Arc::new(AppConfig::default()), services, None));

        let mut request = Request::builder().uri(uri);
        if let Some(id) = request_id {
            request = request.header(REQUEST_ID_HEADER, id);
        }
        let response = router
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let header = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .map(|v| v.to_str().unwrap().to_string());
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, header, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_fallback_renders_not_found_envelope() {
        let (status, header, body) = call("/nowhere", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["statusCode"], 404);
        assert_eq!(body["message"], "The requested resource was not found.");
        assert_eq!(body["details"]["title"], "ResourceNotFound");
        assert_eq!(body["traceId"].as_str(), header.as_deref());
        assert!(Uuid::parse_str(header.as_deref().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn test_protected_route_without_token() {
        let (status, header, body) = call("/api/courses", Some("req-7")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(header.as_deref(), Some("req-7"));
        assert_eq!(body["errorCode"], 3001);
        assert_eq!(body["traceId"], "req-7");
    }

    #[tokio::test]
    async fn test_disabled_metrics_is_not_found() {
        let (status, _, body) = call("/metrics", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Metrics are disabled.");
        assert_eq!(body["details"]["title"], "ResourceNotFound");
    }

    async fn full_course() -> Result<ApiResponse<i64>> {
        wrap_response("EnrollInFullCourse", async {
            Ok(Outcome::<i64>::failure(
                "Course 7 is full.",
                Some(ErrorCode::CourseNotFound),
            ))
        })
        .await?
        .expect_envelope()
    }

    async fn seat_limit() -> ApiResponse<()> {
        ApiResponse::fail(
            "Seat limit reached.",
            StatusCode::CONFLICT,
            Some(ErrorCode::DuplicateEnrollment),
            None,
            None,
        )
    }

    async fn uncoded_failure() -> Result<ApiResponse<i64>> {
        wrap_response("Uncoded", async {
            Ok(Outcome::<i64>::failure("Nothing to do.", None))
        })
        .await
        .and_then(Normalized::expect_envelope)
    }

    async fn call_failures(uri: &str) -> (StatusCode, Value) {
        let (services, _temp) = services();
        let state = AppState::new(Arc::new(AppConfig::default()), services, None);
        let router = Router::new()
            .route("/full", get(full_course))
            .route("/seats", get(seat_limit))
            .route("/uncoded", get(uncoded_failure))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                normalize_errors,
            ))
            .with_state(state);

        let request = Request::builder()
            .uri(uri)
            .header(REQUEST_ID_HEADER, "t1")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();

        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_failed_outcome_keeps_message_and_code() {
        let (status, body) = call_failures("/full").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["statusCode"], 400);
        assert_eq!(body["message"], "Course 7 is full.");
        assert_eq!(body["errorCode"], 2002);
        assert_eq!(body["traceId"], "t1");
        assert!(body.get("data").is_none());
    }

    #[tokio::test]
    async fn test_wrapped_failure_keeps_status_and_code() {
        let (status, body) = call_failures("/seats").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], "Seat limit reached.");
        assert_eq!(body["errorCode"], 4001);
        assert_eq!(body["traceId"], "t1");
    }

    #[tokio::test]
    async fn test_failure_without_code_gets_validation_code() {
        let (status, body) = call_failures("/uncoded").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Nothing to do.");
        assert_eq!(body["errorCode"], 1001);
        assert_eq!(body["traceId"], "t1");
    }
}
