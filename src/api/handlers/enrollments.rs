//! Enrollment handlers.

use axum::extract::State;

use super::route_id;
use crate::api::extractors::{ApiJson, ApiPath, ApiQuery};
use crate::api::state::AppState;
use crate::domain::{ApiResponse, CreatedId, EnrollmentDto, PaginationParams};
use crate::error::{AppError, ErrorCode, Result};
use crate::service::enrollments::{
    CreateEnrollment, DeleteEnrollment, GetEnrollmentById, ListEnrollments, PageEnrollments,
    UpdateEnrollment,
};

pub async fn list_enrollments(
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<EnrollmentDto>>> {
    state.pipeline.send(ListEnrollments).await?.expect_envelope()
}

pub async fn page_enrollments(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<PaginationParams>,
) -> Result<ApiResponse<Vec<EnrollmentDto>>> {
    state
        .pipeline
        .send(PageEnrollments(params))
        .await?
        .expect_envelope()
}

pub async fn get_enrollment(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<ApiResponse<EnrollmentDto>> {
    state
        .pipeline
        .send(GetEnrollmentById { id })
        .await?
        .or_else(|| {
            AppError::application(
                ErrorCode::EnrollmentNotFound,
                format!("Enrollment with ID {id} not found."),
            )
        })
}

pub async fn create_enrollment(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateEnrollment>,
) -> Result<ApiResponse<CreatedId>> {
    state.pipeline.send(body).await?.expect_envelope()
}

pub async fn update_enrollment(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(mut body): ApiJson<UpdateEnrollment>,
) -> Result<ApiResponse<EnrollmentDto>> {
    body.id = route_id(id, body.id, "Enrollment")?;
    state.pipeline.send(body).await?.expect_envelope()
}

pub async fn delete_enrollment(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<ApiResponse<()>> {
    state
        .pipeline
        .send(DeleteEnrollment { id })
        .await?
        .expect_envelope()
}
