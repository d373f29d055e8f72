//! Course handlers.

use axum::extract::State;

use super::route_id;
use crate::api::extractors::{ApiJson, ApiPath, ApiQuery};
use crate::api::state::AppState;
use crate::domain::{ApiResponse, CourseDto, CreatedId, PaginationParams};
use crate::error::{AppError, ErrorCode, Result};
use crate::service::courses::{
    CreateCourse, DeleteCourse, GetCourseById, ListCourses, PageCourses, UpdateCourse,
};

/// List all courses.
pub async fn list_courses(State(state): State<AppState>) -> Result<ApiResponse<Vec<CourseDto>>> {
    state.pipeline.send(ListCourses).await?.expect_envelope()
}

/// List one page of courses.
pub async fn page_courses(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<PaginationParams>,
) -> Result<ApiResponse<Vec<CourseDto>>> {
    state.pipeline.send(PageCourses(params)).await?.expect_envelope()
}

/// Get a course by id.
pub async fn get_course(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<ApiResponse<CourseDto>> {
    state.pipeline.send(GetCourseById { id }).await?.or_else(|| {
        AppError::application(
            ErrorCode::CourseNotFound,
            format!("Course with ID {id} not found."),
        )
    })
}

/// Create a course.
pub async fn create_course(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateCourse>,
) -> Result<ApiResponse<CreatedId>> {
    state.pipeline.send(body).await?.expect_envelope()
}

/// Update a course.
pub async fn update_course(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(mut body): ApiJson<UpdateCourse>,
) -> Result<ApiResponse<CourseDto>> {
    body.id = route_id(id, body.id, "Course")?;
    state.pipeline.send(body).await?.expect_envelope()
}

/// Delete a course.
pub async fn delete_course(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<ApiResponse<()>> {
    state.pipeline.send(DeleteCourse { id }).await?.expect_envelope()
}
