//! User handlers.

use axum::extract::State;

use super::route_id;
use crate::api::extractors::{AdminUser, ApiJson, ApiPath, ApiQuery};
use crate::api::state::AppState;
use crate::domain::{ApiResponse, CreatedId, PaginationParams, UserDto};
use crate::error::{AppError, Result};
use crate::service::users::{
    CreateUser, DeleteUser, GetUserById, ListUsers, PageUsers, UpdateUser,
};

/// List all users.
pub async fn list_users(State(state): State<AppState>) -> Result<ApiResponse<Vec<UserDto>>> {
    state.pipeline.send(ListUsers).await?.expect_envelope()
}

/// List one page of users.
pub async fn page_users(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<PaginationParams>,
) -> Result<ApiResponse<Vec<UserDto>>> {
    state.pipeline.send(PageUsers(params)).await?.expect_envelope()
}

/// Get a user by id.
pub async fn get_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<ApiResponse<UserDto>> {
    state
        .pipeline
        .send(GetUserById { id })
        .await?
        .or_else(|| AppError::NotFound(format!("User with ID {id} not found.")))
}

/// Create a user. Admin only.
pub async fn create_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(body): ApiJson<CreateUser>,
) -> Result<ApiResponse<CreatedId>> {
    tracing::debug!(admin_id = admin.id, "Creating user");
    state.pipeline.send(body).await?.expect_envelope()
}

/// Update a user.
pub async fn update_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(mut body): ApiJson<UpdateUser>,
) -> Result<ApiResponse<UserDto>> {
    body.id = route_id(id, body.id, "User")?;
    state.pipeline.send(body).await?.expect_envelope()
}

/// Delete a user. Admin only.
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<ApiResponse<()>> {
    tracing::debug!(admin_id = admin.id, user_id = id, "Deleting user");
    state.pipeline.send(DeleteUser { id }).await?.expect_envelope()
}
