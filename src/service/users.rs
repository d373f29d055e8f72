//! User commands and queries.

use async_trait::async_trait;
use axum::http::StatusCode;
use chrono::Utc;
use serde::Deserialize;
use validator::Validate;

use super::{AppServices, conflict_as, missing_as};
use crate::domain::{ApiResponse, CreatedId, Paged, PaginationParams, Role, User, UserDto};
use crate::error::{AppError, ErrorCode, Result, StorageError};
use crate::pipeline::{Request, RequestHandler};
use crate::storage::{Change, Table};

/// All users, ordered by id.
pub struct ListUsers;

impl Request for ListUsers {
    type Response = Vec<UserDto>;
    const NAME: &'static str = "ListUsers";
}

/// One page of users, optionally filtered by name or email.
pub struct PageUsers(pub PaginationParams);

impl Request for PageUsers {
    type Response = Paged<UserDto>;
    const NAME: &'static str = "PageUsers";
}

/// A single user; absent when the id is unknown.
pub struct GetUserById {
    /// User id.
    pub id: i64,
}

impl Request for GetUserById {
    type Response = Option<UserDto>;
    const NAME: &'static str = "GetUserById";

    fn validate_request(&self) -> Result<()> {
        positive_id(self.id)
    }
}

/// Register a new user.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser {
    /// Display name.
    #[validate(length(min = 1, max = 100, message = "Name is required and must not exceed 100 characters."))]
    pub name: String,

    /// Login email.
    #[validate(
        email(message = "Invalid email address."),
        length(max = 200, message = "Email must not exceed 200 characters.")
    )]
    pub email: String,

    /// Plain-text password.
    #[validate(length(min = 8, message = "Password must be at least 8 characters."))]
    pub password: String,

    /// Granted role.
    #[serde(default)]
    pub role: Role,
}

impl Request for CreateUser {
    type Response = ApiResponse<CreatedId>;
    const NAME: &'static str = "CreateUser";

    fn validate_request(&self) -> Result<()> {
        self.validate().map_err(AppError::from)
    }
}

/// Replace a user's profile.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUser {
    /// User id; must match the route.
    #[serde(default)]
    #[validate(range(min = 1, message = "Invalid user ID."))]
    pub id: i64,

    /// Display name.
    #[validate(length(min = 1, max = 100, message = "Name is required and must not exceed 100 characters."))]
    pub name: String,

    /// Login email.
    #[validate(
        email(message = "Invalid email address."),
        length(max = 200, message = "Email must not exceed 200 characters.")
    )]
    pub email: String,

    /// New password; unchanged when absent.
    #[serde(default)]
    #[validate(length(min = 8, message = "Password must be at least 8 characters."))]
    pub password: Option<String>,

    /// New role; unchanged when absent.
    #[serde(default)]
    pub role: Option<Role>,
}

impl Request for UpdateUser {
    type Response = ApiResponse<UserDto>;
    const NAME: &'static str = "UpdateUser";

    fn validate_request(&self) -> Result<()> {
        self.validate().map_err(AppError::from)
    }
}

/// Delete a user, the courses they teach and all related enrollments.
pub struct DeleteUser {
    /// User id.
    pub id: i64,
}

impl Request for DeleteUser {
    type Response = ApiResponse<()>;
    const NAME: &'static str = "DeleteUser";

    fn validate_request(&self) -> Result<()> {
        positive_id(self.id)
    }
}

fn positive_id(id: i64) -> Result<()> {
    if id <= 0 {
        return Err(AppError::invalid_field("id", "Invalid user ID."));
    }
    Ok(())
}

fn user_not_found(id: i64) -> AppError {
    AppError::application(ErrorCode::UserNotFound, format!("User with ID {id} not found."))
}

fn email_taken(email: &str) -> AppError {
    AppError::application(
        ErrorCode::DuplicateEmail,
        format!("Email '{email}' is already registered."),
    )
}

#[async_trait]
impl RequestHandler<ListUsers> for AppServices {
    async fn handle(&self, _request: ListUsers) -> Result<Vec<UserDto>> {
        let users = self.storage.list_users().await?;
        Ok(users.iter().map(UserDto::from).collect())
    }
}

#[async_trait]
impl RequestHandler<PageUsers> for AppServices {
    async fn handle(&self, request: PageUsers) -> Result<Paged<UserDto>> {
        let page = request.0.resolve(&self.pagination)?;
        let rows = self.storage.page_users(&page).await?;

        Ok(Paged {
            items: rows.items.iter().map(UserDto::from).collect(),
            pagination: page.metadata(rows.total)?,
        })
    }
}

#[async_trait]
impl RequestHandler<GetUserById> for AppServices {
    async fn handle(&self, request: GetUserById) -> Result<Option<UserDto>> {
        let user = self.storage.get_user(request.id).await?;
        Ok(user.as_ref().map(UserDto::from))
    }
}

#[async_trait]
impl RequestHandler<CreateUser> for AppServices {
    async fn handle(&self, request: CreateUser) -> Result<ApiResponse<CreatedId>> {
        let email = request.email.trim().to_string();
        if self.storage.find_user_by_email(&email).await?.is_some() {
            return Err(email_taken(&email));
        }

        let password_hash = self.passwords.hash(&request.password).await?;

        let mut uow = self.uow();
        let id = uow.next_id(Table::Users).await?;
        let now = Utc::now();
        uow.stage(Change::InsertUser(User {
            id,
            name: request.name.trim().to_string(),
            email: email.clone(),
            password_hash,
            role: request.role,
            created_at: now,
            updated_at: now,
        }));

        // A concurrent registration can still win between the check and the commit.
        uow.save().await.map_err(|e| {
            conflict_as(e, ErrorCode::DuplicateEmail, || {
                format!("Email '{email}' is already registered.")
            })
        })?;

        tracing::info!(user_id = id, role = %request.role, "User created");
        Ok(ApiResponse::ok_with(
            CreatedId { id },
            "User created successfully",
            StatusCode::CREATED,
        ))
    }
}

#[async_trait]
impl RequestHandler<UpdateUser> for AppServices {
    async fn handle(&self, request: UpdateUser) -> Result<ApiResponse<UserDto>> {
        let id = request.id;
        let mut uow = self.uow();
        let mut user = uow.get_user(id).await?.ok_or_else(|| user_not_found(id))?;

        let email = request.email.trim().to_string();
        if let Some(other) = uow.find_user_by_email(&email).await?
            && other.id != id
        {
            return Err(email_taken(&email));
        }

        if let Some(password) = &request.password {
            user.password_hash = self.passwords.hash(password).await?;
        }
        if let Some(role) = request.role {
            user.role = role;
        }
        user.name = request.name.trim().to_string();
        user.email = email;
        user.updated_at = Utc::now();

        let dto = UserDto::from(&user);
        uow.stage(Change::UpdateUser(user));
        uow.save().await.map_err(|e| match e {
            StorageError::NotFound(_) => user_not_found(id),
            other => conflict_as(other, ErrorCode::DuplicateEmail, || {
                format!("Email '{}' is already registered.", dto.email)
            }),
        })?;

        tracing::info!(user_id = id, "User updated");
        Ok(ApiResponse::ok_with(
            dto,
            "User updated successfully.",
            StatusCode::OK,
        ))
    }
}

#[async_trait]
impl RequestHandler<DeleteUser> for AppServices {
    async fn handle(&self, request: DeleteUser) -> Result<ApiResponse<()>> {
        let id = request.id;
        let mut uow = self.uow();
        if uow.get_user(id).await?.is_none() {
            return Err(user_not_found(id));
        }

        uow.stage(Change::DeleteUser(id));
        uow.save().await.map_err(|e| {
            missing_as(e, ErrorCode::UserNotFound, || {
                format!("User with ID {id} not found.")
            })
        })?;

        // Taught courses go with the user.
        self.cache.remove_by_prefix("course");

        tracing::info!(user_id = id, "User deleted");
        Ok(ApiResponse::ok_empty("User deleted successfully."))
    }
}
