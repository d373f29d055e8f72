//! Authenticated caller extractors.

use axum::{extract::FromRequestParts, http::request::Parts};
use std::future::Future;

use crate::domain::Role;
use crate::error::{AppError, ErrorCode};
use crate::service::Claims;

/// Caller identity extracted from request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    /// User id.
    pub id: i64,
    /// User email.
    pub email: String,
    /// User display name.
    pub name: String,
    /// Granted role.
    pub role: Role,
}

impl CurrentUser {
    /// Check if the caller is an administrator.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl TryFrom<Claims> for CurrentUser {
    type Error = AppError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        Ok(Self {
            id: claims.user_id()?,
            email: claims.email,
            name: claims.name,
            role: claims.role,
        })
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        // Set by the auth middleware
        let result = parts.extensions.get::<Self>().cloned().ok_or_else(|| {
            AppError::Unauthorized("Authentication is required to access this resource.".to_string())
        });
        std::future::ready(result)
    }
}

/// Caller holding the `Admin` role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub CurrentUser);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let result = CurrentUser::from_request_parts(parts, state);
        async move {
            let user = result.await?;
            if !user.is_admin() {
                return Err(AppError::application(
                    ErrorCode::Forbidden,
                    "You do not have permission to perform this action.",
                ));
            }
            Ok(Self(user))
        }
    }
}
