//! Service layer module.
//!
//! [`AppServices`] owns the collaborators every request handler needs and is
//! the handler set the request pipeline dispatches to. Each feature module
//! declares its requests and implements `RequestHandler` for `AppServices`.

pub mod auth;
pub mod cache;
pub mod courses;
pub mod enrollments;
pub mod password;
pub mod token;
pub mod users;

use std::sync::Arc;

use chrono::Utc;

use crate::config::{AppConfig, BootstrapAdmin, PaginationConfig};
use crate::domain::{Role, User};
use crate::error::{AppError, ErrorCode, Result, StorageError};
use crate::storage::{Change, DynStorage, Table, UnitOfWork};

pub use cache::QueryCache;
pub use password::PasswordService;
pub use token::{Claims, IssuedToken, TokenService};

/// Shared collaborators for request handlers.
pub struct AppServices {
    storage: Arc<DynStorage>,
    passwords: PasswordService,
    tokens: TokenService,
    cache: QueryCache,
    pagination: PaginationConfig,
}

impl AppServices {
    /// Build the services over an initialized storage backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the password hashing parameters are invalid.
    pub fn new(config: &AppConfig, storage: Arc<DynStorage>) -> Result<Self> {
        Ok(Self {
            storage,
            passwords: PasswordService::new(&config.auth)?,
            tokens: TokenService::new(&config.auth),
            cache: QueryCache::new(&config.cache),
            pagination: config.pagination.clone(),
        })
    }

    /// Storage backend.
    #[must_use]
    pub const fn storage(&self) -> &Arc<DynStorage> {
        &self.storage
    }

    /// Token service.
    #[must_use]
    pub const fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Query cache.
    #[must_use]
    pub const fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Start a unit of work for one request.
    #[must_use]
    pub fn uow(&self) -> UnitOfWork {
        UnitOfWork::new(Arc::clone(&self.storage))
    }

    /// Create the bootstrap administrator when no users exist yet.
    ///
    /// Returns whether an account was created.
    ///
    /// # Errors
    ///
    /// Returns storage and hashing errors.
    pub async fn seed_admin(&self, admin: &BootstrapAdmin) -> Result<bool> {
        if self.storage.count_users().await? > 0 {
            tracing::debug!("Users exist, skipping bootstrap admin");
            return Ok(false);
        }

        let password_hash = self.passwords.hash(&admin.password).await?;
        let mut uow = self.uow();
        let id = uow.next_id(Table::Users).await?;
        let now = Utc::now();

        uow.stage(Change::InsertUser(User {
            id,
            name: admin.name.clone(),
            email: admin.email.trim().to_string(),
            password_hash,
            role: Role::Admin,
            created_at: now,
            updated_at: now,
        }));
        uow.save().await?;

        tracing::info!(user_id = id, email = %admin.email, "Bootstrap admin created");
        Ok(true)
    }
}

/// Map a commit conflict to a domain error; other storage errors pass through.
fn conflict_as(err: StorageError, code: ErrorCode, message: impl FnOnce() -> String) -> AppError {
    match err {
        StorageError::Conflict(detail) => AppError::Application {
            message: message(),
            code,
            details: Some(detail),
        },
        other => AppError::Storage(other),
    }
}

/// Map a commit that lost its row to a domain not-found error.
fn missing_as(err: StorageError, code: ErrorCode, message: impl FnOnce() -> String) -> AppError {
    match err {
        StorageError::NotFound(_) => AppError::application(code, message()),
        other => AppError::Storage(other),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::AppServices;
    use crate::config::{AppConfig, FileStorageConfig};
    use crate::storage::file::FileStorage;

    /// Services over file storage in a temp dir, with cheap hashing.
    pub fn services() -> (AppServices, TempDir) {
        let temp = TempDir::new().unwrap();
        let storage = FileStorage::new(&FileStorageConfig {
            data_dir: temp.path().to_path_buf(),
        })
        .unwrap();

        let mut config = AppConfig::default();
        config.auth.jwt_secret = "test-secret".to_string();
        config.auth.hash_memory_kib = 8;
        config.auth.hash_iterations = 1;

        (AppServices::new(&config, Arc::new(storage)).unwrap(), temp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seed_admin_only_once() {
        let (services, _temp) = test_support::services();
        let admin = BootstrapAdmin {
            name: "Root".to_string(),
            email: "root@lms.local".to_string(),
            password: "change-me-now".to_string(),
        };

        assert!(services.seed_admin(&admin).await.unwrap());
        assert!(!services.seed_admin(&admin).await.unwrap());

        let stored = services
            .storage()
            .find_user_by_email("root@lms.local")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.role, Role::Admin);
        assert_ne!(stored.password_hash, "change-me-now");
    }

    #[test]
    fn test_conflict_mapping() {
        let err = conflict_as(
            StorageError::Conflict("dup".to_string()),
            ErrorCode::DuplicateEmail,
            || "taken".to_string(),
        );
        assert_eq!(err.error_code(), ErrorCode::DuplicateEmail);

        let err = conflict_as(StorageError::Unavailable, ErrorCode::DuplicateEmail, String::new);
        assert!(matches!(err, AppError::Storage(StorageError::Unavailable)));
    }
}
