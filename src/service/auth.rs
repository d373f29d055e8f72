//! Login.

use async_trait::async_trait;
use validator::Validate;

use super::AppServices;
use crate::domain::{LoginRequest, LoginResponse, Outcome, UserDto};
use crate::error::{AppError, ErrorCode, Result};
use crate::pipeline::{Request, RequestHandler};

const INVALID_CREDENTIALS: &str = "Invalid email or password.";

/// Exchange an email and password for a bearer token.
pub struct Login(pub LoginRequest);

impl Request for Login {
    type Response = LoginResponse;
    const NAME: &'static str = "Login";

    fn validate_request(&self) -> Result<()> {
        self.0.validate().map_err(AppError::from)
    }
}

#[async_trait]
impl RequestHandler<Login> for AppServices {
    async fn handle(&self, request: Login) -> Result<LoginResponse> {
        let LoginRequest { email, password } = request.0;
        let user = self.storage.find_user_by_email(email.trim()).await?;

        let verified = match &user {
            Some(user) => self.passwords.verify(&password, &user.password_hash).await?,
            None => false,
        };

        let candidate = match user {
            Some(user) if verified => Outcome::success(user),
            _ => Outcome::failure(INVALID_CREDENTIALS, Some(ErrorCode::InvalidCredentials)),
        };

        candidate
            .tap_error(|_, _| tracing::warn!(email = %email, "Login rejected"))
            .bind(|user| Outcome::from(self.tokens.issue(&user).map(|issued| (user, issued))))
            .map(|(user, issued)| LoginResponse {
                token: issued.token,
                expires_at: issued.expires_at,
                user: UserDto::from(&user),
            })
            .tap(|response| tracing::info!(user_id = response.user.id, "Login succeeded"))
            .into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use crate::service::test_support::services;
    use crate::service::users::CreateUser;
    use axum::http::StatusCode;

    async fn register(services: &AppServices) {
        services
            .handle(CreateUser {
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                password: "password123".to_string(),
                role: Role::Admin,
            })
            .await
            .unwrap();
    }

    fn login(email: &str, password: &str) -> Login {
        Login(LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        })
    }

    #[tokio::test]
    async fn test_login_issues_verifiable_token() {
        let (services, _temp) = services();
        register(&services).await;

        let response = services
            .handle(login("Ada@Example.com", "password123"))
            .await
            .unwrap();
        assert_eq!(response.user.role, Role::Admin);

        let claims = services.tokens().verify(&response.token).unwrap();
        assert_eq!(claims.user_id().unwrap(), response.user.id);
        assert_eq!(claims.email, "ada@example.com");
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_email_look_alike() {
        let (services, _temp) = services();
        register(&services).await;

        let wrong = services
            .handle(login("ada@example.com", "nope-nope"))
            .await
            .unwrap_err();
        let unknown = services
            .handle(login("bob@example.com", "password123"))
            .await
            .unwrap_err();

        for err in [wrong, unknown] {
            assert_eq!(err.error_code(), ErrorCode::InvalidCredentials);
            assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
            assert_eq!(err.to_string(), INVALID_CREDENTIALS);
        }
    }

    #[test]
    fn test_login_validation() {
        assert!(login("not-an-email", "").validate_request().is_err());
        assert!(login("ada@example.com", "x").validate_request().is_ok());
    }
}
