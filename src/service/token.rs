//! Token service for authentication.
//!
//! Issues and verifies HS256 JSON Web Tokens carrying the user's id, email,
//! name and role. When no signing secret is configured a random one is
//! generated per process, so tokens do not survive a restart.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::domain::{Role, User};
use crate::error::{AppError, ErrorCode, Result};

/// Generated secret length in bytes (64 base64 chars).
const SECRET_BYTES: usize = 48;

/// Token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    /// User email.
    pub email: String,
    /// User display name.
    pub name: String,
    /// Granted role.
    pub role: Role,
    /// Issued at (unix seconds).
    pub iat: i64,
    /// Expiry (unix seconds).
    pub exp: i64,
    /// Issuer.
    pub iss: String,
    /// Audience.
    pub aud: String,
}

impl Claims {
    /// The user id carried in `sub`.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` if `sub` is not a numeric id.
    pub fn user_id(&self) -> Result<i64> {
        self.sub
            .parse()
            .map_err(|_| AppError::application(ErrorCode::Unauthorized, "Invalid token subject."))
    }
}

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Encoded JWT.
    pub token: String,
    /// Expiry time.
    pub expires_at: DateTime<Utc>,
}

/// Token service for authentication and authorization.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl TokenService {
    /// Create a new token service.
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        let secret = if config.jwt_secret.is_empty() {
            tracing::warn!("auth.jwt_secret not set; using a random secret for this process");
            generate_secret()
        } else {
            config.jwt_secret.clone()
        };

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_audience(&[config.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            ttl: Duration::minutes(config.token_ttl_minutes),
        }
    }

    /// Sign a token for `user`.
    ///
    /// # Errors
    ///
    /// Returns an internal error if signing fails.
    pub fn issue(&self, user: &User) -> Result<IssuedToken> {
        let now = Utc::now();
        let expires_at = now + self.ttl;

        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {e}")))?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Verify a token and return its claims.
    ///
    /// # Errors
    ///
    /// Returns `TokenExpired` for expired tokens and `Unauthorized` for
    /// anything else that fails verification.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => {
                    AppError::application(ErrorCode::TokenExpired, "Token has expired.")
                }
                _ => {
                    tracing::debug!(error = %e, "Rejected bearer token");
                    AppError::application(ErrorCode::Unauthorized, "Invalid token.")
                }
            })
    }
}

/// Generate a random 64-character URL-safe base64 secret.
fn generate_secret() -> String {
    let mut rng = rand::rng();
    let mut bytes = [0u8; SECRET_BYTES];
    rng.fill(&mut bytes);

    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(secret: &str, ttl_minutes: i64) -> AuthConfig {
        AuthConfig {
            jwt_secret: secret.to_string(),
            token_ttl_minutes: ttl_minutes,
            ..AuthConfig::default()
        }
    }

    fn user() -> User {
        let now = Utc::now();
        User {
            id: 42,
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: String::new(),
            role: Role::Instructor,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_issue_and_verify() {
        let service = TokenService::new(&config("test-secret", 60));
        let issued = service.issue(&user()).unwrap();

        let claims = service.verify(&issued.token).unwrap();
        assert_eq!(claims.user_id().unwrap(), 42);
        assert_eq!(claims.role, Role::Instructor);
        assert_eq!(claims.iss, "lms-api");
        assert_eq!(claims.aud, "lms-clients");
        assert_eq!(claims.exp, issued.expires_at.timestamp());
    }

    #[test]
    fn test_expired_token() {
        let service = TokenService::new(&config("test-secret", -5));
        let issued = service.issue(&user()).unwrap();

        let err = service.verify(&issued.token).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::TokenExpired);
    }

    #[test]
    fn test_foreign_secret_rejected() {
        let ours = TokenService::new(&config("ours", 60));
        let theirs = TokenService::new(&config("theirs", 60));
        let issued = theirs.issue(&user()).unwrap();

        let err = ours.verify(&issued.token).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::Unauthorized);
        assert_eq!(
            ours.verify("not-a-token").unwrap_err().error_code(),
            ErrorCode::Unauthorized
        );
    }

    #[test]
    fn test_random_secret_per_process() {
        assert_eq!(generate_secret().len(), 64);
        assert_ne!(generate_secret(), generate_secret());

        let service = TokenService::new(&config("", 60));
        let issued = service.issue(&user()).unwrap();
        assert!(service.verify(&issued.token).is_ok());
    }
}
