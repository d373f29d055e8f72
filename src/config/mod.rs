//! Configuration management module.
//!
//! Supports loading configuration from:
//! - TOML files (config/default.toml, config/{profile}.toml)
//! - Environment variables with `LMS_API__<SECTION>__<KEY>` pattern

mod server;
mod storage;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub use server::ServerConfig;
pub use storage::{FileStorageConfig, PostgresStorageConfig, StorageBackend, StorageConfig};

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Query cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Paged list limits.
    #[serde(default)]
    pub pagination: PaginationConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration from files and environment.
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. `config/default.toml`
    /// 2. `config/{LMS_PROFILE}.toml` (if `LMS_PROFILE` is set)
    /// 3. Environment variables with `LMS_API__` prefix
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let profile = std::env::var("LMS_PROFILE").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{profile}")).required(false))
            // LMS_API__SERVER__PORT=8080 -> server.port = 8080
            .add_source(
                Environment::with_prefix("LMS_API")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app_config: Self = config.try_deserialize()?;
        app_config.validate()?;

        Ok(app_config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message("server.port cannot be 0".to_string()));
        }

        self.storage.validate()?;
        self.auth.validate()?;

        if self.pagination.max_page_size <= 0 {
            return Err(ConfigError::Message(
                "pagination.max_page_size must be positive".to_string(),
            ));
        }
        if self.pagination.default_page_size <= 0 {
            return Err(ConfigError::Message(
                "pagination.default_page_size must be positive".to_string(),
            ));
        }
        if self.cache.max_entries == 0 {
            return Err(ConfigError::Message(
                "cache.max_entries cannot be 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for signing tokens. Empty means a random per-process secret.
    #[serde(default)]
    pub jwt_secret: String,

    /// Token issuer.
    #[serde(default = "default_issuer")]
    pub issuer: String,

    /// Token audience.
    #[serde(default = "default_audience")]
    pub audience: String,

    /// Token lifetime in minutes.
    #[serde(default = "default_token_ttl_minutes")]
    pub token_ttl_minutes: i64,

    /// Argon2 memory cost in KiB.
    #[serde(default = "default_hash_memory_kib")]
    pub hash_memory_kib: u32,

    /// Argon2 iteration count.
    #[serde(default = "default_hash_iterations")]
    pub hash_iterations: u32,

    /// Admin account created at startup when no users exist.
    #[serde(default)]
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

fn default_issuer() -> String {
    "lms-api".to_string()
}

fn default_audience() -> String {
    "lms-clients".to_string()
}

const fn default_token_ttl_minutes() -> i64 {
    60
}

const fn default_hash_memory_kib() -> u32 {
    19 * 1024
}

const fn default_hash_iterations() -> u32 {
    2
}

impl AuthConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.token_ttl_minutes <= 0 {
            return Err(ConfigError::Message(
                "auth.token_ttl_minutes must be positive".to_string(),
            ));
        }
        if let Some(admin) = &self.bootstrap_admin
            && (admin.email.is_empty() || admin.password.len() < 8)
        {
            return Err(ConfigError::Message(
                "auth.bootstrap_admin needs an email and a password of at least 8 characters"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            issuer: default_issuer(),
            audience: default_audience(),
            token_ttl_minutes: default_token_ttl_minutes(),
            hash_memory_kib: default_hash_memory_kib(),
            hash_iterations: default_hash_iterations(),
            bootstrap_admin: None,
        }
    }
}

/// Seed administrator account.
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapAdmin {
    /// Display name.
    #[serde(default = "default_admin_name")]
    pub name: String,

    /// Login email.
    pub email: String,

    /// Plain-text password, hashed before storage.
    pub password: String,
}

fn default_admin_name() -> String {
    "Administrator".to_string()
}

/// Query cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Entry lifetime in seconds.
    #[serde(default = "default_cache_ttl")]
    pub default_ttl_secs: u64,

    /// Maximum number of live entries.
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
}

const fn default_cache_ttl() -> u64 {
    300
}

const fn default_cache_max_entries() -> usize {
    10_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_cache_ttl(),
            max_entries: default_cache_max_entries(),
        }
    }
}

/// Paged list limits.
#[derive(Debug, Clone, Deserialize)]
pub struct PaginationConfig {
    /// Page size used when the client sends none.
    #[serde(default = "default_page_size")]
    pub default_page_size: i64,

    /// Upper bound for client-requested page sizes.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: i64,
}

const fn default_page_size() -> i64 {
    10
}

const fn default_max_page_size() -> i64 {
    50
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format: "text" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Enable Prometheus metrics endpoint.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,

    /// Attach inner error text to error envelopes. Diagnostics only.
    #[serde(default)]
    pub error_details: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

const fn default_metrics_enabled() -> bool {
    true
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            metrics_enabled: default_metrics_enabled(),
            error_details: false,
        }
    }
}
