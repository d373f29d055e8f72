//! HTTP middleware.

pub mod auth;
pub mod errors;

pub use auth::require_auth;
pub use errors::{REQUEST_ID_HEADER, normalize_errors};
