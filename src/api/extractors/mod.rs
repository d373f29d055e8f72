//! Request extractors.

mod auth;
mod json;

pub use auth::{AdminUser, CurrentUser};
pub use json::{ApiJson, ApiPath, ApiQuery};
