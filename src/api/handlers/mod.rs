//! HTTP handlers.
//!
//! Handlers stay thin: extract, build the request, send it through the
//! pipeline and turn an absent result into the entity's not-found error.

pub mod auth;
pub mod courses;
pub mod enrollments;
pub mod health;
pub mod users;

use crate::error::{AppError, Result};

/// Reconcile the id in the route with the id in an update body.
///
/// A body without an id takes the route's.
fn route_id(path_id: i64, body_id: i64, entity: &str) -> Result<i64> {
    if body_id != 0 && body_id != path_id {
        return Err(AppError::invalid_field(
            "id",
            format!("{entity} ID in the URL and body do not match."),
        ));
    }
    Ok(path_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_route_id() {
        assert_eq!(route_id(4, 4, "User").unwrap(), 4);
        assert_eq!(route_id(4, 0, "User").unwrap(), 4);

        let err = route_id(4, 5, "Course").unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::ValidationError);
        assert_eq!(err.to_string(), "Course ID in the URL and body do not match.");
    }
}
