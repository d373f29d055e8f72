//! Domain models for the LMS.
//!
//! This module contains the persistent entities, the API contracts and the
//! uniform response envelope.

pub mod dto;
pub mod entities;
pub mod outcome;
pub mod pagination;
pub mod response;

pub use dto::{
    CourseDto, CreatedId, EnrollmentDto, HealthResponse, LoginRequest, LoginResponse,
    ReadyComponents, ReadyResponse, UserDto,
};
pub use entities::{Course, Enrollment, Role, User};
pub use outcome::Outcome;
pub use pagination::{PageRequest, Paged, PaginationMetadata, PaginationParams};
pub use response::{ApiResponse, ErrorModel};
