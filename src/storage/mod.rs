//! Storage layer module.
//!
//! This module provides trait-based storage abstraction allowing different backends
//! to be used without changing business logic.

pub mod factory;
pub mod file;
pub mod postgres;
pub mod traits;
pub mod unit_of_work;

pub use factory::create_storage;
pub use traits::{
    Change, CourseStorage, DynStorage, EnrollmentDetails, EnrollmentStorage, Page, Storage, Table,
    UserStorage,
};
pub use unit_of_work::UnitOfWork;
