//! Enrollment commands and queries.

use async_trait::async_trait;
use axum::http::StatusCode;
use chrono::Utc;
use serde::Deserialize;
use validator::Validate;

use super::{AppServices, conflict_as, missing_as};
use crate::domain::{ApiResponse, CreatedId, Enrollment, EnrollmentDto, Paged, PaginationParams};
use crate::error::{AppError, ErrorCode, Result, StorageError};
use crate::pipeline::{Request, RequestHandler};
use crate::storage::{Change, EnrollmentDetails, Table};

impl From<&EnrollmentDetails> for EnrollmentDto {
    fn from(details: &EnrollmentDetails) -> Self {
        Self {
            id: details.enrollment.id,
            user_id: details.enrollment.user_id,
            course_id: details.enrollment.course_id,
            user_name: details.user_name.clone(),
            course_title: details.course_title.clone(),
            enrolled_at: details.enrollment.created_at,
        }
    }
}

/// All enrollments, ordered by id.
pub struct ListEnrollments;

impl Request for ListEnrollments {
    type Response = Vec<EnrollmentDto>;
    const NAME: &'static str = "ListEnrollments";
}

/// One page of enrollments, optionally filtered by user name or course title.
pub struct PageEnrollments(pub PaginationParams);

impl Request for PageEnrollments {
    type Response = Paged<EnrollmentDto>;
    const NAME: &'static str = "PageEnrollments";
}

/// A single enrollment; absent when the id is unknown.
pub struct GetEnrollmentById {
    /// Enrollment id.
    pub id: i64,
}

impl Request for GetEnrollmentById {
    type Response = Option<EnrollmentDto>;
    const NAME: &'static str = "GetEnrollmentById";

    fn validate_request(&self) -> Result<()> {
        positive_id(self.id)
    }
}

/// Enroll a user in a course.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateEnrollment {
    /// Enrolled user.
    #[validate(range(min = 1, message = "User ID must be greater than zero."))]
    pub user_id: i64,

    /// Target course.
    #[validate(range(min = 1, message = "Course ID must be greater than zero."))]
    pub course_id: i64,
}

impl Request for CreateEnrollment {
    type Response = ApiResponse<CreatedId>;
    const NAME: &'static str = "CreateEnrollment";

    fn validate_request(&self) -> Result<()> {
        self.validate().map_err(AppError::from)
    }
}

/// Move an enrollment to another user or course.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEnrollment {
    /// Enrollment id; must match the route.
    #[serde(default)]
    #[validate(range(min = 1, message = "Invalid enrollment ID."))]
    pub id: i64,

    /// Enrolled user.
    #[validate(range(min = 1, message = "User ID must be greater than zero."))]
    pub user_id: i64,

    /// Target course.
    #[validate(range(min = 1, message = "Course ID must be greater than zero."))]
    pub course_id: i64,
}

impl Request for UpdateEnrollment {
    type Response = ApiResponse<EnrollmentDto>;
    const NAME: &'static str = "UpdateEnrollment";

    fn validate_request(&self) -> Result<()> {
        self.validate().map_err(AppError::from)
    }
}

/// Remove an enrollment.
pub struct DeleteEnrollment {
    /// Enrollment id.
    pub id: i64,
}

impl Request for DeleteEnrollment {
    type Response = ApiResponse<()>;
    const NAME: &'static str = "DeleteEnrollment";

    fn validate_request(&self) -> Result<()> {
        positive_id(self.id)
    }
}

fn positive_id(id: i64) -> Result<()> {
    if id <= 0 {
        return Err(AppError::invalid_field("id", "Invalid enrollment ID."));
    }
    Ok(())
}

fn enrollment_not_found(id: i64) -> AppError {
    AppError::application(
        ErrorCode::EnrollmentNotFound,
        format!("Enrollment with ID {id} not found."),
    )
}

fn already_enrolled(user_id: i64, course_id: i64) -> AppError {
    AppError::application(
        ErrorCode::DuplicateEnrollment,
        format!("User {user_id} is already enrolled in course {course_id}."),
    )
}

impl AppServices {
    /// Resolve the names an enrollment refers to, failing on a missing side.
    async fn enrollment_parties(&self, user_id: i64, course_id: i64) -> Result<(String, String)> {
        let user = self.storage.get_user(user_id).await?.ok_or_else(|| {
            AppError::application(
                ErrorCode::UserNotFound,
                format!("User with ID {user_id} not found."),
            )
        })?;
        let course = self.storage.get_course(course_id).await?.ok_or_else(|| {
            AppError::application(
                ErrorCode::CourseNotFound,
                format!("Course with ID {course_id} not found."),
            )
        })?;
        Ok((user.name, course.title))
    }
}

#[async_trait]
impl RequestHandler<ListEnrollments> for AppServices {
    async fn handle(&self, _request: ListEnrollments) -> Result<Vec<EnrollmentDto>> {
        let rows = self.storage.list_enrollments().await?;
        Ok(rows.iter().map(EnrollmentDto::from).collect())
    }
}

#[async_trait]
impl RequestHandler<PageEnrollments> for AppServices {
    async fn handle(&self, request: PageEnrollments) -> Result<Paged<EnrollmentDto>> {
        let page = request.0.resolve(&self.pagination)?;
        let rows = self.storage.page_enrollments(&page).await?;

        Ok(Paged {
            items: rows.items.iter().map(EnrollmentDto::from).collect(),
            pagination: page.metadata(rows.total)?,
        })
    }
}

#[async_trait]
impl RequestHandler<GetEnrollmentById> for AppServices {
    async fn handle(&self, request: GetEnrollmentById) -> Result<Option<EnrollmentDto>> {
        let details = self.storage.get_enrollment(request.id).await?;
        Ok(details.as_ref().map(EnrollmentDto::from))
    }
}

#[async_trait]
impl RequestHandler<CreateEnrollment> for AppServices {
    async fn handle(&self, request: CreateEnrollment) -> Result<ApiResponse<CreatedId>> {
        let CreateEnrollment { user_id, course_id } = request;
        self.enrollment_parties(user_id, course_id).await?;

        if self.storage.enrollment_exists(user_id, course_id).await? {
            return Err(already_enrolled(user_id, course_id));
        }

        let mut uow = self.uow();
        let id = uow.next_id(Table::Enrollments).await?;
        let now = Utc::now();
        uow.stage(Change::InsertEnrollment(Enrollment {
            id,
            user_id,
            course_id,
            created_at: now,
            updated_at: now,
        }));

        uow.save().await.map_err(|e| {
            conflict_as(e, ErrorCode::DuplicateEnrollment, || {
                format!("User {user_id} is already enrolled in course {course_id}.")
            })
        })?;

        tracing::info!(enrollment_id = id, user_id, course_id, "Enrollment created");
        Ok(ApiResponse::ok_with(
            CreatedId { id },
            "Enrollment created successfully",
            StatusCode::CREATED,
        ))
    }
}

#[async_trait]
impl RequestHandler<UpdateEnrollment> for AppServices {
    async fn handle(&self, request: UpdateEnrollment) -> Result<ApiResponse<EnrollmentDto>> {
        let UpdateEnrollment {
            id,
            user_id,
            course_id,
        } = request;

        let mut uow = self.uow();
        let mut enrollment = uow
            .get_enrollment(id)
            .await?
            .ok_or_else(|| enrollment_not_found(id))?
            .enrollment;

        let (user_name, course_title) = self.enrollment_parties(user_id, course_id).await?;

        let moved = enrollment.user_id != user_id || enrollment.course_id != course_id;
        if moved && uow.enrollment_exists(user_id, course_id).await? {
            return Err(already_enrolled(user_id, course_id));
        }

        enrollment.user_id = user_id;
        enrollment.course_id = course_id;
        enrollment.updated_at = Utc::now();

        let dto = EnrollmentDto::from(&EnrollmentDetails {
            enrollment: enrollment.clone(),
            user_name,
            course_title,
        });
        uow.stage(Change::UpdateEnrollment(enrollment));
        uow.save().await.map_err(|e| match e {
            StorageError::NotFound(_) => enrollment_not_found(id),
            other => conflict_as(other, ErrorCode::DuplicateEnrollment, || {
                format!("User {user_id} is already enrolled in course {course_id}.")
            }),
        })?;

        tracing::info!(enrollment_id = id, user_id, course_id, "Enrollment updated");
        Ok(ApiResponse::ok_with(
            dto,
            "Enrollment updated successfully.",
            StatusCode::OK,
        ))
    }
}

#[async_trait]
impl RequestHandler<DeleteEnrollment> for AppServices {
    async fn handle(&self, request: DeleteEnrollment) -> Result<ApiResponse<()>> {
        let id = request.id;
        let mut uow = self.uow();
        if uow.get_enrollment(id).await?.is_none() {
            return Err(enrollment_not_found(id));
        }

        uow.stage(Change::DeleteEnrollment(id));
        uow.save().await.map_err(|e| {
            missing_as(e, ErrorCode::EnrollmentNotFound, || {
                format!("Enrollment with ID {id} not found.")
            })
        })?;

        tracing::info!(enrollment_id = id, "Enrollment deleted");
        Ok(ApiResponse::ok_empty("Enrollment deleted successfully."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use crate::service::courses::CreateCourse;
    use crate::service::test_support::services;
    use crate::service::users::CreateUser;

    struct Fixture {
        student: i64,
        course: i64,
        other_course: i64,
    }

    async fn fixture(services: &AppServices) -> Fixture {
        let mut ids = Vec::new();
        for (name, role) in [("Grace", Role::Instructor), ("Alan", Role::Student)] {
            let created = services
                .handle(CreateUser {
                    name: name.to_string(),
                    email: format!("{}@example.com", name.to_lowercase()),
                    password: "password123".to_string(),
                    role,
                })
                .await
                .unwrap();
            ids.push(created.data.unwrap().id);
        }

        let mut courses = Vec::new();
        for title in ["Rust", "Go"] {
            let created = services
                .handle(CreateCourse {
                    title: title.to_string(),
                    description: String::new(),
                    instructor_id: ids[0],
                })
                .await
                .unwrap();
            courses.push(created.data.unwrap().id);
        }

        Fixture {
            student: ids[1],
            course: courses[0],
            other_course: courses[1],
        }
    }

    #[tokio::test]
    async fn test_enroll_once() {
        let (services, _temp) = services();
        let f = fixture(&services).await;

        let created = services
            .handle(CreateEnrollment {
                user_id: f.student,
                course_id: f.course,
            })
            .await
            .unwrap();
        assert_eq!(created.status_code, 201);

        let err = services
            .handle(CreateEnrollment {
                user_id: f.student,
                course_id: f.course,
            })
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::DuplicateEnrollment);
        assert_eq!(err.status_code(), StatusCode::CONFLICT);

        let all = services.handle(ListEnrollments).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].user_name, "Alan");
        assert_eq!(all[0].course_title, "Rust");
    }

    #[tokio::test]
    async fn test_missing_parties() {
        let (services, _temp) = services();
        let f = fixture(&services).await;

        let err = services
            .handle(CreateEnrollment {
                user_id: 999,
                course_id: f.course,
            })
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::UserNotFound);

        let err = services
            .handle(CreateEnrollment {
                user_id: f.student,
                course_id: 999,
            })
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::CourseNotFound);
    }

    #[tokio::test]
    async fn test_move_enrollment() {
        let (services, _temp) = services();
        let f = fixture(&services).await;
        let id = services
            .handle(CreateEnrollment {
                user_id: f.student,
                course_id: f.course,
            })
            .await
            .unwrap()
            .data
            .unwrap()
            .id;

        let moved = services
            .handle(UpdateEnrollment {
                id,
                user_id: f.student,
                course_id: f.other_course,
            })
            .await
            .unwrap();
        assert_eq!(moved.data.unwrap().course_title, "Go");

        // Re-saving the same pair is not a duplicate.
        services
            .handle(UpdateEnrollment {
                id,
                user_id: f.student,
                course_id: f.other_course,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_enrollment() {
        let (services, _temp) = services();
        let f = fixture(&services).await;
        let id = services
            .handle(CreateEnrollment {
                user_id: f.student,
                course_id: f.course,
            })
            .await
            .unwrap()
            .data
            .unwrap()
            .id;

        services.handle(DeleteEnrollment { id }).await.unwrap();
        assert!(services.handle(GetEnrollmentById { id }).await.unwrap().is_none());

        let err = services.handle(DeleteEnrollment { id }).await.unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::EnrollmentNotFound);
    }
}
