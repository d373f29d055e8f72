//! Course commands and queries.
//!
//! Single-course and paged reads are cached; every course mutation drops the
//! course's own key and the whole `courses:` family.

use async_trait::async_trait;
use axum::http::StatusCode;
use chrono::Utc;
use serde::Deserialize;
use validator::Validate;

use super::{AppServices, conflict_as, missing_as};
use crate::domain::{ApiResponse, Course, CourseDto, CreatedId, PageRequest, Paged, PaginationParams};
use crate::error::{AppError, ErrorCode, Result};
use crate::pipeline::{Request, RequestHandler};
use crate::storage::{Change, Table};

/// Prefix shared by every list and page key.
const COURSES_PREFIX: &str = "courses:";

fn course_key(id: i64) -> String {
    format!("course:{id}")
}

fn page_key(page: &PageRequest) -> String {
    format!(
        "{COURSES_PREFIX}page:{}:{}:{}",
        page.page_number,
        page.page_size,
        page.search_term.as_deref().unwrap_or_default().to_lowercase()
    )
}

/// All courses, ordered by id.
pub struct ListCourses;

impl Request for ListCourses {
    type Response = Vec<CourseDto>;
    const NAME: &'static str = "ListCourses";
}

/// One page of courses, optionally filtered by title or description.
pub struct PageCourses(pub PaginationParams);

impl Request for PageCourses {
    type Response = Paged<CourseDto>;
    const NAME: &'static str = "PageCourses";
}

/// A single course; absent when the id is unknown.
pub struct GetCourseById {
    /// Course id.
    pub id: i64,
}

impl Request for GetCourseById {
    type Response = Option<CourseDto>;
    const NAME: &'static str = "GetCourseById";

    fn validate_request(&self) -> Result<()> {
        positive_id(self.id)
    }
}

/// Create a course taught by an existing user.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCourse {
    /// Course title.
    #[validate(length(min = 1, max = 150, message = "Title is required and must not exceed 150 characters."))]
    pub title: String,

    /// Course description.
    #[serde(default)]
    #[validate(length(max = 500, message = "Description must not exceed 500 characters."))]
    pub description: String,

    /// Teaching user.
    #[validate(range(min = 1, message = "Instructor ID must be greater than zero."))]
    pub instructor_id: i64,
}

impl Request for CreateCourse {
    type Response = ApiResponse<CreatedId>;
    const NAME: &'static str = "CreateCourse";

    fn validate_request(&self) -> Result<()> {
        self.validate().map_err(AppError::from)
    }
}

/// Replace a course.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCourse {
    /// Course id; must match the route.
    #[serde(default)]
    #[validate(range(min = 1, message = "Invalid course ID."))]
    pub id: i64,

    /// Course title.
    #[validate(length(min = 1, max = 150, message = "Title is required and must not exceed 150 characters."))]
    pub title: String,

    /// Course description.
    #[serde(default)]
    #[validate(length(max = 500, message = "Description must not exceed 500 characters."))]
    pub description: String,

    /// New instructor; unchanged when absent.
    #[serde(default)]
    #[validate(range(min = 1, message = "Instructor ID must be greater than zero."))]
    pub instructor_id: Option<i64>,
}

impl Request for UpdateCourse {
    type Response = ApiResponse<CourseDto>;
    const NAME: &'static str = "UpdateCourse";

    fn validate_request(&self) -> Result<()> {
        self.validate().map_err(AppError::from)
    }
}

/// Delete a course and its enrollments.
pub struct DeleteCourse {
    /// Course id.
    pub id: i64,
}

impl Request for DeleteCourse {
    type Response = ApiResponse<()>;
    const NAME: &'static str = "DeleteCourse";

    fn validate_request(&self) -> Result<()> {
        positive_id(self.id)
    }
}

fn positive_id(id: i64) -> Result<()> {
    if id <= 0 {
        return Err(AppError::invalid_field("id", "Invalid course ID."));
    }
    Ok(())
}

fn course_not_found(id: i64) -> AppError {
    AppError::application(ErrorCode::CourseNotFound, format!("Course with ID {id} not found."))
}

fn instructor_not_found(id: i64) -> AppError {
    AppError::application(
        ErrorCode::InstructorNotFound,
        format!("Instructor with ID {id} not found."),
    )
}

impl AppServices {
    fn invalidate_course(&self, id: i64) {
        self.cache.remove(&course_key(id));
        let dropped = self.cache.remove_by_prefix(COURSES_PREFIX);
        tracing::debug!(course_id = id, dropped, "Course cache invalidated");
    }

    async fn ensure_instructor(&self, id: i64) -> Result<()> {
        if self.storage.get_user(id).await?.is_none() {
            return Err(instructor_not_found(id));
        }
        Ok(())
    }
}

#[async_trait]
impl RequestHandler<ListCourses> for AppServices {
    async fn handle(&self, _request: ListCourses) -> Result<Vec<CourseDto>> {
        let key = format!("{COURSES_PREFIX}all");
        if let Some(cached) = self.cache.get::<Vec<CourseDto>>(&key) {
            return Ok(cached);
        }

        let courses = self.storage.list_courses().await?;
        let dtos: Vec<CourseDto> = courses.iter().map(CourseDto::from).collect();
        self.cache.set(&key, &dtos, None);
        Ok(dtos)
    }
}

#[async_trait]
impl RequestHandler<PageCourses> for AppServices {
    async fn handle(&self, request: PageCourses) -> Result<Paged<CourseDto>> {
        let page = request.0.resolve(&self.pagination)?;
        let key = page_key(&page);
        if let Some(cached) = self.cache.get::<Paged<CourseDto>>(&key) {
            tracing::debug!(key = %key, "Course page served from cache");
            return Ok(cached);
        }

        let rows = self.storage.page_courses(&page).await?;
        let paged = Paged {
            items: rows.items.iter().map(CourseDto::from).collect(),
            pagination: page.metadata(rows.total)?,
        };
        self.cache.set(&key, &paged, None);
        Ok(paged)
    }
}

#[async_trait]
impl RequestHandler<GetCourseById> for AppServices {
    async fn handle(&self, request: GetCourseById) -> Result<Option<CourseDto>> {
        let key = course_key(request.id);
        if let Some(cached) = self.cache.get::<CourseDto>(&key) {
            return Ok(Some(cached));
        }

        let Some(course) = self.storage.get_course(request.id).await? else {
            return Ok(None);
        };

        let dto = CourseDto::from(&course);
        self.cache.set(&key, &dto, None);
        Ok(Some(dto))
    }
}

#[async_trait]
impl RequestHandler<CreateCourse> for AppServices {
    async fn handle(&self, request: CreateCourse) -> Result<ApiResponse<CreatedId>> {
        self.ensure_instructor(request.instructor_id).await?;

        let mut uow = self.uow();
        let id = uow.next_id(Table::Courses).await?;
        let now = Utc::now();
        uow.stage(Change::InsertCourse(Course {
            id,
            title: request.title.trim().to_string(),
            description: request.description.trim().to_string(),
            instructor_id: request.instructor_id,
            created_at: now,
            updated_at: now,
        }));

        // The instructor may be deleted between the check and the commit.
        uow.save().await.map_err(|e| {
            conflict_as(e, ErrorCode::InstructorNotFound, || {
                format!("Instructor with ID {} not found.", request.instructor_id)
            })
        })?;
        self.invalidate_course(id);

        tracing::info!(course_id = id, instructor_id = request.instructor_id, "Course created");
        Ok(ApiResponse::ok_with(
            CreatedId { id },
            "Course created successfully",
            StatusCode::CREATED,
        ))
    }
}

#[async_trait]
impl RequestHandler<UpdateCourse> for AppServices {
    async fn handle(&self, request: UpdateCourse) -> Result<ApiResponse<CourseDto>> {
        let id = request.id;
        let mut uow = self.uow();
        let mut course = uow.get_course(id).await?.ok_or_else(|| course_not_found(id))?;

        if let Some(instructor_id) = request.instructor_id {
            self.ensure_instructor(instructor_id).await?;
            course.instructor_id = instructor_id;
        }
        course.title = request.title.trim().to_string();
        course.description = request.description.trim().to_string();
        course.updated_at = Utc::now();

        let dto = CourseDto::from(&course);
        uow.stage(Change::UpdateCourse(course));
        uow.save().await.map_err(|e| {
            missing_as(e, ErrorCode::CourseNotFound, || {
                format!("Course with ID {id} not found.")
            })
        })?;
        self.invalidate_course(id);

        tracing::info!(course_id = id, "Course updated");
        Ok(ApiResponse::ok_with(
            dto,
            "Course updated successfully.",
            StatusCode::OK,
        ))
    }
}

#[async_trait]
impl RequestHandler<DeleteCourse> for AppServices {
    async fn handle(&self, request: DeleteCourse) -> Result<ApiResponse<()>> {
        let id = request.id;
        let mut uow = self.uow();
        if uow.get_course(id).await?.is_none() {
            return Err(course_not_found(id));
        }

        uow.stage(Change::DeleteCourse(id));
        uow.save().await.map_err(|e| {
            missing_as(e, ErrorCode::CourseNotFound, || {
                format!("Course with ID {id} not found.")
            })
        })?;
        self.invalidate_course(id);

        tracing::info!(course_id = id, "Course deleted");
        Ok(ApiResponse::ok_empty("Course deleted successfully."))
    }
}
