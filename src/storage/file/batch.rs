//! In-memory application of a change batch.
//!
//! The whole batch is checked against a snapshot of the tables first; files
//! are only touched once every change has been accepted.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{Course, Enrollment, User};
use crate::error::{StorageError, StorageResult};
use crate::storage::traits::{Change, Table};

/// Snapshot of all tables plus the rows a batch touched.
#[derive(Debug, Default)]
pub struct Snapshot {
    /// Users by id.
    pub users: BTreeMap<i64, User>,
    /// Courses by id.
    pub courses: BTreeMap<i64, Course>,
    /// Enrollments by id.
    pub enrollments: BTreeMap<i64, Enrollment>,
    dirty: BTreeSet<(Table, i64)>,
}

impl Snapshot {
    /// Build a snapshot from loaded rows.
    pub fn new(users: Vec<User>, courses: Vec<Course>, enrollments: Vec<Enrollment>) -> Self {
        Self {
            users: users.into_iter().map(|u| (u.id, u)).collect(),
            courses: courses.into_iter().map(|c| (c.id, c)).collect(),
            enrollments: enrollments.into_iter().map(|e| (e.id, e)).collect(),
            dirty: BTreeSet::new(),
        }
    }

    /// Rows written or removed by the applied changes.
    pub fn dirty(&self) -> impl Iterator<Item = (Table, i64)> + '_ {
        self.dirty.iter().copied()
    }

    /// Apply one change, enforcing uniqueness and references.
    pub fn apply(&mut self, change: Change) -> StorageResult<()> {
        match change {
            Change::InsertUser(user) => {
                Self::ensure_absent(Table::Users, self.users.contains_key(&user.id), user.id)?;
                self.ensure_email_free(&user.email, user.id)?;
                self.put_user(user);
            }
            Change::UpdateUser(user) => {
                Self::ensure_present(Table::Users, self.users.contains_key(&user.id), user.id)?;
                self.ensure_email_free(&user.email, user.id)?;
                self.put_user(user);
            }
            Change::DeleteUser(id) => {
                Self::ensure_present(Table::Users, self.users.contains_key(&id), id)?;
                let taught: Vec<i64> = self
                    .courses
                    .values()
                    .filter(|c| c.instructor_id == id)
                    .map(|c| c.id)
                    .collect();
                for course_id in taught {
                    self.remove_course(course_id);
                }
                self.remove_enrollments_where(|e| e.user_id == id);
                self.users.remove(&id);
                self.dirty.insert((Table::Users, id));
            }
            Change::InsertCourse(course) => {
                Self::ensure_absent(Table::Courses, self.courses.contains_key(&course.id), course.id)?;
                self.ensure_user_exists(course.instructor_id)?;
                self.put_course(course);
            }
            Change::UpdateCourse(course) => {
                Self::ensure_present(Table::Courses, self.courses.contains_key(&course.id), course.id)?;
                self.ensure_user_exists(course.instructor_id)?;
                self.put_course(course);
            }
            Change::DeleteCourse(id) => {
                Self::ensure_present(Table::Courses, self.courses.contains_key(&id), id)?;
                self.remove_course(id);
            }
            Change::InsertEnrollment(enrollment) => {
                Self::ensure_absent(
                    Table::Enrollments,
                    self.enrollments.contains_key(&enrollment.id),
                    enrollment.id,
                )?;
                self.ensure_enrollment_valid(&enrollment)?;
                self.put_enrollment(enrollment);
            }
            Change::UpdateEnrollment(enrollment) => {
                Self::ensure_present(
                    Table::Enrollments,
                    self.enrollments.contains_key(&enrollment.id),
                    enrollment.id,
                )?;
                self.ensure_enrollment_valid(&enrollment)?;
                self.put_enrollment(enrollment);
            }
            Change::DeleteEnrollment(id) => {
                Self::ensure_present(Table::Enrollments, self.enrollments.contains_key(&id), id)?;
                self.enrollments.remove(&id);
                self.dirty.insert((Table::Enrollments, id));
            }
        }
        Ok(())
    }

    fn put_user(&mut self, user: User) {
        self.dirty.insert((Table::Users, user.id));
        self.users.insert(user.id, user);
    }

    fn put_course(&mut self, course: Course) {
        self.dirty.insert((Table::Courses, course.id));
        self.courses.insert(course.id, course);
    }

    fn put_enrollment(&mut self, enrollment: Enrollment) {
        self.dirty.insert((Table::Enrollments, enrollment.id));
        self.enrollments.insert(enrollment.id, enrollment);
    }

    fn remove_course(&mut self, id: i64) {
        self.remove_enrollments_where(|e| e.course_id == id);
        self.courses.remove(&id);
        self.dirty.insert((Table::Courses, id));
    }

    fn remove_enrollments_where(&mut self, predicate: impl Fn(&Enrollment) -> bool) {
        let doomed: Vec<i64> = self
            .enrollments
            .values()
            .filter(|e| predicate(e))
            .map(|e| e.id)
            .collect();
        for id in doomed {
            self.enrollments.remove(&id);
            self.dirty.insert((Table::Enrollments, id));
        }
    }

    fn ensure_absent(table: Table, exists: bool, id: i64) -> StorageResult<()> {
        if exists {
            return Err(StorageError::Conflict(format!("{table} row {id} already exists")));
        }
        Ok(())
    }

    fn ensure_present(table: Table, exists: bool, id: i64) -> StorageResult<()> {
        if !exists {
            return Err(StorageError::NotFound(format!("{table} row {id}")));
        }
        Ok(())
    }

    fn ensure_email_free(&self, email: &str, own_id: i64) -> StorageResult<()> {
        let email = email.to_lowercase();
        let taken = self
            .users
            .values()
            .any(|u| u.id != own_id && u.email.to_lowercase() == email);
        if taken {
            return Err(StorageError::Conflict(format!("email '{email}' already registered")));
        }
        Ok(())
    }

    fn ensure_user_exists(&self, user_id: i64) -> StorageResult<()> {
        if !self.users.contains_key(&user_id) {
            return Err(StorageError::Conflict(format!("user {user_id} does not exist")));
        }
        Ok(())
    }

    fn ensure_enrollment_valid(&self, enrollment: &Enrollment) -> StorageResult<()> {
        self.ensure_user_exists(enrollment.user_id)?;
        if !self.courses.contains_key(&enrollment.course_id) {
            return Err(StorageError::Conflict(format!(
                "course {} does not exist",
                enrollment.course_id
            )));
        }
        let duplicate = self.enrollments.values().any(|e| {
            e.id != enrollment.id
                && e.user_id == enrollment.user_id
                && e.course_id == enrollment.course_id
        });
        if duplicate {
            return Err(StorageError::Conflict(format!(
                "user {} already enrolled in course {}",
                enrollment.user_id, enrollment.course_id
            )));
        }
        Ok(())
    }
}
