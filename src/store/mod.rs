//! Data-store seam for report generation.
//!
//! A report run opens one [`StoreTx`], performs all of its reads and its single
//! report insert on it, and commits. Dropping the transaction without calling
//! [`StoreTx::commit`] rolls it back.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    AttendanceRecord, Course, Cycle, Enrollment, GradeRecord, Period, Report, ReportFilter,
    Student,
};

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PgStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Invalid stored value: {0}")]
    Decode(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>>;

    /// Persisted reports for a cycle or period, newest first.
    async fn reports(&self, filter: ReportFilter) -> StoreResult<Vec<Report>>;
}

#[async_trait]
pub trait StoreTx: Send {
    async fn cycle(&mut self, id: Uuid) -> StoreResult<Option<Cycle>>;

    async fn period(&mut self, id: Uuid) -> StoreResult<Option<Period>>;

    /// Periods of a cycle ordered by period number.
    async fn periods_in_cycle(&mut self, cycle_id: Uuid) -> StoreResult<Vec<Period>>;

    async fn course(&mut self, id: Uuid) -> StoreResult<Option<Course>>;

    async fn student(&mut self, id: Uuid) -> StoreResult<Option<Student>>;

    /// Grade rows of a period in recording order, optionally for one student.
    async fn grades_for_period(
        &mut self,
        period_id: Uuid,
        student_id: Option<Uuid>,
    ) -> StoreResult<Vec<GradeRecord>>;

    /// Attendance rows of a period in recording order, optionally restricted to
    /// students enrolled in a course.
    async fn attendance_for_period(
        &mut self,
        period_id: Uuid,
        course_id: Option<Uuid>,
    ) -> StoreResult<Vec<AttendanceRecord>>;

    async fn enrollment(
        &mut self,
        student_id: Uuid,
        cycle_id: Uuid,
    ) -> StoreResult<Option<Enrollment>>;

    async fn finalized_enrollments(&mut self, cycle_id: Uuid) -> StoreResult<Vec<Enrollment>>;

    async fn insert_report(&mut self, report: &Report) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}
