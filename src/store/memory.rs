use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use super::{ReportStore, StoreError, StoreResult, StoreTx};
use crate::models::{
    AttendanceRecord, Course, Cycle, Enrollment, EnrollmentStatus, GradeRecord, Period, Report,
    ReportFilter, Student,
};

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub cycles: Vec<Cycle>,
    pub periods: Vec<Period>,
    pub courses: Vec<Course>,
    pub students: Vec<Student>,
    pub grades: Vec<GradeRecord>,
    pub attendance: Vec<AttendanceRecord>,
    pub enrollments: Vec<Enrollment>,
    pub reports: Vec<Report>,
}

/// Where an injected write failure should surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailPoint {
    #[default]
    Never,
    Insert,
    Commit,
}

/// In-memory store. Reports inserted through a transaction stay invisible
/// until it commits.
#[derive(Default)]
pub struct MemoryStore {
    data: Arc<Mutex<Dataset>>,
    fail_point: Mutex<FailPoint>,
}

impl MemoryStore {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            data: Arc::new(Mutex::new(dataset)),
            fail_point: Mutex::new(FailPoint::Never),
        }
    }

    pub fn fail_at(&self, point: FailPoint) {
        *self
            .fail_point
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = point;
    }

    pub fn committed_reports(&self) -> Vec<Report> {
        lock(&self.data).reports.clone()
    }
}

/// Mirrors the `REFERENCES` constraints on `academic_reports.reports`.
fn foreign_key(table: &str, id: Uuid) -> StoreError {
    StoreError::Database(format!("report references unknown {table} {id}"))
}

fn lock(data: &Mutex<Dataset>) -> MutexGuard<'_, Dataset> {
    data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let fail_point = *self
            .fail_point
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        Ok(Box::new(MemoryTx {
            data: self.data.clone(),
            pending: Vec::new(),
            fail_point,
        }))
    }

    async fn reports(&self, filter: ReportFilter) -> StoreResult<Vec<Report>> {
        let mut reports: Vec<Report> = lock(&self.data)
            .reports
            .iter()
            .filter(|report| match filter {
                ReportFilter::Cycle(id) => report.cycle_id == id,
                ReportFilter::Period(id) => report.period_id == Some(id),
            })
            .cloned()
            .collect();
        reports.sort_by(|a, b| b.generated_at.cmp(&a.generated_at));
        Ok(reports)
    }
}

struct MemoryTx {
    data: Arc<Mutex<Dataset>>,
    pending: Vec<Report>,
    fail_point: FailPoint,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn cycle(&mut self, id: Uuid) -> StoreResult<Option<Cycle>> {
        Ok(lock(&self.data).cycles.iter().find(|c| c.id == id).cloned())
    }

    async fn period(&mut self, id: Uuid) -> StoreResult<Option<Period>> {
        Ok(lock(&self.data).periods.iter().find(|p| p.id == id).cloned())
    }

    async fn periods_in_cycle(&mut self, cycle_id: Uuid) -> StoreResult<Vec<Period>> {
        let mut periods: Vec<Period> = lock(&self.data)
            .periods
            .iter()
            .filter(|p| p.cycle_id == cycle_id)
            .cloned()
            .collect();
        periods.sort_by_key(|p| p.period_number);
        Ok(periods)
    }

    async fn course(&mut self, id: Uuid) -> StoreResult<Option<Course>> {
        Ok(lock(&self.data).courses.iter().find(|c| c.id == id).cloned())
    }

    async fn student(&mut self, id: Uuid) -> StoreResult<Option<Student>> {
        Ok(lock(&self.data).students.iter().find(|s| s.id == id).cloned())
    }

    async fn grades_for_period(
        &mut self,
        period_id: Uuid,
        student_id: Option<Uuid>,
    ) -> StoreResult<Vec<GradeRecord>> {
        Ok(lock(&self.data)
            .grades
            .iter()
            .filter(|g| g.period_id == period_id)
            .filter(|g| student_id.is_none_or(|id| g.student_id == id))
            .cloned()
            .collect())
    }

    async fn attendance_for_period(
        &mut self,
        period_id: Uuid,
        course_id: Option<Uuid>,
    ) -> StoreResult<Vec<AttendanceRecord>> {
        let data = lock(&self.data);
        let in_course = |student_id: Uuid| match course_id {
            None => true,
            Some(course_id) => data
                .enrollments
                .iter()
                .any(|e| e.student_id == student_id && e.course_id == Some(course_id)),
        };

        Ok(data
            .attendance
            .iter()
            .filter(|a| a.period_id == period_id && in_course(a.student_id))
            .cloned()
            .collect())
    }

    async fn enrollment(
        &mut self,
        student_id: Uuid,
        cycle_id: Uuid,
    ) -> StoreResult<Option<Enrollment>> {
        Ok(lock(&self.data)
            .enrollments
            .iter()
            .find(|e| e.student_id == student_id && e.cycle_id == cycle_id)
            .cloned())
    }

    async fn finalized_enrollments(&mut self, cycle_id: Uuid) -> StoreResult<Vec<Enrollment>> {
        Ok(lock(&self.data)
            .enrollments
            .iter()
            .filter(|e| e.cycle_id == cycle_id && e.status == EnrollmentStatus::Finalized)
            .cloned()
            .collect())
    }

    async fn insert_report(&mut self, report: &Report) -> StoreResult<()> {
        if self.fail_point == FailPoint::Insert {
            return Err(StoreError::Database("insert rejected".to_string()));
        }

        {
            let data = lock(&self.data);
            if !data.cycles.iter().any(|c| c.id == report.cycle_id) {
                return Err(foreign_key("cycle", report.cycle_id));
            }
            if let Some(id) = report.period_id {
                if !data.periods.iter().any(|p| p.id == id) {
                    return Err(foreign_key("period", id));
                }
            }
            if let Some(id) = report.course_id {
                if !data.courses.iter().any(|c| c.id == id) {
                    return Err(foreign_key("course", id));
                }
            }
        }

        self.pending.push(report.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        if self.fail_point == FailPoint::Commit {
            return Err(StoreError::Database("commit rejected".to_string()));
        }
        let MemoryTx { data, pending, .. } = *self;
        lock(&data).reports.extend(pending);
        Ok(())
    }
}
