use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::aggregate::{self, PeriodActivity};
use crate::error::ReportError;
use crate::models::{FileFormat, PeriodReportType, Report, ReportFilter, ReportKind};
use crate::notify::NotificationDispatcher;
use crate::store::ReportStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportRequest {
    Period {
        period_id: Uuid,
        report_type: PeriodReportType,
    },
    Certificate {
        student_id: Uuid,
        cycle_id: Uuid,
    },
    Attendance {
        period_id: Uuid,
        course_id: Option<Uuid>,
    },
    Promotion {
        cycle_id: Uuid,
    },
    CycleStatistics {
        cycle_id: Uuid,
    },
}

impl ReportRequest {
    fn label(&self) -> String {
        match self {
            ReportRequest::Period { period_id, .. } => format!("period report for {period_id}"),
            ReportRequest::Certificate {
                student_id,
                cycle_id,
            } => format!("certificate for student {student_id} in cycle {cycle_id}"),
            ReportRequest::Attendance { period_id, .. } => {
                format!("attendance report for {period_id}")
            }
            ReportRequest::Promotion { cycle_id } => format!("promotion report for {cycle_id}"),
            ReportRequest::CycleStatistics { cycle_id } => {
                format!("cycle statistics for {cycle_id}")
            }
        }
    }
}

pub struct ReportService {
    store: Arc<dyn ReportStore>,
    notifications: Option<NotificationDispatcher>,
}

impl ReportService {
    pub fn new(store: Arc<dyn ReportStore>) -> Self {
        Self {
            store,
            notifications: None,
        }
    }

    pub fn with_notifications(mut self, dispatcher: NotificationDispatcher) -> Self {
        self.notifications = Some(dispatcher);
        self
    }

    /// Runs one report pipeline. On success exactly one report has been
    /// committed; on error nothing has been written.
    pub async fn generate(&self, request: ReportRequest) -> Result<Report, ReportError> {
        let label = request.label();
        debug!("Generating {}", label);

        let outcome = match request {
            ReportRequest::Period {
                period_id,
                report_type,
            } => self.period_report(period_id, report_type).await,
            ReportRequest::Certificate {
                student_id,
                cycle_id,
            } => self.student_certificate(student_id, cycle_id).await,
            ReportRequest::Attendance {
                period_id,
                course_id,
            } => self.attendance_report(period_id, course_id).await,
            ReportRequest::Promotion { cycle_id } => self.promotion_report(cycle_id).await,
            ReportRequest::CycleStatistics { cycle_id } => self.cycle_statistics(cycle_id).await,
        };

        match &outcome {
            Ok(report) => {
                info!(
                    report_id = %report.id,
                    kind = report.kind.as_str(),
                    "Generated {}",
                    label
                );
                if let Some(dispatcher) = &self.notifications {
                    dispatcher.report_generated(report);
                }
            }
            Err(err @ ReportError::Persistence(_)) => error!("Failed to generate {}: {}", label, err),
            Err(err) => warn!("Skipped {}: {}", label, err),
        }

        outcome
    }

    pub async fn list_reports(&self, filter: ReportFilter) -> Result<Vec<Report>, ReportError> {
        Ok(self.store.reports(filter).await?)
    }

    async fn period_report(
        &self,
        period_id: Uuid,
        report_type: PeriodReportType,
    ) -> Result<Report, ReportError> {
        let mut tx = self.store.begin().await?;

        let period = tx
            .period(period_id)
            .await?
            .ok_or_else(|| ReportError::NotFound(format!("period {period_id}")))?;

        let grades = tx.grades_for_period(period.id, None).await?;
        if grades.is_empty() {
            return Err(ReportError::NoData(format!(
                "no grades recorded for {}",
                period.name
            )));
        }

        let payload = aggregate::period_grades(&period, &grades);
        let overall = payload.overall;

        let report = Report {
            period_id: Some(period.id),
            overall_mean: Some(overall.mean),
            highest: Some(overall.max),
            lowest: Some(overall.min),
            ..Report::new(
                report_type.kind(),
                period.cycle_id,
                report_type.title(&period.name),
                to_payload(&payload)?,
            )
        };

        tx.insert_report(&report).await?;
        tx.commit().await?;
        Ok(report)
    }

    async fn student_certificate(
        &self,
        student_id: Uuid,
        cycle_id: Uuid,
    ) -> Result<Report, ReportError> {
        let mut tx = self.store.begin().await?;

        let student = tx
            .student(student_id)
            .await?
            .ok_or_else(|| ReportError::NotFound(format!("student {student_id}")))?;
        let cycle = tx
            .cycle(cycle_id)
            .await?
            .ok_or_else(|| ReportError::NotFound(format!("cycle {cycle_id}")))?;
        let enrollment = tx.enrollment(student.id, cycle.id).await?.ok_or_else(|| {
            ReportError::NotFound(format!(
                "enrollment of {} in {}",
                student.full_name(),
                cycle.name
            ))
        })?;

        let mut periods = Vec::new();
        for period in tx.periods_in_cycle(cycle.id).await? {
            let grades = tx.grades_for_period(period.id, Some(student.id)).await?;
            periods.push((period, grades));
        }

        if periods.iter().all(|(_, grades)| grades.is_empty()) {
            return Err(ReportError::NoData(format!(
                "no grades recorded for {} in {}",
                student.full_name(),
                cycle.name
            )));
        }

        let payload = aggregate::certificate(&student, &cycle, &enrollment, &periods);

        let report = Report {
            course_id: enrollment.course_id,
            overall_mean: Some(enrollment.final_average.unwrap_or(0.0)),
            file_format: Some(FileFormat::Pdf),
            file_name: Some(format!(
                "Certificate_{}_{}_{}.pdf",
                student.first_name, student.last_name, cycle.name
            )),
            ..Report::new(
                ReportKind::PerStudent,
                cycle.id,
                payload.course.clone(),
                to_payload(&payload)?,
            )
        };

        tx.insert_report(&report).await?;
        tx.commit().await?;
        Ok(report)
    }

    async fn attendance_report(
        &self,
        period_id: Uuid,
        course_id: Option<Uuid>,
    ) -> Result<Report, ReportError> {
        let mut tx = self.store.begin().await?;

        let period = tx
            .period(period_id)
            .await?
            .ok_or_else(|| ReportError::NotFound(format!("period {period_id}")))?;

        let course = match course_id {
            Some(id) => tx.course(id).await?,
            None => None,
        };
        let course_name = match (&course, course_id) {
            (Some(course), _) => course.name.clone(),
            (None, Some(_)) => "N/A".to_string(),
            (None, None) => "All courses".to_string(),
        };

        let records = tx.attendance_for_period(period.id, course_id).await?;
        let payload = aggregate::attendance(&period, &course_name, &records);

        let report = Report {
            period_id: Some(period.id),
            course_id: course.map(|course| course.id),
            file_format: Some(FileFormat::Excel),
            file_name: Some(format!("Attendance_{}_{}.xlsx", period.name, course_name)),
            ..Report::new(
                ReportKind::Attendance,
                period.cycle_id,
                course_name,
                to_payload(&payload)?,
            )
        };

        tx.insert_report(&report).await?;
        tx.commit().await?;
        Ok(report)
    }

    async fn promotion_report(&self, cycle_id: Uuid) -> Result<Report, ReportError> {
        let mut tx = self.store.begin().await?;

        let cycle = tx
            .cycle(cycle_id)
            .await?
            .ok_or_else(|| ReportError::NotFound(format!("cycle {cycle_id}")))?;

        let enrollments = tx.finalized_enrollments(cycle.id).await?;
        let payload = aggregate::promotion(&cycle, &enrollments);

        let report = Report {
            overall_mean: Some(payload.statistics.pass_rate),
            file_format: Some(FileFormat::Excel),
            file_name: Some(format!("Promotion_Report_{}.xlsx", cycle.name)),
            ..Report::new(
                ReportKind::Promotion,
                cycle.id,
                "General promotion report".to_string(),
                to_payload(&payload)?,
            )
        };

        tx.insert_report(&report).await?;
        tx.commit().await?;
        Ok(report)
    }

    async fn cycle_statistics(&self, cycle_id: Uuid) -> Result<Report, ReportError> {
        let mut tx = self.store.begin().await?;

        let cycle = tx
            .cycle(cycle_id)
            .await?
            .ok_or_else(|| ReportError::NotFound(format!("cycle {cycle_id}")))?;

        let mut periods = Vec::new();
        for period in tx.periods_in_cycle(cycle.id).await? {
            let grades = tx.grades_for_period(period.id, None).await?;
            let attendance = tx.attendance_for_period(period.id, None).await?;
            periods.push(PeriodActivity {
                period,
                grades,
                attendance,
            });
        }

        let payload = aggregate::cycle_statistics(&cycle, &periods);
        let summary = payload.grades.summary;

        let report = Report {
            overall_mean: Some(summary.mean),
            highest: Some(summary.max),
            lowest: Some(summary.min),
            file_format: Some(FileFormat::Excel),
            file_name: Some(format!("Statistics_{}.xlsx", cycle.name)),
            ..Report::new(
                ReportKind::General,
                cycle.id,
                "General cycle statistics".to_string(),
                to_payload(&payload)?,
            )
        };

        tx.insert_report(&report).await?;
        tx.commit().await?;
        Ok(report)
    }
}

fn to_payload<T: Serialize>(payload: &T) -> Result<serde_json::Value, ReportError> {
    Ok(serde_json::to_value(payload)?)
}
