use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use super::{ReportStore, StoreError, StoreResult, StoreTx};
use crate::models::{
    AttendanceRecord, AttendanceStatus, Course, Cycle, Enrollment, EnrollmentStatus, FileFormat,
    GradeRecord, Period, PromotionStatus, Report, ReportFilter, ReportKind, ReportStatus, Student,
};

const ENROLLMENT_COLUMNS: &str = "SELECT e.id, e.student_id, \
     COALESCE(st.first_name || ' ' || st.last_name, 'Unknown') AS student_name, \
     COALESCE(st.document_number, 'N/A') AS document_number, \
     e.cycle_id, e.course_id, c.name AS course_name, e.status, e.promotion, \
     e.final_average, e.closing_notes \
     FROM academic_reports.enrollments e \
     LEFT JOIN academic_reports.students st ON st.id = e.student_id \
     LEFT JOIN academic_reports.courses c ON c.id = e.course_id ";

const REPORT_COLUMNS: &str = "SELECT id, kind, cycle_id, period_id, course_id, title, payload, \
     overall_mean, highest, lowest, file_format, file_name, generated_at, status \
     FROM academic_reports.reports ";

const GRADES_QUERY: &str = r#"
    SELECT g.student_id,
           COALESCE(st.first_name || ' ' || st.last_name, 'Unknown') AS student_name,
           g.subject_id,
           COALESCE(sub.name, 'N/A') AS subject_name,
           g.period_id,
           g.value
    FROM academic_reports.grades g
    LEFT JOIN academic_reports.students st ON st.id = g.student_id
    LEFT JOIN academic_reports.subjects sub ON sub.id = g.subject_id
    WHERE g.period_id = $1
      AND ($2::uuid IS NULL OR g.student_id = $2)
    ORDER BY g.seq
    "#;

const ATTENDANCE_QUERY: &str = r#"
    SELECT a.student_id,
           COALESCE(st.first_name || ' ' || st.last_name, 'Unknown') AS student_name,
           a.period_id,
           a.status,
           a.excused
    FROM academic_reports.attendance a
    LEFT JOIN academic_reports.students st ON st.id = a.student_id
    WHERE a.period_id = $1
      AND (
        $2::uuid IS NULL
        OR a.student_id IN (
            SELECT student_id FROM academic_reports.enrollments WHERE course_id = $2
        )
      )
    ORDER BY a.seq
    "#;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReportStore for PgStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgStoreTx { tx }))
    }

    async fn reports(&self, filter: ReportFilter) -> StoreResult<Vec<Report>> {
        let (clause, id) = match filter {
            ReportFilter::Cycle(id) => ("WHERE cycle_id = $1", id),
            ReportFilter::Period(id) => ("WHERE period_id = $1", id),
        };
        let query = format!("{REPORT_COLUMNS}{clause} ORDER BY generated_at DESC");

        let rows = sqlx::query(&query).bind(id).fetch_all(&self.pool).await?;
        rows.iter().map(report_from_row).collect()
    }
}

pub struct PgStoreTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgStoreTx {
    async fn cycle(&mut self, id: Uuid) -> StoreResult<Option<Cycle>> {
        let row = sqlx::query("SELECT id, name FROM academic_reports.cycles WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(|row| -> StoreResult<_> {
            Ok(Cycle {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
            })
        })
        .transpose()
    }

    async fn period(&mut self, id: Uuid) -> StoreResult<Option<Period>> {
        let row = sqlx::query(
            "SELECT id, cycle_id, name, period_number FROM academic_reports.periods WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(period_from_row).transpose()
    }

    async fn periods_in_cycle(&mut self, cycle_id: Uuid) -> StoreResult<Vec<Period>> {
        let rows = sqlx::query(
            r#"
            SELECT id, cycle_id, name, period_number
            FROM academic_reports.periods
            WHERE cycle_id = $1
            ORDER BY period_number
            "#,
        )
        .bind(cycle_id)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter().map(period_from_row).collect()
    }

    async fn course(&mut self, id: Uuid) -> StoreResult<Option<Course>> {
        let row = sqlx::query("SELECT id, name FROM academic_reports.courses WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(|row| -> StoreResult<_> {
            Ok(Course {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
            })
        })
        .transpose()
    }

    async fn student(&mut self, id: Uuid) -> StoreResult<Option<Student>> {
        let row = sqlx::query(
            r#"
            SELECT id, first_name, last_name, document_number
            FROM academic_reports.students
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(|row| -> StoreResult<_> {
            Ok(Student {
                id: row.try_get("id")?,
                first_name: row.try_get("first_name")?,
                last_name: row.try_get("last_name")?,
                document_number: row.try_get("document_number")?,
            })
        })
        .transpose()
    }

    async fn grades_for_period(
        &mut self,
        period_id: Uuid,
        student_id: Option<Uuid>,
    ) -> StoreResult<Vec<GradeRecord>> {
        let rows = sqlx::query(GRADES_QUERY)
            .bind(period_id)
            .bind(student_id)
            .fetch_all(&mut *self.tx)
            .await?;

        let mut grades = Vec::with_capacity(rows.len());
        for row in rows {
            grades.push(GradeRecord {
                student_id: row.try_get("student_id")?,
                student_name: row.try_get("student_name")?,
                subject_id: row.try_get("subject_id")?,
                subject_name: row.try_get("subject_name")?,
                period_id: row.try_get("period_id")?,
                value: row.try_get("value")?,
            });
        }

        Ok(grades)
    }

    async fn attendance_for_period(
        &mut self,
        period_id: Uuid,
        course_id: Option<Uuid>,
    ) -> StoreResult<Vec<AttendanceRecord>> {
        let rows = sqlx::query(ATTENDANCE_QUERY)
            .bind(period_id)
            .bind(course_id)
            .fetch_all(&mut *self.tx)
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let status: String = row.try_get("status")?;
            records.push(AttendanceRecord {
                student_id: row.try_get("student_id")?,
                student_name: row.try_get("student_name")?,
                period_id: row.try_get("period_id")?,
                status: AttendanceStatus::parse(&status).ok_or_else(|| {
                    StoreError::Decode(format!("unknown attendance status {status}"))
                })?,
                excused: row.try_get("excused")?,
            });
        }

        Ok(records)
    }

    async fn enrollment(
        &mut self,
        student_id: Uuid,
        cycle_id: Uuid,
    ) -> StoreResult<Option<Enrollment>> {
        let query = format!("{ENROLLMENT_COLUMNS}WHERE e.student_id = $1 AND e.cycle_id = $2");
        let row = sqlx::query(&query)
            .bind(student_id)
            .bind(cycle_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        row.as_ref().map(enrollment_from_row).transpose()
    }

    async fn finalized_enrollments(&mut self, cycle_id: Uuid) -> StoreResult<Vec<Enrollment>> {
        let query = format!(
            "{ENROLLMENT_COLUMNS}WHERE e.cycle_id = $1 AND e.status = 'finalized' \
             ORDER BY c.name NULLS LAST, st.last_name, st.first_name, e.id"
        );
        let rows = sqlx::query(&query)
            .bind(cycle_id)
            .fetch_all(&mut *self.tx)
            .await?;

        rows.iter().map(enrollment_from_row).collect()
    }

    async fn insert_report(&mut self, report: &Report) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO academic_reports.reports
            (id, kind, cycle_id, period_id, course_id, title, payload, overall_mean,
             highest, lowest, file_format, file_name, generated_at, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(report.id)
        .bind(report.kind.as_str())
        .bind(report.cycle_id)
        .bind(report.period_id)
        .bind(report.course_id)
        .bind(&report.title)
        .bind(&report.payload)
        .bind(report.overall_mean)
        .bind(report.highest)
        .bind(report.lowest)
        .bind(report.file_format.map(|format| format.as_str()))
        .bind(&report.file_name)
        .bind(report.generated_at)
        .bind(report.status.as_str())
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let PgStoreTx { tx } = *self;
        tx.commit().await?;
        Ok(())
    }
}

fn period_from_row(row: &PgRow) -> StoreResult<Period> {
    Ok(Period {
        id: row.try_get("id")?,
        cycle_id: row.try_get("cycle_id")?,
        name: row.try_get("name")?,
        period_number: row.try_get("period_number")?,
    })
}

fn enrollment_from_row(row: &PgRow) -> StoreResult<Enrollment> {
    let status: String = row.try_get("status")?;
    let promotion: Option<String> = row.try_get("promotion")?;

    Ok(Enrollment {
        id: row.try_get("id")?,
        student_id: row.try_get("student_id")?,
        student_name: row.try_get("student_name")?,
        document_number: row.try_get("document_number")?,
        cycle_id: row.try_get("cycle_id")?,
        course_id: row.try_get("course_id")?,
        course_name: row.try_get("course_name")?,
        status: EnrollmentStatus::parse(&status)
            .ok_or_else(|| StoreError::Decode(format!("unknown enrollment status {status}")))?,
        promotion: promotion
            .map(|value| {
                PromotionStatus::parse(&value)
                    .ok_or_else(|| StoreError::Decode(format!("unknown promotion status {value}")))
            })
            .transpose()?,
        final_average: row.try_get("final_average")?,
        closing_notes: row.try_get("closing_notes")?,
    })
}

fn report_from_row(row: &PgRow) -> StoreResult<Report> {
    let kind: String = row.try_get("kind")?;
    let status: String = row.try_get("status")?;
    let file_format: Option<String> = row.try_get("file_format")?;

    Ok(Report {
        id: row.try_get("id")?,
        kind: ReportKind::parse(&kind)
            .ok_or_else(|| StoreError::Decode(format!("unknown report kind {kind}")))?,
        cycle_id: row.try_get("cycle_id")?,
        period_id: row.try_get("period_id")?,
        course_id: row.try_get("course_id")?,
        title: row.try_get("title")?,
        payload: row.try_get("payload")?,
        overall_mean: row.try_get("overall_mean")?,
        highest: row.try_get("highest")?,
        lowest: row.try_get("lowest")?,
        file_format: file_format
            .map(|value| {
                FileFormat::parse(&value)
                    .ok_or_else(|| StoreError::Decode(format!("unknown file format {value}")))
            })
            .transpose()?,
        file_name: row.try_get("file_name")?,
        generated_at: row.try_get("generated_at")?,
        status: ReportStatus::parse(&status)
            .ok_or_else(|| StoreError::Decode(format!("unknown report status {status}")))?,
    })
}
