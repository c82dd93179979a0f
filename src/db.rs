use anyhow::Context;
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::models::AttendanceStatus;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

const CYCLE_2026: u128 = 0x6a1f_3c2e_9b41_4d0a_8e57_0c3d_2026_0001;
const PERIOD_1: u128 = 0x6a1f_3c2e_9b41_4d0a_8e57_0c3d_2026_0101;
const PERIOD_2: u128 = 0x6a1f_3c2e_9b41_4d0a_8e57_0c3d_2026_0102;
const COURSE_10A: u128 = 0x3f0e_77b5_12c4_4a9e_a1d6_5b0c_0000_010a;
const COURSE_10B: u128 = 0x3f0e_77b5_12c4_4a9e_a1d6_5b0c_0000_010b;
const MATHEMATICS: u128 = 0x51b7_0d2a_6c8e_4f13_9a02_7e44_0000_0001;
const SCIENCE: u128 = 0x51b7_0d2a_6c8e_4f13_9a02_7e44_0000_0002;

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let mut tx = pool.begin().await?;
    let cycle_id = Uuid::from_u128(CYCLE_2026);

    sqlx::query(
        r#"
        INSERT INTO academic_reports.cycles (id, name)
        VALUES ($1, $2)
        ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name
        "#,
    )
    .bind(cycle_id)
    .bind("2026")
    .execute(&mut *tx)
    .await?;

    for (id, name, number) in [(PERIOD_1, "Period 1", 1), (PERIOD_2, "Period 2", 2)] {
        sqlx::query(
            r#"
            INSERT INTO academic_reports.periods (id, cycle_id, name, period_number)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name, period_number = EXCLUDED.period_number
            "#,
        )
        .bind(Uuid::from_u128(id))
        .bind(cycle_id)
        .bind(name)
        .bind(number)
        .execute(&mut *tx)
        .await?;
    }

    for (table, rows) in [
        ("courses", [(COURSE_10A, "Grade 10-A"), (COURSE_10B, "Grade 10-B")]),
        ("subjects", [(MATHEMATICS, "Mathematics"), (SCIENCE, "Science")]),
    ] {
        for (id, name) in rows {
            let query = format!(
                "INSERT INTO academic_reports.{table} (id, name) VALUES ($1, $2) \
                 ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name"
            );
            sqlx::query(&query)
                .bind(Uuid::from_u128(id))
                .bind(name)
                .execute(&mut *tx)
                .await?;
        }
    }

    let students = vec![
        (
            "Avery Lee",
            "1001",
            COURSE_10A,
            "approved",
            84.5,
            "Consistent progress",
        ),
        ("Jules Moreno", "1002", COURSE_10A, "failed", 58.0, "Repeat mathematics"),
        ("Kiara Patel", "1003", COURSE_10B, "graduated", 91.25, "Honours"),
    ];

    let mut student_ids = Vec::new();
    for (full_name, document, course, promotion, final_average, notes) in students {
        let student_id = upsert_student(&mut tx, full_name, document).await?;
        sqlx::query(
            r#"
            INSERT INTO academic_reports.enrollments
            (id, student_id, cycle_id, course_id, status, promotion, final_average, closing_notes)
            VALUES ($1, $2, $3, $4, 'finalized', $5, $6, $7)
            ON CONFLICT (student_id, cycle_id) DO UPDATE
            SET course_id = EXCLUDED.course_id,
                status = EXCLUDED.status,
                promotion = EXCLUDED.promotion,
                final_average = EXCLUDED.final_average,
                closing_notes = EXCLUDED.closing_notes
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(cycle_id)
        .bind(Uuid::from_u128(course))
        .bind(promotion)
        .bind(final_average)
        .bind(notes)
        .execute(&mut *tx)
        .await?;
        student_ids.push(student_id);
    }

    let grades = [
        ("seed-g-001", 0, MATHEMATICS, PERIOD_1, Some(80.0)),
        ("seed-g-002", 0, MATHEMATICS, PERIOD_1, Some(90.0)),
        ("seed-g-003", 1, MATHEMATICS, PERIOD_1, Some(70.0)),
        ("seed-g-004", 2, SCIENCE, PERIOD_1, None),
        ("seed-g-005", 0, SCIENCE, PERIOD_2, Some(88.0)),
        ("seed-g-006", 1, SCIENCE, PERIOD_2, Some(61.5)),
        ("seed-g-007", 2, MATHEMATICS, PERIOD_2, Some(95.0)),
    ];

    for (source_key, student, subject, period, value) in grades {
        sqlx::query(
            r#"
            INSERT INTO academic_reports.grades
            (id, student_id, subject_id, period_id, value, source_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_ids[student])
        .bind(Uuid::from_u128(subject))
        .bind(Uuid::from_u128(period))
        .bind(value)
        .bind(source_key)
        .execute(&mut *tx)
        .await?;
    }

    let first_day = NaiveDate::from_ymd_opt(2026, 2, 2).context("invalid date")?;
    let avery_days = [
        "present", "present", "absent", "present", "present", "late", "present", "present",
        "absent", "present",
    ];
    let mut attendance: Vec<(usize, &str, bool)> =
        avery_days.iter().map(|status| (0, *status, false)).collect();
    attendance.push((1, "absent", true));
    attendance.push((1, "present", false));
    attendance.push((2, "present", false));

    for (day, (student, status, excused)) in attendance.into_iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO academic_reports.attendance
            (id, student_id, period_id, status, excused, occurred_on, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_ids[student])
        .bind(Uuid::from_u128(PERIOD_1))
        .bind(status)
        .bind(excused)
        .bind(first_day + chrono::Duration::days(day as i64))
        .bind(format!("seed-a-{day:03}"))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct GradeCsvRow {
    pub document_number: String,
    pub full_name: String,
    pub subject: String,
    pub period_id: Uuid,
    pub value: Option<f64>,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct AttendanceCsvRow {
    pub document_number: String,
    pub full_name: String,
    pub period_id: Uuid,
    pub status: String,
    pub excused: bool,
    pub occurred_on: NaiveDate,
}

pub async fn import_grades(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut tx = pool.begin().await?;
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<GradeCsvRow>().enumerate() {
        let row = result.with_context(|| format!("invalid grade row {}", line + 1))?;
        let student_id = upsert_student(&mut tx, &row.full_name, &row.document_number).await?;

        let subject_id: Uuid = sqlx::query(
            r#"
            INSERT INTO academic_reports.subjects (id, name)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(row.subject.trim())
        .fetch_one(&mut *tx)
        .await?
        .get("id");

        let result = sqlx::query(
            r#"
            INSERT INTO academic_reports.grades (id, student_id, subject_id, period_id, value)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(subject_id)
        .bind(row.period_id)
        .bind(row.value)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to insert grade row {}", line + 1))?;

        inserted += result.rows_affected() as usize;
    }

    tx.commit().await?;
    Ok(inserted)
}

pub async fn import_attendance(
    pool: &PgPool,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut tx = pool.begin().await?;
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<AttendanceCsvRow>().enumerate() {
        let row = result.with_context(|| format!("invalid attendance row {}", line + 1))?;
        let status = AttendanceStatus::parse(&row.status)
            .with_context(|| format!("unknown attendance status {:?}", row.status))?;
        let student_id = upsert_student(&mut tx, &row.full_name, &row.document_number).await?;

        let result = sqlx::query(
            r#"
            INSERT INTO academic_reports.attendance
            (id, student_id, period_id, status, excused, occurred_on)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(row.period_id)
        .bind(status.as_str())
        .bind(row.excused)
        .bind(row.occurred_on)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to insert attendance row {}", line + 1))?;

        inserted += result.rows_affected() as usize;
    }

    tx.commit().await?;
    Ok(inserted)
}

async fn upsert_student(
    tx: &mut Transaction<'static, Postgres>,
    full_name: &str,
    document_number: &str,
) -> anyhow::Result<Uuid> {
    let (first_name, last_name) = split_name(full_name);

    let id = sqlx::query(
        r#"
        INSERT INTO academic_reports.students (id, first_name, last_name, document_number)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (document_number) DO UPDATE
        SET first_name = EXCLUDED.first_name, last_name = EXCLUDED.last_name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(first_name)
    .bind(last_name)
    .bind(document_number.trim())
    .fetch_one(&mut **tx)
    .await?
    .get("id");

    Ok(id)
}

/// Splits on the first whitespace run: "Ana María Ruiz" -> ("Ana", "María Ruiz").
fn split_name(full_name: &str) -> (&str, &str) {
    let trimmed = full_name.trim();
    match trimmed.split_once(char::is_whitespace) {
        Some((first, rest)) => (first, rest.trim_start()),
        None => (trimmed, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_name_keeps_compound_surnames() {
        assert_eq!(split_name("Avery Lee"), ("Avery", "Lee"));
        assert_eq!(split_name("  Ana  María Ruiz "), ("Ana", "María Ruiz"));
        assert_eq!(split_name("Kiara"), ("Kiara", ""));
    }

    #[test]
    fn grade_rows_treat_empty_value_as_missing() {
        let data = "document_number,full_name,subject,period_id,value\n\
                    1001,Avery Lee,Mathematics,6a1f3c2e-9b41-4d0a-8e57-0c3d20260101,85.5\n\
                    1002,Jules Moreno,Mathematics,6a1f3c2e-9b41-4d0a-8e57-0c3d20260101,\n";
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        let rows: Vec<GradeCsvRow> = reader.deserialize().collect::<Result<_, _>>().unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].value, Some(85.5));
        assert_eq!(rows[0].period_id, Uuid::from_u128(PERIOD_1));
        assert_eq!(rows[1].value, None);
    }

    #[test]
    fn attendance_rows_parse_dates_and_flags() {
        let data = "document_number,full_name,period_id,status,excused,occurred_on\n\
                    1001,Avery Lee,6a1f3c2e-9b41-4d0a-8e57-0c3d20260101,Absent,true,2026-02-03\n";
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        let rows: Vec<AttendanceCsvRow> = reader.deserialize().collect::<Result<_, _>>().unwrap();

        assert_eq!(rows.len(), 1);
        assert!(rows[0].excused);
        assert_eq!(
            rows[0].occurred_on,
            NaiveDate::from_ymd_opt(2026, 2, 3).unwrap()
        );
        assert_eq!(
            AttendanceStatus::parse(&rows[0].status),
            Some(AttendanceStatus::Absent)
        );
    }
}
