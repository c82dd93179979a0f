use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct Cycle {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Period {
    pub id: Uuid,
    pub cycle_id: Uuid,
    pub name: String,
    pub period_number: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Course {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Student {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub document_number: String,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// One grade row. `value` is `None` when the grade was recorded without a mark.
#[derive(Debug, Clone, PartialEq)]
pub struct GradeRecord {
    pub student_id: Uuid,
    pub student_name: String,
    pub subject_id: Uuid,
    pub subject_name: String,
    pub period_id: Uuid,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
            AttendanceStatus::Excused => "excused",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "present" => Some(AttendanceStatus::Present),
            "absent" => Some(AttendanceStatus::Absent),
            "late" => Some(AttendanceStatus::Late),
            "excused" => Some(AttendanceStatus::Excused),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceRecord {
    pub student_id: Uuid,
    pub student_name: String,
    pub period_id: Uuid,
    pub status: AttendanceStatus,
    pub excused: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Active,
    Finalized,
    Withdrawn,
}

impl EnrollmentStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(EnrollmentStatus::Active),
            "finalized" => Some(EnrollmentStatus::Finalized),
            "withdrawn" => Some(EnrollmentStatus::Withdrawn),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromotionStatus {
    Approved,
    Failed,
    Graduated,
}

impl PromotionStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "approved" => Some(PromotionStatus::Approved),
            "failed" => Some(PromotionStatus::Failed),
            "graduated" => Some(PromotionStatus::Graduated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enrollment {
    pub id: Uuid,
    pub student_id: Uuid,
    pub student_name: String,
    pub document_number: String,
    pub cycle_id: Uuid,
    pub course_id: Option<Uuid>,
    pub course_name: Option<String>,
    pub status: EnrollmentStatus,
    pub promotion: Option<PromotionStatus>,
    pub final_average: Option<f64>,
    pub closing_notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportKind {
    General,
    PerStudent,
    PerCourse,
    Attendance,
    Promotion,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::General => "general",
            ReportKind::PerStudent => "per-student",
            ReportKind::PerCourse => "per-course",
            ReportKind::Attendance => "attendance",
            ReportKind::Promotion => "promotion",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "general" => Some(ReportKind::General),
            "per-student" => Some(ReportKind::PerStudent),
            "per-course" => Some(ReportKind::PerCourse),
            "attendance" => Some(ReportKind::Attendance),
            "promotion" => Some(ReportKind::Promotion),
            _ => None,
        }
    }
}

/// Report types a period grade report can be filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum PeriodReportType {
    #[default]
    General,
    PerStudent,
    PerCourse,
}

impl PeriodReportType {
    pub fn kind(self) -> ReportKind {
        match self {
            PeriodReportType::General => ReportKind::General,
            PeriodReportType::PerStudent => ReportKind::PerStudent,
            PeriodReportType::PerCourse => ReportKind::PerCourse,
        }
    }

    pub fn title(self, period_name: &str) -> String {
        let prefix = match self {
            PeriodReportType::General => "General",
            PeriodReportType::PerStudent => "Per-student",
            PeriodReportType::PerCourse => "Per-course",
        };
        format!("{prefix} report - {period_name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Generated,
    Failed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Generated => "generated",
            ReportStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "generated" => Some(ReportStatus::Generated),
            "failed" => Some(ReportStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Pdf,
    Excel,
}

impl FileFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Pdf => "pdf",
            FileFormat::Excel => "excel",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pdf" => Some(FileFormat::Pdf),
            "excel" => Some(FileFormat::Excel),
            _ => None,
        }
    }
}

/// A generated report. Written once and never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub kind: ReportKind,
    pub cycle_id: Uuid,
    pub period_id: Option<Uuid>,
    pub course_id: Option<Uuid>,
    pub title: String,
    pub payload: serde_json::Value,
    pub overall_mean: Option<f64>,
    pub highest: Option<f64>,
    pub lowest: Option<f64>,
    pub file_format: Option<FileFormat>,
    pub file_name: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub status: ReportStatus,
}

impl Report {
    pub fn new(kind: ReportKind, cycle_id: Uuid, title: String, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            cycle_id,
            period_id: None,
            course_id: None,
            title,
            payload,
            overall_mean: None,
            highest: None,
            lowest: None,
            file_format: None,
            file_name: None,
            generated_at: Utc::now(),
            status: ReportStatus::Generated,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFilter {
    Cycle(Uuid),
    Period(Uuid),
}
