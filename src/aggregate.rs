//! Turns fetched rows into report payloads.
//!
//! Every function here is pure: groups live only for the duration of the
//! call and are emitted in the order their keys were first seen.

use std::collections::HashMap;
use std::hash::Hash;

use serde::Serialize;
use uuid::Uuid;

use crate::models::{
    AttendanceRecord, Cycle, Enrollment, GradeRecord, Period, PromotionStatus, Student,
};
use crate::stats::{AttendanceTally, GradeSummary, PromotionTally};

/// Insertion-ordered grouping keyed by `K`.
#[derive(Debug)]
pub struct Groups<K, V> {
    index: HashMap<K, usize>,
    entries: Vec<V>,
}

impl<K: Eq + Hash, V> Groups<K, V> {
    pub fn new() -> Self {
        Self {
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }

    pub fn get_or_insert_with(&mut self, key: K, init: impl FnOnce() -> V) -> &mut V {
        let position = match self.index.get(&key) {
            Some(position) => *position,
            None => {
                self.entries.push(init());
                let position = self.entries.len() - 1;
                self.index.insert(key, position);
                position
            }
        };
        &mut self.entries[position]
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn into_values(self) -> Vec<V> {
        self.entries
    }
}

impl<K: Eq + Hash, V> Default for Groups<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentGrades {
    pub student_id: Uuid,
    pub name: String,
    pub grades: Vec<f64>,
    #[serde(flatten)]
    pub summary: GradeSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodGrades {
    pub period: String,
    pub students: Vec<StudentGrades>,
    pub overall: GradeSummary,
}

/// Groups grades by student, then reduces the per-student means into the
/// overall figure. Students without any positive mean are listed but left out
/// of the overall summary.
pub fn period_grades(period: &Period, grades: &[GradeRecord]) -> PeriodGrades {
    let mut groups: Groups<Uuid, StudentGrades> = Groups::new();

    for grade in grades {
        let entry = groups.get_or_insert_with(grade.student_id, || StudentGrades {
            student_id: grade.student_id,
            name: grade.student_name.clone(),
            grades: Vec::new(),
            summary: GradeSummary::default(),
        });
        if let Some(value) = grade.value {
            entry.grades.push(value);
        }
    }

    let students: Vec<StudentGrades> = groups
        .into_values()
        .into_iter()
        .map(|mut student| {
            student.summary = GradeSummary::from_values(&student.grades);
            student
        })
        .collect();

    let means: Vec<f64> = students
        .iter()
        .map(|student| student.summary.mean)
        .filter(|mean| *mean > 0.0)
        .collect();

    PeriodGrades {
        period: period.name.clone(),
        students,
        overall: GradeSummary::from_values(&means),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CertificateStudent {
    pub id: Uuid,
    pub name: String,
    pub document_number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectGrades {
    pub subject_id: Uuid,
    pub name: String,
    pub grades: Vec<f64>,
    #[serde(flatten)]
    pub summary: GradeSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodSubjects {
    pub period_id: Uuid,
    pub period: String,
    pub subjects: Vec<SubjectGrades>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalSummary {
    pub final_average: f64,
    pub promotion: Option<PromotionStatus>,
    pub closing_notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Certificate {
    pub student: CertificateStudent,
    pub cycle: String,
    pub course: String,
    pub periods: Vec<PeriodSubjects>,
    pub final_summary: Option<FinalSummary>,
}

/// Builds a student's certificate from the cycle's periods in order. The final
/// summary is copied from the enrollment and never recomputed.
pub fn certificate(
    student: &Student,
    cycle: &Cycle,
    enrollment: &Enrollment,
    periods: &[(Period, Vec<GradeRecord>)],
) -> Certificate {
    let periods = periods
        .iter()
        .map(|(period, grades)| {
            let mut groups: Groups<Uuid, SubjectGrades> = Groups::new();
            for grade in grades {
                let entry = groups.get_or_insert_with(grade.subject_id, || SubjectGrades {
                    subject_id: grade.subject_id,
                    name: grade.subject_name.clone(),
                    grades: Vec::new(),
                    summary: GradeSummary::default(),
                });
                if let Some(value) = grade.value {
                    entry.grades.push(value);
                }
            }

            let subjects = groups
                .into_values()
                .into_iter()
                .map(|mut subject| {
                    subject.summary = GradeSummary::from_values(&subject.grades);
                    subject
                })
                .collect();

            PeriodSubjects {
                period_id: period.id,
                period: period.name.clone(),
                subjects,
            }
        })
        .collect();

    let final_summary = enrollment.final_average.map(|final_average| FinalSummary {
        final_average,
        promotion: enrollment.promotion,
        closing_notes: enrollment.closing_notes.clone(),
    });

    Certificate {
        student: CertificateStudent {
            id: student.id,
            name: student.full_name(),
            document_number: student.document_number.clone(),
        },
        cycle: cycle.name.clone(),
        course: course_label(enrollment),
        periods,
        final_summary,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentAttendance {
    pub student_id: Uuid,
    pub name: String,
    #[serde(flatten)]
    pub tally: AttendanceTally,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceSheet {
    pub period: String,
    pub course: String,
    pub students: Vec<StudentAttendance>,
}

pub fn attendance(period: &Period, course: &str, records: &[AttendanceRecord]) -> AttendanceSheet {
    let mut groups: Groups<Uuid, StudentAttendance> = Groups::new();

    for record in records {
        groups
            .get_or_insert_with(record.student_id, || StudentAttendance {
                student_id: record.student_id,
                name: record.student_name.clone(),
                tally: AttendanceTally::default(),
            })
            .tally
            .record(record.status, record.excused);
    }

    AttendanceSheet {
        period: period.name.clone(),
        course: course.to_string(),
        students: groups.into_values(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoursePromotion {
    pub course: String,
    #[serde(flatten)]
    pub tally: PromotionTally,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromotionEntry {
    pub name: String,
    pub document_number: String,
    pub course: String,
    pub final_average: f64,
    pub promotion: Option<PromotionStatus>,
    pub closing_notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Promotion {
    pub cycle: String,
    pub statistics: PromotionTally,
    pub by_course: Vec<CoursePromotion>,
    pub students: Vec<PromotionEntry>,
}

pub fn promotion(cycle: &Cycle, enrollments: &[Enrollment]) -> Promotion {
    let mut statistics = PromotionTally::default();
    let mut groups: Groups<String, CoursePromotion> = Groups::new();
    let mut students = Vec::with_capacity(enrollments.len());

    for enrollment in enrollments {
        let course = course_label(enrollment);
        statistics.record(enrollment.promotion);
        groups
            .get_or_insert_with(course.clone(), || CoursePromotion {
                course: course.clone(),
                tally: PromotionTally::default(),
            })
            .tally
            .record(enrollment.promotion);

        students.push(PromotionEntry {
            name: enrollment.student_name.clone(),
            document_number: enrollment.document_number.clone(),
            course,
            final_average: enrollment.final_average.unwrap_or(0.0),
            promotion: enrollment.promotion,
            closing_notes: enrollment.closing_notes.clone(),
        });
    }

    Promotion {
        cycle: cycle.name.clone(),
        statistics,
        by_course: groups.into_values(),
        students,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleGrades {
    pub total_rows: usize,
    #[serde(flatten)]
    pub summary: GradeSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodOverview {
    pub period_id: Uuid,
    pub period: String,
    pub grade_rows: usize,
    pub mean: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleStatistics {
    pub cycle: String,
    pub total_periods: usize,
    pub grades: CycleGrades,
    pub attendance: AttendanceTally,
    pub by_period: Vec<PeriodOverview>,
}

pub struct PeriodActivity {
    pub period: Period,
    pub grades: Vec<GradeRecord>,
    pub attendance: Vec<AttendanceRecord>,
}

/// Cycle-wide figures. Unlike the period report, grade statistics here are
/// taken over the raw values.
pub fn cycle_statistics(cycle: &Cycle, periods: &[PeriodActivity]) -> CycleStatistics {
    let mut all_values = Vec::new();
    let mut total_rows = 0;
    let mut attendance = AttendanceTally::default();
    let mut by_period = Vec::with_capacity(periods.len());

    for activity in periods {
        let values: Vec<f64> = activity.grades.iter().filter_map(|g| g.value).collect();
        total_rows += activity.grades.len();

        for record in &activity.attendance {
            attendance.record(record.status, record.excused);
        }

        by_period.push(PeriodOverview {
            period_id: activity.period.id,
            period: activity.period.name.clone(),
            grade_rows: activity.grades.len(),
            mean: GradeSummary::from_values(&values).mean,
        });
        all_values.extend(values);
    }

    CycleStatistics {
        cycle: cycle.name.clone(),
        total_periods: periods.len(),
        grades: CycleGrades {
            total_rows,
            summary: GradeSummary::from_values(&all_values),
        },
        attendance,
        by_period,
    }
}

fn course_label(enrollment: &Enrollment) -> String {
    enrollment
        .course_name
        .clone()
        .unwrap_or_else(|| "N/A".to_string())
}
