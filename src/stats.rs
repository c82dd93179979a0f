use serde::{Deserialize, Serialize};

use crate::models::{AttendanceStatus, PromotionStatus};

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Arithmetic mean rounded to two decimals. An empty slice yields 0.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    round2(values.iter().sum::<f64>() / values.len() as f64)
}

/// `part / total * 100`, rounded to two decimals and kept within [0, 100].
pub fn percentage(part: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round2(part as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GradeSummary {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

impl GradeSummary {
    /// Non-finite values are ignored; an empty input gives an all-zero summary.
    pub fn from_values(values: &[f64]) -> Self {
        let valid: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if valid.is_empty() {
            return Self::default();
        }

        let min = valid.iter().copied().fold(f64::INFINITY, f64::min);
        let max = valid.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Self {
            count: valid.len(),
            mean: mean(&valid),
            min: round2(min),
            max: round2(max),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AttendanceTally {
    pub present: u32,
    pub absent: u32,
    pub late: u32,
    pub excused: u32,
    pub total: u32,
    pub attendance_percentage: f64,
}

impl AttendanceTally {
    pub fn record(&mut self, status: AttendanceStatus, excused: bool) {
        self.total += 1;
        match status {
            AttendanceStatus::Present => self.present += 1,
            AttendanceStatus::Absent => self.absent += 1,
            AttendanceStatus::Late => self.late += 1,
            AttendanceStatus::Excused => {}
        }
        if excused || status == AttendanceStatus::Excused {
            self.excused += 1;
        }
        self.attendance_percentage = percentage(self.present, self.total);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PromotionTally {
    pub total: u32,
    pub approved: u32,
    pub failed: u32,
    pub graduated: u32,
    pub pass_rate: f64,
    pub fail_rate: f64,
}

impl PromotionTally {
    /// Enrollments without a promotion status still count towards `total`.
    pub fn record(&mut self, promotion: Option<PromotionStatus>) {
        self.total += 1;
        match promotion {
            Some(PromotionStatus::Approved) => self.approved += 1,
            Some(PromotionStatus::Failed) => self.failed += 1,
            Some(PromotionStatus::Graduated) => self.graduated += 1,
            None => {}
        }
        self.pass_rate = percentage(self.approved + self.graduated, self.total);
        self.fail_rate = percentage(self.failed, self.total);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_rounds_to_two_decimals() {
        assert_eq!(mean(&[80.0, 90.0]), 85.0);
        assert_eq!(mean(&[1.0, 2.0, 2.0]), 1.67);
        assert_eq!(mean(&[70.0]), 70.0);
    }

    #[test]
    fn empty_values_yield_zero_statistics() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(GradeSummary::from_values(&[]), GradeSummary::default());
    }

    #[test]
    fn summary_tracks_extremes() {
        let summary = GradeSummary::from_values(&[72.5, 91.25, 64.0]);
        assert_eq!(summary.count, 3);
        assert_eq!(summary.min, 64.0);
        assert_eq!(summary.max, 91.25);
        assert_eq!(summary.mean, 75.92);
    }

    #[test]
    fn summary_skips_non_finite_values() {
        let summary = GradeSummary::from_values(&[f64::NAN, 60.0]);
        assert_eq!(summary.count, 1);
        assert_eq!(summary.mean, 60.0);
    }

    #[test]
    fn percentage_stays_within_bounds() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(7, 10), 70.0);
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(3, 3), 100.0);
        assert_eq!(percentage(5, 3), 100.0);
    }

    #[test]
    fn attendance_percentage_counts_only_present() {
        let mut tally = AttendanceTally::default();
        for _ in 0..7 {
            tally.record(AttendanceStatus::Present, false);
        }
        tally.record(AttendanceStatus::Absent, true);
        tally.record(AttendanceStatus::Absent, false);
        tally.record(AttendanceStatus::Late, false);

        assert_eq!(tally.total, 10);
        assert_eq!(tally.present, 7);
        assert_eq!(tally.absent, 2);
        assert_eq!(tally.late, 1);
        assert_eq!(tally.excused, 1);
        assert_eq!(tally.attendance_percentage, 70.0);
    }

    #[test]
    fn excused_status_counts_as_excused() {
        let mut tally = AttendanceTally::default();
        tally.record(AttendanceStatus::Excused, false);
        assert_eq!(tally.excused, 1);
        assert_eq!(tally.total, 1);
        assert_eq!(tally.attendance_percentage, 0.0);
    }

    #[test]
    fn pass_rate_includes_graduates() {
        let mut tally = PromotionTally::default();
        tally.record(Some(PromotionStatus::Approved));
        tally.record(Some(PromotionStatus::Graduated));
        tally.record(Some(PromotionStatus::Failed));

        assert_eq!(tally.total, 3);
        assert_eq!(tally.pass_rate, 66.67);
        assert_eq!(tally.fail_rate, 33.33);
    }

    #[test]
    fn empty_promotion_tally_has_zero_rates() {
        let tally = PromotionTally::default();
        assert_eq!(tally.pass_rate, 0.0);
        assert_eq!(tally.fail_rate, 0.0);
    }
}
