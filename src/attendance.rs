//! Attendance classification.
//!
//! Turns a day's period→code map into a `DayStatus` and a set of days into
//! month summaries for the calendar. Pure and stateless: classifying the same
//! input twice always gives the same answer, and nothing is cached between
//! month navigations.
//!
//! Day classification, evaluated in order (first match wins):
//!   1. only on-duty codes                        → FullOnDuty
//!   2. absent codes plus present or on-duty ones → Partial
//!   3. only absent codes                         → FullAbsent
//!   4. present or on-duty codes, no absent ones  → FullPresent
//!   5. nothing recognised / no record at all     → Holiday
//!
//! Headline percentages (overall, on-duty, absent) come pre-aggregated from
//! upstream and are never recomputed here.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::types::{lenient_f64, lenient_opt_i64, lenient_opt_string, lenient_string};

/// Present-like codes, matched case-insensitively as prefixes.
pub const PRESENT_CODES: &[&str] = &["P", "Present"];
/// Absent-like codes. Leave counts as absent.
pub const ABSENT_CODES: &[&str] = &["A", "Ab", "Absent", "L", "Leave"];
/// On-duty codes, e.g. "OD", "OD - Symposium", "On Duty".
pub const ON_DUTY_CODES: &[&str] = &["OD", "On Duty"];

/// Period index → raw upstream code for one day.
pub type PeriodCodes = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeKind {
    Present,
    Absent,
    OnDuty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    FullPresent,
    FullAbsent,
    FullOnDuty,
    Partial,
    Holiday,
}

fn matches_vocabulary(code: &str, vocabulary: &[&str]) -> bool {
    let upper = code.trim().to_uppercase();
    !upper.is_empty() && vocabulary.iter().any(|v| upper.starts_with(&v.to_uppercase()))
}

/// Bucket for a single period code, or `None` when unrecognised.
pub fn classify_code(code: &str) -> Option<CodeKind> {
    if matches_vocabulary(code, ON_DUTY_CODES) {
        Some(CodeKind::OnDuty)
    } else if matches_vocabulary(code, PRESENT_CODES) {
        Some(CodeKind::Present)
    } else if matches_vocabulary(code, ABSENT_CODES) {
        Some(CodeKind::Absent)
    } else {
        None
    }
}

/// Per-bucket counts for one day's codes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodTally {
    pub present: usize,
    pub absent: usize,
    pub on_duty: usize,
}

impl PeriodTally {
    pub fn from_codes<'a>(codes: impl IntoIterator<Item = &'a String>) -> Self {
        let mut tally = Self::default();
        for code in codes {
            if matches_vocabulary(code, PRESENT_CODES) {
                tally.present += 1;
            }
            if matches_vocabulary(code, ABSENT_CODES) {
                tally.absent += 1;
            }
            if matches_vocabulary(code, ON_DUTY_CODES) {
                tally.on_duty += 1;
            }
        }
        tally
    }

    pub fn status(&self) -> DayStatus {
        let PeriodTally {
            present,
            absent,
            on_duty,
        } = *self;

        if absent == 0 && present == 0 && on_duty > 0 {
            DayStatus::FullOnDuty
        } else if absent > 0 && (present > 0 || on_duty > 0) {
            // Must precede FullAbsent: a mixed day is not an absent day.
            DayStatus::Partial
        } else if absent > 0 {
            DayStatus::FullAbsent
        } else if present > 0 || on_duty > 0 {
            DayStatus::FullPresent
        } else {
            DayStatus::Holiday
        }
    }
}

/// Classify a day. `None` (no record for the date) is a holiday, never an absence.
pub fn classify_day(periods: Option<&PeriodCodes>) -> DayStatus {
    match periods {
        Some(codes) if !codes.is_empty() => PeriodTally::from_codes(codes.values()).status(),
        _ => DayStatus::Holiday,
    }
}

// ============================================================================
// Records
// ============================================================================

/// One day of period codes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceDay {
    pub date: NaiveDate,
    pub periods: PeriodCodes,
}

impl AttendanceDay {
    pub fn status(&self) -> DayStatus {
        classify_day(Some(&self.periods))
    }
}

/// Daily attendance item as served upstream. Dates may carry a time suffix
/// (`2024-03-04T00:00:00`) and `attendance` is not always an object.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAttendanceDay {
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub attendance_date: Option<String>,
    #[serde(default)]
    pub attendance: Option<serde_json::Value>,
}

impl RawAttendanceDay {
    pub fn into_day(self) -> Option<AttendanceDay> {
        let date = parse_attendance_date(self.attendance_date.as_deref()?)?;
        let periods = match self.attendance {
            Some(serde_json::Value::Object(map)) => map
                .into_iter()
                .filter_map(|(period, code)| match code {
                    serde_json::Value::String(s) => Some((period, s)),
                    serde_json::Value::Null => None,
                    other => Some((period, other.to_string())),
                })
                .collect(),
            _ => PeriodCodes::new(),
        };
        Some(AttendanceDay { date, periods })
    }
}

pub fn parse_attendance_date(raw: &str) -> Option<NaiveDate> {
    let date_part = raw.trim().split('T').next()?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(date_part, "%d/%m/%Y"))
        .or_else(|_| NaiveDate::parse_from_str(date_part, "%d-%m-%Y"))
        .ok()
}

/// Course-wise percentage, pre-aggregated upstream. A missing percentage
/// reads as 0; the band is derived once on parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawCourseAttendance")]
pub struct CourseAttendance {
    pub id: Option<i64>,
    pub course_id: Option<i64>,
    pub course_code: Option<String>,
    pub course_name: Option<String>,
    pub attendance_percentage: f64,
    pub band: AttendanceBand,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCourseAttendance {
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    course_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    course_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    course_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    attendance_percentage: f64,
}

impl From<RawCourseAttendance> for CourseAttendance {
    fn from(raw: RawCourseAttendance) -> Self {
        Self {
            id: raw.id,
            course_id: raw.course_id,
            course_code: raw.course_code,
            course_name: raw.course_name,
            attendance_percentage: raw.attendance_percentage,
            band: AttendanceBand::for_percentage(raw.attendance_percentage),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceBand {
    Excellent,
    Good,
    Warning,
    Critical,
}

impl AttendanceBand {
    pub fn for_percentage(percentage: f64) -> Self {
        if percentage >= 85.0 {
            AttendanceBand::Excellent
        } else if percentage >= 75.0 {
            AttendanceBand::Good
        } else if percentage >= 65.0 {
            AttendanceBand::Warning
        } else {
            AttendanceBand::Critical
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub from_date: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub to_date: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub reason_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub leave_status: String,
}

// ============================================================================
// Calendar
// ============================================================================

/// Days keyed by date. A date with no entry classifies as a holiday.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AttendanceCalendar {
    days: BTreeMap<NaiveDate, AttendanceDay>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub full_present: usize,
    pub full_absent: usize,
    pub full_on_duty: usize,
    pub partial: usize,
    pub holiday: usize,
}

impl StatusCounts {
    fn add(&mut self, status: DayStatus) {
        match status {
            DayStatus::FullPresent => self.full_present += 1,
            DayStatus::FullAbsent => self.full_absent += 1,
            DayStatus::FullOnDuty => self.full_on_duty += 1,
            DayStatus::Partial => self.partial += 1,
            DayStatus::Holiday => self.holiday += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthSummary {
    pub year: i32,
    pub month: u32,
    pub days: Vec<(NaiveDate, DayStatus)>,
    pub counts: StatusCounts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PeriodLabel {
    Present,
    OnDuty { activity: String },
    Absent,
    Unrecognized { code: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodEntry {
    pub period: String,
    pub code: String,
    pub label: PeriodLabel,
}

/// "OD - Symposium" → "Symposium"; bare "OD" → "On Duty".
fn on_duty_activity(code: &str) -> String {
    code.split('-')
        .nth(1)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("On Duty")
        .to_string()
}

fn label_for(code: &str) -> PeriodLabel {
    match classify_code(code) {
        Some(CodeKind::OnDuty) => PeriodLabel::OnDuty {
            activity: on_duty_activity(code),
        },
        Some(CodeKind::Present) => PeriodLabel::Present,
        Some(CodeKind::Absent) => PeriodLabel::Absent,
        None => PeriodLabel::Unrecognized {
            code: code.to_string(),
        },
    }
}

fn period_order(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<u32>(), b.trim().parse::<u32>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

impl AttendanceCalendar {
    /// Later entries for the same date replace earlier ones.
    pub fn from_days(days: impl IntoIterator<Item = AttendanceDay>) -> Self {
        Self {
            days: days.into_iter().map(|d| (d.date, d)).collect(),
        }
    }

    /// Build from upstream items, skipping ones without a usable date.
    pub fn from_raw(items: Vec<RawAttendanceDay>) -> Self {
        let total = items.len();
        let days: Vec<AttendanceDay> = items.into_iter().filter_map(|d| d.into_day()).collect();
        if days.len() < total {
            log::debug!(
                "attendance: skipped {} of {} daily records without a usable date",
                total - days.len(),
                total
            );
        }
        Self::from_days(days)
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn day(&self, date: NaiveDate) -> Option<&AttendanceDay> {
        self.days.get(&date)
    }

    pub fn status_on(&self, date: NaiveDate) -> DayStatus {
        classify_day(self.days.get(&date).map(|d| &d.periods))
    }

    /// Every calendar day of the month with its status. `None` for an invalid month.
    pub fn month_summary(&self, year: i32, month: u32) -> Option<MonthSummary> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        let mut counts = StatusCounts::default();
        let days: Vec<(NaiveDate, DayStatus)> = first
            .iter_days()
            .take_while(|d| d.month() == month)
            .map(|date| {
                let status = self.status_on(date);
                counts.add(status);
                (date, status)
            })
            .collect();

        Some(MonthSummary {
            year,
            month,
            days,
            counts,
        })
    }

    /// Period-wise detail for one date, ordered by period number.
    pub fn period_breakdown(&self, date: NaiveDate) -> Vec<PeriodEntry> {
        let Some(day) = self.days.get(&date) else {
            return Vec::new();
        };
        let mut entries: Vec<PeriodEntry> = day
            .periods
            .iter()
            .map(|(period, code)| PeriodEntry {
                period: period.clone(),
                code: code.clone(),
                label: label_for(code),
            })
            .collect();
        entries.sort_by(|a, b| period_order(&a.period, &b.period));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(pairs: &[(&str, &str)]) -> PeriodCodes {
        pairs
            .iter()
            .map(|(p, c)| (p.to_string(), c.to_string()))
            .collect()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_present_and_absent_is_partial() {
        let day = codes(&[("1", "P"), ("2", "A")]);
        assert_eq!(classify_day(Some(&day)), DayStatus::Partial);
    }

    #[test]
    fn test_only_absent_is_full_absent() {
        assert_eq!(classify_day(Some(&codes(&[("1", "A")]))), DayStatus::FullAbsent);
        assert_eq!(
            classify_day(Some(&codes(&[("1", "Leave"), ("2", "ab")]))),
            DayStatus::FullAbsent
        );
    }

    #[test]
    fn test_only_on_duty_is_full_on_duty() {
        assert_eq!(classify_day(Some(&codes(&[("1", "OD")]))), DayStatus::FullOnDuty);
        assert_eq!(
            classify_day(Some(&codes(&[("1", "on duty"), ("2", "OD - Symposium")]))),
            DayStatus::FullOnDuty
        );
    }

    #[test]
    fn test_present_with_on_duty_is_full_present() {
        let day = codes(&[("1", "P"), ("2", "OD")]);
        assert_eq!(classify_day(Some(&day)), DayStatus::FullPresent);
    }

    #[test]
    fn test_on_duty_with_absent_is_partial() {
        let day = codes(&[("1", "OD"), ("2", "Absent")]);
        assert_eq!(classify_day(Some(&day)), DayStatus::Partial);
    }

    #[test]
    fn test_missing_or_empty_day_is_holiday() {
        assert_eq!(classify_day(None), DayStatus::Holiday);
        assert_eq!(classify_day(Some(&PeriodCodes::new())), DayStatus::Holiday);
        assert_eq!(
            classify_day(Some(&codes(&[("1", "-"), ("2", "")]))),
            DayStatus::Holiday
        );
    }

    #[test]
    fn test_classification_is_idempotent() {
        let day = codes(&[("1", "p"), ("2", "a"), ("3", "OD"), ("4", "x")]);
        let first = classify_day(Some(&day));
        let second = classify_day(Some(&day));
        assert_eq!(first, second);
        assert_eq!(first, DayStatus::Partial);
    }

    #[test]
    fn test_date_absent_from_calendar_is_holiday_not_absent() {
        let calendar = AttendanceCalendar::from_days(vec![AttendanceDay {
            date: date(2024, 3, 4),
            periods: codes(&[("1", "A")]),
        }]);
        assert_eq!(calendar.status_on(date(2024, 3, 4)), DayStatus::FullAbsent);
        assert_eq!(calendar.status_on(date(2024, 3, 5)), DayStatus::Holiday);
    }

    #[test]
    fn test_raw_day_parses_timestamped_date_and_non_object_attendance() {
        let raw: Vec<RawAttendanceDay> = serde_json::from_value(serde_json::json!([
            { "attendanceDate": "2024-03-04T00:00:00", "attendance": { "1": "P", "2": "A" } },
            { "attendanceDate": "2024-03-05T00:00:00", "attendance": "holiday" },
            { "attendanceDate": null, "attendance": { "1": "P" } },
            { "attendanceDate": "garbage", "attendance": { "1": "P" } }
        ]))
        .unwrap();

        let calendar = AttendanceCalendar::from_raw(raw);
        assert_eq!(calendar.len(), 2);
        assert_eq!(calendar.status_on(date(2024, 3, 4)), DayStatus::Partial);
        assert_eq!(calendar.status_on(date(2024, 3, 5)), DayStatus::Holiday);
    }

    #[test]
    fn test_month_summary_counts_every_day() {
        let calendar = AttendanceCalendar::from_days(vec![
            AttendanceDay {
                date: date(2024, 2, 1),
                periods: codes(&[("1", "P")]),
            },
            AttendanceDay {
                date: date(2024, 2, 2),
                periods: codes(&[("1", "P"), ("2", "L")]),
            },
            AttendanceDay {
                date: date(2024, 3, 1),
                periods: codes(&[("1", "A")]),
            },
        ]);

        let summary = calendar.month_summary(2024, 2).unwrap();
        assert_eq!(summary.days.len(), 29);
        assert_eq!(summary.counts.full_present, 1);
        assert_eq!(summary.counts.partial, 1);
        assert_eq!(summary.counts.full_absent, 0);
        assert_eq!(summary.counts.holiday, 27);

        // Navigating away and back yields the same summary.
        let _ = calendar.month_summary(2024, 3);
        assert_eq!(calendar.month_summary(2024, 2).unwrap(), summary);
        assert!(calendar.month_summary(2024, 13).is_none());
    }

    #[test]
    fn test_period_breakdown_labels_and_order() {
        let calendar = AttendanceCalendar::from_days(vec![AttendanceDay {
            date: date(2024, 3, 4),
            periods: codes(&[("10", "P"), ("2", "OD - Symposium"), ("1", "Ab"), ("3", "OD"), ("4", "?")]),
        }]);

        let entries = calendar.period_breakdown(date(2024, 3, 4));
        let periods: Vec<&str> = entries.iter().map(|e| e.period.as_str()).collect();
        assert_eq!(periods, vec!["1", "2", "3", "4", "10"]);
        assert_eq!(entries[0].label, PeriodLabel::Absent);
        assert_eq!(
            entries[1].label,
            PeriodLabel::OnDuty {
                activity: "Symposium".into()
            }
        );
        assert_eq!(
            entries[2].label,
            PeriodLabel::OnDuty {
                activity: "On Duty".into()
            }
        );
        assert_eq!(entries[3].label, PeriodLabel::Unrecognized { code: "?".into() });
        assert_eq!(entries[4].label, PeriodLabel::Present);
        assert!(calendar.period_breakdown(date(2024, 3, 5)).is_empty());
    }

    #[test]
    fn test_attendance_bands() {
        assert_eq!(AttendanceBand::for_percentage(92.0), AttendanceBand::Excellent);
        assert_eq!(AttendanceBand::for_percentage(85.0), AttendanceBand::Excellent);
        assert_eq!(AttendanceBand::for_percentage(75.0), AttendanceBand::Good);
        assert_eq!(AttendanceBand::for_percentage(70.5), AttendanceBand::Warning);
        assert_eq!(AttendanceBand::for_percentage(40.0), AttendanceBand::Critical);
    }

    #[test]
    fn test_course_with_null_percentage_reads_as_zero() {
        let courses: Vec<CourseAttendance> = serde_json::from_value(serde_json::json!([
            {"courseCode": "CS601", "courseName": "Compilers", "attendancePercentage": 88.0},
            {"courseId": "42", "courseCode": null, "attendancePercentage": null},
            {"attendancePercentage": "71.5%"}
        ]))
        .unwrap();
        assert_eq!(courses.len(), 3);
        assert_eq!(courses[0].band, AttendanceBand::Excellent);
        assert_eq!(courses[1].course_id, Some(42));
        assert_eq!(courses[1].course_code, None);
        assert_eq!(courses[1].attendance_percentage, 0.0);
        assert_eq!(courses[1].band, AttendanceBand::Critical);
        assert_eq!(courses[2].attendance_percentage, 71.5);
        assert_eq!(courses[2].band, AttendanceBand::Warning);

        let serialized = serde_json::to_value(&courses[0]).unwrap();
        assert_eq!(serialized["band"], "excellent");
        assert_eq!(serialized["attendancePercentage"], 88.0);
    }

    #[test]
    fn test_leave_and_day_items_tolerate_nulls() {
        let leave: LeaveRecord = serde_json::from_value(serde_json::json!({
            "fromDate": "2024-03-04", "toDate": null, "reasonName": "Medical", "leaveStatus": 1
        }))
        .unwrap();
        assert_eq!(leave.to_date, "");
        assert_eq!(leave.leave_status, "1");

        let day: RawAttendanceDay = serde_json::from_value(serde_json::json!({
            "attendanceDate": null, "attendance": {"1": "P"}
        }))
        .unwrap();
        assert!(day.into_day().is_none());
    }
}
