//! Normalized view model assembled by the dashboard aggregator.
//!
//! Every section is independently nullable: one missing section never
//! invalidates the rest. Upstream field names are snake_case; numeric fields
//! sometimes arrive as strings, so scalars are parsed leniently.

use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};

use crate::attendance::{AttendanceCalendar, CourseAttendance, LeaveRecord};
use crate::error::PageError;
use crate::upstream::{Resource, UpstreamError};

// ============================================================================
// Lenient scalars
// ============================================================================

pub(crate) fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s,
        Some(other) => other.to_string(),
    })
}

pub(crate) fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(serde_json::Value::String(s)) => s.trim().trim_end_matches('%').parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

pub(crate) fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

/// Like `lenient_string`, but null and blank stay absent.
pub(crate) fn lenient_opt_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let value = lenient_string(deserializer)?;
    Ok(Some(value).filter(|s| !s.trim().is_empty()))
}

pub(crate) fn lenient_opt_i64<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<i64>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

pub(crate) fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Bool(b)) => b,
        Some(serde_json::Value::Number(n)) => n.as_i64().unwrap_or(0) != 0,
        Some(serde_json::Value::String(s)) => {
            matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "y" | "1")
        }
        _ => false,
    })
}

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonalDetails {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub reg_no: String,
    /// Document reference for the profile photo.
    #[serde(default, deserialize_with = "lenient_string")]
    pub photo_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub mobile: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub date_of_birth: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub gender: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub community: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub religion: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub bus_route: String,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub hostel: bool,
    #[serde(default, deserialize_with = "lenient_string")]
    pub languages: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub age: String,
}

impl PersonalDetails {
    pub fn photo_reference(&self) -> Option<&str> {
        let id = self.photo_id.trim();
        (!id.is_empty()).then_some(id)
    }
}

/// Department, semester, section and the numeric ids other calls filter on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcademicContext {
    #[serde(default, deserialize_with = "lenient_string")]
    pub dept: String,
    /// Current semester id.
    #[serde(default, deserialize_with = "lenient_i64")]
    pub semester: i64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub semester_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub semester_type: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub section: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub batch: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub admission_mode: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub university_reg_no: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub mentor_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub current_academic_year: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub programme_id: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub branch_id: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub year_of_study_id: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub section_id: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub academic_year_id: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub academic_batch_id: i64,
}

impl AcademicContext {
    /// Without an academic year there is nothing to filter attendance by.
    pub fn has_filter_ids(&self) -> bool {
        self.academic_year_id > 0
    }

    /// Query parameters for attendance detail, course and leave calls.
    pub fn filter_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("academicYearId", self.academic_year_id.to_string()),
            ("branchId", self.branch_id.to_string()),
            ("semesterId", self.semester.to_string()),
            ("yearOfStudyId", self.year_of_study_id.to_string()),
            ("sectionId", self.section_id.to_string()),
        ]
    }

    /// Exam eligibility additionally needs the semester type.
    pub fn exam_params(&self) -> Vec<(&'static str, String)> {
        let mut params = self.filter_params();
        if !self.semester_type.is_empty() {
            params.push(("semesterType", self.semester_type.clone()));
        }
        params
    }
}

/// Headline statistics, displayed as served.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub attendance_percentage: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub cgpa: f64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub arrears: i64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub od_percentage: f64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub od_count: i64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub absent_percentage: f64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub program: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub branch_code: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub mentor_name: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub total_semesters: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub total_years: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExamEligibility {
    #[serde(default, deserialize_with = "lenient_bool")]
    pub attendance_eligible: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub fees_eligible: bool,
    #[serde(default, deserialize_with = "lenient_string")]
    pub current_status: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_fees: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub paid_online: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub previous_due: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub attendance_pct: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub od_pct: f64,
}

impl ExamEligibility {
    pub fn is_eligible(&self) -> bool {
        self.attendance_eligible && self.fees_eligible
    }
}

/// One prior qualification (school leaving exams and the like).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcademicPercentageRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub exam: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub year: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FamilyDetails {
    #[serde(default, deserialize_with = "lenient_string")]
    pub father_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub father_occupation: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub father_mobile: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub mother_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub mother_occupation: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub mother_mobile: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub guardian_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub guardian_occupation: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub guardian_mobile: String,
}

// ============================================================================
// View
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Readiness {
    #[default]
    Loading,
    Ready,
    Unreachable {
        error: PageError,
    },
}

/// A call that failed. Recorded for diagnostics; the field stays absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldFailure {
    pub resource: Resource,
    pub message: String,
    pub retryable: bool,
}

impl FieldFailure {
    pub fn new(resource: Resource, err: &UpstreamError) -> Self {
        Self {
            resource,
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub readiness: Readiness,
    pub personal: Option<PersonalDetails>,
    pub stats: Option<DashboardStats>,
    pub academic: Option<AcademicContext>,
    pub eligibility: Option<ExamEligibility>,
    pub percentages: Option<Vec<AcademicPercentageRecord>>,
    pub family: Option<FamilyDetails>,
    pub attendance: Option<AttendanceCalendar>,
    pub leaves: Option<Vec<LeaveRecord>>,
    pub courses: Option<Vec<CourseAttendance>>,
    /// Resources whose call has completed, in any outcome.
    pub settled: BTreeSet<Resource>,
    pub failures: Vec<FieldFailure>,
}

impl ProfileView {
    pub fn is_ready(&self) -> bool {
        matches!(self.readiness, Readiness::Ready)
    }

    pub fn is_settled(&self, resource: Resource) -> bool {
        self.settled.contains(&resource)
    }

    /// Store eligibility and refine the percentages it carries into the
    /// statistics already on screen. Touches only those two stats fields.
    pub fn merge_eligibility(&mut self, eligibility: ExamEligibility) {
        if let Some(stats) = self.stats.as_mut() {
            if eligibility.attendance_pct > 0.0 {
                stats.attendance_percentage = eligibility.attendance_pct;
            }
            if eligibility.od_pct > 0.0 {
                stats.od_percentage = eligibility.od_pct;
            }
        }
        self.eligibility = Some(eligibility);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lenient_fields_accept_strings_and_nulls() {
        let record: AcademicPercentageRecord =
            serde_json::from_value(json!({"exam": "HSC", "year": 2021, "percentage": "91.5"}))
                .unwrap();
        assert_eq!(record.year, "2021");
        assert_eq!(record.percentage, 91.5);

        let stats: DashboardStats =
            serde_json::from_value(json!({"attendance_percentage": null, "cgpa": "8.2"})).unwrap();
        assert_eq!(stats.attendance_percentage, 0.0);
        assert_eq!(stats.cgpa, 8.2);
    }

    #[test]
    fn test_academic_filter_params() {
        let academic = AcademicContext {
            semester: 6,
            semester_type: "Even".into(),
            branch_id: 2,
            year_of_study_id: 3,
            section_id: 2,
            academic_year_id: 14,
            ..Default::default()
        };
        assert!(academic.has_filter_ids());
        let params = academic.exam_params();
        assert!(params.contains(&("academicYearId", "14".to_string())));
        assert!(params.contains(&("semesterId", "6".to_string())));
        assert!(params.contains(&("semesterType", "Even".to_string())));
        assert!(!AcademicContext::default().has_filter_ids());
    }

    #[test]
    fn test_merge_eligibility_refines_only_percentages() {
        let mut view = ProfileView {
            stats: Some(DashboardStats {
                attendance_percentage: 80.0,
                od_percentage: 2.0,
                cgpa: 8.4,
                arrears: 1,
                ..Default::default()
            }),
            ..Default::default()
        };
        view.merge_eligibility(ExamEligibility {
            attendance_pct: 82.5,
            od_pct: 0.0,
            fees_eligible: true,
            attendance_eligible: true,
            ..Default::default()
        });

        let stats = view.stats.as_ref().unwrap();
        assert_eq!(stats.attendance_percentage, 82.5);
        assert_eq!(stats.od_percentage, 2.0);
        assert_eq!(stats.cgpa, 8.4);
        assert_eq!(stats.arrears, 1);
        assert!(view.eligibility.as_ref().unwrap().is_eligible());
    }

    #[test]
    fn test_merge_eligibility_without_stats_leaves_stats_absent() {
        let mut view = ProfileView::default();
        view.merge_eligibility(ExamEligibility {
            attendance_pct: 70.0,
            ..Default::default()
        });
        assert!(view.stats.is_none());
        assert!(view.eligibility.is_some());
    }

    #[test]
    fn test_photo_reference_blank_is_none() {
        let personal = PersonalDetails {
            photo_id: "  ".into(),
            ..Default::default()
        };
        assert!(personal.photo_reference().is_none());
    }
}
