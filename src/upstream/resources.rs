//! Upstream resource catalogue: path and method for every call the core makes.

use serde::Serialize;

use super::transport::Method;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    PersonalProfile,
    AcademicContext,
    DashboardStats,
    ExamEligibility,
    AcademicPercentages,
    FamilyDetails,
    DailyAttendance,
    LeaveStatus,
    CourseAttendance,
    ReportSemesters,
    ReportArtifact,
    ProfileImage,
}

impl Resource {
    pub fn path(self) -> &'static str {
        match self {
            Resource::PersonalProfile => "/api/student/personal",
            Resource::AcademicContext => "/api/student/academic",
            Resource::DashboardStats => "/api/dashboard/stats",
            Resource::ExamEligibility => "/api/student/exam-status",
            Resource::AcademicPercentages => "/api/student/academic-percentage",
            Resource::FamilyDetails => "/api/student/parent",
            Resource::DailyAttendance => "/api/attendance/daily-detail",
            Resource::LeaveStatus => "/api/attendance/leave",
            Resource::CourseAttendance => "/api/attendance/course-detail",
            Resource::ReportSemesters => "/api/reports/filters",
            Resource::ReportArtifact => "/api/reports/download",
            Resource::ProfileImage => "/api/profile/image",
        }
    }

    pub fn method(self) -> Method {
        match self {
            Resource::ReportArtifact => Method::Post,
            _ => Method::Get,
        }
    }

    /// Short name used in log lines and decode errors.
    pub fn name(self) -> &'static str {
        match self {
            Resource::PersonalProfile => "personal",
            Resource::AcademicContext => "academic",
            Resource::DashboardStats => "stats",
            Resource::ExamEligibility => "exam_status",
            Resource::AcademicPercentages => "academic_percentage",
            Resource::FamilyDetails => "family",
            Resource::DailyAttendance => "daily_attendance",
            Resource::LeaveStatus => "leave",
            Resource::CourseAttendance => "course_attendance",
            Resource::ReportSemesters => "report_semesters",
            Resource::ReportArtifact => "report_artifact",
            Resource::ProfileImage => "profile_image",
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_artifact_download_is_post() {
        assert_eq!(Resource::ReportArtifact.method(), Method::Post);
        assert_eq!(Resource::ReportSemesters.method(), Method::Get);
        assert_eq!(Resource::ProfileImage.method(), Method::Get);
    }
}
