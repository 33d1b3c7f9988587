//! Report generation: report types, semester discovery and the session
//! state machine that turns a selection into a downloadable artifact.

pub mod artifact;
pub mod session;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use artifact::{classify_artifact, ReportArtifact};
pub use session::{ReportEvent, ReportSessionController, ReportState};

/// Artifacts smaller than this were generated without content.
pub const MIN_REPORT_BYTES: usize = 500;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Cannot {event} while {state}")]
    InvalidTransition {
        state: &'static str,
        event: &'static str,
    },

    #[error("Semester {0} is not offered for this report")]
    UnknownSemester(i64),

    #[error("Unknown report type: {0}")]
    UnknownType(String),

    #[error("Could not store report: {0}")]
    Storage(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    Attendance,
    ContinuousAssessment,
    EndSemester,
}

impl ReportType {
    /// Id the semester discovery endpoint filters on.
    pub fn sub_id(self) -> u32 {
        match self {
            ReportType::Attendance => 9,
            ReportType::ContinuousAssessment => 1,
            ReportType::EndSemester => 5,
        }
    }

    /// Canonical name the download endpoint expects.
    pub fn upstream_name(self) -> &'static str {
        match self {
            ReportType::Attendance => "Attendance",
            ReportType::ContinuousAssessment => "CAT",
            ReportType::EndSemester => "EndSemester",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ReportType::Attendance => "Attendance Report",
            ReportType::ContinuousAssessment => "CAT Marks Report",
            ReportType::EndSemester => "End Semester Report",
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ReportType {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "attendance" => Ok(ReportType::Attendance),
            "cat" | "continuousassessment" => Ok(ReportType::ContinuousAssessment),
            "endsem" | "endsemester" => Ok(ReportType::EndSemester),
            _ => Err(ReportError::UnknownType(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Semester {
    #[serde(deserialize_with = "crate::types::lenient_i64")]
    pub id: i64,
    #[serde(default, deserialize_with = "crate::types::lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "crate::types::lenient_i64")]
    pub number: i64,
}

/// Semester discovery result. Anything served next to the semester list is
/// kept untouched and submitted back with the download request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SemesterDiscovery {
    #[serde(default)]
    pub semesters: Vec<Semester>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SemesterDiscovery {
    pub fn find(&self, id: i64) -> Option<&Semester> {
        self.semesters.iter().find(|s| s.id == id)
    }

    /// Download body for `semester`. Pass-through values never override the
    /// report name or semester id.
    pub fn download_body(&self, report: ReportType, semester: i64) -> serde_json::Value {
        let mut body = serde_json::Map::new();
        body.insert("reportName".into(), report.upstream_name().into());
        body.insert("semesterId".into(), semester.into());
        for (key, value) in &self.extra {
            body.entry(key.clone()).or_insert_with(|| value.clone());
        }
        serde_json::Value::Object(body)
    }
}
