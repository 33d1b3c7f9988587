//! Downloaded report artifacts.
//!
//! The download endpoint answers 200 both for a real document and for a JSON
//! error, so the response is classified by content-type before size or
//! status are trusted. An accepted artifact is written to a temporary file
//! that is removed when the artifact is dropped.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::{ReportError, ReportType};
use crate::upstream::{semantic_error, BinaryBody, Fetch};

pub const GENERIC_REPORT_ERROR: &str = "Could not generate the report. Please try again later.";
pub const EMPTY_REPORT_ERROR: &str = "Empty report: no data was generated for this semester.";

const DOCUMENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/x-pdf",
    "application/octet-stream",
];

/// Decide whether a download produced a usable document. `Err` carries the
/// message to show.
pub fn classify_artifact(fetched: Fetch<BinaryBody>, min_bytes: usize) -> Result<BinaryBody, String> {
    let body = match fetched {
        Fetch::Ok(body) => body,
        Fetch::Empty => return Err(EMPTY_REPORT_ERROR.to_string()),
        Fetch::Failed(e) => {
            log::warn!("reports: download failed: {}", e);
            return Err(GENERIC_REPORT_ERROR.to_string());
        }
    };

    if body.is_json() {
        return Err(json_message(&body.bytes).unwrap_or_else(|| GENERIC_REPORT_ERROR.to_string()));
    }

    let media = body.media_type();
    if !DOCUMENT_TYPES.contains(&media.as_str()) {
        log::warn!(
            "reports: unexpected content-type '{}' ({} bytes)",
            media,
            body.len()
        );
        return Err(GENERIC_REPORT_ERROR.to_string());
    }

    if body.len() < min_bytes {
        log::info!("reports: rejecting {}-byte document as empty", body.len());
        return Err(EMPTY_REPORT_ERROR.to_string());
    }
    Ok(body)
}

/// The message inside a JSON error body.
fn json_message(bytes: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(bytes).ok()?;
    if let Some(message) = semantic_error(&value) {
        return Some(message);
    }
    ["message", "detail"]
        .iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .filter(|m| !m.trim().is_empty())
        .map(str::to_string)
}

/// A generated report held on disk for the lifetime of this value.
#[derive(Debug)]
pub struct ReportArtifact {
    file: NamedTempFile,
    report: ReportType,
    semester: i64,
    len: usize,
}

impl ReportArtifact {
    pub fn store(report: ReportType, semester: i64, body: &BinaryBody) -> Result<Self, ReportError> {
        let mut file = tempfile::Builder::new()
            .prefix("edumate-report-")
            .suffix(".pdf")
            .tempfile()?;
        file.write_all(&body.bytes)?;
        file.flush()?;
        log::debug!(
            "reports: stored {} bytes at {}",
            body.len(),
            file.path().display()
        );

        Ok(Self {
            file,
            report,
            semester,
            len: body.len(),
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn report(&self) -> ReportType {
        self.report
    }

    pub fn semester(&self) -> i64 {
        self.semester
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Suggested download name, e.g. `Attendance_sem4.pdf`.
    pub fn file_name(&self) -> String {
        format!("{}_sem{}.pdf", self.report.upstream_name(), self.semester)
    }

    /// Copy the document somewhere that outlives the artifact.
    pub fn save_to(&self, dest: &Path) -> Result<PathBuf, ReportError> {
        let dest = if dest.is_dir() {
            dest.join(self.file_name())
        } else {
            dest.to_path_buf()
        };
        std::fs::copy(self.path(), &dest)?;
        Ok(dest)
    }
}

impl Drop for ReportArtifact {
    fn drop(&mut self) {
        log::debug!(
            "reports: releasing {} for semester {}",
            self.report.upstream_name(),
            self.semester
        );
    }
}
