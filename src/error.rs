//! Page-level errors for the dashboard.
//!
//! Per-field failures are folded into the view and never escalate. Only a
//! failure of every critical call becomes a page-level error, classified by
//! recoverability:
//! - Retryable: network issues, timeouts, upstream 5xx
//! - NonRetryable: the load was replaced by a newer one
//! - RequiresUserAction: the session credential was rejected

use thiserror::Error;

use crate::upstream::UpstreamError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DashboardError {
    #[error("Student records are unreachable: {0}")]
    Unreachable(String),

    #[error("Session expired or was rejected by the student portal")]
    AuthExpired,

    #[error("Load was superseded by a newer session")]
    Superseded,
}

impl DashboardError {
    /// Collapse the failures of every critical call into one page-level error.
    pub fn from_critical_failures(failures: &[&UpstreamError]) -> Self {
        if !failures.is_empty() && failures.iter().all(|e| e.is_auth_failure()) {
            return DashboardError::AuthExpired;
        }
        let reason = failures
            .first()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no response".to_string());
        DashboardError::Unreachable(reason)
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, DashboardError::Unreachable(_))
    }

    pub fn requires_user_action(&self) -> bool {
        matches!(self, DashboardError::AuthExpired)
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            DashboardError::Unreachable(_) => {
                "The student portal is not responding. Check your connection and retry."
            }
            DashboardError::AuthExpired => "Sign in again to refresh your session.",
            DashboardError::Superseded => "A newer load replaced this one.",
        }
    }
}

/// Serializable error representation for the presentation layer.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageError {
    pub message: String,
    pub error_type: ErrorType,
    pub can_retry: bool,
    pub recovery_suggestion: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorType {
    Retryable,
    NonRetryable,
    RequiresUserAction,
}

impl From<&DashboardError> for PageError {
    fn from(err: &DashboardError) -> Self {
        let error_type = if err.requires_user_action() {
            ErrorType::RequiresUserAction
        } else if err.is_retryable() {
            ErrorType::Retryable
        } else {
            ErrorType::NonRetryable
        };

        PageError {
            message: err.to_string(),
            error_type,
            can_retry: err.is_retryable(),
            recovery_suggestion: err.recovery_suggestion().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_auth_failures_require_user_action() {
        let a = UpstreamError::Status {
            status: 401,
            message: "expired".into(),
        };
        let b = UpstreamError::Status {
            status: 403,
            message: "forbidden".into(),
        };
        let err = DashboardError::from_critical_failures(&[&a, &b]);
        assert_eq!(err, DashboardError::AuthExpired);

        let page = PageError::from(&err);
        assert_eq!(page.error_type, ErrorType::RequiresUserAction);
        assert!(!page.can_retry);
    }

    #[test]
    fn test_mixed_failures_are_retryable_unreachable() {
        let a = UpstreamError::Transport("connection refused".into());
        let b = UpstreamError::Status {
            status: 401,
            message: "expired".into(),
        };
        let err = DashboardError::from_critical_failures(&[&a, &b]);
        assert!(matches!(err, DashboardError::Unreachable(ref m) if m.contains("connection refused")));

        let page = PageError::from(&err);
        assert_eq!(page.error_type, ErrorType::Retryable);
        assert!(page.can_retry);
    }

    #[test]
    fn test_superseded_load_is_not_retryable() {
        let page = PageError::from(&DashboardError::Superseded);
        assert_eq!(page.error_type, ErrorType::NonRetryable);
        assert!(!page.can_retry);
    }
}
