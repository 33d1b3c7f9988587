//! Report session state machine.
//!
//! `ReportState::apply` is the only transition function. It never performs
//! I/O; it returns an [`Effect`] that `ReportSessionController` executes and
//! feeds back as the next event.

use super::artifact::{classify_artifact, ReportArtifact, GENERIC_REPORT_ERROR};
use super::{ReportError, ReportType, Semester, SemesterDiscovery, MIN_REPORT_BYTES};
use crate::upstream::{BinaryBody, Fetch, Resource, StudentIdentity, UpstreamClient};

#[derive(Debug, Default)]
pub enum ReportState {
    #[default]
    Idle,
    TypeSelected {
        report: ReportType,
    },
    SemestersLoaded {
        report: ReportType,
        discovery: SemesterDiscovery,
    },
    Downloading {
        report: ReportType,
        discovery: SemesterDiscovery,
        semester: i64,
    },
    Ready {
        report: ReportType,
        discovery: SemesterDiscovery,
        artifact: ReportArtifact,
    },
    /// `discovery` is kept when the failure happened after semesters loaded,
    /// so a retry can go straight back to the list.
    Error {
        report: ReportType,
        discovery: Option<SemesterDiscovery>,
        message: String,
    },
}

#[derive(Debug)]
pub enum ReportEvent {
    SelectType(ReportType),
    SemestersResolved {
        report: ReportType,
        fetched: Fetch<SemesterDiscovery>,
    },
    SelectSemester(i64),
    ArtifactResolved {
        semester: i64,
        fetched: Fetch<BinaryBody>,
    },
    CloseArtifact,
    Retry,
    Dismiss,
}

impl ReportEvent {
    fn name(&self) -> &'static str {
        match self {
            ReportEvent::SelectType(_) => "select a report type",
            ReportEvent::SemestersResolved { .. } => "accept semesters",
            ReportEvent::SelectSemester(_) => "select a semester",
            ReportEvent::ArtifactResolved { .. } => "accept an artifact",
            ReportEvent::CloseArtifact => "close the artifact",
            ReportEvent::Retry => "retry",
            ReportEvent::Dismiss => "dismiss",
        }
    }
}

/// Work the controller must do after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    None,
    FetchSemesters(ReportType),
    FetchArtifact {
        report: ReportType,
        semester: i64,
        body: serde_json::Value,
    },
}

impl ReportState {
    pub fn name(&self) -> &'static str {
        match self {
            ReportState::Idle => "idle",
            ReportState::TypeSelected { .. } => "type selected",
            ReportState::SemestersLoaded { .. } => "semesters loaded",
            ReportState::Downloading { .. } => "downloading",
            ReportState::Ready { .. } => "ready",
            ReportState::Error { .. } => "error",
        }
    }

    pub fn report(&self) -> Option<ReportType> {
        match self {
            ReportState::Idle => None,
            ReportState::TypeSelected { report }
            | ReportState::SemestersLoaded { report, .. }
            | ReportState::Downloading { report, .. }
            | ReportState::Ready { report, .. }
            | ReportState::Error { report, .. } => Some(*report),
        }
    }

    pub fn semesters(&self) -> &[Semester] {
        match self {
            ReportState::SemestersLoaded { discovery, .. }
            | ReportState::Downloading { discovery, .. }
            | ReportState::Ready { discovery, .. }
            | ReportState::Error {
                discovery: Some(discovery),
                ..
            } => &discovery.semesters,
            _ => &[],
        }
    }

    pub fn artifact(&self) -> Option<&ReportArtifact> {
        match self {
            ReportState::Ready { artifact, .. } => Some(artifact),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ReportState::Error { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Apply one event. `min_bytes` is the artifact plausibility threshold.
    pub fn apply(&mut self, event: ReportEvent, min_bytes: usize) -> Result<Effect, ReportError> {
        let invalid = |state: &ReportState, event: &ReportEvent| ReportError::InvalidTransition {
            state: state.name(),
            event: event.name(),
        };

        if let ReportEvent::SelectSemester(id) = &event {
            if let ReportState::SemestersLoaded { discovery, .. } | ReportState::Ready { discovery, .. } =
                &*self
            {
                if discovery.find(*id).is_none() {
                    return Err(ReportError::UnknownSemester(*id));
                }
            }
        }

        // Taking the state drops any artifact the next state does not keep.
        let current = std::mem::take(self);
        let (next, effect) = match (current, event) {
            (_, ReportEvent::Dismiss) => (ReportState::Idle, Effect::None),

            (current, ReportEvent::SelectType(report)) => {
                if current.report() == Some(report) {
                    log::debug!("reports: collapsing {}", report.upstream_name());
                    (ReportState::Idle, Effect::None)
                } else {
                    drop(current);
                    (
                        ReportState::TypeSelected { report },
                        Effect::FetchSemesters(report),
                    )
                }
            }

            (
                ReportState::TypeSelected { report },
                ReportEvent::SemestersResolved {
                    report: resolved,
                    fetched,
                },
            ) if resolved == report => match fetched {
                Fetch::Ok(discovery) if !discovery.semesters.is_empty() => {
                    (ReportState::SemestersLoaded { report, discovery }, Effect::None)
                }
                Fetch::Ok(_) | Fetch::Empty => (
                    ReportState::Error {
                        report,
                        discovery: None,
                        message: format!("No semesters are available for the {}.", report.label()),
                    },
                    Effect::None,
                ),
                Fetch::Failed(e) => {
                    log::warn!("reports: semester discovery failed: {}", e);
                    (
                        ReportState::Error {
                            report,
                            discovery: None,
                            message: "Could not load semesters. Please try again later.".into(),
                        },
                        Effect::None,
                    )
                }
            },

            (ReportState::SemestersLoaded { report, discovery }, ReportEvent::SelectSemester(id))
            | (ReportState::Ready { report, discovery, .. }, ReportEvent::SelectSemester(id)) => {
                let body = discovery.download_body(report, id);
                (
                    ReportState::Downloading {
                        report,
                        discovery,
                        semester: id,
                    },
                    Effect::FetchArtifact {
                        report,
                        semester: id,
                        body,
                    },
                )
            }

            (
                ReportState::Downloading {
                    report,
                    discovery,
                    semester,
                },
                ReportEvent::ArtifactResolved {
                    semester: resolved,
                    fetched,
                },
            ) if resolved == semester => {
                let outcome = classify_artifact(fetched, min_bytes).and_then(|body| {
                    ReportArtifact::store(report, semester, &body).map_err(|e| {
                        log::warn!("reports: {}", e);
                        GENERIC_REPORT_ERROR.to_string()
                    })
                });
                match outcome {
                    Ok(artifact) => {
                        log::info!(
                            "reports: {} for semester {} ready ({} bytes)",
                            report.upstream_name(),
                            semester,
                            artifact.len()
                        );
                        (
                            ReportState::Ready {
                                report,
                                discovery,
                                artifact,
                            },
                            Effect::None,
                        )
                    }
                    Err(message) => (
                        ReportState::Error {
                            report,
                            discovery: Some(discovery),
                            message,
                        },
                        Effect::None,
                    ),
                }
            }

            (ReportState::Ready { report, discovery, .. }, ReportEvent::CloseArtifact) => {
                (ReportState::SemestersLoaded { report, discovery }, Effect::None)
            }

            (
                ReportState::Error {
                    report,
                    discovery: Some(discovery),
                    ..
                },
                ReportEvent::Retry,
            ) => (ReportState::SemestersLoaded { report, discovery }, Effect::None),

            (
                ReportState::Error {
                    report,
                    discovery: None,
                    ..
                },
                ReportEvent::Retry,
            ) => (
                ReportState::TypeSelected { report },
                Effect::FetchSemesters(report),
            ),

            (current, event) => {
                let err = invalid(&current, &event);
                *self = current;
                return Err(err);
            }
        };

        *self = next;
        Ok(effect)
    }
}

/// Drives a report session for one student. Methods take `&mut self`, so
/// one request is in flight at a time and at most one artifact is live.
pub struct ReportSessionController {
    client: UpstreamClient,
    identity: StudentIdentity,
    state: ReportState,
    min_bytes: usize,
}

impl ReportSessionController {
    pub fn new(client: UpstreamClient, identity: StudentIdentity) -> Self {
        Self {
            client,
            identity,
            state: ReportState::Idle,
            min_bytes: MIN_REPORT_BYTES,
        }
    }

    pub fn with_min_bytes(mut self, min_bytes: usize) -> Self {
        self.min_bytes = min_bytes;
        self
    }

    pub fn state(&self) -> &ReportState {
        &self.state
    }

    /// A different student invalidates the whole session.
    pub fn set_identity(&mut self, identity: StudentIdentity) {
        if identity != self.identity {
            self.state = ReportState::Idle;
            self.identity = identity;
        }
    }

    pub async fn select_type(&mut self, report: ReportType) -> Result<&ReportState, ReportError> {
        self.drive(ReportEvent::SelectType(report)).await
    }

    pub async fn select_semester(&mut self, semester: i64) -> Result<&ReportState, ReportError> {
        self.drive(ReportEvent::SelectSemester(semester)).await
    }

    pub async fn retry(&mut self) -> Result<&ReportState, ReportError> {
        self.drive(ReportEvent::Retry).await
    }

    pub fn close_artifact(&mut self) -> Result<&ReportState, ReportError> {
        self.state.apply(ReportEvent::CloseArtifact, self.min_bytes)?;
        Ok(&self.state)
    }

    pub fn dismiss(&mut self) -> Result<&ReportState, ReportError> {
        self.state.apply(ReportEvent::Dismiss, self.min_bytes)?;
        Ok(&self.state)
    }

    async fn drive(&mut self, event: ReportEvent) -> Result<&ReportState, ReportError> {
        let mut effect = self.state.apply(event, self.min_bytes)?;
        loop {
            let event = match effect {
                Effect::None => break,
                Effect::FetchSemesters(report) => {
                    log::info!("reports: discovering semesters for {}", report.upstream_name());
                    let fetched = self
                        .client
                        .get_json::<SemesterDiscovery>(
                            Resource::ReportSemesters,
                            &self.identity,
                            &[("reportSubId", report.sub_id().to_string())],
                        )
                        .await;
                    ReportEvent::SemestersResolved { report, fetched }
                }
                Effect::FetchArtifact {
                    report,
                    semester,
                    body,
                } => {
                    log::info!(
                        "reports: requesting {} for semester {}",
                        report.upstream_name(),
                        semester
                    );
                    let fetched = self
                        .client
                        .post_binary(Resource::ReportArtifact, &self.identity, body)
                        .await;
                    ReportEvent::ArtifactResolved { semester, fetched }
                }
            };
            effect = self.state.apply(event, self.min_bytes)?;
        }
        Ok(&self.state)
    }
}
