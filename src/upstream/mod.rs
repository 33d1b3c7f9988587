//! Client for the institutional student API.
//!
//! Every call carries the bearer credential and the institution selector and
//! resolves to exactly one `Fetch` outcome:
//! - `Ok(T)`: success and the body has the expected shape
//! - `Empty`: success, but the body says "no data" / "not eligible"
//! - `Failed`: transport error, non-2xx, or an unparsable body
//!
//! Nothing here retries. Callers decide what a failure means for them.

pub mod resources;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::Config;
pub use resources::Resource;
pub use transport::{Method, RawResponse, ReqwestTransport, Transport, UpstreamRequest};

/// Default name of the header carrying the institution selector.
pub const DEFAULT_INSTITUTION_HEADER: &str = "X-Institution-Id";

// ============================================================================
// Identity
// ============================================================================

/// The institutions the upstream serves. Each expects its own selector value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Institution {
    #[serde(rename = "SEC")]
    Sec,
    #[serde(rename = "SIT")]
    Sit,
}

impl Institution {
    pub fn code(self) -> &'static str {
        match self {
            Institution::Sec => "SEC",
            Institution::Sit => "SIT",
        }
    }
}

impl fmt::Display for Institution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Institution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SEC" => Ok(Institution::Sec),
            "SIT" => Ok(Institution::Sit),
            other => Err(format!("Unknown institution: {}", other)),
        }
    }
}

/// Who the core is acting for. Supplied by the caller on every operation;
/// nothing in the core reads session state from anywhere else.
#[derive(Clone, PartialEq, Eq)]
pub struct StudentIdentity {
    record_key: String,
    institution: Institution,
    token: String,
}

impl StudentIdentity {
    pub fn new(record_key: &str, institution: Institution, token: &str) -> Self {
        Self {
            record_key: normalize_record_key(record_key),
            institution,
            token: token.trim().to_string(),
        }
    }

    pub fn record_key(&self) -> &str {
        &self.record_key
    }

    pub fn institution(&self) -> Institution {
        self.institution
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// Record key prefix, safe for log lines.
    pub fn short_key(&self) -> String {
        let prefix: String = self.record_key.chars().take(5).collect();
        format!("{}...", prefix)
    }
}

impl fmt::Debug for StudentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StudentIdentity")
            .field("record_key", &self.short_key())
            .field("institution", &self.institution)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Record keys are base64; query-string decoding upstream of us may have
/// turned '+' into ' '.
pub fn normalize_record_key(raw: &str) -> String {
    raw.trim().replace(' ', "+")
}

// ============================================================================
// Outcomes
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UpstreamError {
    #[error("Network error: {0}")]
    Transport(String),
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),
    #[error("Upstream error {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Unexpected response shape: {0}")]
    Decode(String),
    #[error("Invalid upstream URL: {0}")]
    InvalidUrl(String),
}

impl UpstreamError {
    pub fn is_retryable(&self) -> bool {
        match self {
            UpstreamError::Transport(_) | UpstreamError::Timeout(_) => true,
            UpstreamError::Status { status, .. } => *status == 429 || *status >= 500,
            UpstreamError::Decode(_) | UpstreamError::InvalidUrl(_) => false,
        }
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(self, UpstreamError::Status { status: 401 | 403, .. })
    }
}

/// Tri-state result of one upstream call.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetch<T> {
    Ok(T),
    Empty,
    Failed(UpstreamError),
}

impl<T> Fetch<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            Fetch::Ok(value) => Some(value),
            Fetch::Empty | Fetch::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Fetch::Failed(_))
    }

    pub fn failure(&self) -> Option<&UpstreamError> {
        match self {
            Fetch::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetch<U> {
        match self {
            Fetch::Ok(value) => Fetch::Ok(f(value)),
            Fetch::Empty => Fetch::Empty,
            Fetch::Failed(err) => Fetch::Failed(err),
        }
    }
}

/// A binary body with the content-type it was served under.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryBody {
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl BinaryBody {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Media type without parameters, lowercased (`application/pdf`).
    pub fn media_type(&self) -> String {
        self.content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map(|ct| ct.trim().to_ascii_lowercase())
            .unwrap_or_default()
    }

    pub fn is_json(&self) -> bool {
        let media = self.media_type();
        media == "application/json" || media.ends_with("+json")
    }
}

/// List payloads arrive bare, wrapped in `data`, or wrapped in `records`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Listing<T> {
    Bare(Vec<T>),
    Wrapped { data: Vec<T> },
    Records { records: Vec<T> },
}

impl<T> Listing<T> {
    pub(crate) fn into_vec(self) -> Vec<T> {
        match self {
            Listing::Bare(items) => items,
            Listing::Wrapped { data } => data,
            Listing::Records { records } => records,
        }
    }
}

/// The message carried by an `{"error": ...}` style body, if any.
pub(crate) fn semantic_error(value: &serde_json::Value) -> Option<String> {
    let obj = value.as_object()?;
    let err = obj.get("error")?;
    match err {
        serde_json::Value::Null | serde_json::Value::Bool(false) => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Classify a JSON response into a `Fetch`.
pub(crate) fn decode_json<T: DeserializeOwned>(resource: Resource, raw: &RawResponse) -> Fetch<T> {
    if !raw.is_success() {
        return Fetch::Failed(UpstreamError::Status {
            status: raw.status,
            message: raw.body_excerpt(),
        });
    }

    let value: serde_json::Value = match serde_json::from_slice(&raw.body) {
        Ok(v) => v,
        Err(e) => return Fetch::Failed(UpstreamError::Decode(e.to_string())),
    };

    if value.is_null() {
        log::debug!("upstream: {} returned null body", resource.name());
        return Fetch::Empty;
    }
    if let Some(message) = semantic_error(&value) {
        log::debug!("upstream: {} signalled absence: {}", resource.name(), message);
        return Fetch::Empty;
    }

    match serde_json::from_value(value) {
        Ok(parsed) => Fetch::Ok(parsed),
        Err(e) => Fetch::Failed(UpstreamError::Decode(format!("{}: {}", resource.name(), e))),
    }
}

// ============================================================================
// Client
// ============================================================================

#[derive(Clone)]
pub struct UpstreamClient {
    transport: Arc<dyn Transport>,
    institution_header: String,
    request_timeout: Duration,
    report_timeout: Duration,
}

impl UpstreamClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            institution_header: DEFAULT_INSTITUTION_HEADER.to_string(),
            request_timeout: Duration::from_secs(15),
            report_timeout: Duration::from_secs(30),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, UpstreamError> {
        let transport = ReqwestTransport::new(&config.base_url)?;
        Ok(Self {
            transport: Arc::new(transport),
            institution_header: config.institution_header.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            report_timeout: Duration::from_secs(config.report_timeout_secs),
        })
    }

    fn build_request(
        &self,
        resource: Resource,
        identity: &StudentIdentity,
        query: &[(&str, String)],
        body: Option<serde_json::Value>,
    ) -> UpstreamRequest {
        let mut pairs = vec![("studtblId".to_string(), identity.record_key().to_string())];
        pairs.extend(query.iter().map(|(k, v)| (k.to_string(), v.clone())));

        let body = body.map(|mut value| {
            if let Some(obj) = value.as_object_mut() {
                obj.entry("studtblId")
                    .or_insert_with(|| identity.record_key().into());
            }
            value
        });

        let timeout = match resource {
            Resource::ReportArtifact => self.report_timeout,
            _ => self.request_timeout,
        };

        UpstreamRequest {
            method: resource.method(),
            path: resource.path(),
            query: pairs,
            headers: vec![
                ("Authorization".to_string(), identity.bearer()),
                (
                    self.institution_header.clone(),
                    identity.institution().code().to_string(),
                ),
            ],
            body,
            timeout,
        }
    }

    async fn exchange(&self, resource: Resource, request: UpstreamRequest) -> Result<RawResponse, UpstreamError> {
        let started = Instant::now();
        let result = self.transport.send(request).await;
        let elapsed_ms = started.elapsed().as_millis();

        match &result {
            Ok(raw) => log::debug!(
                "upstream: {} -> {} ({}) in {}ms",
                resource.name(),
                raw.status,
                raw.content_type.as_deref().unwrap_or("no content-type"),
                elapsed_ms
            ),
            Err(e) => {
                log::warn!("upstream: {} transport failure: {}", resource.name(), e);
            }
        }
        result
    }

    /// GET a JSON resource and classify it.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        resource: Resource,
        identity: &StudentIdentity,
        query: &[(&str, String)],
    ) -> Fetch<T> {
        let request = self.build_request(resource, identity, query, None);
        let raw = match self.exchange(resource, request).await {
            Ok(raw) => raw,
            Err(e) => return Fetch::Failed(e),
        };
        let fetched = decode_json(resource, &raw);
        if let Fetch::Failed(e) = &fetched {
            log::warn!("upstream: {} failed: {}", resource.name(), e);
        }
        fetched
    }

    /// GET a binary resource. Content-type and size are left to the caller.
    pub async fn get_binary(
        &self,
        resource: Resource,
        identity: &StudentIdentity,
        query: &[(&str, String)],
    ) -> Fetch<BinaryBody> {
        let request = self.build_request(resource, identity, query, None);
        self.binary_exchange(resource, request).await
    }

    /// POST a JSON body and receive a binary response.
    pub async fn post_binary(
        &self,
        resource: Resource,
        identity: &StudentIdentity,
        body: serde_json::Value,
    ) -> Fetch<BinaryBody> {
        let request = self.build_request(resource, identity, &[], Some(body));
        self.binary_exchange(resource, request).await
    }

    async fn binary_exchange(&self, resource: Resource, request: UpstreamRequest) -> Fetch<BinaryBody> {
        match self.exchange(resource, request).await {
            Ok(raw) if raw.is_success() => {
                if raw.body.is_empty() && raw.content_type.is_none() {
                    return Fetch::Empty;
                }
                Fetch::Ok(BinaryBody {
                    content_type: raw.content_type,
                    bytes: raw.body,
                })
            }
            Ok(raw) => {
                log::warn!(
                    "upstream: {} returned {}: {}",
                    resource.name(),
                    raw.status,
                    raw.body_excerpt()
                );
                Fetch::Failed(UpstreamError::Status {
                    status: raw.status,
                    message: raw.body_excerpt(),
                })
            }
            Err(e) => Fetch::Failed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedTransport;
    use super::*;
    use serde_json::json;

    fn identity() -> StudentIdentity {
        StudentIdentity::new("ab+cd==", Institution::Sit, "tok-123")
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Named {
        name: String,
    }

    #[test]
    fn test_record_key_restores_plus() {
        let id = StudentIdentity::new(" ab cd== ", Institution::Sec, "t");
        assert_eq!(id.record_key(), "ab+cd==");
    }

    #[test]
    fn test_identity_debug_redacts_token() {
        let rendered = format!("{:?}", identity());
        assert!(!rendered.contains("tok-123"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_institution_parse() {
        assert_eq!("sit".parse::<Institution>().unwrap(), Institution::Sit);
        assert_eq!(" SEC ".parse::<Institution>().unwrap(), Institution::Sec);
        assert!("MIT".parse::<Institution>().is_err());
    }

    #[test]
    fn test_decode_error_field_is_empty() {
        let raw = RawResponse {
            status: 200,
            content_type: Some("application/json".into()),
            body: br#"{"error":"Failed to fetch exam status"}"#.to_vec(),
        };
        let fetched: Fetch<Named> = decode_json(Resource::ExamEligibility, &raw);
        assert_eq!(fetched, Fetch::Empty);
    }

    #[test]
    fn test_decode_non_success_is_failed() {
        let raw = RawResponse {
            status: 502,
            content_type: None,
            body: b"bad gateway".to_vec(),
        };
        let fetched: Fetch<Named> = decode_json(Resource::PersonalProfile, &raw);
        assert!(matches!(
            fetched,
            Fetch::Failed(UpstreamError::Status { status: 502, .. })
        ));
    }

    #[test]
    fn test_decode_shape_mismatch_is_failed() {
        let raw = RawResponse {
            status: 200,
            content_type: Some("text/html".into()),
            body: b"<html>login</html>".to_vec(),
        };
        let fetched: Fetch<Named> = decode_json(Resource::PersonalProfile, &raw);
        assert!(matches!(fetched, Fetch::Failed(UpstreamError::Decode(_))));
    }

    #[test]
    fn test_listing_accepts_all_wrappers() {
        let bare: Listing<u32> = serde_json::from_value(json!([1, 2])).unwrap();
        let data: Listing<u32> = serde_json::from_value(json!({"data": [3]})).unwrap();
        let records: Listing<u32> = serde_json::from_value(json!({"records": [4]})).unwrap();
        assert_eq!(bare.into_vec(), vec![1, 2]);
        assert_eq!(data.into_vec(), vec![3]);
        assert_eq!(records.into_vec(), vec![4]);
    }

    #[test]
    fn test_media_type_strips_parameters() {
        let body = BinaryBody {
            content_type: Some("Application/JSON; charset=utf-8".into()),
            bytes: vec![],
        };
        assert_eq!(body.media_type(), "application/json");
        assert!(body.is_json());
    }

    #[tokio::test]
    async fn test_get_json_sends_identity_headers() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.json(Resource::PersonalProfile.path(), 200, json!({"name": "Asha"}));
        let client = UpstreamClient::new(transport.clone());

        let fetched: Fetch<Named> = client
            .get_json(Resource::PersonalProfile, &identity(), &[])
            .await;
        assert_eq!(fetched, Fetch::Ok(Named { name: "Asha".into() }));

        let calls = transport.calls_to(Resource::PersonalProfile.path());
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].header_value("authorization"), Some("Bearer tok-123"));
        assert_eq!(calls[0].header_value("X-Institution-Id"), Some("SIT"));
        assert_eq!(calls[0].query_value("studtblId"), Some("ab+cd=="));
    }

    #[tokio::test]
    async fn test_transport_error_is_failed_without_retry() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.fail(
            Resource::DashboardStats.path(),
            UpstreamError::Transport("connection refused".into()),
        );
        let client = UpstreamClient::new(transport.clone());

        let fetched: Fetch<Named> = client
            .get_json(Resource::DashboardStats, &identity(), &[])
            .await;
        assert!(fetched.is_failed());
        assert_eq!(transport.calls_to(Resource::DashboardStats.path()).len(), 1);
    }

    #[tokio::test]
    async fn test_post_binary_injects_record_key() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.binary(Resource::ReportArtifact.path(), "application/pdf", vec![0u8; 600]);
        let client = UpstreamClient::new(transport.clone());

        let fetched = client
            .post_binary(
                Resource::ReportArtifact,
                &identity(),
                json!({"reportName": "Attendance", "semesterId": 4}),
            )
            .await;
        assert_eq!(fetched.ok().map(|b| b.len()), Some(600));

        let calls = transport.calls_to(Resource::ReportArtifact.path());
        let body = calls[0].body.as_ref().unwrap();
        assert_eq!(body["studtblId"], "ab+cd==");
        assert_eq!(calls[0].timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_binary_non_success_is_failed() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.raw(
            Resource::ProfileImage.path(),
            RawResponse {
                status: 404,
                content_type: None,
                body: vec![],
            },
        );
        let client = UpstreamClient::new(transport);
        let fetched = client
            .get_binary(Resource::ProfileImage, &identity(), &[])
            .await;
        assert!(matches!(
            fetched,
            Fetch::Failed(UpstreamError::Status { status: 404, .. })
        ));
    }
}
