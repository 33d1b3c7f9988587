//! HTTP transport seam for the upstream client.
//!
//! `UpstreamClient` builds `UpstreamRequest`s and classifies `RawResponse`s;
//! the transport only moves bytes. Production uses reqwest, tests use the
//! scripted transport in `upstream::testing`.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use super::UpstreamError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One outgoing call, fully resolved except for the base URL.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub path: &'static str,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    pub timeout: Duration,
}

impl UpstreamRequest {
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn header_value(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

/// Status, content-type and body of a received response.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First 200 characters of the body, for log lines and error messages.
    pub fn body_excerpt(&self) -> String {
        String::from_utf8_lossy(&self.body).chars().take(200).collect()
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: UpstreamRequest) -> Result<RawResponse, UpstreamError>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl ReqwestTransport {
    pub fn new(base_url: &str) -> Result<Self, UpstreamError> {
        let mut base_url =
            Url::parse(base_url).map_err(|e| UpstreamError::InvalidUrl(e.to_string()))?;
        // `Url::join` replaces the last segment unless the base ends in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
        })
    }

    fn resolve(&self, path: &str) -> Result<Url, UpstreamError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| UpstreamError::InvalidUrl(e.to_string()))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: UpstreamRequest) -> Result<RawResponse, UpstreamError> {
        let url = self.resolve(request.path)?;
        let mut builder = match request.method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
        };
        builder = builder.query(&request.query).timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                UpstreamError::Timeout(request.timeout.as_secs())
            } else {
                UpstreamError::Transport(e.to_string())
            }
        })?;

        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = resp
            .bytes()
            .await
            .map_err(|e| UpstreamError::Transport(format!("Failed to read body: {}", e)))?;

        Ok(RawResponse {
            status,
            content_type,
            body: body.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_keeps_base_path() {
        let transport = ReqwestTransport::new("https://portal.example.edu/studapi").unwrap();
        let url = transport.resolve("/api/student/personal").unwrap();
        assert_eq!(
            url.as_str(),
            "https://portal.example.edu/studapi/api/student/personal"
        );
    }

    #[test]
    fn test_resolve_root_base() {
        let transport = ReqwestTransport::new("http://localhost:8000").unwrap();
        let url = transport.resolve("/api/dashboard/stats").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/dashboard/stats");
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        assert!(matches!(
            ReqwestTransport::new("not a url"),
            Err(UpstreamError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_body_excerpt_truncates() {
        let resp = RawResponse {
            status: 500,
            content_type: None,
            body: vec![b'x'; 500],
        };
        assert_eq!(resp.body_excerpt().len(), 200);
        assert!(!resp.is_success());
    }
}
