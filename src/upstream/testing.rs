//! Scripted in-memory transport for orchestration tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::transport::{RawResponse, Transport, UpstreamRequest};
use super::UpstreamError;

#[derive(Clone)]
enum Reply {
    Response(RawResponse),
    Error(UpstreamError),
}

#[derive(Clone)]
struct Route {
    reply: Reply,
    gate: Option<Arc<Notify>>,
}

/// Responds per path with a scripted reply. Unscripted paths fail as transport
/// errors. A gated path holds the call until the gate is notified.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    routes: Mutex<HashMap<&'static str, Route>>,
    calls: Mutex<Vec<UpstreamRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn set(&self, path: &'static str, reply: Reply) {
        let mut routes = self.routes.lock();
        let gate = routes.get(path).and_then(|r| r.gate.clone());
        routes.insert(path, Route { reply, gate });
    }

    pub(crate) fn raw(&self, path: &'static str, response: RawResponse) {
        self.set(path, Reply::Response(response));
    }

    pub(crate) fn json(&self, path: &'static str, status: u16, value: serde_json::Value) {
        self.raw(
            path,
            RawResponse {
                status,
                content_type: Some("application/json".to_string()),
                body: value.to_string().into_bytes(),
            },
        );
    }

    pub(crate) fn binary(&self, path: &'static str, content_type: &str, bytes: Vec<u8>) {
        self.raw(
            path,
            RawResponse {
                status: 200,
                content_type: Some(content_type.to_string()),
                body: bytes,
            },
        );
    }

    pub(crate) fn fail(&self, path: &'static str, err: UpstreamError) {
        self.set(path, Reply::Error(err));
    }

    /// Hold calls to `path` until the returned gate is notified (once per call).
    pub(crate) fn gate(&self, path: &'static str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        let mut routes = self.routes.lock();
        let reply = routes
            .get(path)
            .map(|r| r.reply.clone())
            .unwrap_or_else(|| Reply::Error(UpstreamError::Transport(format!("no route for {}", path))));
        routes.insert(
            path,
            Route {
                reply,
                gate: Some(notify.clone()),
            },
        );
        notify
    }

    pub(crate) fn calls(&self) -> Vec<UpstreamRequest> {
        self.calls.lock().clone()
    }

    pub(crate) fn calls_to(&self, path: &str) -> Vec<UpstreamRequest> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.path == path)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: UpstreamRequest) -> Result<RawResponse, UpstreamError> {
        let path = request.path;
        self.calls.lock().push(request);

        let route = self.routes.lock().get(path).cloned();
        let Some(route) = route else {
            return Err(UpstreamError::Transport(format!("no route for {}", path)));
        };

        if let Some(gate) = route.gate {
            gate.notified().await;
        }

        match route.reply {
            Reply::Response(resp) => Ok(resp),
            Reply::Error(err) => Err(err),
        }
    }
}
