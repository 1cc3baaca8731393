use super::{HttpRequest, HttpResponse, Transport, bearer_token};
use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, StatusCode, header::CONTENT_TYPE};
use std::sync::{Arc, Mutex};

type Handler = Box<dyn Fn(&HttpRequest) -> HttpResponse + Send + Sync>;

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) authorization: Option<String>,
    pub(crate) body: Bytes,
}

/// In-memory network that answers every request with a handler and records what it saw.
pub(crate) struct ScriptedTransport {
    handler: Handler,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl std::fmt::Debug for ScriptedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedTransport").finish_non_exhaustive()
    }
}

impl ScriptedTransport {
    pub(crate) fn new(handler: impl Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self { handler: Box::new(handler), requests: Mutex::new(Vec::new()) })
    }

    pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, path: &str) -> usize {
        self.requests.lock().unwrap().iter().filter(|r| r.path == path).count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(RecordedRequest {
            method: request.method().clone(),
            path: request.uri().path().to_string(),
            authorization: bearer_token(request.headers()).map(|t| format!("Bearer {t}")),
            body: request.body().clone(),
        });
        Ok((self.handler)(&request))
    }
}

pub(crate) fn json_response(status: StatusCode, body: &serde_json::Value) -> HttpResponse {
    http::Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Bytes::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

pub(crate) fn empty_request(method: Method, path: &str) -> HttpRequest {
    http::Request::builder().method(method).uri(format!("http://api.test{path}")).body(Bytes::new()).unwrap()
}
