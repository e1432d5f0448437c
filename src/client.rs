use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::error::{Error, Result};

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// Only reads are replayed after a transient failure.
    pub fn is_retry_safe(&self) -> bool {
        matches!(self, Method::Get)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request against the application backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    fn new(method: Method, path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path, None)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, path, Some(body))
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Patch, path, Some(body))
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path, None)
    }

    pub fn with_query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    /// Append a query parameter only when `value` is present.
    pub fn with_optional_query(self, key: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.with_query(key, v),
            None => self,
        }
    }
}

/// The session's authenticated client. Adapters and the session provider
/// talk to the backend exclusively through this trait, which keeps them
/// testable with canned responses.
pub trait ApiClient: Send + Sync {
    /// Perform one blocking exchange and return the decoded JSON body
    /// (`Value::Null` for an empty body).
    fn send(&self, request: &ApiRequest) -> Result<Value>;
}

/// `ureq`-backed client with bearer auth. Reads are retried on transient
/// failures; mutations are sent once.
pub struct DefaultApiClient {
    base_url: String,
    access_token: Option<String>,
    agent: ureq::Agent,
}

impl DefaultApiClient {
    pub fn new(base_url: &str, access_token: Option<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn send_once(&self, request: &ApiRequest, url: &str) -> std::result::Result<String, ureq::Error> {
        let mut req = self
            .agent
            .request(request.method.as_str(), url)
            .set("Accept", "application/json");
        for (key, value) in &request.query {
            req = req.query(key, value);
        }
        for (name, value) in &request.headers {
            req = req.set(name, value);
        }
        if let Some(ref token) = self.access_token {
            req = req.set("Authorization", &format!("Bearer {token}"));
        }

        let response = match request.body {
            Some(ref body) => req.send_json(body)?,
            None => req.call()?,
        };
        Ok(response.into_string()?)
    }
}

/// Decode a response body; an empty body is `Value::Null`.
fn decode(text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(text)?)
}

impl ApiClient for DefaultApiClient {
    fn send(&self, request: &ApiRequest) -> Result<Value> {
        let url = self.url(&request.path);

        let attempts = if request.method.is_retry_safe() {
            MAX_RETRIES
        } else {
            1
        };

        let mut backoff_ms = INITIAL_BACKOFF_MS;
        for attempt in 1..=attempts {
            match self.send_once(request, &url) {
                Ok(text) => return decode(&text),
                Err(ref e) if attempt < attempts && is_retryable(e) => {
                    warn!(
                        attempt,
                        error = %e,
                        backoff_ms,
                        method = %request.method,
                        path = %request.path,
                        "retrying backend request after transient error"
                    );
                    thread::sleep(Duration::from_millis(backoff_ms));
                    backoff_ms *= 2;
                }
                Err(ureq::Error::Status(code, response)) => {
                    let body = response.into_string().unwrap_or_default();
                    return Err(Error::Http(format!(
                        "{} {} returned {code}: {}",
                        request.method,
                        request.path,
                        body.trim()
                    )));
                }
                Err(e) => {
                    return Err(Error::Http(format!(
                        "{} {} failed: {e}",
                        request.method, request.path
                    )));
                }
            }
        }
        unreachable!()
    }
}

/// Only retry rate-limits (429), server errors (5xx), and transport/network errors.
fn is_retryable(err: &ureq::Error) -> bool {
    match err {
        ureq::Error::Status(code, _) => *code == 429 || *code >= 500,
        ureq::Error::Transport(_) => true,
    }
}

/// Run a blocking exchange off the async runtime.
pub async fn run_blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Http(format!("request task failed: {e}")))?
}

/// Send `request` through `client`, racing it against `cancel`.
///
/// A cancelled call returns [`Error::Cancelled`] as soon as the token fires.
/// The blocking exchange is detached; its result is dropped and the agent
/// timeout bounds how long it lingers.
pub async fn call(
    client: &Arc<dyn ApiClient>,
    request: ApiRequest,
    cancel: Option<&CancelToken>,
) -> Result<Value> {
    let client = Arc::clone(client);
    let path = request.path.clone();
    let exchange = run_blocking(move || client.send(&request));

    let Some(token) = cancel else {
        return exchange.await;
    };
    if token.is_cancelled() {
        return Err(Error::Cancelled);
    }

    tokio::select! {
        biased;
        _ = token.cancelled() => {
            debug!(%path, "request cancelled");
            Err(Error::Cancelled)
        }
        res = exchange => res,
    }
}
