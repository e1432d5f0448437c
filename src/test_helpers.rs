use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;

use crate::client::{ApiClient, ApiRequest};
use crate::error::{Error, Result};

/// Backend client that replays canned responses in order and records every
/// request it saw.
pub struct MockClient {
    responses: Mutex<Vec<Result<Value>>>,
    requests: Mutex<Vec<ApiRequest>>,
    delay: Duration,
}

impl MockClient {
    pub fn new(responses: Vec<Result<Value>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        })
    }

    /// Like `new` with one response, but every exchange blocks for `delay`.
    pub fn slow(response: Value, delay: Duration) -> Arc<Self> {
        Self::delayed(vec![Ok(response)], delay)
    }

    pub fn delayed(responses: Vec<Result<Value>>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
            delay,
        })
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl ApiClient for MockClient {
    fn send(&self, request: &ApiRequest) -> Result<Value> {
        self.requests.lock().unwrap().push(request.clone());
        std::thread::sleep(self.delay);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Err(Error::Http("no more mock responses".to_string()))
        } else {
            responses.remove(0)
        }
    }
}
