// 🧪 Mock Gateway - scripted in-memory RemoteGateway
// Responses, failures and artificial latency are registered per URL

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{Mutation, RemoteGateway};
use crate::error::GatewayError;

/// One request as seen by the mock
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub url: String,
    pub body: Option<Value>,
}

#[derive(Default)]
struct MockState {
    json: HashMap<String, Result<Value, GatewayError>>,
    text: HashMap<String, Result<String, GatewayError>>,
    mutations: HashMap<(Mutation, String), Result<Value, GatewayError>>,
    delays: HashMap<String, Duration>,
    requests: Vec<RecordedRequest>,
}

/// In-memory gateway; clones share the same script.
#[derive(Clone, Default)]
pub struct MockGateway {
    state: Arc<Mutex<MockState>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_json(&self, url: &str, value: Value) -> &Self {
        self.lock().json.insert(url.to_string(), Ok(value));
        self
    }

    pub fn respond_text(&self, url: &str, text: &str) -> &Self {
        self.lock().text.insert(url.to_string(), Ok(text.to_string()));
        self
    }

    /// Fail GETs of `url` (both JSON and text)
    pub fn fail(&self, url: &str, err: GatewayError) -> &Self {
        let mut state = self.lock();
        state.json.insert(url.to_string(), Err(err.clone()));
        state.text.insert(url.to_string(), Err(err));
        self
    }

    pub fn respond_mutation(&self, method: Mutation, url: &str, result: Result<Value, GatewayError>) -> &Self {
        self.lock().mutations.insert((method, url.to_string()), result);
        self
    }

    /// Hold every request to `url` for `delay` (tokio clock)
    pub fn delay(&self, url: &str, delay: Duration) -> &Self {
        self.lock().delays.insert(url.to_string(), delay);
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.lock().requests.iter().filter(|r| r.url == url).count()
    }

    pub fn clear_requests(&self) {
        self.lock().requests.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the script from the others
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record the request and return the configured delay, if any
    fn record(&self, method: &'static str, url: &str, body: Option<Value>) -> Option<Duration> {
        let mut state = self.lock();
        state.requests.push(RecordedRequest {
            method,
            url: url.to_string(),
            body,
        });
        state.delays.get(url).copied()
    }
}

#[async_trait]
impl RemoteGateway for MockGateway {
    async fn get_json(&self, url: &str) -> Result<Value, GatewayError> {
        if let Some(delay) = self.record("GET", url, None) {
            tokio::time::sleep(delay).await;
        }
        self.lock()
            .json
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(GatewayError::NotFound(url.to_string())))
    }

    async fn get_text(&self, url: &str) -> Result<String, GatewayError> {
        if let Some(delay) = self.record("GET", url, None) {
            tokio::time::sleep(delay).await;
        }
        self.lock()
            .text
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(GatewayError::NotFound(url.to_string())))
    }

    async fn send(&self, method: Mutation, url: &str, body: Value) -> Result<Value, GatewayError> {
        if let Some(delay) = self.record(method.as_str(), url, Some(body)) {
            tokio::time::sleep(delay).await;
        }
        self.lock()
            .mutations
            .get(&(method, url.to_string()))
            .cloned()
            .unwrap_or_else(|| Err(GatewayError::NotFound(url.to_string())))
    }
}
