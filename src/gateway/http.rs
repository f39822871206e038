// HTTP gateway backed by reqwest

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::debug;

use super::{Mutation, RemoteGateway};
use crate::error::GatewayError;

/// Reqwest-backed gateway. Relative URLs are joined onto `base_url`.
#[derive(Clone)]
pub struct HttpGateway {
    base_url: String,
    client: reqwest::Client,
}

impl HttpGateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport {
                url: base_url.to_string(),
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URLs pass through, paths are joined onto the base
    pub fn resolve(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else if url.starts_with('/') {
            format!("{}{}", self.base_url, url)
        } else {
            format!("{}/{}", self.base_url, url)
        }
    }

    async fn execute(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
    ) -> Result<(StatusCode, String), GatewayError> {
        let target = self.resolve(url);
        debug!(%method, url = %target, "issuing request");

        let mut request = self
            .client
            .request(method, &target)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| transport(&target, e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| transport(&target, e))?;
        debug!(url = %target, status = status.as_u16(), bytes = text.len(), "request complete");

        if status == StatusCode::BAD_REQUEST {
            if let Some(fields) = serde_json::from_str::<Value>(&text).ok().as_ref().and_then(validation_fields) {
                return Err(GatewayError::Validation(fields));
            }
        }
        if !status.is_success() {
            return Err(GatewayError::Status {
                url: target,
                status: status.as_u16(),
                body: text,
            });
        }
        Ok((status, text))
    }
}

fn transport(url: &str, err: reqwest::Error) -> GatewayError {
    let message = if err.is_timeout() {
        "timed out".to_string()
    } else {
        err.to_string()
    };
    GatewayError::Transport {
        url: url.to_string(),
        message,
    }
}

fn decode(url: &str, text: &str) -> Result<Value, GatewayError> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text).map_err(|e| GatewayError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })
}

/// Flatten a `{field: message}` error body.
///
/// Messages may be strings or lists of strings, and may sit one level down
/// under a resource name (`{"filter": {"value": [...]}}`).
pub(crate) fn validation_fields(body: &Value) -> Option<BTreeMap<String, String>> {
    let object = body.as_object()?;
    let mut fields = BTreeMap::new();

    for (key, value) in object {
        match value {
            Value::Object(inner) => {
                for (field, message) in inner {
                    if let Some(message) = message_text(message) {
                        fields.insert(field.clone(), message);
                    }
                }
            }
            other => {
                if let Some(message) = message_text(other) {
                    fields.insert(key.clone(), message);
                }
            }
        }
    }

    if fields.is_empty() {
        None
    } else {
        Some(fields)
    }
}

fn message_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(" "))
            }
        }
        _ => None,
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn get_json(&self, url: &str) -> Result<Value, GatewayError> {
        let (_, text) = self.execute(Method::GET, url, None).await?;
        decode(url, &text)
    }

    async fn get_text(&self, url: &str) -> Result<String, GatewayError> {
        let (_, text) = self.execute(Method::GET, url, None).await?;
        Ok(text.trim().to_string())
    }

    async fn send(&self, method: Mutation, url: &str, body: Value) -> Result<Value, GatewayError> {
        let (method, body) = match method {
            Mutation::Post => (Method::POST, Some(body)),
            Mutation::Patch => (Method::PATCH, Some(body)),
            Mutation::Delete => (Method::DELETE, None),
        };
        let (_, text) = self.execute(method, url, body).await?;
        decode(url, &text)
    }
}
