// 🌐 Remote Gateway - the only way the core talks to the server
// Everything is JSON in, JSON out; transport details stay behind the trait

mod http;
mod mock;

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::GatewayError;

pub use http::HttpGateway;
pub use mock::{MockGateway, RecordedRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mutation {
    Post,
    Patch,
    Delete,
}

impl Mutation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mutation::Post => "POST",
            Mutation::Patch => "PATCH",
            Mutation::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Port for remote requests.
///
/// Implementations decide about timeouts; the core only sees success or
/// `GatewayError`.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// GET a JSON document
    async fn get_json(&self, url: &str) -> Result<Value, GatewayError>;

    /// GET a plain-text body (server-built filter fragments)
    async fn get_text(&self, url: &str) -> Result<String, GatewayError>;

    /// POST/PATCH/DELETE; empty success bodies come back as `Value::Null`
    async fn send(&self, method: Mutation, url: &str, body: Value) -> Result<Value, GatewayError>;
}
