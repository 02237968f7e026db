//! HTTP transport seam.
//!
//! The interceptor and the flush engine both speak to the API through
//! this trait, so tests can script outcomes and the queue logic never
//! touches a socket directly.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;

use crate::types::{ApiResponse, OutboundRequest};

/// Transport error.
///
/// The split between `Connectivity` and `Api` is load-bearing: only a
/// connectivity failure may divert a call into the offline queue. A
/// response from the backend, whatever its status, is a real answer and
/// must reach the caller unchanged.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("network unreachable: {0}")]
    Connectivity(String),
    #[error("API error ({0}): {1}")]
    Api(u16, String),
    #[error("invalid request descriptor: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity(_))
    }
}

/// Issues a serialized request descriptor against the live API.
///
/// Non-2xx responses are returned as `TransportError::Api`; `Ok` always
/// means the backend accepted the call.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &OutboundRequest) -> Result<ApiResponse, TransportError>;
}

/// Live HTTP transport.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Request timeout applied to every call. A stalled replay should
    /// fail here, at the HTTP layer, rather than hold the flush guard
    /// indefinitely.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new() -> anyhow::Result<Self> {
        Self::with_timeout(Self::DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &OutboundRequest) -> Result<ApiResponse, TransportError> {
        let method = reqwest::Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
            .map_err(|e| {
                TransportError::InvalidRequest(format!("method {:?}: {e}", request.method))
            })?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_builder() {
                TransportError::InvalidRequest(e.to_string())
            } else {
                TransportError::Connectivity(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Api(status.as_u16(), body));
        }

        let data = response.json::<Value>().await.unwrap_or(Value::Null);
        Ok(ApiResponse {
            status: status.as_u16(),
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_a_malformed_method_before_touching_the_network() {
        let transport = HttpTransport::new().unwrap();
        let request = OutboundRequest::new("NOT A METHOD", "http://localhost:9/api/");
        let err = transport.send(&request).await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn unreachable_host_classifies_as_connectivity() {
        let transport = HttpTransport::with_timeout(Duration::from_millis(500)).unwrap();
        // Port 9 (discard) on localhost: connection refused, no backend
        // response involved.
        let request = OutboundRequest::get("http://127.0.0.1:9/api/products/");
        let err = transport.send(&request).await.unwrap_err();
        assert!(err.is_connectivity(), "got {err:?}");
    }
}
