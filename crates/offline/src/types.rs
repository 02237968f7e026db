//! Shared types for the offline queue and synchronization runtime.
//!
//! Everything here is serde-serializable: queued entries round-trip
//! through the durable store, and stats/responses cross into UI code.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Store-assigned identifier of a queued entry.
///
/// Assigned at insertion, strictly increasing, never reused. Ascending
/// id order equals enqueue order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EntryId(pub i64);

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A serialized description of one outgoing API call.
///
/// Captures everything needed to replay the call against the API:
/// method, URL, headers (including the auth/org-context values active at
/// capture time, as plain strings) and the JSON body. `replay` marks a
/// call issued by the flush engine so a failing replay is never queued a
/// second time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundRequest {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default)]
    pub replay: bool,
}

impl OutboundRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            body: None,
            replay: false,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self::new("POST", url).with_body(body)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set a header, replacing any existing value (name compared
    /// case-insensitively, as HTTP requires).
    pub fn upsert_header(&mut self, name: &str, value: String) {
        match self
            .headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some((_, v)) => *v = value,
            None => self.headers.push((name.to_string(), value)),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Tag this descriptor as a replay issued by the flush engine.
    pub fn into_replay(mut self) -> Self {
        self.replay = true;
        self
    }
}

/// One persisted, not-yet-delivered mutation.
///
/// Created by the interceptor exactly once per call that failed due to
/// connectivity loss; deleted by the flush engine immediately after a
/// successful replay. Never mutated in between.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedRequest {
    pub id: EntryId,
    pub request: OutboundRequest,
    pub enqueued_at: DateTime<Utc>,
}

/// Derived queue statistics for UI display. Recomputed on demand from
/// the live store contents, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub count: usize,
    pub oldest_timestamp: Option<DateTime<Utc>>,
    pub newest_timestamp: Option<DateTime<Utc>>,
}

/// Connectivity state of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityState {
    /// Online and able to reach the API.
    Online,
    /// Offline (network unreachable).
    Offline,
}

/// Response returned to calling code for every API call, live or queued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: u16,
    pub data: Value,
}

impl ApiResponse {
    /// The synthetic response acknowledging a mutation deferred for
    /// later delivery. UI code relies on this exact shape to show
    /// "queued for later" instead of an error.
    pub fn offline_queued() -> Self {
        Self {
            status: 202,
            data: json!({ "offlineQueued": true }),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_offline_queued(&self) -> bool {
        self.data
            .get("offlineQueued")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_header_replaces_case_insensitively() {
        let mut request = OutboundRequest::get("/api/products/")
            .with_header("authorization", "Bearer old");
        request.upsert_header("Authorization", "Bearer new".to_string());

        assert_eq!(request.header("AUTHORIZATION"), Some("Bearer new"));
        assert_eq!(request.headers.len(), 1);
    }

    #[test]
    fn queued_entry_round_trips_through_serde() {
        let entry = QueuedRequest {
            id: EntryId(7),
            request: OutboundRequest::post("/api/invoices/", json!({"total": "1200"}))
                .with_header("Authorization", "Bearer abc123")
                .with_header("X-Organization-Id", "0192c7a1-0000-7000-8000-000000000000"),
            enqueued_at: Utc::now(),
        };

        let encoded = serde_json::to_string(&entry).unwrap();
        let decoded: QueuedRequest = serde_json::from_str(&encoded).unwrap();
        assert_eq!(entry, decoded);
    }

    #[test]
    fn offline_queued_response_has_contract_shape() {
        let response = ApiResponse::offline_queued();
        assert_eq!(response.status, 202);
        assert!(response.is_success());
        assert!(response.is_offline_queued());
        assert_eq!(response.data, json!({ "offlineQueued": true }));
    }

    #[test]
    fn ordinary_response_is_not_marked_queued() {
        let response = ApiResponse {
            status: 200,
            data: json!({ "id": 1 }),
        };
        assert!(!response.is_offline_queued());
    }

    #[test]
    fn stats_serialize_with_ui_field_names() {
        let stats = QueueStats::default();
        let value = serde_json::to_value(stats).unwrap();
        assert!(value.get("oldestTimestamp").is_some());
        assert!(value.get("newestTimestamp").is_some());
    }
}
