//! Status callbacks from a worker process to its supervising node.
//!
//! Every message is an envelope `{taskId, eventType, timestamp, payload}`
//! posted as JSON to the parent's callback URL. Delivery is best effort:
//! transport and HTTP-status failures are reported on stderr and surface as
//! `None`, never as an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// Environment variable holding the parent's callback URL
pub const CALLBACK_URL_ENV: &str = "PARENT_NODE_CALLBACK_URL";

/// Environment variable holding this worker's task identifier
pub const TASK_ID_ENV: &str = "WORKER_TASK_ID";

/// Callback URL used when none is configured
pub const FALLBACK_CALLBACK_URL: &str = "http://127.0.0.1:3000/mock_callback";

/// Task identifier used when none is configured
pub const FALLBACK_TASK_ID: &str = "unknown_task";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Kind of event reported to the parent node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    StatusUpdate,
    LogEntry,
    TaskResult,
    TaskError,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::StatusUpdate => "status_update",
            EventType::LogEntry => "log_entry",
            EventType::TaskResult => "task_result",
            EventType::TaskError => "task_error",
        }
    }
}

/// Envelope posted to the callback URL
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskEventMessage {
    pub task_id: String,
    pub event_type: EventType,
    pub timestamp: String,
    pub payload: Value,
}

impl TaskEventMessage {
    pub fn new(task_id: &str, event_type: EventType, payload: Value) -> Self {
        Self {
            task_id: task_id.to_string(),
            event_type,
            timestamp: format_timestamp(Utc::now()),
            payload,
        }
    }
}

/// UTC, second precision, explicit `Z` marker
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Payload of a `status_update` event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdatePayload {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
}

/// Log level carried by a `log_entry` event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// Payload of a `log_entry` event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntryPayload {
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Outcome carried by a `task_result` event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Completed,
    Failed,
}

/// Payload of a `task_result` event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResultPayload {
    pub status: ResultStatus,
    pub result_data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Payload of a `task_error` event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskErrorPayload {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
}

/// Client a worker uses to report back to its parent node
#[derive(Debug, Clone)]
pub struct TaskEventClient {
    callback_url: String,
    task_id: String,
    http: reqwest::Client,
}

impl TaskEventClient {
    /// Build a client, falling back to defaults for anything not provided
    pub fn new(callback_url: Option<String>, task_id: Option<String>) -> Self {
        let (callback_url, task_id) = resolve_settings(callback_url, task_id);
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            callback_url,
            task_id,
            http,
        }
    }

    /// Build a client from `PARENT_NODE_CALLBACK_URL` and `WORKER_TASK_ID`
    pub fn from_env() -> Self {
        Self::new(
            std::env::var(CALLBACK_URL_ENV).ok(),
            std::env::var(TASK_ID_ENV).ok(),
        )
    }

    pub fn callback_url(&self) -> &str {
        &self.callback_url
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub async fn send_status_update(&self, message: &str, progress: Option<u8>) -> Option<Value> {
        let payload = StatusUpdatePayload {
            message: message.to_string(),
            progress,
        };
        self.send(EventType::StatusUpdate, to_payload(&payload)).await
    }

    pub async fn send_log_entry(
        &self,
        level: LogLevel,
        message: &str,
        details: Option<Value>,
    ) -> Option<Value> {
        let payload = LogEntryPayload {
            level,
            message: message.to_string(),
            details,
        };
        self.send(EventType::LogEntry, to_payload(&payload)).await
    }

    pub async fn send_task_result(
        &self,
        status: ResultStatus,
        result_data: Option<Value>,
        error_message: Option<String>,
    ) -> Option<Value> {
        let payload = TaskResultPayload {
            status,
            result_data: result_data.unwrap_or_else(|| json!({})),
            error_message,
        };
        self.send(EventType::TaskResult, to_payload(&payload)).await
    }

    pub async fn send_task_error(
        &self,
        message: &str,
        error_details: Option<Value>,
        stack_trace: Option<String>,
    ) -> Option<Value> {
        let payload = TaskErrorPayload {
            message: message.to_string(),
            error_details,
            stack_trace,
        };
        self.send(EventType::TaskError, to_payload(&payload)).await
    }

    /// Post one envelope; `None` on any transport or HTTP-status failure
    pub async fn send(&self, event_type: EventType, payload: Value) -> Option<Value> {
        let message = TaskEventMessage::new(&self.task_id, event_type, payload);

        let response = match self.http.post(&self.callback_url).json(&message).send().await {
            Ok(response) => response,
            Err(e) => {
                crate::log_error!(e, format!("Failed to send {} event", event_type.as_str()));
                return None;
            }
        };

        let response = match response.error_for_status() {
            Ok(response) => response,
            Err(e) => {
                crate::log_error!(e, format!("Failed to send {} event", event_type.as_str()));
                return None;
            }
        };

        match response.text().await {
            Ok(body) => Some(interpret_body(&body)),
            Err(e) => {
                crate::log_error!(e, format!("Failed to read {} response", event_type.as_str()));
                None
            }
        }
    }
}

fn resolve_settings(callback_url: Option<String>, task_id: Option<String>) -> (String, String) {
    let callback_url = match callback_url.filter(|url| !url.trim().is_empty()) {
        Some(url) => url,
        None => {
            crate::log_warning!(
                "{} not set, using {} for local testing",
                CALLBACK_URL_ENV,
                FALLBACK_CALLBACK_URL
            );
            FALLBACK_CALLBACK_URL.to_string()
        }
    };

    let task_id = match task_id.filter(|id| !id.trim().is_empty()) {
        Some(id) => id,
        None => {
            crate::log_warning!("{} not set, using '{}'", TASK_ID_ENV, FALLBACK_TASK_ID);
            FALLBACK_TASK_ID.to_string()
        }
    };

    (callback_url, task_id)
}

fn to_payload<T: Serialize>(payload: &T) -> Value {
    serde_json::to_value(payload).unwrap_or(Value::Null)
}

fn interpret_body(body: &str) -> Value {
    serde_json::from_str(body)
        .unwrap_or_else(|_| json!({ "status": "success", "raw_response": body }))
}
