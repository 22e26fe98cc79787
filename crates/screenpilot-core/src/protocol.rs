//! Line-delimited JSON protocol spoken by `screenpilot-daemon serve`.
//!
//! One request object per input line, one response object per output line.
//! Unknown fields are ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result, ValidationError};
use crate::task::{SlotRequest, TaskRequest};

/// A request line, tagged by `op`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RequestEnvelope {
    /// Caller correlation id, echoed on the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(flatten)]
    pub request: Request,
}

/// Operations exposed by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// Run one task on the main screen.
    RunMain(TaskRequest),
    /// Run one task on a virtual-display session.
    RunVirtual(TaskRequest),
    /// Run up to four tasks concurrently on distinct sessions.
    RunParallel { slots: Vec<SlotRequest> },
    /// Forget the remembered session and tear down virtual displays.
    CloseAllSessions,
    /// Capability-dependent guidance for callers.
    UsageAdvice,
}

/// A response line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Response {
    pub fn ok(message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            id: None,
            success: true,
            message: message.into(),
            data,
        }
    }

    pub fn failed(message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            id: None,
            success: false,
            message: message.into(),
            data,
        }
    }

    /// Build the rejection response for a validation failure.
    pub fn rejected(err: &ValidationError) -> Self {
        Self::failed(err.to_string(), err.details())
    }

    #[must_use]
    pub fn with_id(mut self, id: Option<Value>) -> Self {
        self.id = id;
        self
    }
}

/// Parse one request line.
pub fn parse_request(line: &str) -> Result<RequestEnvelope> {
    serde_json::from_str(line).map_err(Error::from)
}

/// Serialize a response as a single line (without the trailing newline).
pub fn encode_response(response: &Response) -> Result<String> {
    serde_json::to_string(response).map_err(Error::from)
}
