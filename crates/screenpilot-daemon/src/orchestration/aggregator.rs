//! Normalizes dispatch outcomes into caller-facing results.

use serde::Serialize;
use serde_json::{Value, json};

use screenpilot_core::protocol::Response;

/// Outcome of one parallel branch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchResult {
    pub slot_index: usize,
    pub success: bool,
    /// Session the branch ran on, as reported by the executor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BranchResult {
    pub fn succeeded(slot_index: usize, session_id: impl Into<String>, payload: Value) -> Self {
        Self {
            slot_index,
            success: true,
            session_id: Some(session_id.into()),
            payload: Some(payload),
            error: None,
        }
    }

    pub fn failed(slot_index: usize, error: impl Into<String>) -> Self {
        Self {
            slot_index,
            success: false,
            session_id: None,
            payload: None,
            error: Some(error.into()),
        }
    }
}

/// Aggregated outcome of an accepted batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResponse {
    pub accepted_count: usize,
    pub success_count: usize,
    pub results: Vec<BranchResult>,
}

impl BatchResponse {
    /// One-line summary, e.g. `"succeeded 2 / total 3"`.
    pub fn summary(&self) -> String {
        format!(
            "succeeded {} / total {}",
            self.success_count, self.accepted_count
        )
    }

    /// An accepted batch is a successful response even if branches failed.
    pub fn into_response(self) -> Response {
        let message = self.summary();
        Response::ok(message, Some(json!(self)))
    }
}

/// Collapse branch results, keeping their order.
pub fn aggregate(results: Vec<BranchResult>) -> BatchResponse {
    BatchResponse {
        accepted_count: results.len(),
        success_count: results.iter().filter(|r| r.success).count(),
        results,
    }
}

/// Outcome of a single-task run.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskResult {
    Succeeded { session_id: String, payload: Value },
    Failed { error: String },
}

impl TaskResult {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    pub fn into_response(self) -> Response {
        match self {
            Self::Succeeded {
                session_id,
                payload,
            } => Response::ok(
                "Sub-agent run completed",
                Some(json!({ "session_id": session_id, "payload": payload })),
            ),
            Self::Failed { error } => {
                Response::failed(error.clone(), Some(json!({ "error": error })))
            }
        }
    }
}
