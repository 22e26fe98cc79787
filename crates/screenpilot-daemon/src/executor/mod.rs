//! Seams to the collaborators the orchestrator drives but does not own.
//!
//! - [`SubAgentExecutor`]: runs one UI task to completion on a session.
//! - [`AppRegistry`]: lists the applications installed on the device.
//!
//! [`command`] provides subprocess-backed implementations of both.

pub mod command;

use async_trait::async_trait;
use serde_json::Value;

use screenpilot_core::SessionId;

pub use command::{CommandAppRegistry, CommandExecutor};

/// One task as handed to the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorTask {
    pub intent: String,
    pub max_steps: u32,
    pub session: SessionId,
    /// Resolved launch target (package id when known, else display name).
    pub target_app: Option<String>,
}

/// What a successful run reports back.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorOutcome {
    /// Session the run ended up on; may be blank or `"default"`.
    pub session_id: String,
    /// Opaque result, passed through to the caller untouched.
    pub payload: Value,
}

/// Errors from the sub-agent executor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutorError {
    #[error("{0}")]
    Failed(String),

    #[error("Failed to start executor: {reason}")]
    SpawnFailed { reason: String },

    #[error("Sub-agent timed out after {secs}s")]
    TimedOut { secs: u64 },

    #[error("Executor returned no result")]
    NoResult,

    #[error("Branch aborted: {reason}")]
    Aborted { reason: String },
}

/// Errors from the installed-app registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Failed to query installed apps: {reason}")]
    QueryFailed { reason: String },
}

/// Runs UI automation tasks.
///
/// Implementations may be slow and may fail; the orchestrator never
/// interprets the payload.
#[async_trait]
pub trait SubAgentExecutor: Send + Sync {
    async fn run(&self, task: ExecutorTask) -> Result<ExecutorOutcome, ExecutorError>;

    /// Tear down every virtual-display session.
    async fn close_all_sessions(&self) -> Result<(), ExecutorError>;
}

/// Lists installed applications.
///
/// Each entry is either a bare display name or `"Name (package.id)"`.
#[async_trait]
pub trait AppRegistry: Send + Sync {
    async fn list_installed(&self, include_system_apps: bool) -> Result<Vec<String>, RegistryError>;
}
