//! Error types for the screenpilot core library.

use serde_json::{Value, json};
use thiserror::Error;

use crate::task::MAX_PARALLEL_SLOTS;

/// Result type alias using screenpilot Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for screenpilot operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Rejections raised before any sub-agent is started.
///
/// Every variant rejects the whole request or batch; nothing is ever
/// partially admitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("intent must not be empty")]
    EmptyIntent,

    #[error("max_steps must be a positive integer, got {value}")]
    InvalidMaxSteps { value: i64 },

    #[error("parallel mode cannot run a single task; use run_parallel instead")]
    SingleTaskInParallelMode,

    #[error(
        "virtual displays are unavailable in main-screen mode; use run_main and execute tasks serially"
    )]
    VirtualDisplayUnavailable,

    #[error(
        "virtual-screen mode needs a session id: pass an explicit non-'default' session_id, \
         or complete one successful call first and reuse its returned session id"
    )]
    MissingVirtualSession,

    #[error(
        "virtual-screen mode must not use the 'default' session: pass a non-'default' session_id, \
         or complete one successful call first and reuse its returned session id"
    )]
    DefaultSessionInVirtualMode,

    #[error("parallel batch accepts at most {} slots, got {count}", MAX_PARALLEL_SLOTS)]
    TooManySlots { count: usize },

    #[error("parallel batch has no active slot: at least one slot needs a non-empty intent")]
    NoActiveSlots,

    #[error(
        "parallel slot(s) {} missing target_app: every active branch must name its target app \
         so that one app is never driven from two sessions",
        format_slots(.slots)
    )]
    MissingTargetApps { slots: Vec<usize> },

    #[error(
        "parallel slot(s) {} need an explicit session_id that is not 'default'",
        format_slots(.slots)
    )]
    InvalidSessions { slots: Vec<usize> },

    #[error("target app '{target_app}' is not installed; installed_apps lists the valid names")]
    AppNotFound {
        target_app: String,
        installed_apps: Vec<String>,
    },

    #[error(
        "target apps not installed: {}; installed_apps lists the valid names",
        format_names(.missing_apps)
    )]
    AppsNotFound {
        missing_apps: Vec<String>,
        installed_apps: Vec<String>,
    },

    #[error(
        "target_app_{first_slot} and target_app_{second_slot} both name '{app}': \
         one app cannot be operated from two sessions at the same time"
    )]
    TargetConflict {
        first_slot: usize,
        second_slot: usize,
        app: String,
    },
}

impl ValidationError {
    /// Structured recovery data for the caller, when the rejection has any.
    pub fn details(&self) -> Option<Value> {
        match self {
            Self::AppNotFound {
                target_app,
                installed_apps,
            } => Some(json!({
                "target_app": target_app,
                "installed_apps": installed_apps,
            })),
            Self::AppsNotFound {
                missing_apps,
                installed_apps,
            } => Some(json!({
                "missing_apps": missing_apps,
                "installed_apps": installed_apps,
            })),
            Self::TargetConflict {
                first_slot,
                second_slot,
                app,
            } => Some(json!({
                "conflicting_slots": [first_slot, second_slot],
                "target_app": app,
            })),
            Self::MissingTargetApps { slots } | Self::InvalidSessions { slots } => {
                Some(json!({ "slots": slots }))
            }
            _ => None,
        }
    }
}

fn format_slots(slots: &[usize]) -> String {
    slots
        .iter()
        .map(|i| format!("#{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_names(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("'{n}'"))
        .collect::<Vec<_>>()
        .join(", ")
}
