//! Task model shared by the orchestrator and its callers.
//!
//! Requests are validated at construction: a [`TaskRequest`] with an empty
//! intent or a non-positive step budget cannot be built, whether it comes
//! from the builder or from the wire.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Reserved session id naming the main (non-isolated) screen.
pub const DEFAULT_SESSION: &str = "default";

/// Step budget used when a request does not carry one.
pub const DEFAULT_MAX_STEPS: u32 = 20;

/// Upper bound on slots in one parallel batch.
pub const MAX_PARALLEL_SLOTS: usize = 4;

/// Which screen context a request runs in, and therefore which admission
/// rules apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Forced onto the main screen; any caller session id is ignored.
    MainScreen,
    /// An existing virtual-display session, explicit or remembered.
    VirtualScreen,
    /// Up to four branches, each on its own explicit virtual session.
    Parallel,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MainScreen => f.write_str("main_screen"),
            Self::VirtualScreen => f.write_str("virtual_screen"),
            Self::Parallel => f.write_str("parallel"),
        }
    }
}

/// An execution context identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SessionId {
    /// The main screen (`"default"`).
    Main,
    /// A virtual-display session.
    Virtual(String),
}

impl SessionId {
    /// Parse a caller-supplied id.
    ///
    /// Returns `None` for a blank value. `"default"` is matched
    /// case-insensitively.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.eq_ignore_ascii_case(DEFAULT_SESSION) {
            Some(Self::Main)
        } else {
            Some(Self::Virtual(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Main => DEFAULT_SESSION,
            Self::Virtual(id) => id,
        }
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SessionId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A validated single-task request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTaskRequest")]
pub struct TaskRequest {
    intent: String,
    max_steps: Option<u32>,
    target_app: Option<String>,
    session_id: Option<String>,
}

impl TaskRequest {
    /// Start building a request for the given intent.
    pub fn builder(intent: impl Into<String>) -> TaskRequestBuilder {
        TaskRequestBuilder {
            intent: intent.into(),
            max_steps: None,
            target_app: None,
            session_id: None,
        }
    }

    pub fn intent(&self) -> &str {
        &self.intent
    }

    /// Requested step budget, if the caller supplied one.
    pub const fn max_steps(&self) -> Option<u32> {
        self.max_steps
    }

    pub fn target_app(&self) -> Option<&str> {
        self.target_app.as_deref()
    }

    /// Raw caller session id, trimmed; blank values are dropped.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }
}

/// Builder for [`TaskRequest`].
#[derive(Debug, Clone)]
pub struct TaskRequestBuilder {
    intent: String,
    max_steps: Option<i64>,
    target_app: Option<String>,
    session_id: Option<String>,
}

impl TaskRequestBuilder {
    #[must_use]
    pub const fn max_steps(mut self, max_steps: i64) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    #[must_use]
    pub fn target_app(mut self, target_app: impl Into<String>) -> Self {
        self.target_app = Some(target_app.into());
        self
    }

    #[must_use]
    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn build(self) -> Result<TaskRequest, ValidationError> {
        let intent = self.intent.trim();
        if intent.is_empty() {
            return Err(ValidationError::EmptyIntent);
        }
        Ok(TaskRequest {
            intent: intent.to_string(),
            max_steps: self.max_steps.map(check_max_steps).transpose()?,
            target_app: non_blank(self.target_app),
            session_id: non_blank(self.session_id),
        })
    }
}

#[derive(Deserialize)]
struct RawTaskRequest {
    intent: String,
    #[serde(default)]
    max_steps: Option<i64>,
    #[serde(default)]
    target_app: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
}

impl TryFrom<RawTaskRequest> for TaskRequest {
    type Error = ValidationError;

    fn try_from(raw: RawTaskRequest) -> Result<Self, Self::Error> {
        TaskRequestBuilder {
            intent: raw.intent,
            max_steps: raw.max_steps,
            target_app: raw.target_app,
            session_id: raw.session_id,
        }
        .build()
    }
}

/// One slot of a parallel batch. The slot is active iff its intent is
/// non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRequest {
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub max_steps: Option<i64>,
    #[serde(default)]
    pub target_app: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl SlotRequest {
    pub fn is_active(&self) -> bool {
        self.intent.as_deref().is_some_and(|i| !i.trim().is_empty())
    }

    /// Resolved step budget for an active slot.
    pub fn checked_max_steps(&self) -> Result<Option<u32>, ValidationError> {
        self.max_steps.map(check_max_steps).transpose()
    }
}

/// An ordered parallel batch of 1..=4 slots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub slots: Vec<SlotRequest>,
}

impl BatchRequest {
    pub const fn new(slots: Vec<SlotRequest>) -> Self {
        Self { slots }
    }

    /// Active slots paired with their 1-based position.
    pub fn active_slots(&self) -> impl Iterator<Item = (usize, &SlotRequest)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_active())
            .map(|(i, slot)| (i + 1, slot))
    }
}

fn check_max_steps(value: i64) -> Result<u32, ValidationError> {
    u32::try_from(value)
        .ok()
        .filter(|n| *n > 0)
        .ok_or(ValidationError::InvalidMaxSteps { value })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
