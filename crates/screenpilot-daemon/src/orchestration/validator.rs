//! Pre-dispatch admission.
//!
//! Every rule is checked before any sub-agent starts. A rejected request or
//! batch never reaches the executor, not even partially.

use tracing::debug;

use screenpilot_core::config::DisplayCapability;
use screenpilot_core::{
    BatchRequest, DEFAULT_MAX_STEPS, ExecutionMode, MAX_PARALLEL_SLOTS, SessionId, SlotRequest,
    TaskRequest, ValidationError,
};

use super::conflict::check_conflicts;
use super::resolver::{AppResolver, InstalledApp};
use super::session::SessionContext;
use crate::executor::{ExecutorTask, RegistryError};

/// Errors that stop a request before dispatch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrchestrationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// A single task that passed admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedTask {
    pub intent: String,
    pub max_steps: u32,
    pub session: SessionId,
    pub target: Option<InstalledApp>,
}

impl ValidatedTask {
    pub fn to_executor_task(&self) -> ExecutorTask {
        ExecutorTask {
            intent: self.intent.clone(),
            max_steps: self.max_steps,
            session: self.session.clone(),
            target_app: self.target.as_ref().map(|app| app.run_target().to_string()),
        }
    }
}

/// An active parallel slot that passed admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSlot {
    /// 1-based position in the caller's batch.
    pub slot_index: usize,
    pub task: ValidatedTask,
}

/// Applies the per-mode admission rules.
#[derive(Clone)]
pub struct Validator {
    resolver: AppResolver,
    display: DisplayCapability,
    default_max_steps: u32,
}

impl Validator {
    pub const fn new(resolver: AppResolver, display: DisplayCapability) -> Self {
        Self {
            resolver,
            display,
            default_max_steps: DEFAULT_MAX_STEPS,
        }
    }

    /// Step budget for requests that omit one (0 keeps the built-in default).
    #[must_use]
    pub const fn with_default_max_steps(mut self, max_steps: u32) -> Self {
        if max_steps > 0 {
            self.default_max_steps = max_steps;
        }
        self
    }

    pub const fn display(&self) -> DisplayCapability {
        self.display
    }

    /// Admit one task in `MainScreen` or `VirtualScreen` mode.
    ///
    /// Main-screen runs always use the `"default"` session. Virtual-screen
    /// runs use the caller's id, falling back to the one remembered in `ctx`.
    pub async fn validate_single(
        &self,
        mode: ExecutionMode,
        request: &TaskRequest,
        ctx: &SessionContext,
    ) -> Result<ValidatedTask, OrchestrationError> {
        let session = match mode {
            ExecutionMode::Parallel => {
                return Err(ValidationError::SingleTaskInParallelMode.into());
            }
            ExecutionMode::MainScreen => SessionId::Main,
            ExecutionMode::VirtualScreen => {
                if self.display == DisplayCapability::MainOnly {
                    return Err(ValidationError::VirtualDisplayUnavailable.into());
                }
                match request
                    .session_id()
                    .or_else(|| ctx.get())
                    .and_then(SessionId::parse)
                {
                    None => return Err(ValidationError::MissingVirtualSession.into()),
                    Some(SessionId::Main) => {
                        return Err(ValidationError::DefaultSessionInVirtualMode.into());
                    }
                    Some(session) => session,
                }
            }
        };

        let target = match request.target_app() {
            Some(reference) => {
                let apps = self.resolver.snapshot().await?;
                let Some(app) = apps.find(reference) else {
                    return Err(ValidationError::AppNotFound {
                        target_app: reference.to_string(),
                        installed_apps: apps.names(),
                    }
                    .into());
                };
                Some(app.clone())
            }
            None => None,
        };

        debug!(
            %mode,
            %session,
            target = ?target.as_ref().map(InstalledApp::run_target),
            "Task admitted"
        );
        Ok(ValidatedTask {
            intent: request.intent().to_string(),
            max_steps: request.max_steps().unwrap_or(self.default_max_steps),
            session,
            target,
        })
    }

    /// Admit a parallel batch as a whole.
    ///
    /// Checks run in a fixed order: display capability, slot count, active
    /// slots, step budgets, missing target apps, illegal session ids, app
    /// resolution against one registry snapshot, and finally conflicts.
    pub async fn validate_batch(
        &self,
        batch: &BatchRequest,
    ) -> Result<Vec<ValidatedSlot>, OrchestrationError> {
        if self.display == DisplayCapability::MainOnly {
            return Err(ValidationError::VirtualDisplayUnavailable.into());
        }
        if batch.slots.len() > MAX_PARALLEL_SLOTS {
            return Err(ValidationError::TooManySlots {
                count: batch.slots.len(),
            }
            .into());
        }

        let active: Vec<(usize, &SlotRequest)> = batch.active_slots().collect();
        if active.is_empty() {
            return Err(ValidationError::NoActiveSlots.into());
        }

        let mut budgets = Vec::with_capacity(active.len());
        for (_, slot) in &active {
            budgets.push(slot.checked_max_steps()?.unwrap_or(self.default_max_steps));
        }

        let missing_targets: Vec<usize> = active
            .iter()
            .filter(|(_, slot)| trimmed(slot.target_app.as_deref()).is_none())
            .map(|(index, _)| *index)
            .collect();
        if !missing_targets.is_empty() {
            return Err(ValidationError::MissingTargetApps {
                slots: missing_targets,
            }
            .into());
        }

        let mut sessions = Vec::with_capacity(active.len());
        let mut invalid_sessions = Vec::new();
        for (index, slot) in &active {
            match slot.session_id.as_deref().and_then(SessionId::parse) {
                Some(session @ SessionId::Virtual(_)) => sessions.push(session),
                _ => invalid_sessions.push(*index),
            }
        }
        if !invalid_sessions.is_empty() {
            return Err(ValidationError::InvalidSessions {
                slots: invalid_sessions,
            }
            .into());
        }

        let apps = self.resolver.snapshot().await?;
        let mut targets = Vec::with_capacity(active.len());
        let mut missing_apps = Vec::new();
        for (_, slot) in &active {
            let reference = trimmed(slot.target_app.as_deref()).unwrap_or_default();
            match apps.find(reference) {
                Some(app) => targets.push(app.clone()),
                None => missing_apps.push(reference.to_string()),
            }
        }
        if !missing_apps.is_empty() {
            return Err(ValidationError::AppsNotFound {
                missing_apps,
                installed_apps: apps.names(),
            }
            .into());
        }

        check_conflicts(
            active
                .iter()
                .zip(&targets)
                .map(|((index, _), app)| (*index, app.run_target())),
        )?;

        let admitted: Vec<ValidatedSlot> = active
            .into_iter()
            .zip(budgets)
            .zip(sessions)
            .zip(targets)
            .map(|((((slot_index, slot), max_steps), session), target)| ValidatedSlot {
                slot_index,
                task: ValidatedTask {
                    intent: slot.intent.as_deref().unwrap_or_default().trim().to_string(),
                    max_steps,
                    session,
                    target: Some(target),
                },
            })
            .collect();
        debug!(active = admitted.len(), "Batch admitted");
        Ok(admitted)
    }
}

fn trimmed(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
