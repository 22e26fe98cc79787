//! Caller-owned session affinity.

use tracing::debug;

use screenpilot_core::SessionId;

/// Remembers the last virtual session a successful run reported.
///
/// One context belongs to one caller and is passed by `&mut` into every
/// orchestrator call, so there is exactly one writer at a time. Only
/// non-blank, non-`"default"` ids are ever stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    last_session: Option<String>,
}

impl SessionContext {
    pub const fn new() -> Self {
        Self { last_session: None }
    }

    pub fn get(&self) -> Option<&str> {
        self.last_session.as_deref()
    }

    /// Remember `id` if it names a virtual session. Returns whether it was
    /// stored.
    pub fn set(&mut self, id: &str) -> bool {
        match SessionId::parse(id) {
            Some(SessionId::Virtual(id)) => {
                debug!(session = %id, "Session context updated");
                self.last_session = Some(id);
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        if let Some(previous) = self.last_session.take() {
            debug!(session = %previous, "Session context cleared");
        }
    }
}
