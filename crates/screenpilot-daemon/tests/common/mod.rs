//! In-memory collaborators for integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::panic)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use screenpilot_core::config::{DisplayCapability, OrchestratorConfig};
use screenpilot_daemon::executor::{
    AppRegistry, ExecutorError, ExecutorOutcome, ExecutorTask, RegistryError, SubAgentExecutor,
};
use screenpilot_daemon::orchestration::OrchestrationManager;

/// Executor whose behavior is driven by markers in the intent:
/// `fail` returns an error, `panic` panics, `sleep=<ms>` delays the run.
/// The reported session is the one it was given, unless the intent carries
/// `reply=<id>`.
#[derive(Default)]
pub struct FakeExecutor {
    runs: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    close_calls: AtomicUsize,
    fail_close: AtomicBool,
    tasks: Mutex<Vec<ExecutorTask>>,
}

impl FakeExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_close() -> Arc<Self> {
        let executor = Self::default();
        executor.fail_close.store(true, Ordering::SeqCst);
        Arc::new(executor)
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn tasks(&self) -> Vec<ExecutorTask> {
        self.tasks.lock().unwrap().clone()
    }

    pub fn last_task(&self) -> ExecutorTask {
        self.tasks().pop().unwrap()
    }
}

fn marker<'a>(intent: &'a str, key: &str) -> Option<&'a str> {
    intent
        .split_whitespace()
        .find_map(|word| word.strip_prefix(key))
}

#[async_trait]
impl SubAgentExecutor for FakeExecutor {
    async fn run(&self, task: ExecutorTask) -> Result<ExecutorOutcome, ExecutorError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.tasks.lock().unwrap().push(task.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(ms) = marker(&task.intent, "sleep=") {
            tokio::time::sleep(Duration::from_millis(ms.parse().unwrap())).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if task.intent.contains("panic") {
            panic!("executor blew up");
        }
        if task.intent.contains("fail") {
            return Err(ExecutorError::Failed(format!(
                "could not finish on {}",
                task.session
            )));
        }

        let session_id = marker(&task.intent, "reply=")
            .map_or_else(|| task.session.to_string(), String::from);
        Ok(ExecutorOutcome {
            payload: json!({
                "session_id": session_id,
                "intent": task.intent,
                "target_app": task.target_app,
            }),
            session_id,
        })
    }

    async fn close_all_sessions(&self) -> Result<(), ExecutorError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_close.load(Ordering::SeqCst) {
            Err(ExecutorError::Failed("display service unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Registry returning a fixed listing, or failing every query.
pub struct FakeRegistry {
    listing: Option<Vec<String>>,
    queries: AtomicUsize,
}

impl FakeRegistry {
    pub fn with_apps(apps: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            listing: Some(apps.iter().map(ToString::to_string).collect()),
            queries: AtomicUsize::new(0),
        })
    }

    pub fn broken() -> Arc<Self> {
        Arc::new(Self {
            listing: None,
            queries: AtomicUsize::new(0),
        })
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AppRegistry for FakeRegistry {
    async fn list_installed(
        &self,
        _include_system_apps: bool,
    ) -> Result<Vec<String>, RegistryError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.listing.clone().ok_or_else(|| RegistryError::QueryFailed {
            reason: "device not connected".to_string(),
        })
    }
}

pub const DEFAULT_APPS: &[&str] = &[
    "Chrome (com.android.chrome)",
    "WeChat (com.tencent.mm)",
    "Example (com.example.app)",
    "Notes",
];

pub fn manager_with(
    executor: &Arc<FakeExecutor>,
    registry: &Arc<FakeRegistry>,
    display: DisplayCapability,
    max_parallel: usize,
) -> OrchestrationManager {
    let config = OrchestratorConfig {
        max_parallel,
        display,
        ..OrchestratorConfig::default()
    };
    let executor: Arc<FakeExecutor> = Arc::clone(executor);
    let registry: Arc<FakeRegistry> = Arc::clone(registry);
    OrchestrationManager::new(executor, registry, &config)
}

pub fn manager(executor: &Arc<FakeExecutor>) -> OrchestrationManager {
    manager_with(
        executor,
        &FakeRegistry::with_apps(DEFAULT_APPS),
        DisplayCapability::VirtualDisplay,
        0,
    )
}
