//! Orchestration manager.
//!
//! [`OrchestrationManager`] is the high-level coordinator that:
//! - admits single tasks and parallel batches (via [`Validator`])
//! - dispatches admitted work under the shared [`BranchPool`]
//! - aggregates branch outcomes into one [`BatchResponse`]
//! - tears down virtual sessions on request

use std::sync::Arc;

use tracing::{info, warn};

use screenpilot_core::config::{DisplayCapability, OrchestratorConfig};
use screenpilot_core::{BatchRequest, ExecutionMode, TaskRequest};

use super::advice;
use super::aggregator::{BatchResponse, TaskResult, aggregate};
use super::dispatcher::Dispatcher;
use super::pool::BranchPool;
use super::resolver::AppResolver;
use super::session::SessionContext;
use super::validator::{OrchestrationError, Validator};
use crate::executor::{AppRegistry, ExecutorError, SubAgentExecutor};

/// Admission, dispatch and aggregation for one executor.
///
/// The manager itself holds no per-caller state; the session context is
/// owned by the caller and passed into each call that needs it.
pub struct OrchestrationManager {
    validator: Validator,
    dispatcher: Dispatcher,
    executor: Arc<dyn SubAgentExecutor>,
}

impl OrchestrationManager {
    pub fn new(
        executor: Arc<dyn SubAgentExecutor>,
        registry: Arc<dyn AppRegistry>,
        config: &OrchestratorConfig,
    ) -> Self {
        let resolver = AppResolver::new(registry).with_system_apps(config.include_system_apps);
        let validator = Validator::new(resolver, config.display)
            .with_default_max_steps(config.default_max_steps);
        let dispatcher =
            Dispatcher::new(Arc::clone(&executor), BranchPool::new(config.max_parallel));

        info!(
            display = ?config.display,
            max_parallel = dispatcher.pool().max_concurrency(),
            "OrchestrationManager created"
        );

        Self {
            validator,
            dispatcher,
            executor,
        }
    }

    pub const fn display(&self) -> DisplayCapability {
        self.validator.display()
    }

    /// Run one task on the main screen or a virtual session.
    ///
    /// `Err` means the request was rejected and nothing ran. An executor
    /// failure is a successful call returning [`TaskResult::Failed`].
    pub async fn run_single_task(
        &self,
        mode: ExecutionMode,
        request: &TaskRequest,
        ctx: &mut SessionContext,
    ) -> Result<TaskResult, OrchestrationError> {
        let task = self
            .validator
            .validate_single(mode, request, ctx)
            .await
            .inspect_err(|e| warn!(%mode, error = %e, "Task rejected"))?;

        info!(%mode, session = %task.session, max_steps = task.max_steps, "Task accepted");
        Ok(self.dispatcher.run_one(&task, ctx).await)
    }

    /// Run up to four tasks concurrently, each on its own session.
    ///
    /// The batch is admitted or rejected as a whole. Once admitted, every
    /// active slot runs to completion and reports its own outcome. Parallel
    /// runs never update a session context.
    pub async fn run_parallel_batch(
        &self,
        batch: &BatchRequest,
    ) -> Result<BatchResponse, OrchestrationError> {
        let slots = self
            .validator
            .validate_batch(batch)
            .await
            .inspect_err(|e| warn!(error = %e, "Batch rejected"))?;

        info!(active = slots.len(), "Batch accepted");
        let response = aggregate(self.dispatcher.run_batch(slots).await);
        info!(summary = %response.summary(), "Batch finished");
        Ok(response)
    }

    /// Forget the remembered session, then ask the executor to tear down
    /// every virtual session. The context stays cleared if teardown fails.
    pub async fn close_all_sessions(&self, ctx: &mut SessionContext) -> Result<(), ExecutorError> {
        ctx.clear();
        self.executor
            .close_all_sessions()
            .await
            .inspect(|_| info!("All virtual sessions closed"))
            .inspect_err(|e| warn!(error = %e, "Virtual session teardown failed"))
    }

    /// Stop handing out branch slots. Runs still waiting for one fail as
    /// aborted; runs already holding a slot finish normally.
    pub fn shutdown(&self) {
        info!("Closing branch pool");
        self.dispatcher.pool().close();
    }

    pub const fn usage_advice(&self) -> &'static str {
        advice::usage_advice(self.validator.display())
    }
}
