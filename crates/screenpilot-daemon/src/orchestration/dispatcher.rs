//! Runs admitted tasks on the executor.
//!
//! Parallel branches are spawned together and joined in slot order. A
//! branch that fails, errors, or panics is recorded for its own slot only;
//! siblings are never cancelled.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::aggregator::{BranchResult, TaskResult};
use super::pool::BranchPool;
use super::session::SessionContext;
use super::validator::{ValidatedSlot, ValidatedTask};
use crate::executor::{ExecutorError, ExecutorOutcome, ExecutorTask, SubAgentExecutor};

pub struct Dispatcher {
    executor: Arc<dyn SubAgentExecutor>,
    pool: BranchPool,
}

impl Dispatcher {
    pub const fn new(executor: Arc<dyn SubAgentExecutor>, pool: BranchPool) -> Self {
        Self { executor, pool }
    }

    pub const fn pool(&self) -> &BranchPool {
        &self.pool
    }

    /// Run one task. On success, a returned virtual session id is written
    /// to `ctx`; failures come back as [`TaskResult::Failed`].
    pub async fn run_one(&self, task: &ValidatedTask, ctx: &mut SessionContext) -> TaskResult {
        let outcome = run_with_permit(
            Arc::clone(&self.executor),
            self.pool.clone(),
            task.to_executor_task(),
        )
        .await;

        match outcome {
            Ok(outcome) => {
                if ctx.set(&outcome.session_id) {
                    info!(session = %outcome.session_id, "Remembering returned session");
                }
                TaskResult::Succeeded {
                    session_id: outcome.session_id,
                    payload: outcome.payload,
                }
            }
            Err(e) => {
                warn!(session = %task.session, error = %e, "Sub-agent run failed");
                TaskResult::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Fan out every slot, then await each handle exactly once in slot order.
    pub async fn run_batch(&self, slots: Vec<ValidatedSlot>) -> Vec<BranchResult> {
        let handles: Vec<(usize, JoinHandle<Result<ExecutorOutcome, ExecutorError>>)> = slots
            .into_iter()
            .map(|slot| {
                let executor = Arc::clone(&self.executor);
                let pool = self.pool.clone();
                let task = slot.task.to_executor_task();
                info!(
                    slot = slot.slot_index,
                    session = %task.session,
                    target_app = ?task.target_app,
                    "Branch started"
                );
                (
                    slot.slot_index,
                    tokio::spawn(run_with_permit(executor, pool, task)),
                )
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (slot_index, handle) in handles {
            let result = match handle.await {
                Ok(Ok(outcome)) => {
                    info!(slot = slot_index, session = %outcome.session_id, "Branch succeeded");
                    BranchResult::succeeded(slot_index, outcome.session_id, outcome.payload)
                }
                Ok(Err(e)) => {
                    warn!(slot = slot_index, error = %e, "Branch failed");
                    BranchResult::failed(slot_index, e.to_string())
                }
                Err(join_err) => {
                    let e = ExecutorError::Aborted {
                        reason: join_err.to_string(),
                    };
                    warn!(slot = slot_index, error = %e, "Branch aborted");
                    BranchResult::failed(slot_index, e.to_string())
                }
            };
            results.push(result);
        }
        results
    }
}

async fn run_with_permit(
    executor: Arc<dyn SubAgentExecutor>,
    pool: BranchPool,
    task: ExecutorTask,
) -> Result<ExecutorOutcome, ExecutorError> {
    let _permit = pool.acquire().await.map_err(|e| ExecutorError::Aborted {
        reason: e.to_string(),
    })?;
    executor.run(task).await
}
