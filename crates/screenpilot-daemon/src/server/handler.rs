//! Request handler - routes protocol requests to the orchestration manager.

use serde_json::{Value, json};
use tracing::{debug, warn};

use screenpilot_core::protocol::{Request, Response, parse_request};
use screenpilot_core::{BatchRequest, ExecutionMode};

use crate::orchestration::{OrchestrationError, OrchestrationManager, SessionContext, TaskResult};

/// Handle one raw request line.
///
/// A line that does not parse still gets a response; its `id` is echoed
/// when the line was at least a JSON object carrying one.
pub async fn handle_line(
    manager: &OrchestrationManager,
    ctx: &mut SessionContext,
    line: &str,
) -> Response {
    match parse_request(line) {
        Ok(envelope) => {
            let id = envelope.id;
            handle_request(manager, ctx, envelope.request)
                .await
                .with_id(id)
        }
        Err(e) => {
            warn!(error = %e, "Malformed request line");
            let id = serde_json::from_str::<Value>(line)
                .ok()
                .and_then(|v| v.get("id").cloned());
            Response::failed(format!("Invalid request: {e}"), None).with_id(id)
        }
    }
}

/// Handle a single parsed request.
pub async fn handle_request(
    manager: &OrchestrationManager,
    ctx: &mut SessionContext,
    request: Request,
) -> Response {
    match request {
        Request::RunMain(task) => {
            debug!(intent_len = task.intent().len(), "run_main");
            single_response(
                manager
                    .run_single_task(ExecutionMode::MainScreen, &task, ctx)
                    .await,
            )
        }
        Request::RunVirtual(task) => {
            debug!(intent_len = task.intent().len(), "run_virtual");
            single_response(
                manager
                    .run_single_task(ExecutionMode::VirtualScreen, &task, ctx)
                    .await,
            )
        }
        Request::RunParallel { slots } => {
            debug!(slots = slots.len(), "run_parallel");
            match manager
                .run_parallel_batch(&BatchRequest::new(slots))
                .await
            {
                Ok(batch) => batch.into_response(),
                Err(e) => rejection(&e),
            }
        }
        Request::CloseAllSessions => match manager.close_all_sessions(ctx).await {
            Ok(()) => Response::ok("All virtual sessions closed", None),
            Err(e) => Response::failed(
                format!("Failed to close virtual sessions: {e}"),
                Some(json!({ "error": e.to_string() })),
            ),
        },
        Request::UsageAdvice => Response::ok(
            "Usage advice",
            Some(json!({ "advice": manager.usage_advice() })),
        ),
    }
}

fn single_response(result: Result<TaskResult, OrchestrationError>) -> Response {
    match result {
        Ok(outcome) => outcome.into_response(),
        Err(e) => rejection(&e),
    }
}

fn rejection(err: &OrchestrationError) -> Response {
    match err {
        OrchestrationError::Validation(v) => Response::rejected(v),
        OrchestrationError::Registry(r) => Response::failed(r.to_string(), None),
    }
}
