#![allow(clippy::unwrap_used, clippy::panic)] // Integration tests use unwrap for brevity

//! End-to-end tests for the orchestration manager.
//!
//! Drives `OrchestrationManager` against in-memory collaborators and checks
//! admission, session affinity, conflict detection, branch isolation and
//! bounded concurrency.

mod common;

use serde_json::json;

use screenpilot_core::config::DisplayCapability;
use screenpilot_core::{
    BatchRequest, ExecutionMode, SessionId, SlotRequest, TaskRequest, ValidationError,
};
use screenpilot_daemon::executor::RegistryError;
use screenpilot_daemon::orchestration::{
    AppResolver, OrchestrationError, Resolution, SessionContext, TaskResult,
};

use common::{DEFAULT_APPS, FakeExecutor, FakeRegistry, manager, manager_with};

fn task(intent: &str) -> TaskRequest {
    TaskRequest::builder(intent).build().unwrap()
}

fn task_on(intent: &str, session: &str) -> TaskRequest {
    TaskRequest::builder(intent).session_id(session).build().unwrap()
}

fn slot(intent: &str, target_app: &str, session: &str) -> SlotRequest {
    SlotRequest {
        intent: Some(intent.to_string()),
        max_steps: None,
        target_app: Some(target_app.to_string()),
        session_id: Some(session.to_string()),
    }
}

#[tokio::test]
async fn main_screen_overrides_any_session() {
    let executor = FakeExecutor::new();
    let manager = manager(&executor);
    let mut ctx = SessionContext::new();

    for session in ["", "x", "default"] {
        let result = manager
            .run_single_task(
                ExecutionMode::MainScreen,
                &task_on("open settings", session),
                &mut ctx,
            )
            .await
            .unwrap();
        assert!(result.is_success());
        assert_eq!(executor.last_task().session, SessionId::Main);
    }
    assert_eq!(executor.runs(), 3);
    // A main-screen run reports "default", which is never remembered.
    assert_eq!(ctx.get(), None);
}

#[tokio::test]
async fn virtual_screen_falls_back_to_remembered_session() {
    let executor = FakeExecutor::new();
    let manager = manager(&executor);
    let mut ctx = SessionContext::new();

    manager
        .run_single_task(ExecutionMode::VirtualScreen, &task_on("launch Chrome", "S1"), &mut ctx)
        .await
        .unwrap();
    assert_eq!(ctx.get(), Some("S1"));

    manager
        .run_single_task(ExecutionMode::VirtualScreen, &task("scroll down"), &mut ctx)
        .await
        .unwrap();
    assert_eq!(executor.last_task().session, SessionId::Virtual("S1".into()));
}

#[tokio::test]
async fn virtual_screen_without_any_session_is_rejected_before_dispatch() {
    let executor = FakeExecutor::new();
    let manager = manager(&executor);
    let mut ctx = SessionContext::new();

    let err = manager
        .run_single_task(ExecutionMode::VirtualScreen, &task("scroll down"), &mut ctx)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        OrchestrationError::Validation(ValidationError::MissingVirtualSession)
    );
    assert_eq!(executor.runs(), 0);
}

#[tokio::test]
async fn latest_returned_session_wins() {
    let executor = FakeExecutor::new();
    let manager = manager(&executor);
    let mut ctx = SessionContext::new();

    manager
        .run_single_task(ExecutionMode::VirtualScreen, &task_on("launch Notes", "S1"), &mut ctx)
        .await
        .unwrap();
    let result = manager
        .run_single_task(
            ExecutionMode::VirtualScreen,
            &task_on("launch Chrome reply=S2", "S1"),
            &mut ctx,
        )
        .await
        .unwrap();
    assert!(matches!(result, TaskResult::Succeeded { ref session_id, .. } if session_id == "S2"));

    manager
        .run_single_task(ExecutionMode::VirtualScreen, &task("read title"), &mut ctx)
        .await
        .unwrap();
    assert_eq!(executor.last_task().session, SessionId::Virtual("S2".into()));
}

#[tokio::test]
async fn executor_failure_is_a_failed_result_not_an_error() {
    let executor = FakeExecutor::new();
    let manager = manager(&executor);
    let mut ctx = SessionContext::new();
    ctx.set("S1");

    let result = manager
        .run_single_task(ExecutionMode::VirtualScreen, &task_on("fail here", "S7"), &mut ctx)
        .await
        .unwrap();
    assert_eq!(
        result,
        TaskResult::Failed {
            error: "could not finish on S7".to_string()
        }
    );
    assert_eq!(ctx.get(), Some("S1"));
}

#[tokio::test]
async fn single_task_target_is_resolved_to_package() {
    let executor = FakeExecutor::new();
    let manager = manager(&executor);
    let mut ctx = SessionContext::new();

    let request = TaskRequest::builder("send hello")
        .target_app("wechat")
        .max_steps(8)
        .build()
        .unwrap();
    manager
        .run_single_task(ExecutionMode::MainScreen, &request, &mut ctx)
        .await
        .unwrap();

    let sent = executor.last_task();
    assert_eq!(sent.target_app.as_deref(), Some("com.tencent.mm"));
    assert_eq!(sent.max_steps, 8);
}

#[tokio::test]
async fn parallel_conflict_rejects_whole_batch() {
    let executor = FakeExecutor::new();
    let manager = manager(&executor);

    let batch = BatchRequest::new(vec![
        slot("check inbox", "com.example.app", "s1"),
        slot("check outbox", "com.example.app", "s2"),
    ]);
    let err = manager.run_parallel_batch(&batch).await.unwrap_err();
    assert_eq!(
        err,
        OrchestrationError::Validation(ValidationError::TargetConflict {
            first_slot: 1,
            second_slot: 2,
            app: "com.example.app".to_string(),
        })
    );
    assert!(err.to_string().contains("target_app_1 and target_app_2"));
    assert_eq!(executor.runs(), 0);
}

#[tokio::test]
async fn parallel_branch_failure_is_isolated_and_ordered() {
    let executor = FakeExecutor::new();
    let manager = manager(&executor);

    // Slot 1 finishes last, slot 2 fails first.
    let batch = BatchRequest::new(vec![
        slot("search news sleep=80", "Chrome", "s1"),
        slot("fail sending", "WeChat", "s2"),
        slot("write memo sleep=20", "Notes", "s3"),
    ]);
    let response = manager.run_parallel_batch(&batch).await.unwrap();

    assert_eq!(executor.runs(), 3);
    assert_eq!(response.accepted_count, 3);
    assert_eq!(response.success_count, 2);
    assert_eq!(response.summary(), "succeeded 2 / total 3");

    let order: Vec<(usize, bool)> = response
        .results
        .iter()
        .map(|r| (r.slot_index, r.success))
        .collect();
    assert_eq!(order, vec![(1, true), (2, false), (3, true)]);
    assert_eq!(
        response.results[1].error.as_deref(),
        Some("could not finish on s2")
    );
    assert_eq!(
        response.results[0].payload.as_ref().unwrap()["target_app"],
        json!("com.android.chrome")
    );

    let sessions: Vec<Option<&str>> = response
        .results
        .iter()
        .map(|r| r.session_id.as_deref())
        .collect();
    assert_eq!(sessions, vec![Some("s1"), None, Some("s3")]);
}

#[tokio::test]
async fn parallel_reports_session_returned_by_executor() {
    let executor = FakeExecutor::new();
    let manager = manager(&executor);

    let batch = BatchRequest::new(vec![
        slot("launch reply=vd-9", "Chrome", "s1"),
        slot("write memo", "Notes", "s2"),
    ]);
    let response = manager.run_parallel_batch(&batch).await.unwrap();

    assert_eq!(response.results[0].session_id.as_deref(), Some("vd-9"));
    assert_eq!(response.results[1].session_id.as_deref(), Some("s2"));
}

#[tokio::test]
async fn parallel_invalid_step_budget_rejects_batch() {
    let executor = FakeExecutor::new();
    let manager = manager(&executor);

    let batch = BatchRequest::new(vec![
        slot("search", "Chrome", "s1"),
        SlotRequest {
            max_steps: Some(0),
            ..slot("write memo", "Notes", "s2")
        },
    ]);
    let err = manager.run_parallel_batch(&batch).await.unwrap_err();

    assert_eq!(
        err,
        OrchestrationError::Validation(ValidationError::InvalidMaxSteps { value: 0 })
    );
    assert_eq!(executor.runs(), 0);
}

#[tokio::test]
async fn parallel_panicking_branch_only_fails_its_slot() {
    let executor = FakeExecutor::new();
    let manager = manager(&executor);

    let batch = BatchRequest::new(vec![
        slot("panic now", "Chrome", "s1"),
        slot("write memo", "Notes", "s2"),
    ]);
    let response = manager.run_parallel_batch(&batch).await.unwrap();

    assert!(!response.results[0].success);
    assert!(response.results[0].error.as_deref().unwrap().starts_with("Branch aborted"));
    assert!(response.results[1].success);
}

#[tokio::test]
async fn parallel_keeps_inactive_slot_positions() {
    let executor = FakeExecutor::new();
    let manager = manager(&executor);

    let batch = BatchRequest::new(vec![
        SlotRequest::default(),
        slot("write memo", "Notes", "s2"),
        SlotRequest {
            intent: Some("   ".to_string()),
            ..SlotRequest::default()
        },
        slot("search", "Chrome", "s4"),
    ]);
    let response = manager.run_parallel_batch(&batch).await.unwrap();
    let slots: Vec<usize> = response.results.iter().map(|r| r.slot_index).collect();
    assert_eq!(slots, vec![2, 4]);
    assert_eq!(executor.runs(), 2);
}

#[tokio::test]
async fn parallel_requires_explicit_sessions_and_targets() {
    let executor = FakeExecutor::new();
    let manager = manager(&executor);

    let batch = BatchRequest::new(vec![
        slot("a", "Chrome", "s1"),
        slot("b", "Notes", "default"),
        SlotRequest {
            intent: Some("c".to_string()),
            target_app: Some("WeChat".to_string()),
            ..SlotRequest::default()
        },
    ]);
    let err = manager.run_parallel_batch(&batch).await.unwrap_err();
    assert_eq!(
        err,
        OrchestrationError::Validation(ValidationError::InvalidSessions { slots: vec![2, 3] })
    );
    assert_eq!(executor.runs(), 0);
}

#[tokio::test]
async fn parallel_unknown_apps_return_installed_names() {
    let executor = FakeExecutor::new();
    let manager = manager(&executor);

    let batch = BatchRequest::new(vec![
        slot("a", "NoSuchApp", "s1"),
        slot("b", "Notes", "s2"),
    ]);
    let err = manager.run_parallel_batch(&batch).await.unwrap_err();
    let OrchestrationError::Validation(rejection) = err else {
        panic!("expected a validation error");
    };
    let details = rejection.details().unwrap();
    assert_eq!(details["missing_apps"], json!(["NoSuchApp"]));
    assert_eq!(
        details["installed_apps"],
        json!(["Chrome", "Example", "Notes", "WeChat"])
    );
    assert_eq!(executor.runs(), 0);
}

#[tokio::test]
async fn pool_bounds_concurrent_branches() {
    let executor = FakeExecutor::new();
    let registry = FakeRegistry::with_apps(DEFAULT_APPS);
    let manager = manager_with(&executor, &registry, DisplayCapability::VirtualDisplay, 2);

    let batch = BatchRequest::new(vec![
        slot("a sleep=40", "Chrome", "s1"),
        slot("b sleep=40", "WeChat", "s2"),
        slot("c sleep=40", "Example", "s3"),
        slot("d sleep=40", "Notes", "s4"),
    ]);
    let response = manager.run_parallel_batch(&batch).await.unwrap();

    assert_eq!(response.success_count, 4);
    assert!(executor.max_in_flight() <= 2, "ran {} at once", executor.max_in_flight());
}

#[tokio::test]
async fn registry_failure_rejects_before_dispatch() {
    let executor = FakeExecutor::new();
    let registry = FakeRegistry::broken();
    let manager = manager_with(&executor, &registry, DisplayCapability::VirtualDisplay, 0);
    let mut ctx = SessionContext::new();

    let request = TaskRequest::builder("open").target_app("Chrome").build().unwrap();
    let err = manager
        .run_single_task(ExecutionMode::MainScreen, &request, &mut ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestrationError::Registry(RegistryError::QueryFailed { .. })));

    let batch = BatchRequest::new(vec![slot("a", "Chrome", "s1")]);
    assert!(manager.run_parallel_batch(&batch).await.is_err());
    assert_eq!(executor.runs(), 0);
    assert_eq!(registry.queries(), 2);
}

#[tokio::test]
async fn registry_is_queried_on_every_resolution() {
    let executor = FakeExecutor::new();
    let registry = FakeRegistry::with_apps(DEFAULT_APPS);
    let manager = manager_with(&executor, &registry, DisplayCapability::VirtualDisplay, 0);
    let mut ctx = SessionContext::new();

    let request = TaskRequest::builder("open").target_app("Notes").build().unwrap();
    for _ in 0..2 {
        manager
            .run_single_task(ExecutionMode::MainScreen, &request, &mut ctx)
            .await
            .unwrap();
    }
    manager
        .run_single_task(ExecutionMode::MainScreen, &task("no target"), &mut ctx)
        .await
        .unwrap();
    assert_eq!(registry.queries(), 2);
}

#[tokio::test]
async fn main_only_device_refuses_virtual_work() {
    let executor = FakeExecutor::new();
    let registry = FakeRegistry::with_apps(DEFAULT_APPS);
    let manager = manager_with(&executor, &registry, DisplayCapability::MainOnly, 0);
    let mut ctx = SessionContext::new();

    let err = manager
        .run_single_task(ExecutionMode::VirtualScreen, &task_on("x", "S1"), &mut ctx)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        OrchestrationError::Validation(ValidationError::VirtualDisplayUnavailable)
    );

    let batch = BatchRequest::new(vec![slot("a", "Chrome", "s1")]);
    assert!(manager.run_parallel_batch(&batch).await.is_err());

    assert!(
        manager
            .run_single_task(ExecutionMode::MainScreen, &task("x"), &mut ctx)
            .await
            .unwrap()
            .is_success()
    );
    assert_eq!(executor.runs(), 1);
    assert!(manager.usage_advice().contains("not supported"));
}

#[tokio::test]
async fn close_all_clears_context_even_when_teardown_fails() {
    let executor = FakeExecutor::failing_close();
    let manager = manager(&executor);
    let mut ctx = SessionContext::new();
    ctx.set("S1");

    let err = manager.close_all_sessions(&mut ctx).await.unwrap_err();
    assert!(err.to_string().contains("display service unavailable"));
    assert_eq!(ctx.get(), None);
    assert_eq!(executor.close_calls(), 1);
}

#[tokio::test]
async fn resolution_is_case_insensitive() {
    let resolver = AppResolver::new(FakeRegistry::with_apps(&["WeChat (com.tencent.mm)"]));

    let mut found = Vec::new();
    for reference in ["wechat", "WECHAT", "com.tencent.mm"] {
        match resolver.resolve(reference).await.unwrap() {
            Resolution::Found(app) => found.push(app),
            Resolution::NotFound { .. } => panic!("{reference} should resolve"),
        }
    }
    assert!(found.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(found[0].package_id.as_deref(), Some("com.tencent.mm"));
}

#[tokio::test]
async fn unknown_app_returns_valid_names() {
    let resolver = AppResolver::new(FakeRegistry::with_apps(&["Chrome (com.android.chrome)"]));
    assert_eq!(
        resolver.resolve("NoSuchApp").await.unwrap(),
        Resolution::NotFound {
            valid_names: vec!["Chrome".to_string()]
        }
    );
}

#[tokio::test]
async fn shutdown_stops_new_runs() {
    let executor = FakeExecutor::new();
    let manager = manager(&executor);
    let mut ctx = SessionContext::new();

    manager.shutdown();
    let result = manager
        .run_single_task(ExecutionMode::MainScreen, &task("open settings"), &mut ctx)
        .await
        .unwrap();

    assert_eq!(
        result,
        TaskResult::Failed {
            error: "Branch aborted: Branch pool has been closed".to_string()
        }
    );
    assert_eq!(executor.runs(), 0);
}
