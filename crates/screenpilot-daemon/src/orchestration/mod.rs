//! Task orchestration: admission, conflict detection, bounded dispatch, and
//! result aggregation.
//!
//! - [`OrchestrationManager`]: entry point for single tasks, parallel
//!   batches, session teardown and usage advice.
//! - [`Validator`]: per-mode admission rules, checked before anything runs.
//! - [`AppResolver`]: matches informal app references against the registry.
//! - [`BranchPool`]: semaphore-based limit on concurrent sub-agent runs.
//! - [`SessionContext`]: caller-owned memory of the last virtual session.

pub mod advice;
pub mod aggregator;
pub mod conflict;
pub mod dispatcher;
pub mod manager;
pub mod pool;
pub mod resolver;
pub mod session;
pub mod validator;

pub use aggregator::{BatchResponse, BranchResult, TaskResult};
pub use manager::OrchestrationManager;
pub use pool::BranchPool;
pub use resolver::{AppResolver, InstalledApp, InstalledApps, Resolution};
pub use session::SessionContext;
pub use validator::{OrchestrationError, Validator};
