//! screenpilot Core Library
//!
//! Shared functionality for screenpilot components:
//! - Task model (execution modes, session ids, validated requests)
//! - Line-delimited JSON request/response protocol
//! - Configuration resolution and hierarchy
//! - Common error types

pub mod config;
pub mod error;
pub mod protocol;
pub mod task;
pub mod tracing_init;

pub use config::{Config, DisplayCapability};
pub use error::{Error, Result, ValidationError};
pub use task::{
    BatchRequest, DEFAULT_MAX_STEPS, DEFAULT_SESSION, ExecutionMode, MAX_PARALLEL_SLOTS,
    SessionId, SlotRequest, TaskRequest,
};
