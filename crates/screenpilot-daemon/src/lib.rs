//! screenpilot Daemon Library
//!
//! Core functionality for the screenpilot daemon:
//! - Admission control for main-screen, virtual-screen and parallel runs
//! - Target-application resolution and cross-branch conflict detection
//! - Bounded fan-out/fan-in dispatch to UI automation sub-agents
//! - Subprocess-backed executor and app registry
//! - Line-delimited JSON server over stdio

pub mod executor;
pub mod orchestration;
pub mod server;
