//! Subprocess-backed executor and registry.
//!
//! Both invoke one configured program with a subcommand:
//!
//! ```text
//! <program> [args..] run --intent <s> --max-steps <n> --session <id> [--target-app <app>]
//! <program> [args..] close-all
//! <program> [args..] list-apps [--include-system]
//! ```
//!
//! `run` writes newline-delimited JSON to stdout; the last JSON object is the
//! outcome. Lines that are not JSON objects are ignored.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, info, warn};

use screenpilot_core::config::{ExecutorConfig, RegistryConfig};

use super::{
    AppRegistry, ExecutorError, ExecutorOutcome, ExecutorTask, RegistryError, SubAgentExecutor,
};

/// Default timeout per sub-agent run in seconds (10 minutes).
const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Timeout for registry queries and teardown.
const QUICK_COMMAND_TIMEOUT_SECS: u64 = 30;

/// Runs sub-agents by spawning the configured program once per task.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandExecutor {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        let timeout_secs = if config.timeout_secs == 0 {
            DEFAULT_TIMEOUT_SECS
        } else {
            config.timeout_secs
        };
        Self::new(config.program.clone(), config.args.clone())
            .with_timeout(Duration::from_secs(timeout_secs))
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self, subcommand: &str) -> Command {
        base_command(&self.program, &self.args, subcommand)
    }
}

#[async_trait]
impl SubAgentExecutor for CommandExecutor {
    async fn run(&self, task: ExecutorTask) -> Result<ExecutorOutcome, ExecutorError> {
        let mut cmd = self.command("run");
        cmd.arg("--intent")
            .arg(&task.intent)
            .arg("--max-steps")
            .arg(task.max_steps.to_string())
            .arg("--session")
            .arg(task.session.as_str());
        if let Some(ref app) = task.target_app {
            cmd.arg("--target-app").arg(app);
        }

        info!(
            program = %self.program.display(),
            session = %task.session,
            target_app = ?task.target_app,
            max_steps = task.max_steps,
            "Starting sub-agent run"
        );

        let output = run_to_completion(cmd, self.timeout).await?;
        if !output.success {
            return Err(ExecutorError::Failed(output.failure_message()));
        }
        parse_outcome(&output.stdout)
    }

    async fn close_all_sessions(&self) -> Result<(), ExecutorError> {
        let output = run_to_completion(
            self.command("close-all"),
            Duration::from_secs(QUICK_COMMAND_TIMEOUT_SECS),
        )
        .await?;
        if output.success {
            Ok(())
        } else {
            Err(ExecutorError::Failed(output.failure_message()))
        }
    }
}

/// Lists installed apps by running the configured program's `list-apps`.
#[derive(Debug, Clone)]
pub struct CommandAppRegistry {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandAppRegistry {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from config, falling back to the executor program.
    pub fn from_config(registry: &RegistryConfig, executor: &ExecutorConfig) -> Self {
        let program = registry
            .program
            .clone()
            .unwrap_or_else(|| executor.program.clone());
        let args = if registry.program.is_some() {
            registry.args.clone()
        } else {
            executor.args.clone()
        };
        Self::new(program, args)
    }
}

#[async_trait]
impl AppRegistry for CommandAppRegistry {
    async fn list_installed(
        &self,
        include_system_apps: bool,
    ) -> Result<Vec<String>, RegistryError> {
        let mut cmd = base_command(&self.program, &self.args, "list-apps");
        if include_system_apps {
            cmd.arg("--include-system");
        }

        let output = run_to_completion(cmd, Duration::from_secs(QUICK_COMMAND_TIMEOUT_SECS))
            .await
            .map_err(|e| RegistryError::QueryFailed {
                reason: e.to_string(),
            })?;
        if !output.success {
            return Err(RegistryError::QueryFailed {
                reason: output.failure_message(),
            });
        }

        let entries: Vec<String> = output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();
        debug!(count = entries.len(), "Installed apps listed");
        Ok(entries)
    }
}

struct CommandOutput {
    success: bool,
    code: Option<i32>,
    stdout: String,
    stderr: String,
}

impl CommandOutput {
    fn failure_message(&self) -> String {
        self.stderr
            .lines()
            .map(str::trim)
            .rfind(|line| !line.is_empty())
            .map_or_else(
                || format!("Exited with code {}", self.code.unwrap_or(-1)),
                String::from,
            )
    }
}

fn base_command(program: &Path, args: &[String], subcommand: &str) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .arg(subcommand)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

/// Run a command, killing it if it outlives `timeout`.
async fn run_to_completion(
    mut cmd: Command,
    timeout: Duration,
) -> Result<CommandOutput, ExecutorError> {
    let child = cmd.spawn().map_err(|e| ExecutorError::SpawnFailed {
        reason: e.to_string(),
    })?;

    // Dropping the timed-out future drops the child, and kill_on_drop reaps it.
    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| {
            warn!(timeout_secs = timeout.as_secs(), "Subprocess timed out, killing");
            ExecutorError::TimedOut {
                secs: timeout.as_secs(),
            }
        })?
        .map_err(|e| ExecutorError::Failed(format!("Process error: {e}")))?;

    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
        warn!("stderr: {}", line);
    }

    Ok(CommandOutput {
        success: output.status.success(),
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr,
    })
}

/// Extract the outcome from a run's stdout.
///
/// The last JSON object line wins. Its `session_id` (or `agentId`) names the
/// session the run ended on; an explicit `"success": false` is a failure.
fn parse_outcome(stdout: &str) -> Result<ExecutorOutcome, ExecutorError> {
    let Some(payload) = stdout
        .lines()
        .rev()
        .filter_map(|line| serde_json::from_str::<Value>(line.trim()).ok())
        .find(Value::is_object)
    else {
        return Err(ExecutorError::NoResult);
    };

    if payload.get("success").and_then(Value::as_bool) == Some(false) {
        let message = payload
            .get("error")
            .or_else(|| payload.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("Sub-agent reported failure")
            .to_string();
        return Err(ExecutorError::Failed(message));
    }

    let session_id = ["session_id", "agentId", "agent_id"]
        .iter()
        .find_map(|key| payload.get(*key).and_then(Value::as_str))
        .unwrap_or("")
        .to_string();

    Ok(ExecutorOutcome {
        session_id,
        payload,
    })
}
