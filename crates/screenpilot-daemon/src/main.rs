//! screenpilot Daemon
//!
//! Orchestrates UI automation sub-agents. `serve` speaks line-delimited JSON
//! on stdin/stdout; the other subcommands run one request and print its
//! response line.

use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tracing::info;

use screenpilot_core::config::{Config, DisplayCapability, load_config};
use screenpilot_core::protocol::{Request, Response};
use screenpilot_core::tracing_init::{filter_for, init_tracing};
use screenpilot_core::{BatchRequest, TaskRequest};
use screenpilot_daemon::executor::{CommandAppRegistry, CommandExecutor};
use screenpilot_daemon::orchestration::{OrchestrationManager, SessionContext};
use screenpilot_daemon::server::{handle_request, serve, write_response};

#[derive(Parser, Debug)]
#[command(name = "screenpilot-daemon")]
#[command(version, about = "screenpilot daemon - UI sub-agent orchestrator")]
struct Args {
    /// Explicit JSON config file, applied over global and project config
    #[arg(long, global = true, env = "SCREENPILOT_CONFIG")]
    config: Option<PathBuf>,

    /// Sub-agent executor program
    #[arg(long, global = true, env = "SCREENPILOT_EXECUTOR_BIN")]
    executor_bin: Option<PathBuf>,

    /// Installed-app registry program (defaults to the executor program)
    #[arg(long, global = true, env = "SCREENPILOT_REGISTRY_BIN")]
    registry_bin: Option<PathBuf>,

    /// Maximum concurrent sub-agent runs
    #[arg(long, global = true, env = "SCREENPILOT_MAX_PARALLEL")]
    max_parallel: Option<usize>,

    /// Display capability of the device: "main" or "virtual"
    #[arg(
        long,
        global = true,
        env = "SCREENPILOT_DISPLAY",
        value_parser = DisplayCapability::from_str
    )]
    display: Option<DisplayCapability>,

    /// Per-run sub-agent timeout in seconds
    #[arg(long, global = true, env = "SCREENPILOT_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Include system apps when resolving target apps
    #[arg(long, global = true, env = "SCREENPILOT_INCLUDE_SYSTEM_APPS")]
    include_system_apps: bool,

    /// Log level filter (e.g. "info", "debug", "warn")
    #[arg(long, global = true, env = "SCREENPILOT_LOG_LEVEL")]
    log_level: Option<String>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, global = true, env = "SCREENPILOT_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve line-delimited JSON requests on stdin/stdout
    Serve,
    /// Run one task on the main screen
    Main(TaskArgs),
    /// Run one task on a virtual-display session
    Virtual(TaskArgs),
    /// Run a parallel batch described by a JSON file (`{"slots": [...]}`)
    Parallel {
        #[arg(long)]
        batch: PathBuf,
    },
    /// Tear down every virtual-display session
    CloseAll,
    /// Print capability-dependent usage advice
    Advice,
}

#[derive(clap::Args, Debug)]
struct TaskArgs {
    /// What the sub-agent should do
    intent: String,

    #[arg(long)]
    max_steps: Option<i64>,

    #[arg(long)]
    target_app: Option<String>,

    #[arg(long)]
    session_id: Option<String>,
}

impl TaskArgs {
    fn into_request(self) -> anyhow::Result<TaskRequest> {
        let mut builder = TaskRequest::builder(self.intent);
        if let Some(steps) = self.max_steps {
            builder = builder.max_steps(steps);
        }
        if let Some(app) = self.target_app {
            builder = builder.target_app(app);
        }
        if let Some(session) = self.session_id {
            builder = builder.session_id(session);
        }
        Ok(builder.build()?)
    }
}

impl Args {
    /// CLI flags win over every config layer.
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(ref bin) = self.executor_bin {
            config.executor.program.clone_from(bin);
        }
        if let Some(ref bin) = self.registry_bin {
            config.registry.program = Some(bin.clone());
        }
        if let Some(n) = self.max_parallel {
            config.orchestrator.max_parallel = n;
        }
        if let Some(display) = self.display {
            config.orchestrator.display = display;
        }
        if let Some(secs) = self.timeout_secs {
            config.executor.timeout_secs = secs;
        }
        if self.include_system_apps {
            config.orchestrator.include_system_apps = true;
        }
        if let Some(ref level) = self.log_level {
            config.log_level.clone_from(level);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let project_dir = std::env::current_dir().ok();
    let mut config = load_config(project_dir.as_deref(), args.config.as_deref())?;
    args.apply_overrides(&mut config);

    init_tracing(
        &filter_for(env!("CARGO_PKG_NAME"), &config.log_level),
        args.log_json,
    );

    info!(
        version = env!("CARGO_PKG_VERSION"),
        executor = %config.executor.program.display(),
        display = ?config.orchestrator.display,
        max_parallel = config.orchestrator.max_parallel,
        "Starting screenpilot-daemon"
    );

    let executor = Arc::new(CommandExecutor::from_config(&config.executor));
    let registry = Arc::new(CommandAppRegistry::from_config(
        &config.registry,
        &config.executor,
    ));
    let manager = OrchestrationManager::new(executor, registry, &config.orchestrator);

    let request = match args.command {
        Command::Serve => {
            let served = serve_until_shutdown(&manager).await;
            manager.shutdown();
            served?;
            return Ok(ExitCode::SUCCESS);
        }
        Command::Main(task) => Request::RunMain(task.into_request()?),
        Command::Virtual(task) => Request::RunVirtual(task.into_request()?),
        Command::Parallel { batch } => {
            let content = tokio::fs::read_to_string(&batch).await?;
            let batch: BatchRequest = serde_json::from_str(&content)?;
            Request::RunParallel { slots: batch.slots }
        }
        Command::CloseAll => Request::CloseAllSessions,
        Command::Advice => Request::UsageAdvice,
    };

    let mut ctx = SessionContext::new();
    let response: Response = handle_request(&manager, &mut ctx, request).await;
    let mut stdout = tokio::io::stdout();
    write_response(&mut stdout, &response).await?;

    Ok(if response.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Run the stdio loop until EOF, Ctrl+C or SIGTERM.
async fn serve_until_shutdown(manager: &OrchestrationManager) -> anyhow::Result<()> {
    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    #[cfg(unix)]
    let sigterm_future = sigterm.recv();
    #[cfg(not(unix))]
    let sigterm_future = std::future::pending::<Option<()>>();

    info!("Serving requests on stdin");

    tokio::select! {
        result = serve(manager, BufReader::new(tokio::io::stdin()), tokio::io::stdout()) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C shutdown signal");
        }
        _ = sigterm_future => {
            info!("Received SIGTERM shutdown signal");
        }
    }

    info!("Daemon stopped");
    Ok(())
}
