//! Configuration resolution for screenpilot.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (<platform config dir>/screenpilot/settings.json)
//! 3. Project config (.screenpilot/settings.json)
//! 4. Explicit config file (`--config`)
//! 5. Environment variables
//! 6. CLI arguments (highest priority, applied by the binary)

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};
use crate::task::{DEFAULT_MAX_STEPS, MAX_PARALLEL_SLOTS};

/// Complete screenpilot configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub orchestrator: OrchestratorConfig,
    pub executor: ExecutorConfig,
    pub registry: RegistryConfig,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            orchestrator: OrchestratorConfig::default(),
            executor: ExecutorConfig::default(),
            registry: RegistryConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

/// Whether the device can host virtual displays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayCapability {
    /// Only the main screen exists; virtual and parallel runs are refused.
    MainOnly,
    /// Virtual-display sessions are available.
    #[default]
    VirtualDisplay,
}

impl std::str::FromStr for DisplayCapability {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "main" | "main_only" | "main-only" | "main_screen" => Ok(Self::MainOnly),
            "virtual" | "virtual_display" | "virtual-display" => Ok(Self::VirtualDisplay),
            other => Err(Error::Config(format!("Unknown display capability: {other}"))),
        }
    }
}

/// Admission and dispatch settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Concurrent sub-agent runs across all dispatches (0 = default).
    pub max_parallel: usize,
    /// Step budget for requests that omit one.
    pub default_max_steps: u32,
    pub display: DisplayCapability,
    /// Pass system apps to the registry query.
    pub include_system_apps: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_parallel: MAX_PARALLEL_SLOTS,
            default_max_steps: DEFAULT_MAX_STEPS,
            display: DisplayCapability::default(),
            include_system_apps: false,
        }
    }
}

/// Sub-agent executor program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub program: PathBuf,
    /// Arguments placed before the subcommand.
    pub args: Vec<String>,
    /// Per-run timeout in seconds (0 = default).
    pub timeout_secs: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ui-subagent"),
            args: Vec::new(),
            timeout_secs: 600,
        }
    }
}

/// Installed-app registry program. Defaults to the executor program.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub program: Option<PathBuf>,
    pub args: Vec<String>,
}

/// Load configuration with hierarchical resolution.
pub fn load_config(project_dir: Option<&Path>, explicit: Option<&Path>) -> Result<Config> {
    let mut layers = Vec::new();

    if let Some(global_path) = global_config_path()
        && global_path.exists()
    {
        layers.push(global_path);
    }

    if let Some(dir) = project_dir {
        let project_path = dir.join(".screenpilot").join("settings.json");
        if project_path.exists() {
            layers.push(project_path);
        }
    }

    // An explicitly named file must exist
    if let Some(path) = explicit {
        layers.push(path.to_path_buf());
    }

    let mut config = config_from_layers(&layers)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;

    Ok(config)
}

/// Get the global config file path.
///
/// `$XDG_CONFIG_HOME/screenpilot/settings.json` on Linux, the platform
/// config directory elsewhere.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("screenpilot").join("settings.json"))
}

/// Deep-merge config files in order, then deserialize once.
///
/// A later file only overrides the keys it actually sets.
fn config_from_layers(paths: &[PathBuf]) -> Result<Config> {
    let mut merged = Value::Object(Map::new());
    for path in paths {
        merge_value(&mut merged, load_config_file(path)?);
    }
    serde_json::from_value(merged)
        .map_err(|e| Error::Config(format!("Invalid configuration: {e}")))
}

fn load_config_file(path: &Path) -> Result<Value> {
    debug!(path = %path.display(), "Loading config file");
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    let value: Value = serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })?;
    if !value.is_object() {
        return Err(Error::Config(format!(
            "Config file {} must contain a JSON object",
            path.display()
        )));
    }
    Ok(value)
}

fn merge_value(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge_value(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn apply_env_overrides(
    config: &mut Config,
    var: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(val) = var("SCREENPILOT_MAX_PARALLEL")
        && let Ok(n) = val.parse()
    {
        config.orchestrator.max_parallel = n;
    }
    if let Some(val) = var("SCREENPILOT_DEFAULT_MAX_STEPS")
        && let Ok(n) = val.parse()
    {
        config.orchestrator.default_max_steps = n;
    }
    if let Some(val) = var("SCREENPILOT_DISPLAY") {
        config.orchestrator.display = val.parse()?;
    }
    if let Some(val) = var("SCREENPILOT_EXECUTOR_BIN") {
        config.executor.program = PathBuf::from(val);
    }
    if let Some(val) = var("SCREENPILOT_REGISTRY_BIN") {
        config.registry.program = Some(PathBuf::from(val));
    }
    if let Some(val) = var("SCREENPILOT_TIMEOUT_SECS")
        && let Ok(n) = val.parse()
    {
        config.executor.timeout_secs = n;
    }
    if let Some(val) = var("SCREENPILOT_LOG_LEVEL") {
        config.log_level = val;
    }
    Ok(())
}
