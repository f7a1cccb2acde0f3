//! Shell configuration: defaults, optional TOML file, `OZONE__*` environment overrides.
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | backend_url | http://127.0.0.1:8001 | Base URL of the backend REST surface. |
//! | affect_enabled | true | Affect/reflection features (polling, triggers, speech). |
//! | primary_orchestration | true | Use the one-shot orchestration call; false forces the fallback path. |
//! | token_budget | 32000 | Ceiling sent with every orchestration call. |
//! | affect_poll_ms / mic_poll_ms / connection_poll_ms | 5000 / 500 / 30000 | Poller periods. |
//! | default_voice_style / default_speech_rate | neutral / 1.0 | Used between thresholds and when the identity profile is unavailable. |
//! | panel_module_dir | unset | Directory searched for `ozone_panel_<id>` libraries. |
//! | `[[pipelines]]` | empty | Extra registry entries. |

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::registry::{PipelineUiEntry, DEFAULT_PANEL_ID};

/// Token ceiling for one orchestration call.
pub const DEFAULT_TOKEN_BUDGET: u32 = 32_000;

const DEFAULT_CONFIG_PATH: &str = "config/shell";
const ENV_PREFIX: &str = "OZONE";

fn default_app_name() -> String {
    "Ozone".to_string()
}

fn default_backend_url() -> String {
    "http://127.0.0.1:8001".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_user_id() -> String {
    "local-user".to_string()
}

fn default_device_id() -> String {
    "local-device".to_string()
}

fn default_true() -> bool {
    true
}

fn default_token_budget() -> u32 {
    DEFAULT_TOKEN_BUDGET
}

fn default_affect_poll_ms() -> u64 {
    5_000
}

fn default_mic_poll_ms() -> u64 {
    500
}

fn default_connection_poll_ms() -> u64 {
    30_000
}

fn default_voice_style() -> String {
    "neutral".to_string()
}

fn default_speech_rate() -> f64 {
    1.0
}

fn default_panel_id() -> String {
    DEFAULT_PANEL_ID.to_string()
}

/// Everything the shell reads at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShellConfig {
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_user_id")]
    pub user_id: String,
    #[serde(default = "default_device_id")]
    pub device_id: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub workspace_id: Option<String>,

    /// Affect feature flag at startup; toggled at runtime through the shell.
    #[serde(default = "default_true")]
    pub affect_enabled: bool,
    #[serde(default = "default_true")]
    pub primary_orchestration: bool,
    #[serde(default = "default_token_budget")]
    pub token_budget: u32,

    #[serde(default = "default_affect_poll_ms")]
    pub affect_poll_ms: u64,
    #[serde(default = "default_mic_poll_ms")]
    pub mic_poll_ms: u64,
    #[serde(default = "default_connection_poll_ms")]
    pub connection_poll_ms: u64,

    #[serde(default = "default_voice_style")]
    pub default_voice_style: String,
    #[serde(default = "default_speech_rate")]
    pub default_speech_rate: f64,

    /// Selection fallback when the last panel is removed.
    #[serde(default = "default_panel_id")]
    pub default_panel_id: String,
    #[serde(default)]
    pub panel_module_dir: Option<PathBuf>,

    #[serde(default)]
    pub pipelines: Vec<PipelineUiEntry>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            backend_url: default_backend_url(),
            request_timeout_secs: default_request_timeout_secs(),
            user_id: default_user_id(),
            device_id: default_device_id(),
            project_id: None,
            workspace_id: None,
            affect_enabled: true,
            primary_orchestration: true,
            token_budget: DEFAULT_TOKEN_BUDGET,
            affect_poll_ms: default_affect_poll_ms(),
            mic_poll_ms: default_mic_poll_ms(),
            connection_poll_ms: default_connection_poll_ms(),
            default_voice_style: default_voice_style(),
            default_speech_rate: default_speech_rate(),
            default_panel_id: default_panel_id(),
            panel_module_dir: None,
            pipelines: Vec::new(),
        }
    }
}

impl ShellConfig {
    /// Load from file and environment. Precedence: `OZONE__*` env > `OZONE_CONFIG` path
    /// (default `config/shell[.toml]`) > defaults.
    pub fn load() -> Result<Self, CoreError> {
        let config_path = std::env::var("OZONE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_with(Path::new(&config_path), ENV_PREFIX)
    }

    /// Load from an explicit file (missing is fine) with the given environment prefix.
    pub fn load_with(path: &Path, env_prefix: &str) -> Result<Self, CoreError> {
        let path_str = path.to_string_lossy();
        let built = config::Config::builder()
            .add_source(config::File::with_name(&path_str).required(false))
            .add_source(
                config::Environment::with_prefix(env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: ShellConfig = built.try_deserialize()?;
        tracing::debug!(
            target: "ozone::config",
            path = %path.display(),
            backend_url = %cfg.backend_url,
            extra_pipelines = cfg.pipelines.len(),
            "shell config loaded"
        );
        Ok(cfg)
    }

    /// Write the config as TOML (used by the settings surface to persist local changes).
    pub fn save_to_path(&self, path: &Path) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)
    }

    pub fn affect_poll_interval(&self) -> Duration {
        Duration::from_millis(self.affect_poll_ms)
    }

    pub fn mic_poll_interval(&self) -> Duration {
        Duration::from_millis(self.mic_poll_ms)
    }

    pub fn connection_poll_interval(&self) -> Duration {
        Duration::from_millis(self.connection_poll_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Runtime feature flags shared by the orchestrator and the bridges.
#[derive(Debug, Clone)]
pub struct FeatureFlags {
    affect_enabled: Arc<AtomicBool>,
}

impl FeatureFlags {
    pub fn new(affect_enabled: bool) -> Self {
        Self {
            affect_enabled: Arc::new(AtomicBool::new(affect_enabled)),
        }
    }

    pub fn affect_enabled(&self) -> bool {
        self.affect_enabled.load(Ordering::SeqCst)
    }

    /// Returns the previous value.
    pub fn set_affect_enabled(&self, enabled: bool) -> bool {
        self.affect_enabled.swap(enabled, Ordering::SeqCst)
    }
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self::new(true)
    }
}
