//! Application configuration.
//!
//! Values are layered: built-in defaults, then the TOML config file, then
//! `DESKPILOT__SECTION__KEY` environment variables. Nothing is mutated at runtime.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::info;

pub const APP_NAME: &str = "deskpilot";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub server: ServerConfig,
    /// Hosted vision-language model.
    pub inference: InferenceConfig,
    /// Remote desktop sandbox service.
    pub sandbox: SandboxConfig,
    /// Desktop geometry announced to the model.
    pub desktop: DesktopConfig,
    /// Per-request limits of the dispatch loop.
    pub agent: AgentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allowed CORS origins. Empty means any origin.
    pub cors_origins: Vec<String>,
    /// Maximum request body size in kilobytes (default: 2048).
    pub max_body_size_kb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(),
            max_body_size_kb: 2048,
        }
    }
}

/// Inference endpoint configuration (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Base URL, e.g. "https://api.together.xyz/v1".
    pub base_url: String,
    /// Bearer credential. Required to serve.
    pub api_key: Option<String>,
    /// Model identifier sent with every request.
    pub model: String,
    /// Response length ceiling in tokens.
    pub max_tokens: u32,
    /// Seconds allowed for the endpoint to accept the stream.
    pub connect_timeout_secs: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.together.xyz/v1".to_string(),
            api_key: None,
            model: "Qwen/Qwen2.5-VL-72B-Instruct".to_string(),
            max_tokens: 2048,
            connect_timeout_secs: 30,
        }
    }
}

/// Sandbox service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Base URL of the sandbox control API.
    pub api_url: String,
    /// API key sent as `X-API-Key`. Required to serve.
    pub api_key: Option<String>,
    /// Template used when starting a new desktop.
    pub template: String,
    /// Timeout for a single desktop command in seconds.
    pub request_timeout_secs: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.e2b.dev".to_string(),
            api_key: None,
            template: "desktop".to_string(),
            request_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DesktopConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for DesktopConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Total wall-clock ceiling for one chat request.
    pub max_request_duration_secs: u64,
    /// Most recent messages kept when pruning history.
    pub max_history_messages: usize,
    /// Per-message content ceiling in characters.
    pub max_message_chars: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_request_duration_secs: 300,
            max_history_messages: 30,
            max_message_chars: 8000,
        }
    }
}

impl AppConfig {
    /// Check that everything needed to serve requests is present.
    pub fn validate(&self) -> Result<()> {
        if self.inference.api_key.as_deref().is_none_or(str::is_empty) {
            bail!(
                "inference.api_key must be set (config file or {}__INFERENCE__API_KEY)",
                env_prefix()
            );
        }
        if self.sandbox.api_key.as_deref().is_none_or(str::is_empty) {
            bail!(
                "sandbox.api_key must be set (config file or {}__SANDBOX__API_KEY)",
                env_prefix()
            );
        }
        if self.desktop.width == 0 || self.desktop.height == 0 {
            bail!("desktop resolution must be non-zero");
        }
        if self.agent.max_history_messages == 0 {
            bail!("agent.max_history_messages must be at least 1");
        }
        Ok(())
    }
}

/// Load configuration from `path` plus environment overrides.
///
/// The file is created with defaults when it does not exist, unless `dry_run` is set.
pub fn load_or_init(path: &Path, dry_run: bool) -> Result<AppConfig> {
    if !path.exists() {
        if dry_run {
            info!("dry-run: would create default config at {}", path.display());
        } else {
            write_default_config(path)?;
        }
    }

    let built = Config::builder()
        .set_default("logging.level", "info")?
        .add_source(
            File::from(path)
                .format(FileFormat::Toml)
                .required(false),
        )
        .add_source(Environment::with_prefix(env_prefix().as_str()).separator("__"))
        .build()?;

    let mut config: AppConfig = built.try_deserialize()?;

    if let Some(ref file) = config.logging.file {
        let expanded = expand_str_path(file)?;
        config.logging.file = Some(expanded.display().to_string());
    }

    Ok(config)
}

pub fn write_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {parent:?}"))?;
    }

    let config = AppConfig::default();
    let toml = toml::to_string_pretty(&config).context("serializing default config to TOML")?;
    let mut body = String::new();
    body.push_str("# Configuration for ");
    body.push_str(APP_NAME);
    body.push('\n');
    body.push_str("# File: ");
    body.push_str(&path.display().to_string());
    body.push_str("\n\n");
    body.push_str(&toml);
    fs::write(path, body).with_context(|| format!("writing config file to {}", path.display()))
}

/// Resolve the config file location, honouring an explicit override.
pub fn resolve_config_path(override_path: Option<PathBuf>) -> Result<PathBuf> {
    let config_file = match override_path {
        Some(path) => {
            let expanded = expand_path(path)?;
            if expanded.is_dir() {
                expanded.join("config.toml")
            } else {
                expanded
            }
        }
        None => default_config_dir()?.join("config.toml"),
    };

    if config_file.parent().is_none() {
        return Err(anyhow!("invalid config file path: {config_file:?}"));
    }
    Ok(config_file)
}

pub fn env_prefix() -> String {
    APP_NAME
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

fn expand_path(path: PathBuf) -> Result<PathBuf> {
    if let Some(text) = path.to_str() {
        expand_str_path(text)
    } else {
        Ok(path)
    }
}

fn expand_str_path(text: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(text).context("expanding path")?;
    Ok(PathBuf::from(expanded.to_string()))
}

fn default_config_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        let mut path = PathBuf::from(dir);
        path.push(APP_NAME);
        return Ok(path);
    }

    if let Some(mut dir) = dirs::config_dir() {
        dir.push(APP_NAME);
        return Ok(dir);
    }

    dirs::home_dir()
        .map(|home| home.join(".config").join(APP_NAME))
        .ok_or_else(|| anyhow!("unable to determine configuration directory"))
}
