// src/infra/config.rs — Configuration loading (TOML + MANIFIX_* env overrides)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::infra::errors::ManifixError;
use crate::infra::paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub watch: WatchConfig,

    #[serde(default)]
    pub sessions: SessionsConfig,

    #[serde(default)]
    pub tool: ToolConfig,

    #[serde(default)]
    pub converter: ConverterConfig,

    #[serde(default)]
    pub api: ApiConfig,
}

/// Drop-folder ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub enabled: bool,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub poll_seconds: u64,
    pub workers: usize,
    pub stability_check_seconds: u64,
    pub stability_max_wait_seconds: u64,
    /// Accepted file extensions, lower-case, without the dot.
    pub extensions: Vec<String>,
    pub queue_capacity: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            input_dir: PathBuf::from("/data/input"),
            output_dir: PathBuf::from("/data/output"),
            poll_seconds: 30,
            workers: 1,
            stability_check_seconds: 3,
            stability_max_wait_seconds: 120,
            extensions: vec!["stl".into()],
            queue_capacity: 256,
        }
    }
}

impl WatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_seconds.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    pub root: PathBuf,
    pub ttl_seconds: u64,
    pub cleanup_seconds: u64,
    pub max_sessions: usize,
    pub max_log_chars: usize,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            root: paths::default_session_root(),
            ttl_seconds: 7200,
            cleanup_seconds: 300,
            max_sessions: 40,
            max_log_chars: 60_000,
        }
    }
}

/// The external mesh-repair tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub admesh_path: String,
    pub timeout_seconds: u64,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            admesh_path: "admesh".into(),
            timeout_seconds: 180,
        }
    }
}

/// The external mesh-conversion program.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    pub program: String,
    pub timeout_seconds: u64,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            program: "assimp".into(),
            timeout_seconds: 180,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

impl Config {
    /// Load config from the default location, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        let config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        Ok(config.with_env_overrides()?.normalized())
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply MANIFIX_* environment variables on top of the file values.
    pub fn with_env_overrides(self) -> Result<Self, ManifixError> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ManifixError> {
        if let Some(v) = lookup("MANIFIX_INPUT_DIR") {
            self.watch.input_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("MANIFIX_OUTPUT_DIR") {
            self.watch.output_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("MANIFIX_WATCH") {
            self.watch.enabled = v == "1" || v.eq_ignore_ascii_case("true");
        }
        if let Some(v) = lookup("MANIFIX_SESSION_ROOT") {
            self.sessions.root = PathBuf::from(v);
        }
        if let Some(v) = lookup("MANIFIX_ADMESH") {
            self.tool.admesh_path = v;
        }
        set_parsed(&lookup, "MANIFIX_POLL_SECONDS", &mut self.watch.poll_seconds)?;
        set_parsed(&lookup, "MANIFIX_WATCH_WORKERS", &mut self.watch.workers)?;
        set_parsed(
            &lookup,
            "MANIFIX_STABILITY_CHECK_SECONDS",
            &mut self.watch.stability_check_seconds,
        )?;
        set_parsed(
            &lookup,
            "MANIFIX_STABILITY_MAX_WAIT_SECONDS",
            &mut self.watch.stability_max_wait_seconds,
        )?;
        set_parsed(&lookup, "MANIFIX_SESSION_TTL_SECONDS", &mut self.sessions.ttl_seconds)?;
        set_parsed(&lookup, "MANIFIX_CLEANUP_SECONDS", &mut self.sessions.cleanup_seconds)?;
        set_parsed(&lookup, "MANIFIX_MAX_SESSIONS", &mut self.sessions.max_sessions)?;
        set_parsed(&lookup, "MANIFIX_MAX_SESSION_LOG_CHARS", &mut self.sessions.max_log_chars)?;
        set_parsed(&lookup, "MANIFIX_ADMESH_TIMEOUT_SECONDS", &mut self.tool.timeout_seconds)?;
        set_parsed(&lookup, "MANIFIX_PORT", &mut self.api.port)?;
        Ok(self)
    }

    /// Clamp values into the ranges the service can actually run with.
    pub fn normalized(mut self) -> Self {
        self.watch.workers = self.watch.workers.max(1);
        self.watch.queue_capacity = self.watch.queue_capacity.max(1);
        self.watch.stability_check_seconds = self.watch.stability_check_seconds.max(1);
        self.watch.stability_max_wait_seconds = self
            .watch
            .stability_max_wait_seconds
            .max(self.watch.stability_check_seconds);
        self.sessions.ttl_seconds = self.sessions.ttl_seconds.max(60);
        self.sessions.cleanup_seconds = self.sessions.cleanup_seconds.max(30);
        self.sessions.max_sessions = self.sessions.max_sessions.max(1);
        self.tool.timeout_seconds = self.tool.timeout_seconds.max(1);
        self.converter.timeout_seconds = self.converter.timeout_seconds.max(1);
        self.watch.extensions = self
            .watch
            .extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        if self.watch.extensions.is_empty() {
            self.watch.extensions.push("stl".into());
        }
        self
    }
}

fn set_parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    slot: &mut T,
) -> Result<(), ManifixError> {
    if let Some(raw) = lookup(key) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|_| ManifixError::Config(format!("{key}={raw:?} is not a valid number")))?;
    }
    Ok(())
}
