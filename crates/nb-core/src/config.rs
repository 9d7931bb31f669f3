//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from TOML and carries all
//! sub-configs for the server, storage, artifacts, job execution, auth and
//! external tools. Every section defaults sensibly so an empty file is valid.
//! Environment variables are applied on top of the file by
//! [`Config::apply_env`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::Error;

/// Locations searched when no config path is given explicitly.
pub const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "./nodeblack.toml",
    "./config.toml",
    "~/.config/nodeblack/config.toml",
    "/etc/nodeblack/config.toml",
];

/// Default upload limit: 20 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;

/// Default artifact time-to-live: 10 minutes.
pub const DEFAULT_ARTIFACT_TTL_SECS: u64 = 600;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub artifacts: ArtifactConfig,
    pub jobs: JobsConfig,
    pub auth: AuthConfig,
    pub tools: ToolsConfig,
}

impl Config {
    /// Deserialize a `Config` from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file. A missing or malformed file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Load configuration from `path`, or from the first existing default
    /// location, or fall back to defaults when nothing is found.
    ///
    /// Environment overrides are applied in every case.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::load(p)?,
            None => match Self::find_default_path() {
                Some(p) => {
                    tracing::info!("Using config file {}", p.display());
                    Self::load(&p)?
                }
                None => {
                    tracing::info!("No config file found; using defaults");
                    Self::default()
                }
            },
        };
        config.apply_env();
        Ok(config)
    }

    fn find_default_path() -> Option<PathBuf> {
        DEFAULT_CONFIG_PATHS
            .iter()
            .map(|p| PathBuf::from(shellexpand::tilde(p).as_ref()))
            .find(|p| p.exists())
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides using `lookup` as the environment.
    ///
    /// Recognised keys: `API_KEY`, `NODEBLACK_HOST`, `NODEBLACK_PORT`,
    /// `NODEBLACK_DB_PATH`. Unparseable values are logged and ignored.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("API_KEY").filter(|k| !k.is_empty()) {
            self.auth.dev_key = Some(key);
        }
        if let Some(host) = lookup("NODEBLACK_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("NODEBLACK_PORT") {
            match port.parse() {
                Ok(p) => self.server.port = p,
                Err(e) => tracing::warn!("Ignoring NODEBLACK_PORT={port}: {e}"),
            }
        }
        if let Some(db) = lookup("NODEBLACK_DB_PATH") {
            self.server.db_path = PathBuf::from(db);
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if self.server.max_upload_bytes == 0 {
            warnings.push("server.max_upload_bytes is 0; every upload will be rejected".into());
        }

        if self.artifacts.ttl_secs == 0 {
            warnings.push("artifacts.ttl_secs is 0; artifacts expire immediately".into());
        }

        if self.artifacts.sweep_interval_secs == 0 {
            warnings.push("artifacts.sweep_interval_secs is 0; the expiry sweep is disabled".into());
        }

        if self.jobs.workers == 0 {
            warnings.push("jobs.workers is 0; one worker will be used".into());
        }

        if self.jobs.queue_capacity == 0 {
            warnings.push("jobs.queue_capacity is 0; a capacity of 1 will be used".into());
        }

        if self.auth.enabled && self.auth.keys().next().is_none() {
            warnings.push(
                "auth is enabled but neither api_keys nor API_KEY is set; all conversions will be rejected"
                    .into(),
            );
        }

        let known = [
            "image",
            "document",
            "presentation",
            "audio",
            "spreadsheet",
            "video",
            "audio_extract",
        ];
        for cap in &self.tools.disabled {
            if !known.contains(&cap.as_str()) {
                warnings.push(format!(
                    "tools.disabled entry '{cap}' is not a known capability (valid: {})",
                    known.join(", ")
                ));
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub max_upload_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            db_path: PathBuf::from("./data/nodeblack.db"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// Where uploads and converted outputs live on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("./data/input"),
            output_dir: PathBuf::from("./data/output"),
        }
    }
}

/// Download window and expiry sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    pub ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_ARTIFACT_TTL_SECS,
            sweep_interval_secs: 60,
        }
    }
}

impl ArtifactConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Worker pool and job record settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    /// Per-job limit; `0` disables the timeout.
    pub timeout_secs: u64,
    /// Hours to keep finished job records. `None` keeps them forever.
    pub retention_hours: Option<u64>,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 64,
            timeout_secs: 600,
            retention_hours: None,
        }
    }
}

impl JobsConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// API key authentication settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub enabled: bool,
    pub api_keys: Vec<String>,
    /// Extra key taken from the `API_KEY` environment variable.
    pub dev_key: Option<String>,
    /// Conversions per minute allowed for each key. `0` disables limiting.
    pub rate_limit_per_minute: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_keys: Vec::new(),
            dev_key: None,
            rate_limit_per_minute: 60,
        }
    }
}

impl AuthConfig {
    /// All accepted keys, configured keys first.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.api_keys
            .iter()
            .chain(self.dev_key.iter())
            .map(String::as_str)
            .filter(|k| !k.is_empty())
    }
}

/// External tool overrides and capability switches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub soffice_path: Option<PathBuf>,
    /// Capabilities forced off regardless of tool availability.
    pub disabled: Vec<String>,
}
