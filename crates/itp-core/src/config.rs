//! Configuration system for ITP.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $ITP_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/itp/config.toml
//!   3. ~/.config/itp/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ItpConfig {
    pub server: ServerConfig,
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind: String,
    /// TCP port. 0 = OS-assigned.
    pub port: u16,
    /// Directory holding `<name>.<EXT>` image files.
    pub resource_root: PathBuf,
    /// Timestamp tick interval in milliseconds.
    pub tick_ms: u64,
    /// Longest file name a request may declare.
    pub max_name_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Protocol version sent in every request (4 bits).
    pub version: u8,
    /// Where received images are written.
    pub download_dir: PathBuf,
    /// Launch the platform image viewer after a successful fetch.
    pub open_viewer: bool,
    /// Largest image a response may declare.
    pub max_image_bytes: usize,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

pub const DEFAULT_PORT: u16 = 8000;

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            resource_root: default_resource_root(),
            tick_ms: 10,
            max_name_bytes: 4096,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            version: 7,
            download_dir: PathBuf::from("."),
            open_viewer: true,
            max_image_bytes: 256 * 1024 * 1024,
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

/// `images/` next to the running executable.
fn default_resource_root() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("images")))
        .unwrap_or_else(|| PathBuf::from("images"))
}

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("itp")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl ItpConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            ItpConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("ITP_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&ItpConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply ITP_* env var overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup. Unparseable values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("ITP_SERVER__BIND") {
            self.server.bind = v;
        }
        if let Some(p) = lookup("ITP_SERVER__PORT").and_then(|v| v.parse().ok()) {
            self.server.port = p;
        }
        if let Some(v) = lookup("ITP_SERVER__RESOURCE_ROOT") {
            self.server.resource_root = PathBuf::from(v);
        }
        if let Some(v) = lookup("ITP_CLIENT__HOST") {
            self.client.host = v;
        }
        if let Some(p) = lookup("ITP_CLIENT__PORT").and_then(|v| v.parse().ok()) {
            self.client.port = p;
        }
        if let Some(v) = lookup("ITP_CLIENT__VERSION").and_then(|v| v.parse().ok()) {
            self.client.version = v;
        }
        if let Some(v) = lookup("ITP_CLIENT__DOWNLOAD_DIR") {
            self.client.download_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("ITP_CLIENT__OPEN_VIEWER") {
            self.client.open_viewer = v == "true" || v == "1";
        }
    }
}
