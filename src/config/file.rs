//! TOML configuration file loading
//!
//! Supports `~/.config/slideshow-manager/config.toml` as a persistent config
//! source. All fields are optional; the file is a partial overlay on top of
//! defaults.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ManagerConfigFile {
    /// Registry storage
    #[serde(default)]
    pub storage: StorageFileConfig,

    /// Device gateway settings
    #[serde(default)]
    pub remote: RemoteFileConfig,

    /// Operator authentication
    #[serde(default)]
    pub auth: AuthFileConfig,

    /// HTTP server
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Self-update
    #[serde(default)]
    pub updates: UpdatesFileConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct StorageFileConfig {
    /// Path of the device registry JSON file
    pub path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RemoteFileConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: Option<f64>,

    /// Hostnames devices may point at; empty allows any
    pub allowed_hosts: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuthFileConfig {
    /// "host" or "static"
    pub mode: Option<String>,

    /// Credential table for static mode
    #[serde(default)]
    pub users: HashMap<String, String>,

    /// Host identity checker program
    pub host_program: Option<String>,

    /// PAM service name for the checker
    pub host_service: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdatesFileConfig {
    /// GitHub repository as `owner/name`
    pub repo: Option<String>,

    /// Token for private repositories
    pub token: Option<String>,

    /// GitHub API base URL
    pub api_url: Option<String>,

    /// Update script path
    pub script: Option<PathBuf>,

    /// Script time limit in seconds
    pub timeout_secs: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    pub port: Option<u16>,
    pub bind: Option<String>,
}

/// Load the config file, returning defaults if missing or unparseable
pub fn load_config_file(path: Option<&Path>) -> ManagerConfigFile {
    let Some(path) = path.map(Path::to_path_buf).or_else(config_file_path) else {
        return ManagerConfigFile::default();
    };

    if !path.exists() {
        return ManagerConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                ManagerConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read config file");
            ManagerConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/slideshow-manager/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new()
        .map(|d| d.config_dir().join("slideshow-manager").join("config.toml"))
}
