//! Configuration management for the slideshow manager

pub mod file;

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::gateway::DEFAULT_TIMEOUT;
use crate::security::auth::parse_static_users;
use crate::security::{AuthConfig, AuthMode};
use crate::updates::{
    UpdateConfig, DEFAULT_GITHUB_API, DEFAULT_UPDATE_SCRIPT, DEFAULT_UPDATE_TIMEOUT,
};
use crate::{Error, Result};

/// Default HTTP API port
pub const DEFAULT_PORT: u16 = 8000;

/// Slideshow manager configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Device registry JSON file
    pub storage_path: PathBuf,

    /// Timeout applied to every device request
    pub remote_timeout: Duration,

    /// Hostnames devices may point at; empty allows any
    pub allowed_hosts: Vec<String>,

    /// Operator authentication
    pub auth: AuthConfig,

    /// HTTP API server configuration
    pub api_server: ApiServerConfig,

    /// Release branch lookup and update script
    pub updates: UpdateConfig,
}

/// HTTP API server configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Address to bind
    pub bind: String,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: "0.0.0.0".to_string(),
        }
    }
}

/// Default registry location: `<data_dir>/slideshow-manager/devices.json`
pub fn default_storage_path() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from("devices.json"),
        |d| d.data_dir().join("slideshow-manager").join("devices.json"),
    )
}

impl Config {
    /// Load configuration from the process environment and config file
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for an unsupported auth mode or a
    /// non-positive timeout
    pub fn load() -> Result<Self> {
        let override_path = std::env::var("SLIDESHOW_MANAGER_CONFIG").ok().map(PathBuf::from);
        Self::load_from(override_path.as_deref(), |key| std::env::var(key).ok())
    }

    /// Load configuration from an explicit file and variable lookup
    ///
    /// # Errors
    ///
    /// Same as [`Config::load`]
    pub fn load_from(path: Option<&Path>, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let fc = file::load_config_file(path);

        let storage_path = env("SLIDESHOW_MANAGER_STORAGE_PATH")
            .map(PathBuf::from)
            .or(fc.storage.path)
            .unwrap_or_else(default_storage_path);

        // Remote timeout (env > toml > default)
        let remote_timeout = seconds(
            "SLIDESHOW_MANAGER_REMOTE_TIMEOUT",
            env("SLIDESHOW_MANAGER_REMOTE_TIMEOUT"),
            fc.remote.timeout_secs,
        )?
        .unwrap_or(DEFAULT_TIMEOUT);

        let allowed_hosts = env("SLIDESHOW_MANAGER_ALLOWED_HOSTS")
            .map(|raw| raw.split(',').map(ToString::to_string).collect())
            .or(fc.remote.allowed_hosts)
            .unwrap_or_default()
            .into_iter()
            .map(|h: String| h.trim().to_lowercase())
            .filter(|h| !h.is_empty())
            .collect();

        // Auth config (env > toml > default)
        let mode = match env("SLIDESHOW_MANAGER_AUTH_MODE").or(fc.auth.mode) {
            Some(raw) => raw.parse::<AuthMode>()?,
            None => AuthMode::default(),
        };
        let static_users = env("SLIDESHOW_MANAGER_STATIC_USERS")
            .map(|raw| parse_static_users(&raw))
            .unwrap_or(fc.auth.users);
        let auth = AuthConfig {
            mode,
            static_users,
            host_program: env("SLIDESHOW_MANAGER_HOST_AUTH_PROGRAM").or(fc.auth.host_program),
            host_service: env("SLIDESHOW_MANAGER_HOST_AUTH_SERVICE").or(fc.auth.host_service),
        };

        if auth.mode == AuthMode::Static && auth.static_users.is_empty() {
            tracing::warn!("static auth mode has no users configured, every login will be refused");
        }

        let defaults = ApiServerConfig::default();
        let api_server = ApiServerConfig {
            port: env("SLIDESHOW_MANAGER_PORT")
                .or_else(|| env("PORT"))
                .and_then(|s| s.parse().ok())
                .or(fc.server.port)
                .unwrap_or(defaults.port),
            bind: env("SLIDESHOW_MANAGER_BIND")
                .or(fc.server.bind)
                .unwrap_or(defaults.bind),
        };

        let updates = UpdateConfig {
            repo: env("SLIDESHOW_MANAGER_REPO").or(fc.updates.repo),
            token: env("SLIDESHOW_MANAGER_REPO_TOKEN").or(fc.updates.token),
            api_url: env("SLIDESHOW_MANAGER_GITHUB_API")
                .or(fc.updates.api_url)
                .unwrap_or_else(|| DEFAULT_GITHUB_API.to_string()),
            script: env("SLIDESHOW_MANAGER_UPDATE_SCRIPT")
                .map(PathBuf::from)
                .or(fc.updates.script)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_UPDATE_SCRIPT)),
            timeout: seconds(
                "SLIDESHOW_MANAGER_UPDATE_TIMEOUT",
                env("SLIDESHOW_MANAGER_UPDATE_TIMEOUT"),
                fc.updates.timeout_secs,
            )?
            .unwrap_or(DEFAULT_UPDATE_TIMEOUT),
        };

        Ok(Self {
            storage_path,
            remote_timeout,
            allowed_hosts,
            auth,
            api_server,
            updates,
        })
    }
}

/// Positive duration in seconds from an env value or a file value
fn seconds(name: &str, raw: Option<String>, file: Option<f64>) -> Result<Option<Duration>> {
    let secs = match raw {
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .map_err(|e| Error::Config(format!("invalid {name} '{raw}': {e}")))?,
        None => match file {
            Some(secs) => secs,
            None => return Ok(None),
        },
    };

    if !secs.is_finite() || secs <= 0.0 {
        return Err(Error::Config(format!("{name} must be positive, got {secs}")));
    }
    Duration::try_from_secs_f64(secs)
        .map(Some)
        .map_err(|e| Error::Config(format!("{name} {secs} is out of range: {e}")))
}
