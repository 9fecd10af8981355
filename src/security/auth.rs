//! Operator authentication
//!
//! Two interchangeable backends sit behind [`Authenticator`]:
//! - Host: delegates to a host identity checker program (PAM via `pamtester` by default)
//! - Static: fixed in-memory credential table, for tests and appliances
//!
//! The backend is chosen once at startup. Every failure path answers
//! `false`; nothing ever authenticates by accident.

use std::collections::HashMap;
use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

use crate::{Error, Result};

/// Default host identity checker
pub const DEFAULT_HOST_PROGRAM: &str = "pamtester";

/// Default PAM service consulted by the host checker
pub const DEFAULT_HOST_SERVICE: &str = "login";

/// How long the host checker may run before the attempt is refused
const HOST_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Which authentication backend to use for operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    /// Check credentials against the host's user database
    #[default]
    Host,

    /// Check credentials against a configured table
    Static,
}

impl FromStr for AuthMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "host" | "pam" | "system" => Ok(Self::Host),
            "static" => Ok(Self::Static),
            other => Err(Error::Config(format!("unsupported auth mode '{other}'"))),
        }
    }
}

impl std::fmt::Display for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Host => write!(f, "host"),
            Self::Static => write!(f, "static"),
        }
    }
}

/// Operator authentication configuration
#[derive(Clone, Default)]
pub struct AuthConfig {
    /// Selected backend
    pub mode: AuthMode,

    /// Username to password table for `Static` mode
    pub static_users: HashMap<String, String>,

    /// Checker program for `Host` mode
    pub host_program: Option<String>,

    /// PAM service name passed to the checker
    pub host_service: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut users: Vec<&str> = self.static_users.keys().map(String::as_str).collect();
        users.sort_unstable();
        f.debug_struct("AuthConfig")
            .field("mode", &self.mode)
            .field("static_users", &users)
            .field("host_program", &self.host_program)
            .field("host_service", &self.host_service)
            .finish()
    }
}

/// Parse `user:pass,user2:pass2` into a credential table
///
/// Entries without a `:` are skipped.
#[must_use]
pub fn parse_static_users(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|entry| entry.split_once(':'))
        .map(|(user, pass)| (user.trim().to_string(), pass.to_string()))
        .collect()
}

/// Capability to check an operator's credentials
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Whether the credentials are valid; fails closed
    async fn authenticate(&self, username: &str, password: &str) -> bool;
}

/// Fixed credential table
#[derive(Clone, Default)]
pub struct StaticAuthenticator {
    users: HashMap<String, String>,
}

impl StaticAuthenticator {
    /// Build from a table; entries with an empty name or password are dropped
    #[must_use]
    pub fn new(users: HashMap<String, String>) -> Self {
        let users = users
            .into_iter()
            .filter(|(name, pass)| !name.is_empty() && !pass.is_empty())
            .collect();
        Self { users }
    }

    fn check(&self, username: &str, password: &str) -> bool {
        self.users
            .get(username)
            .is_some_and(|expected| constant_time_eq(expected.as_bytes(), password.as_bytes()))
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn authenticate(&self, username: &str, password: &str) -> bool {
        self.check(username, password)
    }
}

/// Host identity check through an external program
///
/// Runs `<program> <service> <username> authenticate` with the password on
/// stdin. Exit status zero means the host accepted the credentials.
#[derive(Debug, Clone)]
pub struct HostAuthenticator {
    program: String,
    service: String,
    timeout: Duration,
}

impl Default for HostAuthenticator {
    fn default() -> Self {
        Self::new(DEFAULT_HOST_PROGRAM, DEFAULT_HOST_SERVICE)
    }
}

impl HostAuthenticator {
    /// Create a checker for the given program and service
    #[must_use]
    pub fn new(program: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            service: service.into(),
            timeout: HOST_CHECK_TIMEOUT,
        }
    }

    /// Override how long the checker may run
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn check(&self, username: &str, password: &str) -> std::result::Result<bool, String> {
        let mut child = Command::new(&self.program)
            .arg(&self.service)
            .arg(username)
            .arg("authenticate")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("failed to spawn {}: {e}", self.program))?;

        // The checker may exit before reading; its exit status still decides
        if let Some(mut stdin) = child.stdin.take()
            && let Err(e) = stdin.write_all(format!("{password}\n").as_bytes()).await
        {
            tracing::debug!(program = %self.program, error = %e, "checker closed stdin early");
        }

        let output = timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| format!("checker timed out after {:?}", self.timeout))?
            .map_err(|e| format!("checker failed: {e}"))?;

        if !output.stderr.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::debug!(
                program = %self.program,
                stderr = %stderr.trim(),
                "host checker stderr"
            );
        }

        Ok(output.status.success())
    }
}

#[async_trait]
impl Authenticator for HostAuthenticator {
    async fn authenticate(&self, username: &str, password: &str) -> bool {
        // A leading dash would be read as an option by the checker
        if username.is_empty() || password.is_empty() || username.starts_with('-') {
            return false;
        }

        match self.check(username, password).await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(error = %e, "host authentication unavailable");
                false
            }
        }
    }
}

/// The operator authentication backend selected at startup
#[derive(Clone)]
pub enum OperatorAuth {
    Host(HostAuthenticator),
    Static(StaticAuthenticator),
}

impl OperatorAuth {
    /// Build the configured backend
    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        match config.mode {
            AuthMode::Host => Self::Host(HostAuthenticator::new(
                config
                    .host_program
                    .clone()
                    .unwrap_or_else(|| DEFAULT_HOST_PROGRAM.to_string()),
                config
                    .host_service
                    .clone()
                    .unwrap_or_else(|| DEFAULT_HOST_SERVICE.to_string()),
            )),
            AuthMode::Static => Self::Static(StaticAuthenticator::new(config.static_users.clone())),
        }
    }

    /// Which backend this is
    #[must_use]
    pub const fn mode(&self) -> AuthMode {
        match self {
            Self::Host(_) => AuthMode::Host,
            Self::Static(_) => AuthMode::Static,
        }
    }
}

#[async_trait]
impl Authenticator for OperatorAuth {
    async fn authenticate(&self, username: &str, password: &str) -> bool {
        let accepted = match self {
            Self::Host(host) => host.authenticate(username, password).await,
            Self::Static(table) => table.authenticate(username, password).await,
        };
        if !accepted {
            tracing::info!(
                operator = %username,
                mode = %self.mode(),
                "operator authentication rejected"
            );
        }
        accepted
    }
}

/// The authenticated operator on whose behalf a call runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator {
    username: String,
}

impl Operator {
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }

    /// Operator for local CLI use, named after the invoking OS user
    #[must_use]
    pub fn local() -> Self {
        let name = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "local".to_string());
        Self::new(name)
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }
}

/// Constant-time byte comparison to prevent timing attacks
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
