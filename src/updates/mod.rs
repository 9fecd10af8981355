//! Self-update: release branch discovery and the update script runner
//!
//! Release branches follow `version-x.y.z` and are listed from the GitHub
//! API for the configured repository. Running an update executes the local
//! update script with `--branch <name>` and captures what it prints.

pub mod version;

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client, Url};
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::time::timeout;

pub use version::{is_version_branch, parse_version_branch, sort_version_branches};

use crate::{Error, Result};

/// Default GitHub REST endpoint
pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";

/// Default update script, relative to the working directory
pub const DEFAULT_UPDATE_SCRIPT: &str = "scripts/update.sh";

/// Default limit on how long the update script may run
pub const DEFAULT_UPDATE_TIMEOUT: Duration = Duration::from_secs(600);

const BRANCH_LIST_TIMEOUT: Duration = Duration::from_secs(15);

/// Where release branches come from and how updates are applied
#[derive(Clone)]
pub struct UpdateConfig {
    /// `owner/name` of the GitHub repository
    pub repo: Option<String>,

    /// Bearer token for private repositories
    pub token: Option<String>,

    /// GitHub API base URL
    pub api_url: String,

    /// Script invoked as `<script> --branch <name>`
    pub script: PathBuf,

    /// How long the script may run before it is killed
    pub timeout: Duration,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            repo: None,
            token: None,
            api_url: DEFAULT_GITHUB_API.to_string(),
            script: PathBuf::from(DEFAULT_UPDATE_SCRIPT),
            timeout: DEFAULT_UPDATE_TIMEOUT,
        }
    }
}

impl fmt::Debug for UpdateConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateConfig")
            .field("repo", &self.repo)
            .field("token", &self.token.as_ref().map(|_| "[redacted]"))
            .field("api_url", &self.api_url)
            .field("script", &self.script)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Result of one update script run
#[derive(Debug, Clone, Serialize)]
pub struct UpdateOutcome {
    pub branch: String,
    pub success: bool,
    /// `None` if the script was ended by a signal
    pub exit_code: Option<i32>,
    /// stdout followed by stderr, trimmed
    pub output: String,
}

#[derive(Deserialize)]
struct GithubBranch {
    name: String,
}

/// Lists release branches and runs the update script, one run at a time
#[derive(Clone)]
pub struct Updater {
    config: Arc<UpdateConfig>,
    client: Client,
    running: Arc<Mutex<()>>,
}

impl fmt::Debug for Updater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Updater").field("config", &self.config).finish_non_exhaustive()
    }
}

impl Updater {
    /// # Errors
    ///
    /// Returns `Error::Config` if the HTTP client cannot be built
    pub fn new(config: UpdateConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(BRANCH_LIST_TIMEOUT)
            .user_agent("slideshow-manager")
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config: Arc::new(config),
            client,
            running: Arc::new(Mutex::new(())),
        })
    }

    #[must_use]
    pub fn config(&self) -> &UpdateConfig {
        &self.config
    }

    /// Release branches of the configured repository, oldest first
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if no valid repository is configured and
    /// `Error::Update` if GitHub cannot be reached or answers with an error
    pub async fn version_branches(&self) -> Result<Vec<String>> {
        let url = self.branches_url()?;
        tracing::debug!(%url, "listing release branches");

        let mut request = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/vnd.github+json");
        if let Some(token) = self.config.token.as_deref() {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Update(format!("failed to reach GitHub: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|e| {
                tracing::debug!(error = %e, "failed to read GitHub error body");
                String::new()
            });
            tracing::warn!(status = status.as_u16(), "branch listing rejected");
            return Err(Error::Update(format!(
                "failed to load branches ({}): {}",
                status.as_u16(),
                body.trim()
            )));
        }

        let branches: Vec<GithubBranch> = response
            .json()
            .await
            .map_err(|e| Error::Update(format!("invalid branch listing: {e}")))?;

        Ok(sort_version_branches(branches.into_iter().map(|b| b.name)))
    }

    /// Newest release branch, if any
    ///
    /// # Errors
    ///
    /// Same as [`Updater::version_branches`]
    pub async fn latest_branch(&self) -> Result<Option<String>> {
        Ok(self.version_branches().await?.pop())
    }

    /// Run the update script for `branch`, or for the newest release branch
    ///
    /// A script that runs but exits non-zero is reported through
    /// [`UpdateOutcome::success`], not as an error.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` for a malformed branch or when no release
    /// branch exists, `Error::Conflict` while another run is in progress and
    /// `Error::Update` if the script is missing, cannot start or times out
    pub async fn run(&self, branch: Option<&str>) -> Result<UpdateOutcome> {
        let branch = match branch {
            Some(name) if is_version_branch(name) => name.to_string(),
            Some(name) => {
                return Err(Error::Validation(format!(
                    "invalid branch '{name}', expected version-x.y.z"
                )));
            }
            None => self.latest_branch().await?.ok_or_else(|| {
                Error::Validation("no release branch found, specify one".to_string())
            })?,
        };

        let Ok(_guard) = self.running.try_lock() else {
            return Err(Error::Conflict("an update is already running".to_string()));
        };

        let script = &self.config.script;
        if !tokio::fs::try_exists(script).await.unwrap_or(false) {
            return Err(Error::Update(format!(
                "update script not found ({})",
                script.display()
            )));
        }

        tracing::info!(%branch, script = %script.display(), "running update");

        let child = Command::new(script)
            .arg("--branch")
            .arg(&branch)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Update(format!("failed to start {}: {e}", script.display())))?;

        let output = timeout(self.config.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                Error::Update(format!(
                    "update script timed out after {}s",
                    self.config.timeout.as_secs_f32()
                ))
            })?
            .map_err(|e| Error::Update(format!("update script failed: {e}")))?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        let outcome = UpdateOutcome {
            branch,
            success: output.status.success(),
            exit_code: output.status.code(),
            output: text.trim().to_string(),
        };

        if outcome.success {
            tracing::info!(branch = %outcome.branch, "update finished");
        } else {
            tracing::warn!(
                branch = %outcome.branch,
                exit_code = ?outcome.exit_code,
                "update script failed"
            );
        }

        Ok(outcome)
    }

    fn branches_url(&self) -> Result<Url> {
        let repo = self
            .config
            .repo
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| Error::Config("SLIDESHOW_MANAGER_REPO is not configured".to_string()))?;

        if !valid_repo(repo) {
            return Err(Error::Config(format!(
                "repository must look like owner/name, got '{repo}'"
            )));
        }

        let raw = format!(
            "{}/repos/{repo}/branches?per_page=100",
            self.config.api_url.trim_end_matches('/')
        );
        raw.parse::<Url>()
            .map_err(|e| Error::Config(format!("invalid GitHub API URL '{raw}': {e}")))
    }
}

fn valid_repo(repo: &str) -> bool {
    let Some((owner, name)) = repo.split_once('/') else {
        return false;
    };
    [owner, name].iter().all(|part| {
        !part.is_empty()
            && *part != "."
            && *part != ".."
            && part
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    })
}
