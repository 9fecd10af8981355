//! Host allowlist for device base URLs

use crate::gateway::Endpoint;
use crate::{Error, Result};

/// Which hostnames a device record may point at
///
/// An empty list allows any host.
#[derive(Debug, Clone, Default)]
pub struct HostPolicy {
    allowed: Vec<String>,
}

impl HostPolicy {
    /// Build from a list of hostnames; matching is case-insensitive
    #[must_use]
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = hosts
            .into_iter()
            .map(|h| h.as_ref().trim().to_lowercase())
            .filter(|h| !h.is_empty())
            .collect();
        Self { allowed }
    }

    /// Policy that accepts every host
    #[must_use]
    pub fn allow_all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_restricted(&self) -> bool {
        !self.allowed.is_empty()
    }

    /// Parse a base URL and check its host against the list
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if the URL is invalid or its host is not allowed
    pub fn check(&self, base_url: &str) -> Result<Endpoint> {
        let endpoint = Endpoint::parse(base_url)?;
        self.check_endpoint(&endpoint)?;
        Ok(endpoint)
    }

    /// Check an already parsed endpoint
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if the host is not allowed
    pub fn check_endpoint(&self, endpoint: &Endpoint) -> Result<()> {
        if !self.is_restricted() {
            return Ok(());
        }

        let host = endpoint.host().unwrap_or_default().to_lowercase();
        if self.allowed.iter().any(|allowed| *allowed == host) {
            Ok(())
        } else {
            tracing::warn!(%host, "device host not in allowlist");
            Err(Error::Validation(format!("host '{host}' is not in the allowed hosts list")))
        }
    }
}
