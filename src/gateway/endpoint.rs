//! Resolution of resource paths against a device's base URL

use reqwest::Url;

use crate::{Error, Result};

/// A device API root; every resolved URL stays underneath it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    root: Url,
}

impl Endpoint {
    /// Parse a device base URL
    ///
    /// Query and fragment are dropped and the path always ends in `/`, so
    /// `https://pi.local/player` acts as the root for `player/api/state`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` unless the URL is absolute http(s) with a host
    pub fn parse(base_url: &str) -> Result<Self> {
        let mut root = Url::parse(base_url.trim())
            .map_err(|e| Error::Validation(format!("invalid base URL '{base_url}': {e}")))?;

        if !matches!(root.scheme(), "http" | "https") {
            return Err(Error::Validation(format!(
                "base URL must use http or https, got '{}'",
                root.scheme()
            )));
        }
        if root.host_str().is_none_or(str::is_empty) {
            return Err(Error::Validation(format!("base URL '{base_url}' has no host")));
        }

        root.set_query(None);
        root.set_fragment(None);
        if !root.path().ends_with('/') {
            let path = format!("{}/", root.path());
            root.set_path(&path);
        }

        Ok(Self { root })
    }

    /// The normalised root URL
    #[must_use]
    pub const fn root(&self) -> &Url {
        &self.root
    }

    /// Hostname of the device
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.root.host_str()
    }

    /// Resolve a resource-relative path underneath the root
    ///
    /// Leading slashes are stripped so `/api/state` and `api/state` resolve
    /// to the same place.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if the result would land outside the root
    pub fn resolve(&self, path: &str) -> Result<Url> {
        let relative = path.trim_start_matches('/');
        let url = self
            .root
            .join(relative)
            .map_err(|e| Error::Validation(format!("invalid device path '{path}': {e}")))?;

        if !url.as_str().starts_with(self.root.as_str()) {
            return Err(Error::Validation(format!(
                "device path '{path}' escapes the base URL"
            )));
        }

        Ok(url)
    }
}

/// Percent-encode one operator-chosen value as a single path segment
///
/// # Errors
///
/// Returns `Error::Validation` for blank values and the dot segments
pub fn segment(what: &str, value: &str) -> Result<String> {
    if value.trim().is_empty() {
        return Err(Error::Validation(format!("{what} must not be empty")));
    }
    if value == "." || value == ".." {
        return Err(Error::Validation(format!("{what} '{value}' is not allowed")));
    }
    Ok(urlencoding::encode(value).into_owned())
}

/// Percent-encode a `/`-separated relative path segment by segment
///
/// Empty segments are collapsed.
///
/// # Errors
///
/// Returns `Error::Validation` if nothing remains or a dot segment is present
pub fn segments(what: &str, value: &str) -> Result<String> {
    let parts = value
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| segment(what, s))
        .collect::<Result<Vec<_>>>()?;

    if parts.is_empty() {
        return Err(Error::Validation(format!("{what} must not be empty")));
    }
    Ok(parts.join("/"))
}
