//! `version-x.y.z` release branch names

/// Prefix every release branch carries
pub const VERSION_BRANCH_PREFIX: &str = "version-";

/// Parse `version-x.y.z` into its numeric parts
#[must_use]
pub fn parse_version_branch(branch: &str) -> Option<(u64, u64, u64)> {
    let rest = branch.strip_prefix(VERSION_BRANCH_PREFIX)?;
    let mut parts = rest.split('.').map(|part| {
        if !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()) {
            part.parse::<u64>().ok()
        } else {
            None
        }
    });

    let major = parts.next()??;
    let minor = parts.next()??;
    let patch = parts.next()??;
    if parts.next().is_some() {
        return None;
    }
    Some((major, minor, patch))
}

/// Whether a branch name is a release branch
#[must_use]
pub fn is_version_branch(branch: &str) -> bool {
    parse_version_branch(branch).is_some()
}

/// Keep release branches only, oldest first by semantic version
#[must_use]
pub fn sort_version_branches<I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut versioned: Vec<_> = names
        .into_iter()
        .filter_map(|name| parse_version_branch(&name).map(|v| (v, name)))
        .collect();
    versioned.sort_by(|a, b| a.0.cmp(&b.0));
    versioned.into_iter().map(|(_, name)| name).collect()
}
