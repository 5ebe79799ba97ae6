//! Deployment target lookup.

use crate::target::DeploymentTarget;

/// The immutable, ordered set of configured deployment targets.
#[derive(Debug, Clone, Default)]
pub struct DeploymentRegistry {
    targets: Vec<DeploymentTarget>,
}

impl DeploymentRegistry {
    pub fn new(targets: Vec<DeploymentTarget>) -> Self {
        Self { targets }
    }

    /// Resolve a repository SSH URL to its deployment target.
    ///
    /// See [`find_matching`].
    pub fn find(&self, repository_url: &str) -> Option<&DeploymentTarget> {
        find_matching(&self.targets, repository_url)
    }

}

/// Return the first target, in configuration order, whose repository equals
/// `repository_url` exactly.
///
/// Matching is case-sensitive with no URL normalization. Duplicate
/// repositories are allowed; the earliest one wins. An empty URL never
/// matches, not even a target whose repository is unset.
pub fn find_matching<'a>(
    targets: &'a [DeploymentTarget],
    repository_url: &str,
) -> Option<&'a DeploymentTarget> {
    if repository_url.is_empty() {
        return None;
    }
    targets.iter().find(|t| t.repository == repository_url)
}
