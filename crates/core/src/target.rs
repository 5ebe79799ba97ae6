//! Deployment target definition and pre-flight validation.
//!
//! A [`DeploymentTarget`] maps one repository to one working copy on disk,
//! the OS account that owns it, the branch to track, and optional hook
//! scripts. Targets are built once from configuration and never mutated.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::exec::identity;

/// Required fields in the order they are checked, with the message reported
/// when the field is empty.
const REQUIRED_FIELDS: [(&str, &str); 4] = [
    ("user", "invalid user"),
    ("repository", "invalid repository"),
    ("branch", "invalid branch"),
    ("path", "invalid deployment path"),
];

/// One configured repository-to-path deployment mapping.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct DeploymentTarget {
    /// Shared key for signature verification. Absent or empty disables
    /// verification for this target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// OS account under whose identity every command runs.
    #[serde(default)]
    #[validate(length(min = 1))]
    pub user: String,
    /// Canonical SSH URL, matched against `repository.ssh_url` in the push payload.
    #[serde(default)]
    #[validate(length(min = 1))]
    pub repository: String,
    #[serde(default)]
    #[validate(length(min = 1))]
    pub branch: String,
    /// Absolute path of an existing git working copy.
    #[serde(default)]
    #[validate(length(min = 1))]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_script: Option<String>,
}

impl DeploymentTarget {
    /// The verification secret, if one is configured and non-empty.
    pub fn secret(&self) -> Option<&str> {
        non_empty(self.secret.as_deref())
    }

    pub fn before_script(&self) -> Option<&str> {
        non_empty(self.before_script.as_deref())
    }

    pub fn after_script(&self) -> Option<&str> {
        non_empty(self.after_script.as_deref())
    }

    /// Check that `user`, `repository`, `branch` and `path` are non-empty.
    ///
    /// Reports the first missing field in that order.
    pub fn check_required_fields(&self) -> Result<(), CoreError> {
        let Err(errors) = self.validate() else {
            return Ok(());
        };
        let fields = errors.errors();
        for (field, message) in REQUIRED_FIELDS {
            if fields.contains_key(field) {
                return Err(CoreError::Validation(message.to_string()));
            }
        }
        Err(CoreError::Validation(errors.to_string()))
    }

    /// Full pre-flight check: required fields, OS account, working copy and
    /// hook scripts.
    ///
    /// Never spawns a process.
    pub fn check_deployable(&self) -> Result<(), CoreError> {
        self.check_required_fields()?;

        identity::lookup_user(&self.user)
            .map_err(|e| CoreError::Validation(format!("invalid local user: {e}")))?;

        let path = Path::new(&self.path);
        if !path.exists() {
            return Err(CoreError::Validation(format!(
                "deployment path {} does not exist",
                self.path
            )));
        }
        if !path.join(".git").exists() {
            return Err(CoreError::Validation(format!(
                "deployment path {} is not a git working copy",
                self.path
            )));
        }

        for (label, script) in [
            ("before script", self.before_script()),
            ("after script", self.after_script()),
        ] {
            if let Some(script) = script {
                if !Path::new(script).exists() {
                    return Err(CoreError::Validation(format!(
                        "{label} {script} does not exist"
                    )));
                }
            }
        }

        Ok(())
    }
}

// Keeps the secret out of logs.
impl fmt::Debug for DeploymentTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeploymentTarget")
            .field("secret", &self.secret().map(|_| "<redacted>"))
            .field("user", &self.user)
            .field("repository", &self.repository)
            .field("branch", &self.branch)
            .field("path", &self.path)
            .field("before_script", &self.before_script)
            .field("after_script", &self.after_script)
            .finish()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
