//! OS account resolution and credential switching.

use std::ffi::CString;

use nix::errno::Errno;
use nix::unistd::{Gid, Uid, User};

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("unknown user {0}")]
    UnknownUser(String),

    #[error("invalid user name {0:?}")]
    InvalidName(String),

    #[error("lookup user {user}: {source}")]
    Lookup {
        user: String,
        #[source]
        source: Errno,
    },
}

/// The full credential triple a child process runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user: String,
    pub uid: Uid,
    pub gid: Gid,
    /// Supplementary groups, including the primary group.
    pub groups: Vec<Gid>,
}

/// Look up the passwd entry for `name`.
pub fn lookup_user(name: &str) -> Result<User, IdentityError> {
    if name.is_empty() || name.contains('\0') {
        return Err(IdentityError::InvalidName(name.to_string()));
    }
    User::from_name(name)
        .map_err(|source| IdentityError::Lookup {
            user: name.to_string(),
            source,
        })?
        .ok_or_else(|| IdentityError::UnknownUser(name.to_string()))
}

impl Identity {
    /// Resolve `name` to its uid, primary gid and supplementary group list.
    pub fn resolve(name: &str) -> Result<Self, IdentityError> {
        let user = lookup_user(name)?;
        let groups = supplementary_groups(&user)?;
        Ok(Self {
            user: user.name,
            uid: user.uid,
            gid: user.gid,
            groups,
        })
    }

    /// Switch the calling process to this identity.
    ///
    /// Meant to run in a forked child before `exec`: groups first, then gid,
    /// then uid, since each step needs the privilege the next one drops.
    /// When the process is already this unprivileged user there is nothing
    /// it could change, so the switch is skipped.
    pub fn apply(&self) -> nix::Result<()> {
        let euid = nix::unistd::geteuid();
        if !euid.is_root() && euid == self.uid {
            return Ok(());
        }
        set_groups(&self.groups)?;
        nix::unistd::setgid(self.gid)?;
        nix::unistd::setuid(self.uid)
    }
}

#[cfg(not(any(target_os = "macos", target_os = "ios")))]
fn supplementary_groups(user: &User) -> Result<Vec<Gid>, IdentityError> {
    let name = CString::new(user.name.as_str())
        .map_err(|_| IdentityError::InvalidName(user.name.clone()))?;
    nix::unistd::getgrouplist(&name, user.gid).map_err(|source| IdentityError::Lookup {
        user: user.name.clone(),
        source,
    })
}

#[cfg(any(target_os = "macos", target_os = "ios"))]
fn supplementary_groups(user: &User) -> Result<Vec<Gid>, IdentityError> {
    CString::new(user.name.as_str()).map_err(|_| IdentityError::InvalidName(user.name.clone()))?;
    Ok(vec![user.gid])
}

#[cfg(not(any(target_os = "macos", target_os = "ios")))]
fn set_groups(groups: &[Gid]) -> nix::Result<()> {
    nix::unistd::setgroups(groups)
}

#[cfg(any(target_os = "macos", target_os = "ios"))]
fn set_groups(_groups: &[Gid]) -> nix::Result<()> {
    Ok(())
}
