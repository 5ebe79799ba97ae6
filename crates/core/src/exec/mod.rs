//! Privileged external command execution.
//!
//! [`CommandRunner`] is the seam the deployment pipeline talks to;
//! [`PrivilegedExecutor`] is the production implementation that resolves the
//! target OS account up front and switches the child to exactly that
//! identity before the program image loads.

pub mod executor;
pub mod identity;
pub mod subprocess;

pub use executor::{CommandOutput, CommandRunner, CommandSpec, ExecError, PrivilegedExecutor};
pub use identity::{Identity, IdentityError};
