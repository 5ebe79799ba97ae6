//! Domain building blocks for the hooktail deployment agent.
//!
//! Everything here is free of HTTP concerns: deployment targets and their
//! pre-flight checks, the push payload, target lookup, signature
//! verification and privileged command execution.

pub mod error;
pub mod exec;
pub mod push_event;
pub mod registry;
pub mod signature;
pub mod target;
