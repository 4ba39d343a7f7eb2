//! Version-control access.
//!
//! This module provides:
//! - The `DiffSource` capability the poller consumes
//! - A libgit2 implementation that clones, fetches and diffs a working copy
//! - SSH credential plumbing for private remotes

mod credentials;
mod git;
mod source;

pub use credentials::{Credentials, DEFAULT_GIT_USER};
pub use git::{GitRepository, DEFAULT_REMOTE};
pub use source::{CommitRef, Delta, DiffSource};

#[cfg(test)]
pub(crate) use git::fixture;
#[cfg(test)]
pub(crate) use source::memory;
