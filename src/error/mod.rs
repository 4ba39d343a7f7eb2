//! Error types and Result aliases for git-events.
//!
//! This module defines the error hierarchy used throughout the crate.
//! All public functions return `Result<T, Error>` or `Result<T>`.

use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for git-events operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Repository / diff source error.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Server/API error.
    #[error("server error: {0}")]
    Server(#[from] ServerError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Errors raised by the diff source.
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Failed to open an existing working copy.
    #[error("failed to open repository '{path}': {reason}")]
    Open { path: String, reason: String },

    /// Failed to clone the remote into the working directory.
    #[error("failed to clone '{url}': {reason}")]
    Clone { url: String, reason: String },

    /// Failed to fetch or fast-forward the tracked branch.
    #[error("failed to fetch branch '{branch}': {reason}")]
    Fetch { branch: String, reason: String },

    /// Failed to walk commit history.
    #[error("failed to read history of '{branch}': {reason}")]
    History { branch: String, reason: String },

    /// Failed to diff two trees.
    #[error("diff error: {0}")]
    Diff(String),
}

/// Server/API errors.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Failed to bind to address.
    #[error("failed to bind to {address}: {reason}")]
    BindFailed { address: String, reason: String },

    /// Request handling error.
    #[error("request error: {0}")]
    Request(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl RepositoryError {
    /// Create a diff error from any displayable cause.
    pub fn diff(reason: impl std::fmt::Display) -> Self {
        Self::Diff(reason.to_string())
    }
}

#[cfg(test)]
mod tests;
