//! Error types for the local git provider.

use git_compare_core::{Error, ProviderType};
use thiserror::Error;

/// Errors raised while reading local repositories.
#[derive(Error, Debug)]
pub enum GitProviderError {
    /// No owner directory was configured.
    #[error("at least one owner directory is required")]
    NoOwners,

    /// The repository name does not match any owner directory.
    #[error("Repository not found: {0}")]
    RepositoryNotFound(String),

    /// Git repository error.
    #[error("Git repository error: {0}")]
    GitError(#[from] git2::Error),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// A commit timestamp is out of range.
    #[error("Invalid commit time: {0}")]
    InvalidTime(#[from] time::error::ComponentRange),

    /// The blocking task running libgit2 failed.
    #[error("Task join error: {0}")]
    Join(String),
}

impl GitProviderError {
    /// Convert into the core upstream error, naming the failed operation.
    pub fn into_upstream(self, context: impl Into<String>) -> Error {
        Error::upstream(ProviderType::Local, context, self)
    }
}
