//! Error types shared by the core model and provider implementations.

use thiserror::Error;

use crate::provider::ProviderType;

/// Boxed error raised by a provider client.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors produced by the core model and providers.
#[derive(Debug, Error)]
pub enum Error {
    /// A provider type string could not be parsed.
    #[error("invalid provider type '{0}'")]
    InvalidProviderType(String),

    /// A reference kind string could not be parsed.
    #[error("invalid reference kind '{0}'")]
    InvalidRefKind(String),

    /// No provider of this type is configured.
    #[error("no {} provider configured", .0.pretty())]
    UnknownProvider(ProviderType),

    /// A repository or reference is absent from the cache.
    #[error("{kind} not found: {key}")]
    NotFound {
        /// Kind of the missing entity.
        kind: &'static str,
        /// Key or name that was looked up.
        key: String,
    },

    /// A provider call failed.
    #[error("{provider} {context}: {source}")]
    Upstream {
        /// Provider that failed.
        provider: ProviderType,
        /// Operation and target that failed.
        context: String,
        /// Error reported by the provider client.
        #[source]
        source: BoxError,
    },
}

/// Result alias using the core [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap a provider client error, naming the failed operation and target.
    pub fn upstream(provider: ProviderType, context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Upstream {
            provider,
            context: context.into(),
            source: source.into(),
        }
    }

    /// Entity of the given kind was not found under `key`.
    pub fn not_found(kind: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            kind,
            key: key.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn upstream_keeps_source_and_context() {
        let err = Error::upstream(ProviderType::GitLab, "list references of acme/api", "timeout");
        assert_eq!(err.to_string(), "gitlab list references of acme/api: timeout");
        assert_eq!(err.source().map(ToString::to_string).as_deref(), Some("timeout"));
    }

    #[test]
    fn not_found_names_the_key() {
        let err = Error::not_found("repository", "1040242264");
        assert_eq!(err.to_string(), "repository not found: 1040242264");
        assert_eq!(
            Error::UnknownProvider(ProviderType::GitHub).to_string(),
            "no GitHub provider configured"
        );
    }
}
