//! Contract implemented by source-control providers.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::comparison::Comparison;
use crate::error::{Error, Result};
use crate::reference::{Reference, References};
use crate::repository::{Repositories, Repository};

/// Kind of source-control provider.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// GitHub (cloud or enterprise).
    GitHub,
    /// GitLab (cloud or self-hosted).
    GitLab,
    /// Repositories available on the local filesystem.
    Local,
}

impl ProviderType {
    /// Lowercase discriminant used for keys and configuration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GitHub => "github",
            Self::GitLab => "gitlab",
            Self::Local => "local",
        }
    }

    /// Name with the capitalisation used by the provider itself.
    #[must_use]
    pub const fn pretty(self) -> &'static str {
        match self {
            Self::GitHub => "GitHub",
            Self::GitLab => "GitLab",
            Self::Local => "Local",
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "github" => Ok(Self::GitHub),
            "gitlab" => Ok(Self::GitLab),
            "local" => Ok(Self::Local),
            other => Err(Error::InvalidProviderType(other.to_owned())),
        }
    }
}

/// A source-control provider able to list repositories and references and
/// to compare two references.
///
/// Implementations are responsible for their own retries; callers never retry.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Kind of the provider.
    fn provider_type(&self) -> ProviderType;

    /// Base URL used to build browser links.
    fn web_base_url(&self) -> &str;

    /// List every repository visible to the provider, without references.
    ///
    /// # Errors
    /// Returns [`Error::Upstream`] when the provider cannot be queried.
    async fn list_repositories(&self) -> Result<Vec<Repository>>;

    /// List the references of the repository named `repository`.
    ///
    /// # Errors
    /// Returns [`Error::Upstream`] when the provider cannot be queried.
    async fn list_references(&self, repository: &str) -> Result<Vec<Reference>>;

    /// Compute the commits reachable from `to` but not from `from`.
    ///
    /// # Errors
    /// Returns [`Error::Upstream`] when the provider cannot compute the diff.
    async fn compare(&self, repository: &str, from: &Reference, to: &Reference) -> Result<Comparison>;
}

/// Configured providers, at most one per [`ProviderType`].
#[derive(Clone, Default)]
pub struct Providers {
    entries: HashMap<ProviderType, Arc<dyn Provider>>,
}

impl Providers {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider, replacing any provider of the same type.
    pub fn insert(&mut self, provider: Arc<dyn Provider>) {
        self.entries.insert(provider.provider_type(), provider);
    }

    /// Provider for the given type.
    ///
    /// # Errors
    /// Returns [`Error::UnknownProvider`] when no provider of this type is configured.
    pub fn get(&self, provider: ProviderType) -> Result<&Arc<dyn Provider>> {
        self.entries
            .get(&provider)
            .ok_or(Error::UnknownProvider(provider))
    }

    /// Number of configured providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no provider is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Aggregate the repositories of every provider.
    ///
    /// # Errors
    /// Returns the first provider error; nothing partial is returned.
    pub async fn list_repositories(&self) -> Result<Repositories> {
        let mut repositories = Repositories::new();
        for provider in self.entries.values() {
            let found: Repositories = provider.list_repositories().await?.into_iter().collect();
            info!(
                provider = %provider.provider_type(),
                count = found.len(),
                "fetched repositories from provider"
            );
            repositories.extend(found);
        }
        debug!(total = repositories.len(), "done fetching repositories");
        Ok(repositories)
    }

    /// List the references of `repository` from the provider hosting it.
    ///
    /// # Errors
    /// Returns [`Error::UnknownProvider`] or the provider error.
    pub async fn list_references(&self, repository: &Repository) -> Result<References> {
        let provider = self.get(repository.provider)?;
        let references = provider.list_references(&repository.name).await?;
        Ok(references.into_iter().collect())
    }
}

impl fmt::Debug for Providers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}
