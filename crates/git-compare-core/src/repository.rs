use std::collections::HashMap;
use std::collections::hash_map;
use std::sync::Arc;

use time::OffsetDateTime;

use crate::key::RepositoryKey;
use crate::provider::ProviderType;
use crate::rank::{Named, Ranked, Ranker};
use crate::reference::References;

/// A git repository hosted by a provider, along with its cached references.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Repository {
    /// Provider hosting the repository.
    pub provider: ProviderType,
    /// Fully-qualified name, e.g. `owner/repo`.
    pub name: String,
    /// Browser URL of the repository.
    pub web_url: String,
    /// Cached references of the repository.
    pub references: References,
    /// When references were last refreshed; `UNIX_EPOCH` if never.
    pub references_refreshed_at: OffsetDateTime,
}

impl Repository {
    /// Create a repository without any reference.
    pub fn new(provider: ProviderType, name: impl Into<String>, web_url: impl Into<String>) -> Self {
        Self {
            provider,
            name: name.into(),
            web_url: web_url.into(),
            references: References::new(),
            references_refreshed_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    /// Key derived from the provider and the name.
    #[must_use]
    pub fn key(&self) -> RepositoryKey {
        RepositoryKey::derive(self.provider.as_str(), &self.name)
    }

    /// Whether references were never fetched for this repository.
    #[must_use]
    pub fn references_never_refreshed(&self) -> bool {
        self.references_refreshed_at == OffsetDateTime::UNIX_EPOCH
    }
}

impl Named for Repository {
    fn name(&self) -> &str {
        &self.name
    }

    fn discriminant(&self) -> &str {
        self.provider.as_str()
    }
}

/// Repositories indexed by [`RepositoryKey`].
///
/// Entries are shared so that cloning the whole set, as the cache does on
/// every write, only copies pointers.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Repositories {
    entries: HashMap<RepositoryKey, Arc<Repository>>,
}

impl Repositories {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a repository under its own key, replacing any previous entry.
    pub fn insert(&mut self, repository: Repository) {
        self.entries.insert(repository.key(), Arc::new(repository));
    }

    /// Look a repository up by key.
    #[must_use]
    pub fn get_by_key(&self, key: &RepositoryKey) -> Option<&Arc<Repository>> {
        self.entries.get(key)
    }

    /// Mutable access to a repository, cloning it first if it is shared.
    pub fn get_mut(&mut self, key: &RepositoryKey) -> Option<&mut Repository> {
        self.entries.get_mut(key).map(Arc::make_mut)
    }

    /// Whether a repository with this key is known.
    #[must_use]
    pub fn contains_key(&self, key: &RepositoryKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Fuzzy search repositories by name. An empty filter matches every repository.
    #[must_use]
    pub fn search(&self, filter: &str, limit: usize) -> Vec<Ranked<'_, Arc<Repository>>> {
        Ranker::match_all().search(self.entries.values(), filter, limit)
    }

    /// Return the repository whose name is the closest match to `name`.
    #[must_use]
    pub fn get_by_closest_match(&self, name: &str) -> Option<&Arc<Repository>> {
        Ranker::match_all().closest(self.entries.values(), name)
    }

    /// Number of repositories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no repository is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over repositories in no particular order.
    pub fn iter(&self) -> hash_map::Values<'_, RepositoryKey, Arc<Repository>> {
        self.entries.values()
    }

    /// Move every entry of `other` into this set.
    pub fn extend(&mut self, other: Self) {
        self.entries.extend(other.entries);
    }
}

impl FromIterator<Repository> for Repositories {
    fn from_iter<I: IntoIterator<Item = Repository>>(iter: I) -> Self {
        let mut repositories = Self::new();
        for repository in iter {
            repositories.insert(repository);
        }
        repositories
    }
}

impl<'a> IntoIterator for &'a Repositories {
    type Item = &'a Arc<Repository>;
    type IntoIter = hash_map::Values<'a, RepositoryKey, Arc<Repository>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
