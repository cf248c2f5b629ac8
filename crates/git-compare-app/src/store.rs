//! In-memory snapshot store shared by every request handler and refresh task.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use git_compare_core::{References, Repositories, Repository, RepositoryKey};
use time::OffsetDateTime;
use tracing::debug;

/// Mapping from an email address to a chat platform user id.
pub type IdentityMappings = HashMap<String, String>;

/// Snapshot store for repositories, their references and identity mappings.
///
/// Readers get cheap `Arc` snapshots that stay valid while writers publish
/// new ones. Repositories and identities are guarded independently.
#[derive(Debug)]
pub struct CacheStore {
    repositories: RwLock<CacheState<Repositories>>,
    identities: RwLock<CacheState<IdentityMappings>>,
}

#[derive(Debug)]
struct CacheState<T> {
    value: Arc<T>,
    refreshed_at: OffsetDateTime,
}

impl<T: Default> Default for CacheState<T> {
    fn default() -> Self {
        Self {
            value: Arc::new(T::default()),
            refreshed_at: OffsetDateTime::UNIX_EPOCH,
        }
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore {
    /// Create an empty store. Every refresh timestamp is `UNIX_EPOCH`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            repositories: RwLock::new(CacheState::default()),
            identities: RwLock::new(CacheState::default()),
        }
    }

    /// Current repository snapshot.
    pub fn repositories(&self) -> Arc<Repositories> {
        Arc::clone(&read(&self.repositories).value)
    }

    /// A single repository of the current snapshot.
    pub fn repository(&self, key: &RepositoryKey) -> Option<Arc<Repository>> {
        read(&self.repositories).value.get_by_key(key).cloned()
    }

    /// When the repository list was last replaced.
    pub fn repositories_refreshed_at(&self) -> OffsetDateTime {
        read(&self.repositories).refreshed_at
    }

    /// Publish a new repository list.
    ///
    /// Repositories already known keep their cached references and the
    /// matching refresh timestamp; new ones start without references.
    pub fn replace_repositories(&self, mut repositories: Repositories) {
        let mut state = write(&self.repositories);
        let keys: Vec<RepositoryKey> = repositories.iter().map(|repo| repo.key()).collect();
        let mut carried = 0_usize;
        for key in &keys {
            let Some(previous) = state.value.get_by_key(key) else {
                continue;
            };
            if let Some(next) = repositories.get_mut(key) {
                next.references = previous.references.clone();
                next.references_refreshed_at = previous.references_refreshed_at;
                carried += 1;
            }
        }

        debug!(
            total = keys.len(),
            carried, "published repository snapshot"
        );
        state.value = Arc::new(repositories);
        state.refreshed_at = OffsetDateTime::now_utc();
    }

    /// Replace the references of one repository.
    ///
    /// Returns `false`, leaving the store untouched, when the repository is
    /// not part of the current snapshot.
    pub fn replace_repository_references(&self, key: &RepositoryKey, references: References) -> bool {
        let mut state = write(&self.repositories);
        if !state.value.contains_key(key) {
            return false;
        }

        let repositories = Arc::make_mut(&mut state.value);
        let Some(repository) = repositories.get_mut(key) else {
            return false;
        };
        repository.references = references;
        repository.references_refreshed_at = OffsetDateTime::now_utc();
        true
    }

    /// Current identity mapping snapshot.
    pub fn identities(&self) -> Arc<IdentityMappings> {
        Arc::clone(&read(&self.identities).value)
    }

    /// When identity mappings were last replaced.
    pub fn identities_refreshed_at(&self) -> OffsetDateTime {
        read(&self.identities).refreshed_at
    }

    /// Publish a new identity mapping.
    pub fn replace_identities(&self, identities: IdentityMappings) {
        let mut state = write(&self.identities);
        state.value = Arc::new(identities);
        state.refreshed_at = OffsetDateTime::now_utc();
    }
}

// Writers only swap whole values, so a poisoned lock still holds a consistent snapshot.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
