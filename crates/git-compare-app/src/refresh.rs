//! Refresh tasks and the handlers that apply them to the cache.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use git_compare_core::{Providers, RepositoryKey};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::identity::IdentityDirectory;
use crate::store::CacheStore;

/// A unit of refresh work.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum RefreshTask {
    /// Replace the repository list.
    Repositories,
    /// Replace the references of one repository.
    RepositoryReferences(RepositoryKey),
    /// Replace the references of every known repository.
    AllRepositoryReferences,
    /// Replace the identity mappings.
    Identities,
}

impl RefreshTask {
    /// Stable label used in logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Repositories => "repositories",
            Self::RepositoryReferences(_) => "repository-references",
            Self::AllRepositoryReferences => "all-repository-references",
            Self::Identities => "identities",
        }
    }
}

impl fmt::Display for RefreshTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RepositoryReferences(key) => write!(f, "{}({key})", self.label()),
            other => f.write_str(other.label()),
        }
    }
}

/// Result of running a refresh task.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RefreshOutcome {
    /// Upstream was queried and the cache updated.
    Refreshed,
    /// The cached data was fresher than the throttle window.
    Throttled,
    /// The targeted repository is not in the cache.
    NotFound,
    /// Upstream failed; the previous snapshot was kept.
    Failed,
    /// Nothing can serve this task (e.g. no identity source configured).
    Unavailable,
}

/// Minimum interval between two effective refreshes of each collection.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Throttle {
    /// Window of the repository list.
    pub repositories: Duration,
    /// Window of each repository's references.
    pub references: Duration,
    /// Window of the identity mappings.
    pub identities: Duration,
}

impl Default for Throttle {
    fn default() -> Self {
        Self::from(&CacheConfig::default())
    }
}

impl From<&CacheConfig> for Throttle {
    fn from(config: &CacheConfig) -> Self {
        Self {
            repositories: config.repositories.min_interval(),
            references: config.references.min_interval(),
            identities: config.identities.min_interval(),
        }
    }
}

/// Whether `refreshed_at` falls within `window`; the epoch means never refreshed.
fn is_fresh(refreshed_at: OffsetDateTime, window: Duration) -> bool {
    refreshed_at != OffsetDateTime::UNIX_EPOCH && OffsetDateTime::now_utc() - refreshed_at < window
}

/// Runs refresh tasks against upstream and publishes the results.
///
/// Handlers never propagate upstream errors: they log them and keep the
/// previous snapshot.
#[derive(Debug)]
pub struct Refresher {
    store: Arc<CacheStore>,
    providers: Providers,
    identities: Option<IdentityDirectory>,
    throttle: Throttle,
}

impl Refresher {
    /// Create a refresher publishing into `store`.
    pub const fn new(
        store: Arc<CacheStore>,
        providers: Providers,
        identities: Option<IdentityDirectory>,
        throttle: Throttle,
    ) -> Self {
        Self {
            store,
            providers,
            identities,
            throttle,
        }
    }

    /// Store updated by this refresher.
    pub const fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    /// Dispatch `task` to its handler.
    pub async fn run(&self, task: &RefreshTask) -> RefreshOutcome {
        match task {
            RefreshTask::Repositories => self.refresh_repositories().await,
            RefreshTask::RepositoryReferences(key) => self.refresh_repository_references(key).await,
            RefreshTask::AllRepositoryReferences => self.refresh_all_repository_references().await,
            RefreshTask::Identities => self.refresh_identities().await,
        }
    }

    /// Replace the repository list unless it was refreshed recently.
    pub async fn refresh_repositories(&self) -> RefreshOutcome {
        if is_fresh(self.store.repositories_refreshed_at(), self.throttle.repositories) {
            debug!("repository list refreshed recently, skipping");
            return RefreshOutcome::Throttled;
        }

        match self.providers.list_repositories().await {
            Ok(repositories) => {
                info!(count = repositories.len(), "refreshed repository list");
                self.store.replace_repositories(repositories);
                RefreshOutcome::Refreshed
            }
            Err(err) => {
                warn!(error = %err, "failed to refresh repository list");
                RefreshOutcome::Failed
            }
        }
    }

    /// Replace the references of the repository identified by `key`.
    pub async fn refresh_repository_references(&self, key: &RepositoryKey) -> RefreshOutcome {
        let Some(repository) = self.store.repository(key) else {
            debug!(repository = %key, "repository not cached, skipping references refresh");
            return RefreshOutcome::NotFound;
        };
        if is_fresh(repository.references_refreshed_at, self.throttle.references) {
            debug!(repository = %repository.name, "references refreshed recently, skipping");
            return RefreshOutcome::Throttled;
        }

        match self.providers.list_references(&repository).await {
            Ok(references) => {
                debug!(
                    repository = %repository.name,
                    count = references.len(),
                    "refreshed references"
                );
                if self.store.replace_repository_references(key, references) {
                    RefreshOutcome::Refreshed
                } else {
                    RefreshOutcome::NotFound
                }
            }
            Err(err) => {
                warn!(repository = %repository.name, error = %err, "failed to refresh references");
                RefreshOutcome::Failed
            }
        }
    }

    /// Refresh the references of every repository of the current snapshot.
    ///
    /// Stops at the first upstream failure; repositories already refreshed
    /// keep their new references.
    pub async fn refresh_all_repository_references(&self) -> RefreshOutcome {
        let repositories = self.store.repositories();
        let mut refreshed = 0_usize;
        for repository in repositories.iter() {
            match self.refresh_repository_references(&repository.key()).await {
                RefreshOutcome::Failed => {
                    warn!(
                        repository = %repository.name,
                        refreshed,
                        "aborting references refresh of all repositories"
                    );
                    return RefreshOutcome::Failed;
                }
                RefreshOutcome::Refreshed => refreshed += 1,
                RefreshOutcome::Throttled | RefreshOutcome::NotFound | RefreshOutcome::Unavailable => {}
            }
        }
        info!(
            refreshed,
            total = repositories.len(),
            "refreshed references of all repositories"
        );
        RefreshOutcome::Refreshed
    }

    /// Replace the identity mappings unless they were refreshed recently.
    pub async fn refresh_identities(&self) -> RefreshOutcome {
        let Some(directory) = &self.identities else {
            debug!("no identity source configured");
            return RefreshOutcome::Unavailable;
        };
        if is_fresh(self.store.identities_refreshed_at(), self.throttle.identities) {
            debug!("identities refreshed recently, skipping");
            return RefreshOutcome::Throttled;
        }

        match directory.fetch().await {
            Ok(mappings) => {
                info!(count = mappings.len(), "refreshed identities");
                self.store.replace_identities(mappings);
                RefreshOutcome::Refreshed
            }
            Err(err) => {
                warn!(error = %err, "failed to refresh identities");
                RefreshOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use anyhow::anyhow;
    use async_trait::async_trait;
    use git_compare_core::{
        Comparison, Error, Provider, ProviderType, RefKind, Reference, Repository, Result,
    };

    use crate::identity::IdentitySource;
    use crate::store::IdentityMappings;

    #[derive(Default)]
    struct CountingProvider {
        repository_calls: AtomicUsize,
        reference_calls: AtomicUsize,
        fail: AtomicBool,
    }

    #[async_trait]
    impl Provider for CountingProvider {
        fn provider_type(&self) -> ProviderType {
            ProviderType::GitHub
        }

        fn web_base_url(&self) -> &str {
            "https://git.example.com"
        }

        async fn list_repositories(&self) -> Result<Vec<Repository>> {
            self.repository_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::upstream(ProviderType::GitHub, "list repositories", "boom"));
            }
            Ok(vec![
                Repository::new(ProviderType::GitHub, "acme/api", ""),
                Repository::new(ProviderType::GitHub, "acme/web", ""),
            ])
        }

        async fn list_references(&self, _repository: &str) -> Result<Vec<Reference>> {
            self.reference_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::upstream(ProviderType::GitHub, "list references", "boom"));
            }
            Ok(vec![Reference::new(RefKind::Branch, "main", "")])
        }

        async fn compare(&self, _repository: &str, _from: &Reference, _to: &Reference) -> Result<Comparison> {
            Ok(Comparison::default())
        }
    }

    struct FailingIdentities;

    #[async_trait]
    impl IdentitySource for FailingIdentities {
        async fn list_identities(&self) -> anyhow::Result<IdentityMappings> {
            Err(anyhow!("identity source unreachable"))
        }
    }

    fn refresher(provider: &Arc<CountingProvider>, throttle: Throttle) -> Refresher {
        let mut providers = Providers::new();
        providers.insert(Arc::clone(provider) as Arc<dyn Provider>);
        Refresher::new(Arc::new(CacheStore::new()), providers, None, throttle)
    }

    const NO_THROTTLE: Throttle = Throttle {
        repositories: Duration::ZERO,
        references: Duration::ZERO,
        identities: Duration::ZERO,
    };

    #[tokio::test]
    async fn second_refresh_within_window_is_throttled() {
        let provider = Arc::new(CountingProvider::default());
        let refresher = refresher(&provider, Throttle::default());

        assert_eq!(refresher.refresh_repositories().await, RefreshOutcome::Refreshed);
        assert_eq!(refresher.refresh_repositories().await, RefreshOutcome::Throttled);
        assert_eq!(provider.repository_calls.load(Ordering::SeqCst), 1);

        let key = Repository::new(ProviderType::GitHub, "acme/api", "").key();
        assert_eq!(
            refresher.refresh_repository_references(&key).await,
            RefreshOutcome::Refreshed
        );
        assert_eq!(
            refresher.refresh_repository_references(&key).await,
            RefreshOutcome::Throttled
        );
        assert_eq!(provider.reference_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unbounded_window_throttles_without_overflow() {
        let provider = Arc::new(CountingProvider::default());
        let throttle = Throttle {
            repositories: Duration::MAX,
            references: Duration::MAX,
            identities: Duration::MAX,
        };
        let refresher = refresher(&provider, throttle);

        assert_eq!(refresher.refresh_repositories().await, RefreshOutcome::Refreshed);
        assert_eq!(refresher.refresh_repositories().await, RefreshOutcome::Throttled);
        assert_eq!(provider.repository_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn freshness_window() {
        let now = OffsetDateTime::now_utc();
        assert!(is_fresh(now, Duration::from_secs(60)));
        assert!(!is_fresh(now - time::Duration::minutes(2), Duration::from_secs(60)));
        assert!(!is_fresh(OffsetDateTime::UNIX_EPOCH, Duration::MAX));
        assert!(!is_fresh(now, Duration::ZERO));
    }

    #[tokio::test]
    async fn upstream_failure_keeps_previous_snapshot() {
        let provider = Arc::new(CountingProvider::default());
        let refresher = refresher(&provider, NO_THROTTLE);
        assert_eq!(refresher.refresh_repositories().await, RefreshOutcome::Refreshed);
        let before = refresher.store().repositories();
        let refreshed_at = refresher.store().repositories_refreshed_at();

        provider.fail.store(true, Ordering::SeqCst);
        assert_eq!(refresher.refresh_repositories().await, RefreshOutcome::Failed);

        assert!(Arc::ptr_eq(&before, &refresher.store().repositories()));
        assert_eq!(refresher.store().repositories_refreshed_at(), refreshed_at);
    }

    #[tokio::test]
    async fn references_of_unknown_repository_are_not_fetched() {
        let provider = Arc::new(CountingProvider::default());
        let refresher = refresher(&provider, NO_THROTTLE);
        let key = Repository::new(ProviderType::GitHub, "acme/api", "").key();

        assert_eq!(
            refresher.refresh_repository_references(&key).await,
            RefreshOutcome::NotFound
        );
        assert_eq!(provider.reference_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn refreshing_all_references_visits_every_repository() {
        let provider = Arc::new(CountingProvider::default());
        let refresher = refresher(&provider, NO_THROTTLE);
        refresher.refresh_repositories().await;

        assert_eq!(
            refresher.refresh_all_repository_references().await,
            RefreshOutcome::Refreshed
        );
        assert_eq!(provider.reference_calls.load(Ordering::SeqCst), 2);
        assert!(
            refresher
                .store()
                .repositories()
                .iter()
                .all(|repo| repo.references.len() == 1)
        );
    }

    #[tokio::test]
    async fn refreshing_all_references_stops_at_first_failure() {
        let provider = Arc::new(CountingProvider::default());
        let refresher = refresher(&provider, NO_THROTTLE);
        refresher.refresh_repositories().await;
        provider.fail.store(true, Ordering::SeqCst);

        assert_eq!(
            refresher.refresh_all_repository_references().await,
            RefreshOutcome::Failed
        );
        assert_eq!(provider.reference_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn identities_without_source_are_unavailable() {
        let provider = Arc::new(CountingProvider::default());
        let refresher = refresher(&provider, NO_THROTTLE);
        assert_eq!(refresher.refresh_identities().await, RefreshOutcome::Unavailable);
    }

    #[tokio::test]
    async fn identity_failure_keeps_previous_mapping() {
        let store = Arc::new(CacheStore::new());
        store.replace_identities(IdentityMappings::from([("a@x".to_owned(), "U1".to_owned())]));
        let directory = IdentityDirectory::new(Arc::new(FailingIdentities), Vec::new());
        let refresher = Refresher::new(Arc::clone(&store), Providers::new(), Some(directory), NO_THROTTLE);

        assert_eq!(refresher.refresh_identities().await, RefreshOutcome::Failed);
        assert_eq!(store.identities().get("a@x").map(String::as_str), Some("U1"));
    }

    #[test]
    fn task_display() {
        let key = RepositoryKey::from("42");
        assert_eq!(RefreshTask::Repositories.to_string(), "repositories");
        assert_eq!(
            RefreshTask::RepositoryReferences(key).to_string(),
            "repository-references(42)"
        );
    }
}
