use std::sync::Arc;

use git_compare_core::{
    Comparison, Error, Providers, Reference, Repository, RepositoryKey, Result,
};
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::queue::{QueueError, RefreshQueue};
use crate::refresh::{RefreshOutcome, RefreshTask};
use crate::store::CacheStore;

/// Owned search result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Match<T> {
    /// Distance between the filter and the item name; 0 is best.
    pub rank: usize,
    /// Matched item.
    pub item: T,
}

/// Outcome of resolving `<repository> [from] [to]` against the cache.
#[derive(Clone, Debug, Default)]
pub struct Resolution {
    /// Repository argument as typed.
    pub repository_query: String,
    /// Closest cached repository.
    pub repository: Option<Arc<Repository>>,
    /// First reference argument, if any.
    pub from_query: Option<String>,
    /// Closest reference to `from_query`.
    pub from: Option<Reference>,
    /// Second reference argument, if any.
    pub to_query: Option<String>,
    /// Closest reference to `to_query`.
    pub to: Option<Reference>,
    /// The repository list must be fetched before resolving.
    pub needs_repositories_refresh: bool,
    /// The resolved repository has no usable references yet.
    pub needs_references_refresh: bool,
}

impl Resolution {
    /// Refresh task that would let a new resolution go further.
    #[must_use]
    pub fn refresh_task(&self) -> Option<RefreshTask> {
        if self.needs_repositories_refresh {
            return Some(RefreshTask::Repositories);
        }
        if self.needs_references_refresh {
            return self
                .repository
                .as_ref()
                .map(|repo| RefreshTask::RepositoryReferences(repo.key()));
        }
        None
    }

    /// Whether the repository and both references were resolved.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.repository.is_some() && self.from.is_some() && self.to.is_some()
    }
}

/// Façade used by front-ends to resolve, search and compare.
#[derive(Debug, Clone)]
pub struct CompareService {
    store: Arc<CacheStore>,
    providers: Providers,
    queue: Arc<RefreshQueue>,
}

impl CompareService {
    /// Create the service.
    pub const fn new(store: Arc<CacheStore>, providers: Providers, queue: Arc<RefreshQueue>) -> Self {
        Self {
            store,
            providers,
            queue,
        }
    }

    /// Store queried by the service.
    pub const fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    /// Queue refreshes are submitted to.
    pub const fn queue(&self) -> &Arc<RefreshQueue> {
        &self.queue
    }

    /// Resolve whitespace separated `<repository> [from] [to]` arguments.
    ///
    /// Never queries upstream; the `needs_*` flags tell the caller what to
    /// refresh before resolving again.
    pub fn resolve(&self, text: &str) -> Resolution {
        let mut args = text.split_whitespace();
        let mut resolution = Resolution {
            repository_query: args.next().unwrap_or_default().to_owned(),
            from_query: args.next().map(str::to_owned),
            to_query: args.next().map(str::to_owned),
            ..Resolution::default()
        };

        let repositories = self.store.repositories();
        let never_refreshed = self.store.repositories_refreshed_at() == OffsetDateTime::UNIX_EPOCH;
        if repositories.is_empty() || never_refreshed {
            resolution.needs_repositories_refresh = true;
            return resolution;
        }

        let Some(repository) = repositories
            .get_by_closest_match(&resolution.repository_query)
            .cloned()
        else {
            return resolution;
        };

        if repository.references.is_empty() || repository.references_never_refreshed() {
            resolution.needs_references_refresh = true;
        } else {
            let closest = |query: &Option<String>| {
                query
                    .as_deref()
                    .and_then(|name| repository.references.get_by_closest_match(name))
                    .cloned()
            };
            resolution.from = closest(&resolution.from_query);
            resolution.to = closest(&resolution.to_query);
        }
        resolution.repository = Some(repository);
        resolution
    }

    /// Resolve `text`, refreshing the repository list and then the
    /// repository's references when they are missing.
    ///
    /// Each refresh is attempted once; flags still set on the returned
    /// resolution mean upstream had nothing better to offer.
    pub async fn resolve_fresh(&self, text: &str) -> std::result::Result<Resolution, QueueError> {
        let mut resolution = self.resolve(text);
        if resolution.needs_repositories_refresh {
            self.queue.refresh(RefreshTask::Repositories).await?;
            resolution = self.resolve(text);
        }
        if let Some(task @ RefreshTask::RepositoryReferences(_)) = resolution.refresh_task() {
            self.queue.refresh(task).await?;
            resolution = self.resolve(text);
        }
        Ok(resolution)
    }

    /// Ranked repositories; an empty filter lists every repository.
    pub fn search_repositories(&self, filter: &str, limit: usize) -> Vec<Match<Arc<Repository>>> {
        self.store
            .repositories()
            .search(filter, limit)
            .into_iter()
            .map(|ranked| Match {
                rank: ranked.rank,
                item: Arc::clone(ranked.item),
            })
            .collect()
    }

    /// Ranked references of a repository; an empty filter matches nothing.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] when the repository is not cached.
    pub fn search_references(
        &self,
        repository: &RepositoryKey,
        filter: &str,
        limit: usize,
    ) -> Result<Vec<Match<Reference>>> {
        let repository = self
            .store
            .repository(repository)
            .ok_or_else(|| Error::not_found("repository", repository))?;
        Ok(repository
            .references
            .search(filter, limit)
            .into_iter()
            .map(|ranked| Match {
                rank: ranked.rank,
                item: ranked.item.clone(),
            })
            .collect())
    }

    /// Compare two references and attach cached identities to commit authors.
    ///
    /// # Errors
    /// Returns [`Error::UnknownProvider`] or the provider error unchanged.
    pub async fn compare(&self, repository: &Repository, from: &Reference, to: &Reference) -> Result<Comparison> {
        let provider = self.providers.get(repository.provider)?;
        let mut comparison = provider.compare(&repository.name, from, to).await?;
        comparison.hydrate_authors(&self.store.identities());
        debug!(
            repository = %repository.name,
            from = %from.name,
            to = %to.name,
            commits = comparison.commit_count(),
            "compared references"
        );
        Ok(comparison)
    }

    /// Compare a fully resolved query.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] for the first unresolved argument,
    /// otherwise the errors of [`CompareService::compare`].
    pub async fn compare_resolved(&self, resolution: &Resolution) -> Result<Comparison> {
        let repository = resolution
            .repository
            .as_ref()
            .ok_or_else(|| Error::not_found("repository", &resolution.repository_query))?;
        let from = resolution.from.as_ref().ok_or_else(|| {
            Error::not_found("reference", resolution.from_query.as_deref().unwrap_or_default())
        })?;
        let to = resolution.to.as_ref().ok_or_else(|| {
            Error::not_found("reference", resolution.to_query.as_deref().unwrap_or_default())
        })?;
        self.compare(repository, from, to).await
    }

    /// Submit `task` and run `then` with its outcome on a spawned task, so
    /// the caller can answer immediately and follow up once data is fresh.
    ///
    /// # Errors
    /// Returns the queue error when the task cannot be submitted.
    pub fn refresh_then<F>(&self, task: RefreshTask, then: F) -> std::result::Result<JoinHandle<()>, QueueError>
    where
        F: FnOnce(std::result::Result<RefreshOutcome, QueueError>) + Send + 'static,
    {
        let handle = self.queue.submit_with_handle(task)?;
        Ok(tokio::spawn(async move {
            then(handle.wait().await);
        }))
    }
}
