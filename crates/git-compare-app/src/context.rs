use std::sync::Arc;

use git_compare_core::Providers;
use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::identity::{IdentityDirectory, IdentitySource};
use crate::queue::{RefreshQueue, DEFAULT_QUEUE_CAPACITY};
use crate::refresh::{Refresher, Throttle};
use crate::schedule::Scheduler;
use crate::service::CompareService;
use crate::store::CacheStore;

/// Everything a running instance shares: configuration, cache, refresh
/// queue and the service handed to front-ends.
#[derive(Debug)]
pub struct AppContext {
    config: AppConfig,
    started_at: OffsetDateTime,
    service: CompareService,
    shutdown: watch::Sender<bool>,
    schedulers: Vec<JoinHandle<()>>,
}

impl AppContext {
    /// Wire the store, the refresh queue and the service. Must be called
    /// from within a tokio runtime.
    pub fn new(config: AppConfig, providers: Providers, identities: Option<Arc<dyn IdentitySource>>) -> Self {
        let store = Arc::new(CacheStore::new());
        let directory = identities.map(|source| IdentityDirectory::new(source, config.users.clone()));
        let refresher = Refresher::new(
            Arc::clone(&store),
            providers.clone(),
            directory,
            Throttle::from(&config.cache),
        );
        let queue = Arc::new(RefreshQueue::spawn(Arc::new(refresher), DEFAULT_QUEUE_CAPACITY));
        let (shutdown, _) = watch::channel(false);

        Self {
            config,
            started_at: OffsetDateTime::now_utc(),
            service: CompareService::new(store, providers, queue),
            shutdown,
            schedulers: Vec::new(),
        }
    }

    /// Loaded configuration.
    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    /// When this context was created.
    pub const fn started_at(&self) -> OffsetDateTime {
        self.started_at
    }

    /// Service exposed to front-ends.
    pub const fn service(&self) -> &CompareService {
        &self.service
    }

    /// Start the on-start refreshes and periodic triggers.
    pub fn start_schedulers(&mut self) {
        let scheduler = Scheduler::new(Arc::clone(self.service.queue()), self.config.cache);
        let receiver = self.shutdown.subscribe();
        self.schedulers.extend(scheduler.start(&receiver));
        info!(tasks = self.schedulers.len(), "refresh schedulers started");
    }

    /// Stop schedulers, then give queued refreshes the configured grace
    /// period to finish.
    ///
    /// Returns `true` when everything stopped in time.
    pub async fn shutdown(self) -> bool {
        let grace = self.config.shutdown_grace();
        info!(grace_ms = grace.as_millis(), "shutting down");
        let _ = self.shutdown.send(true);

        let schedulers = join_all(self.schedulers);
        if tokio::time::timeout(grace, schedulers).await.is_err() {
            warn!("refresh schedulers did not stop in time");
        }

        let drained = self.service.queue().shutdown(grace).await;
        if !drained {
            warn!("exiting with refreshes still in flight");
        }
        drained
    }
}

async fn join_all(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        if let Err(err) = handle.await {
            warn!(error = %err, "refresh scheduler failed");
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;
    use crate::config::IdentityEntry;
    use crate::identity::StaticIdentitySource;

    const CONFIG: &str = r#"
        [cache.repositories]
        on_start = false

        [[providers]]
        type = "local"
        owners = ["/srv/git/acme"]

        [[users]]
        email = "jane@example.com"
        aliases = ["jane@home.example.com"]
    "#;

    #[tokio::test]
    async fn start_up_loads_identities_with_aliases() {
        let config = AppConfig::from_toml_str(CONFIG).expect("config");
        let source: Arc<dyn IdentitySource> = Arc::new(StaticIdentitySource::from_entries(&[IdentityEntry {
            email: "jane@example.com".into(),
            id: "U1".into(),
        }]));
        let mut context = AppContext::new(config, Providers::new(), Some(source));
        context.start_schedulers();

        let store = Arc::clone(context.service().store());
        assert!(context.shutdown().await);

        let identities = store.identities();
        assert_eq!(identities.get("jane@home.example.com").map(String::as_str), Some("U1"));
        assert!(store.repositories().is_empty());
    }
}
