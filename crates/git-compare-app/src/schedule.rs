//! Start-up and periodic refresh triggers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::{CacheConfig, RefreshSchedule};
use crate::queue::RefreshQueue;
use crate::refresh::RefreshTask;

/// Spawns the refresh triggers described by a [`CacheConfig`].
#[derive(Debug)]
pub struct Scheduler {
    queue: Arc<RefreshQueue>,
    cache: CacheConfig,
}

impl Scheduler {
    /// Create a scheduler submitting to `queue`.
    pub const fn new(queue: Arc<RefreshQueue>, cache: CacheConfig) -> Self {
        Self { queue, cache }
    }

    /// Spawn the start-up sequence and one periodic trigger per enabled schedule.
    ///
    /// Every spawned task stops once `shutdown` flips to `true`.
    pub fn start(&self, shutdown: &watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let mut handles = vec![tokio::spawn(run_on_start(Arc::clone(&self.queue), self.cache))];

        let periodic = [
            (RefreshTask::Repositories, self.cache.repositories),
            (RefreshTask::AllRepositoryReferences, self.cache.references),
            (RefreshTask::Identities, self.cache.identities),
        ];
        for (task, schedule) in periodic {
            if let Some(handle) = self.spawn_periodic(task, &schedule, shutdown.clone()) {
                handles.push(handle);
            }
        }
        handles
    }

    fn spawn_periodic(
        &self,
        task: RefreshTask,
        schedule: &RefreshSchedule,
        shutdown: watch::Receiver<bool>,
    ) -> Option<JoinHandle<()>> {
        let Some(period) = schedule.period() else {
            info!(task = %task, "periodic refresh disabled");
            return None;
        };
        info!(task = %task, every_seconds = period.as_secs(), "scheduling periodic refresh");
        Some(tokio::spawn(run_periodic(
            Arc::clone(&self.queue),
            task,
            period,
            shutdown,
        )))
    }
}

/// Identities first, then repositories; references of every repository only
/// once the repository list has been refreshed.
async fn run_on_start(queue: Arc<RefreshQueue>, cache: CacheConfig) {
    if cache.identities.on_start {
        if let Err(err) = queue.submit(RefreshTask::Identities) {
            debug!(error = %err, "start-up identity refresh not queued");
        }
    }
    if cache.repositories.on_start {
        match queue.refresh(RefreshTask::Repositories).await {
            Ok(outcome) => debug!(?outcome, "start-up repository refresh done"),
            Err(err) => debug!(error = %err, "start-up repository refresh not run"),
        }
    }
    if cache.references.on_start {
        if let Err(err) = queue.submit(RefreshTask::AllRepositoryReferences) {
            debug!(error = %err, "start-up reference refresh not queued");
        }
    }
}

async fn run_periodic(
    queue: Arc<RefreshQueue>,
    task: RefreshTask,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let Some(start) = Instant::now().checked_add(period) else {
        warn!(task = %task, ?period, "periodic refresh disabled: period out of range");
        return;
    };
    let mut ticker = interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                if let Err(err) = queue.submit(task.clone()) {
                    debug!(task = %task, error = %err, "periodic refresh not queued");
                }
            }
        }
    }
    debug!(task = %task, "periodic refresh stopped");
}
