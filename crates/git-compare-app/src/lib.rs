//! Application layer for git-compare.
//!
//! This crate owns the in-memory cache, the refresh queue and its schedules,
//! identity resolution, configuration and the service used by front-ends.

pub mod config;
pub mod context;
pub mod identity;
pub mod queue;
pub mod refresh;
pub mod schedule;
pub mod service;
pub mod store;

// Re-exports for convenience
pub use config::{AppConfig, CacheConfig, IdentityEntry, ProviderConfig, RefreshSchedule, UserAliases};
pub use context::AppContext;
pub use identity::{IdentityDirectory, IdentitySource, StaticIdentitySource};
pub use queue::{QueueError, RefreshHandle, RefreshQueue};
pub use refresh::{RefreshOutcome, RefreshTask, Refresher, Throttle};
pub use schedule::Scheduler;
pub use service::{CompareService, Match, Resolution};
pub use store::{CacheStore, IdentityMappings};
