use std::{collections::HashSet, fs, path::Path, time::Duration};

use anyhow::{bail, Context, Result};
use git_compare_core::ProviderType;
use serde::Deserialize;

/// Grace period granted to queued refreshes on shutdown.
pub const DEFAULT_SHUTDOWN_GRACE_SECONDS: u64 = 5;

const DEFAULT_MIN_INTERVAL_SECONDS: u64 = 60;

/// Upper bound of every schedule duration, ten years.
pub const MAX_SCHEDULE_SECONDS: u64 = 10 * 366 * 86_400;

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Cache refresh schedules.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Configured providers, at most one per type.
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    /// Extra emails mapped onto a user's primary email.
    #[serde(default)]
    pub users: Vec<UserAliases>,
    /// Static email to chat identity mappings.
    #[serde(default)]
    pub identities: Vec<IdentityEntry>,
    /// Seconds queued refreshes are given to finish on shutdown.
    #[serde(default = "default_shutdown_grace_seconds")]
    pub shutdown_grace_seconds: u64,
}

const fn default_shutdown_grace_seconds() -> u64 {
    DEFAULT_SHUTDOWN_GRACE_SECONDS
}

impl AppConfig {
    /// Load and validate the configuration stored at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents =
            fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&contents).with_context(|| format!("failed to load {}", path.display()))
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents).context("failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Grace period granted to queued refreshes on shutdown.
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }

    fn validate(&self) -> Result<()> {
        self.cache.validate()?;
        self.ensure_unique_providers()?;
        for provider in &self.providers {
            provider.validate()?;
        }
        for user in &self.users {
            user.validate()?;
        }
        Ok(())
    }

    fn ensure_unique_providers(&self) -> Result<()> {
        if self.providers.is_empty() {
            bail!("at least one provider must be configured");
        }
        let mut seen = HashSet::new();
        for provider in &self.providers {
            if !seen.insert(provider.kind) {
                bail!("duplicate provider detected: {}", provider.kind);
            }
        }
        Ok(())
    }
}

/// Refresh schedules of the three cached collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "CacheSection")]
pub struct CacheConfig {
    /// Repository list refreshes.
    pub repositories: RefreshSchedule,
    /// Reference refreshes of every repository.
    pub references: RefreshSchedule,
    /// Identity mapping refreshes.
    pub identities: RefreshSchedule,
}

impl CacheConfig {
    fn validate(&self) -> Result<()> {
        for (section, schedule) in [
            ("repositories", &self.repositories),
            ("references", &self.references),
            ("identities", &self.identities),
        ] {
            schedule
                .validate()
                .with_context(|| format!("invalid [cache.{section}] schedule"))?;
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheSection::default().into()
    }
}

/// When and how often a collection is refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSchedule {
    /// Refresh once when the service starts.
    pub on_start: bool,
    /// Period of background refreshes; zero or negative disables them.
    pub every_seconds: i64,
    /// Minimum time between two effective refreshes.
    pub min_interval_seconds: u64,
}

impl RefreshSchedule {
    /// Defaults of the repository list.
    pub const REPOSITORIES: Self = Self {
        on_start: true,
        every_seconds: 3600,
        min_interval_seconds: DEFAULT_MIN_INTERVAL_SECONDS,
    };

    /// Defaults of repository references.
    pub const REFERENCES: Self = Self {
        on_start: false,
        every_seconds: 0,
        min_interval_seconds: DEFAULT_MIN_INTERVAL_SECONDS,
    };

    /// Defaults of identity mappings.
    pub const IDENTITIES: Self = Self {
        on_start: true,
        every_seconds: 86_400,
        min_interval_seconds: DEFAULT_MIN_INTERVAL_SECONDS,
    };

    /// Period of background refreshes, `None` when disabled.
    #[must_use]
    pub fn period(&self) -> Option<Duration> {
        u64::try_from(self.every_seconds)
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    fn validate(&self) -> Result<()> {
        if u64::try_from(self.every_seconds).is_ok_and(|secs| secs > MAX_SCHEDULE_SECONDS) {
            bail!(
                "every_seconds must be at most {MAX_SCHEDULE_SECONDS}, got {}",
                self.every_seconds
            );
        }
        if self.min_interval_seconds > MAX_SCHEDULE_SECONDS {
            bail!(
                "min_interval_seconds must be at most {MAX_SCHEDULE_SECONDS}, got {}",
                self.min_interval_seconds
            );
        }
        Ok(())
    }

    /// Throttle window applied before hitting upstream again.
    #[must_use]
    pub const fn min_interval(&self) -> Duration {
        Duration::from_secs(self.min_interval_seconds)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CacheSection {
    repositories: ScheduleSection,
    references: ScheduleSection,
    identities: ScheduleSection,
}

impl From<CacheSection> for CacheConfig {
    fn from(section: CacheSection) -> Self {
        Self {
            repositories: section.repositories.or(RefreshSchedule::REPOSITORIES),
            references: section.references.or(RefreshSchedule::REFERENCES),
            identities: section.identities.or(RefreshSchedule::IDENTITIES),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ScheduleSection {
    on_start: Option<bool>,
    every_seconds: Option<i64>,
    min_interval_seconds: Option<u64>,
}

impl ScheduleSection {
    fn or(self, defaults: RefreshSchedule) -> RefreshSchedule {
        RefreshSchedule {
            on_start: self.on_start.unwrap_or(defaults.on_start),
            every_seconds: self.every_seconds.unwrap_or(defaults.every_seconds),
            min_interval_seconds: self
                .min_interval_seconds
                .unwrap_or(defaults.min_interval_seconds),
        }
    }
}

/// One `[[providers]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Provider kind.
    #[serde(rename = "type")]
    pub kind: ProviderType,
    /// Base URL used for browser links.
    #[serde(default)]
    pub url: Option<String>,
    /// Owners (organisations, groups, directories) whose repositories are listed.
    #[serde(default)]
    pub owners: Vec<String>,
}

impl ProviderConfig {
    fn validate(&self) -> Result<()> {
        if self.owners.iter().all(|owner| owner.trim().is_empty()) {
            bail!("{} provider must list at least one owner", self.kind.pretty());
        }
        Ok(())
    }
}

/// Secondary emails attached to a user's primary email.
#[derive(Debug, Clone, Deserialize)]
pub struct UserAliases {
    /// Primary email, as known by the identity source.
    pub email: String,
    /// Additional emails the user commits with.
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl UserAliases {
    fn validate(&self) -> Result<()> {
        if self.email.trim().is_empty() {
            bail!("user mapping must have an email");
        }
        if self.aliases.is_empty() {
            bail!("user mapping for '{}' must list at least one alias", self.email);
        }
        Ok(())
    }
}

/// Static mapping from an email to a chat platform user id.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityEntry {
    /// Email of the user.
    pub email: String,
    /// Chat platform user id.
    pub id: String,
}
