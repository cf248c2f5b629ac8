//! Email to chat identity resolution.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::{IdentityEntry, UserAliases};
use crate::store::IdentityMappings;

/// Source of email to chat platform user id mappings.
#[async_trait]
pub trait IdentitySource: Send + Sync {
    /// Fetch every known mapping.
    async fn list_identities(&self) -> Result<IdentityMappings>;
}

/// Identity source backed by the `[[identities]]` configuration entries.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentitySource {
    entries: IdentityMappings,
}

impl StaticIdentitySource {
    /// Build the source from configuration entries, skipping incomplete ones.
    #[must_use]
    pub fn from_entries(entries: &[IdentityEntry]) -> Self {
        let entries = entries
            .iter()
            .filter(|entry| {
                let complete = !entry.email.is_empty() && !entry.id.is_empty();
                if !complete {
                    debug!(email = %entry.email, "skipping incomplete identity entry");
                }
                complete
            })
            .map(|entry| (entry.email.clone(), entry.id.clone()))
            .collect();
        Self { entries }
    }
}

#[async_trait]
impl IdentitySource for StaticIdentitySource {
    async fn list_identities(&self) -> Result<IdentityMappings> {
        Ok(self.entries.clone())
    }
}

/// Identity source decorated with per-user email aliases.
#[derive(Clone)]
pub struct IdentityDirectory {
    source: Arc<dyn IdentitySource>,
    users: Vec<UserAliases>,
}

impl std::fmt::Debug for IdentityDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityDirectory")
            .field("users", &self.users)
            .finish_non_exhaustive()
    }
}

impl IdentityDirectory {
    /// Wrap `source`, adding the aliases of `users` to every fetched mapping.
    pub fn new(source: Arc<dyn IdentitySource>, users: Vec<UserAliases>) -> Self {
        Self { source, users }
    }

    /// Fetch mappings from the source and extend them with configured aliases.
    ///
    /// An alias resolves to the id of its user's primary email. Users whose
    /// primary email is unknown to the source are reported and skipped.
    pub async fn fetch(&self) -> Result<IdentityMappings> {
        let mut mappings = self.source.list_identities().await?;
        for user in &self.users {
            let Some(id) = mappings.get(&user.email).cloned() else {
                warn!(email = %user.email, "custom user mapping not satisfied");
                continue;
            };
            for alias in &user.aliases {
                debug!(email = %user.email, alias = %alias, "adding user alias");
                mappings.insert(alias.clone(), id.clone());
            }
        }
        Ok(mappings)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;

    fn entry(email: &str, id: &str) -> IdentityEntry {
        IdentityEntry {
            email: email.into(),
            id: id.into(),
        }
    }

    #[tokio::test]
    async fn static_source_skips_incomplete_entries() {
        let source = StaticIdentitySource::from_entries(&[
            entry("jane@example.com", "U1"),
            entry("", "U2"),
            entry("john@example.com", ""),
        ]);
        let mappings = source.list_identities().await.expect("list identities");
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings.get("jane@example.com").map(String::as_str), Some("U1"));
    }

    #[tokio::test]
    async fn aliases_resolve_to_primary_identity() {
        let source = Arc::new(StaticIdentitySource::from_entries(&[entry("jane@example.com", "U1")]));
        let directory = IdentityDirectory::new(
            source,
            vec![
                UserAliases {
                    email: "jane@example.com".into(),
                    aliases: vec!["jane@home.example.com".into(), "jd@example.org".into()],
                },
                UserAliases {
                    email: "ghost@example.com".into(),
                    aliases: vec!["ghost@home.example.com".into()],
                },
            ],
        );

        let mappings = directory.fetch().await.expect("fetch identities");
        assert_eq!(mappings.len(), 3);
        assert_eq!(mappings.get("jane@home.example.com").map(String::as_str), Some("U1"));
        assert_eq!(mappings.get("jd@example.org").map(String::as_str), Some("U1"));
        assert!(!mappings.contains_key("ghost@home.example.com"));
    }
}
