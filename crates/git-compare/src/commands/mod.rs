use std::sync::Arc;

use anyhow::{Context, Result, bail};
use git_compare_app::{AppConfig, AppContext, IdentitySource, StaticIdentitySource};
use git_compare_core::{ProviderType, Providers};
use git_compare_provider_git::LocalGitProvider;
use tracing::{debug, warn};

use crate::Command;

mod handlers;

/// Build the application context from `config` and run `command` against it.
pub async fn run(config: AppConfig, command: Command) -> Result<()> {
    let providers = build_providers(&config)?;
    let identities = build_identity_source(&config);
    let mut context = AppContext::new(config, providers, identities);

    let result = match command {
        Command::Serve => handlers::handle_serve(&mut context).await,
        Command::Repos { filter, limit } => {
            handlers::handle_repos(context.service(), &filter, limit).await
        }
        Command::Refs {
            repository,
            filter,
            limit,
        } => handlers::handle_refs(context.service(), &repository, &filter, limit).await,
        Command::Compare {
            repository,
            from,
            to,
        } => handlers::handle_compare(context.service(), &repository, &from, &to).await,
    };

    if !context.shutdown().await {
        warn!("shutdown grace period elapsed");
    }
    result
}

fn build_providers(config: &AppConfig) -> Result<Providers> {
    let mut providers = Providers::new();
    for entry in &config.providers {
        match entry.kind {
            ProviderType::Local => {
                let provider = LocalGitProvider::new(&entry.owners, entry.url.clone().unwrap_or_default())
                    .context("failed to configure local provider")?;
                providers.insert(Arc::new(provider));
            }
            kind @ (ProviderType::GitHub | ProviderType::GitLab) => {
                bail!("no client available for {} providers", kind.pretty());
            }
        }
    }
    debug!(?providers, "configured providers");
    Ok(providers)
}

fn build_identity_source(config: &AppConfig) -> Option<Arc<dyn IdentitySource>> {
    if config.identities.is_empty() {
        debug!("no identities configured, authors stay unresolved");
        return None;
    }
    Some(Arc::new(StaticIdentitySource::from_entries(&config.identities)))
}
