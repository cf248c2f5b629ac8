use anyhow::{Context, Result, anyhow, bail};
use git_compare_app::{AppContext, CompareService, RefreshOutcome, RefreshTask};
use git_compare_core::Reference;
use time::OffsetDateTime;
use tracing::info;

pub async fn handle_serve(context: &mut AppContext) -> Result<()> {
    context.start_schedulers();
    info!(
        providers = context.config().providers.len(),
        "serving; press Ctrl-C to stop"
    );
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    let uptime = OffsetDateTime::now_utc() - context.started_at();
    info!(uptime_secs = uptime.whole_seconds(), "interrupted");
    Ok(())
}

pub async fn handle_repos(service: &CompareService, filter: &str, limit: usize) -> Result<()> {
    refresh(service, RefreshTask::Repositories).await?;
    for found in service.search_repositories(filter, limit) {
        println!("{:>4}  {:<6}  {}", found.rank, found.item.provider, found.item.name);
    }
    Ok(())
}

pub async fn handle_refs(service: &CompareService, repository: &str, filter: &str, limit: usize) -> Result<()> {
    let resolution = service.resolve_fresh(repository).await?;
    let repository = resolution
        .repository
        .ok_or_else(|| anyhow!("no repository matches '{repository}'"))?;

    if filter.is_empty() {
        let mut references: Vec<&Reference> = repository.references.iter().collect();
        references.sort_by(|a, b| a.name.cmp(&b.name));
        for reference in references.into_iter().take(limit) {
            println!("{:>4}  {}/{}", 0, reference.kind, reference.name);
        }
        return Ok(());
    }

    for found in service.search_references(&repository.key(), filter, limit)? {
        println!("{:>4}  {}/{}", found.rank, found.item.kind, found.item.name);
    }
    Ok(())
}

pub async fn handle_compare(service: &CompareService, repository: &str, from: &str, to: &str) -> Result<()> {
    refresh(service, RefreshTask::Identities).await?;
    let resolution = service.resolve_fresh(&format!("{repository} {from} {to}")).await?;
    if resolution.needs_repositories_refresh {
        bail!("no repository available");
    }
    let comparison = service.compare_resolved(&resolution).await?;

    if let (Some(repository), Some(from), Some(to)) = (&resolution.repository, &resolution.from, &resolution.to) {
        println!("{}  {}...{}", repository.name, from.name, to.name);
    }
    println!("{}", comparison.web_url);
    println!("{}", comparison.authors_summary());
    for commit in &comparison.commits {
        println!(
            "{}  {}  {}",
            commit.short_id,
            commit.short_message(),
            commit.author_label()
        );
    }
    Ok(())
}

async fn refresh(service: &CompareService, task: RefreshTask) -> Result<()> {
    let label = task.label();
    match service.queue().refresh(task).await? {
        RefreshOutcome::Failed => bail!("failed to refresh {label}"),
        RefreshOutcome::Refreshed
        | RefreshOutcome::Throttled
        | RefreshOutcome::NotFound
        | RefreshOutcome::Unavailable => Ok(()),
    }
}
