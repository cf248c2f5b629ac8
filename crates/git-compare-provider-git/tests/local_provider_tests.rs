#![allow(missing_docs, clippy::expect_used, clippy::unwrap_used)]

use std::fs;
use std::path::Path;

use anyhow::Result;
use git_compare_core::{Error, Provider, ProviderType, RefKind, Reference};
use git_compare_provider_git::LocalGitProvider;
use git2::{Oid, Repository, Signature};
use tempfile::TempDir;

const BASE_URL: &str = "https://git.example.com";

fn commit(repo: &Repository, refname: &str, parent: Option<Oid>, message: &str, email: &str) -> Result<Oid> {
    let name = email.split('@').next().unwrap_or_default();
    let sig = Signature::now(name, email)?;
    let tree_id = repo.treebuilder(None)?.write()?;
    let tree = repo.find_tree(tree_id)?;
    let parent = parent.map(|oid| repo.find_commit(oid)).transpose()?;
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
    Ok(repo.commit(Some(refname), &sig, &sig, message, &tree, &parents)?)
}

/// `acme/api`: `main` has two commits tagged `v1`; `feature` adds two more.
/// `acme/notes` is a plain directory and `tools/cli` an empty bare repository.
fn fixture() -> Result<(TempDir, LocalGitProvider)> {
    let root = TempDir::new()?;
    let acme = root.path().join("acme");
    let tools = root.path().join("tools");
    fs::create_dir_all(&acme)?;
    fs::create_dir_all(&tools)?;

    let api = Repository::init(acme.join("api"))?;
    let first = commit(&api, "refs/heads/main", None, "init", "jane@example.com")?;
    let second = commit(&api, "refs/heads/main", Some(first), "add api", "john@example.com")?;
    api.tag_lightweight("v1", &api.find_object(second, None)?, false)?;
    api.branch("feature", &api.find_commit(second)?, false)?;
    let third = commit(&api, "refs/heads/feature", Some(second), "feat: search\n\nbody", "jane@example.com")?;
    commit(&api, "refs/heads/feature", Some(third), "feat: compare", "amy@example.com")?;

    fs::create_dir_all(acme.join("notes"))?;
    fs::write(acme.join("README"), "not a repository")?;
    Repository::init_bare(tools.join("cli"))?;

    let provider = LocalGitProvider::new([acme, tools], BASE_URL)?;
    Ok((root, provider))
}

fn names(refs: &[Reference], kind: RefKind) -> Vec<&str> {
    let mut names: Vec<&str> = refs
        .iter()
        .filter(|r| r.kind == kind)
        .map(|r| r.name.as_str())
        .collect();
    names.sort_unstable();
    names
}

#[tokio::test]
async fn lists_repositories_of_every_owner() -> Result<()> {
    let (_root, provider) = fixture()?;
    let mut repositories = provider.list_repositories().await?;
    repositories.sort_by(|a, b| a.name.cmp(&b.name));

    let listed: Vec<(&str, &str)> = repositories
        .iter()
        .map(|r| (r.name.as_str(), r.web_url.as_str()))
        .collect();
    assert_eq!(
        listed,
        vec![
            ("acme/api", "https://git.example.com/acme/api"),
            ("tools/cli", "https://git.example.com/tools/cli"),
        ]
    );
    assert!(repositories.iter().all(|r| r.provider == ProviderType::Local));
    assert!(repositories.iter().all(|r| r.references.is_empty()));
    Ok(())
}

#[tokio::test]
async fn lists_branches_and_tags() -> Result<()> {
    let (_root, provider) = fixture()?;
    let references = provider.list_references("acme/api").await?;

    assert_eq!(names(&references, RefKind::Branch), vec!["feature", "main"]);
    assert_eq!(names(&references, RefKind::Tag), vec!["v1"]);
    let main = references.iter().find(|r| r.name == "main").expect("main listed");
    assert_eq!(main.web_url, "https://git.example.com/acme/api/tree/main");

    assert!(provider.list_references("tools/cli").await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn compares_branches_oldest_first() -> Result<()> {
    let (_root, provider) = fixture()?;
    let main = Reference::new(RefKind::Branch, "main", "");
    let feature = Reference::new(RefKind::Branch, "feature", "");

    let comparison = provider.compare("acme/api", &main, &feature).await?;

    assert_eq!(comparison.web_url, "https://git.example.com/acme/api/compare/main...feature");
    let messages: Vec<String> = comparison.commits.iter().map(|c| c.short_message()).collect();
    assert_eq!(messages, vec!["feat: search", "feat: compare"]);

    let first = &comparison.commits[0];
    assert_eq!(first.short_id.len(), 8);
    assert!(first.id.starts_with(&first.short_id));
    assert_eq!(first.author.email, "jane@example.com");
    assert_eq!(first.author.name, "jane");
    assert_eq!(first.web_url, format!("https://git.example.com/acme/api/commit/{}", first.id));
    assert_eq!(
        comparison.authors_summary(),
        "commits from _jane@example.com_ and _amy@example.com_"
    );

    let reversed = provider.compare("acme/api", &feature, &main).await?;
    assert_eq!(reversed.commit_count(), 0);
    Ok(())
}

#[tokio::test]
async fn environment_compares_through_its_origin() -> Result<()> {
    let (_root, provider) = fixture()?;
    let production = Reference::new(RefKind::Environment, "production", "")
        .with_origin(Reference::new(RefKind::Tag, "v1", ""));
    let feature = Reference::new(RefKind::Branch, "feature", "");

    let comparison = provider.compare("acme/api", &production, &feature).await?;

    assert_eq!(comparison.commit_count(), 2);
    assert_eq!(
        comparison.web_url,
        "https://git.example.com/acme/api/compare/production...feature"
    );
    Ok(())
}

#[tokio::test]
async fn unknown_repository_is_an_upstream_error() {
    let (_root, provider) = fixture().expect("fixture");
    let err = provider
        .list_references("acme/missing")
        .await
        .expect_err("must fail");
    assert!(matches!(
        err,
        Error::Upstream {
            provider: ProviderType::Local,
            ..
        }
    ));
    assert!(err.to_string().starts_with("local list references of acme/missing: "));
}

#[tokio::test]
async fn unknown_reference_is_an_upstream_error() {
    let (_root, provider) = fixture().expect("fixture");
    let main = Reference::new(RefKind::Branch, "main", "");
    let missing = Reference::new(RefKind::Branch, "missing", "");
    assert!(provider.compare("acme/api", &main, &missing).await.is_err());
}

#[test]
fn owner_directories_need_not_exist_until_listing() {
    let provider = LocalGitProvider::new([Path::new("/nonexistent/owner")], BASE_URL);
    assert!(provider.is_ok());
}
