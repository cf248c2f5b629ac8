//! Provider serving git repositories stored on the local filesystem.
//!
//! Every immediate sub-directory of an owner directory that opens as a git
//! repository is listed as `<owner>/<repository>`.

mod error;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use git_compare_core::{
    Author, Commit, Comparison, Provider, ProviderType, RefKind, Reference, Repository, Result,
};
use git2::{BranchType, Oid, Sort};
use time::OffsetDateTime;
use tracing::debug;

pub use error::GitProviderError;

const SHORT_ID_LEN: usize = 8;

/// Provider listing and comparing repositories found under owner directories.
#[derive(Debug, Clone)]
pub struct LocalGitProvider {
    layout: Arc<Layout>,
}

#[derive(Debug)]
struct Layout {
    owners: Vec<PathBuf>,
    web_base_url: String,
}

impl LocalGitProvider {
    /// Create a provider scanning `owners`, building links under `web_base_url`.
    ///
    /// # Errors
    /// Returns [`GitProviderError::NoOwners`] when `owners` is empty.
    pub fn new<I, P>(owners: I, web_base_url: impl Into<String>) -> std::result::Result<Self, GitProviderError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let owners: Vec<PathBuf> = owners.into_iter().map(Into::into).collect();
        if owners.is_empty() {
            return Err(GitProviderError::NoOwners);
        }
        let web_base_url = web_base_url.into().trim_end_matches('/').to_owned();
        Ok(Self {
            layout: Arc::new(Layout { owners, web_base_url }),
        })
    }

    async fn run_blocking<T, F>(&self, f: F) -> std::result::Result<T, GitProviderError>
    where
        F: FnOnce(&Layout) -> std::result::Result<T, GitProviderError> + Send + 'static,
        T: Send + 'static,
    {
        let layout = Arc::clone(&self.layout);
        tokio::task::spawn_blocking(move || f(&layout))
            .await
            .map_err(|e| GitProviderError::Join(e.to_string()))?
    }
}

#[async_trait]
impl Provider for LocalGitProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Local
    }

    fn web_base_url(&self) -> &str {
        &self.layout.web_base_url
    }

    async fn list_repositories(&self) -> Result<Vec<Repository>> {
        self.run_blocking(Layout::scan)
            .await
            .map_err(|e| e.into_upstream("list repositories"))
    }

    async fn list_references(&self, repository: &str) -> Result<Vec<Reference>> {
        let name = repository.to_owned();
        self.run_blocking(move |layout| layout.references(&name))
            .await
            .map_err(|e| e.into_upstream(format!("list references of {repository}")))
    }

    async fn compare(&self, repository: &str, from: &Reference, to: &Reference) -> Result<Comparison> {
        let (name, from, to) = (repository.to_owned(), from.clone(), to.clone());
        self.run_blocking(move |layout| layout.compare(&name, &from, &to))
            .await
            .map_err(|e| e.into_upstream(format!("compare {repository}")))
    }
}

impl Layout {
    fn scan(&self) -> std::result::Result<Vec<Repository>, GitProviderError> {
        let mut repositories = Vec::new();
        for owner in &self.owners {
            let owner_name = dir_name(owner);
            let before = repositories.len();
            for entry in fs::read_dir(owner)? {
                let path = entry?.path();
                if !path.is_dir() {
                    continue;
                }
                if git2::Repository::open(&path).is_err() {
                    debug!(path = %path.display(), "skipping directory that is not a git repository");
                    continue;
                }
                let name = format!("{owner_name}/{}", dir_name(&path));
                let web_url = format!("{}/{name}", self.web_base_url);
                repositories.push(Repository::new(ProviderType::Local, name, web_url));
            }
            debug!(
                owner = %owner.display(),
                count = repositories.len() - before,
                "scanned owner directory"
            );
        }
        Ok(repositories)
    }

    fn open(&self, name: &str) -> std::result::Result<git2::Repository, GitProviderError> {
        let not_found = || GitProviderError::RepositoryNotFound(name.to_owned());
        let (owner, repository) = name.split_once('/').ok_or_else(not_found)?;
        if repository.is_empty() || repository.contains('/') || repository == "." || repository == ".." {
            return Err(not_found());
        }
        let path = self
            .owners
            .iter()
            .find(|dir| dir_name(dir) == owner)
            .map(|dir| dir.join(repository))
            .ok_or_else(not_found)?;
        Ok(git2::Repository::open(path)?)
    }

    fn references(&self, name: &str) -> std::result::Result<Vec<Reference>, GitProviderError> {
        let repo = self.open(name)?;
        let tree_url = |reference: &str| format!("{}/{name}/tree/{reference}", self.web_base_url);

        let mut references = Vec::new();
        for branch in repo.branches(Some(BranchType::Local))? {
            let (branch, _) = branch?;
            if let Some(branch_name) = branch.name()? {
                references.push(Reference::new(RefKind::Branch, branch_name, tree_url(branch_name)));
            }
        }
        for tag in repo.tag_names(None)?.iter().flatten() {
            references.push(Reference::new(RefKind::Tag, tag, tree_url(tag)));
        }
        debug!(repository = %name, count = references.len(), "listed references");
        Ok(references)
    }

    fn compare(
        &self,
        name: &str,
        from: &Reference,
        to: &Reference,
    ) -> std::result::Result<Comparison, GitProviderError> {
        let repo = self.open(name)?;
        let from_oid = resolve(&repo, from.target())?;
        let to_oid = resolve(&repo, to.target())?;

        let mut walk = repo.revwalk()?;
        walk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;
        walk.push(to_oid)?;
        walk.hide(from_oid)?;

        let mut commits = Vec::new();
        for oid in walk {
            let commit = repo.find_commit(oid?)?;
            commits.push(self.commit(name, &commit)?);
        }

        Ok(Comparison {
            commits,
            web_url: format!(
                "{}/{name}/compare/{}...{}",
                self.web_base_url, from.name, to.name
            ),
        })
    }

    fn commit(&self, name: &str, commit: &git2::Commit<'_>) -> std::result::Result<Commit, GitProviderError> {
        let id = commit.id().to_string();
        let signature = commit.author();
        Ok(Commit {
            short_id: id.chars().take(SHORT_ID_LEN).collect(),
            author: Author {
                name: signature.name().unwrap_or_default().to_owned(),
                email: signature.email().unwrap_or_default().to_owned(),
                platform_id: None,
            },
            created_at: OffsetDateTime::from_unix_timestamp(commit.time().seconds())?,
            message: commit.message().unwrap_or_default().to_owned(),
            web_url: format!("{}/{name}/commit/{id}", self.web_base_url),
            id,
        })
    }
}

fn resolve(repo: &git2::Repository, reference: &Reference) -> std::result::Result<Oid, GitProviderError> {
    let spec = match reference.kind {
        RefKind::Branch => format!("refs/heads/{}", reference.name),
        RefKind::Tag => format!("refs/tags/{}", reference.name),
        RefKind::Commit | RefKind::Environment => reference.name.clone(),
    };
    Ok(repo.revparse_single(&spec)?.peel_to_commit()?.id())
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_an_owner() {
        let owners: Vec<PathBuf> = Vec::new();
        assert!(matches!(
            LocalGitProvider::new(owners, "https://git.example.com"),
            Err(GitProviderError::NoOwners)
        ));
    }

    #[test]
    fn trims_trailing_slash_of_base_url() {
        let provider = LocalGitProvider::new(["/srv/git/acme"], "https://git.example.com/");
        assert_eq!(
            provider.as_ref().map(|p| p.web_base_url()).ok(),
            Some("https://git.example.com")
        );
    }

    #[test]
    fn rejects_names_escaping_owner_directory() {
        let layout = Layout {
            owners: vec![PathBuf::from("/srv/git/acme")],
            web_base_url: String::new(),
        };
        for name in ["acme", "acme/..", "acme/a/b", "other/api", "acme/"] {
            assert!(
                matches!(layout.open(name), Err(GitProviderError::RepositoryNotFound(_))),
                "{name} must not resolve"
            );
        }
    }
}
