use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::trace;

/// Number of authors spelled out by [`Comparison::authors_summary`] before
/// the remainder is collapsed into a count.
pub const MAX_LISTED_AUTHORS: usize = 7;

const SHORT_MESSAGE_MAX_CHARS: usize = 75;
const SHORT_MESSAGE_CUT_CHARS: usize = 73;

/// Author of a commit.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Author {
    /// Name recorded in the commit.
    pub name: String,
    /// Email recorded in the commit.
    pub email: String,
    /// Chat platform user id, when the email could be resolved.
    pub platform_id: Option<String>,
}

impl Author {
    /// Short rendering used when enumerating authors.
    #[must_use]
    pub fn mention(&self) -> String {
        self.platform_id.as_ref().map_or_else(
            || format!("_{}_", self.email),
            |id| format!("<@{id}>"),
        )
    }
}

/// A commit part of a comparison.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    /// Full commit id.
    pub id: String,
    /// Abbreviated commit id.
    pub short_id: String,
    /// Author of the commit.
    pub author: Author,
    /// Creation time of the commit.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Full commit message.
    pub message: String,
    /// Browser URL of the commit.
    pub web_url: String,
}

impl Commit {
    /// First line of the message, cut down to 75 characters.
    #[must_use]
    pub fn short_message(&self) -> String {
        let mut message = if self.message.chars().count() > SHORT_MESSAGE_MAX_CHARS {
            let mut cut: String = self.message.chars().take(SHORT_MESSAGE_CUT_CHARS).collect();
            cut.push_str("..");
            cut
        } else {
            self.message.clone()
        };

        if let Some(idx) = message.find('\n') {
            message.truncate(idx);
        }
        message
    }

    /// Detailed rendering of the author of this commit.
    #[must_use]
    pub fn author_label(&self) -> String {
        self.author.platform_id.as_ref().map_or_else(
            || format!("*{}* - _{}_", self.author.name, self.author.email),
            |id| format!("*<@{id}>*"),
        )
    }
}

/// Commits between two references, as computed by a provider.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// Commits in the order returned by the provider.
    pub commits: Vec<Commit>,
    /// Browser URL of the comparison.
    pub web_url: String,
}

impl Comparison {
    /// Number of commits.
    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.commits.len()
    }

    /// Attach the platform id of every author whose email is in `mapping`.
    ///
    /// Authors without an entry are left untouched.
    pub fn hydrate_authors(&mut self, mapping: &HashMap<String, String>) {
        for commit in &mut self.commits {
            if let Some(platform_id) = mapping.get(&commit.author.email) {
                commit.author.platform_id = Some(platform_id.clone());
                trace!(
                    commit_id = %commit.id,
                    email = %commit.author.email,
                    platform_id = %platform_id,
                    "hydrated commit author"
                );
            } else {
                trace!(
                    commit_id = %commit.id,
                    email = %commit.author.email,
                    "could not hydrate commit author"
                );
            }
        }
    }

    /// Distinct authors of the comparison.
    ///
    /// Resolved authors come first, deduplicated by platform id, then the
    /// remaining ones deduplicated by email. Both groups keep commit order.
    #[must_use]
    pub fn authors(&self) -> Vec<&Author> {
        let mut seen_ids = HashSet::new();
        let mut seen_emails = HashSet::new();
        let mut resolved = Vec::new();
        let mut unresolved = Vec::new();

        for commit in &self.commits {
            let author = &commit.author;
            match &author.platform_id {
                Some(id) => {
                    if seen_ids.insert(id.as_str()) {
                        resolved.push(author);
                    }
                }
                None => {
                    if seen_emails.insert(author.email.as_str()) {
                        unresolved.push(author);
                    }
                }
            }
        }

        resolved.extend(unresolved);
        resolved
    }

    /// One-line summary of who contributed to the comparison.
    ///
    /// ```
    /// use git_compare_core::Comparison;
    ///
    /// assert_eq!(Comparison::default().authors_summary(), "no authors");
    /// ```
    #[must_use]
    pub fn authors_summary(&self) -> String {
        if self.commits.is_empty() {
            return "no authors".to_owned();
        }

        let authors = self.authors();
        let listed = authors.len().min(MAX_LISTED_AUTHORS);
        let mut parts: Vec<String> = authors[..listed].iter().map(|a| a.mention()).collect();
        let others = authors.len() - listed;
        if others > 0 {
            parts.push(format!("{others} other{}", if others > 1 { "s" } else { "" }));
        }

        let mut out = String::from(if self.commit_count() > 1 {
            "commits from "
        } else {
            "commit from "
        });
        let last = parts.len() - 1;
        for (idx, part) in parts.iter().enumerate() {
            if idx > 0 {
                out.push_str(if idx == last { " and " } else { ", " });
            }
            out.push_str(part);
        }
        out
    }
}
