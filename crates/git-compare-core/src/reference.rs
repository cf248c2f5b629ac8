use std::collections::HashMap;
use std::collections::hash_map;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::key::RefKey;
use crate::rank::{Named, Ranked, Ranker};

/// Kind of git reference.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefKind {
    /// A branch.
    Branch,
    /// A single commit.
    Commit,
    /// A deployment environment pointing at another reference.
    #[serde(rename = "env")]
    Environment,
    /// A tag.
    Tag,
}

impl RefKind {
    /// Lowercase discriminant used for keys and display.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Branch => "branch",
            Self::Commit => "commit",
            Self::Environment => "env",
            Self::Tag => "tag",
        }
    }
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "branch" => Ok(Self::Branch),
            "commit" => Ok(Self::Commit),
            "env" => Ok(Self::Environment),
            "tag" => Ok(Self::Tag),
            other => Err(Error::InvalidRefKind(other.to_owned())),
        }
    }
}

/// A named pointer into the history of a repository.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    /// Name of the reference (`main`, `v1.0.0`, `production`, ...).
    pub name: String,
    /// Kind of the reference.
    pub kind: RefKind,
    /// Browser URL of the reference.
    pub web_url: String,
    /// Reference this one points at, e.g. the commit deployed to an environment.
    pub origin: Option<Box<Reference>>,
}

impl Reference {
    /// Create a reference without origin.
    pub fn new(kind: RefKind, name: impl Into<String>, web_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            web_url: web_url.into(),
            origin: None,
        }
    }

    /// Attach the reference this one points at.
    #[must_use]
    pub fn with_origin(mut self, origin: Self) -> Self {
        self.origin = Some(Box::new(origin));
        self
    }

    /// Key derived from the kind and the name.
    #[must_use]
    pub fn key(&self) -> RefKey {
        RefKey::derive(self.kind.as_str(), &self.name)
    }

    /// Reference to hand to a provider when comparing: the origin for
    /// pointers (environments), the reference itself otherwise.
    #[must_use]
    pub fn target(&self) -> &Self {
        self.origin.as_deref().map_or(self, Self::target)
    }
}

impl Named for Reference {
    fn name(&self) -> &str {
        &self.name
    }

    fn discriminant(&self) -> &str {
        self.kind.as_str()
    }
}

/// References of one repository, indexed by [`RefKey`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct References {
    entries: HashMap<RefKey, Reference>,
}

impl References {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a reference under its own key, replacing any previous entry.
    pub fn insert(&mut self, reference: Reference) {
        self.entries.insert(reference.key(), reference);
    }

    /// Look a reference up by key.
    #[must_use]
    pub fn get_by_key(&self, key: &RefKey) -> Option<&Reference> {
        self.entries.get(key)
    }

    /// Fuzzy search references by name. An empty filter matches nothing.
    #[must_use]
    pub fn search(&self, filter: &str, limit: usize) -> Vec<Ranked<'_, Reference>> {
        Ranker::match_none().search(self.entries.values(), filter, limit)
    }

    /// Return the reference whose name is the closest match to `name`.
    #[must_use]
    pub fn get_by_closest_match(&self, name: &str) -> Option<&Reference> {
        Ranker::match_none().closest(self.entries.values(), name)
    }

    /// Number of references.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no reference is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over references in no particular order.
    pub fn iter(&self) -> hash_map::Values<'_, RefKey, Reference> {
        self.entries.values()
    }
}

impl FromIterator<Reference> for References {
    fn from_iter<I: IntoIterator<Item = Reference>>(iter: I) -> Self {
        let mut references = Self::new();
        for reference in iter {
            references.insert(reference);
        }
        references
    }
}

impl<'a> IntoIterator for &'a References {
    type Item = &'a Reference;
    type IntoIter = hash_map::Values<'a, RefKey, Reference>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
