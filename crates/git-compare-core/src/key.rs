use serde::{Deserialize, Serialize};
use std::fmt;

/// Derive the key of an entity from its kind discriminant and its name.
///
/// The key is the CRC32 (IEEE) checksum of `kind` immediately followed by
/// `name`, rendered as an unsigned decimal string. It only depends on its
/// inputs, so it is stable across process restarts. Collisions are possible
/// and accepted.
#[must_use]
pub fn derive(kind: &str, name: &str) -> String {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(kind.as_bytes());
    hasher.update(name.as_bytes());
    hasher.finalize().to_string()
}

/// Identifier of a [`Reference`](crate::Reference) within its repository.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefKey(String);

impl RefKey {
    /// Derive the key of a reference of the given kind and name.
    #[must_use]
    pub fn derive(kind: &str, name: &str) -> Self {
        Self(derive(kind, name))
    }

    /// Borrow the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RefKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RefKey {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for RefKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identifier of a [`Repository`](crate::Repository) across all providers.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepositoryKey(String);

impl RepositoryKey {
    /// Derive the key of a repository hosted by `provider` under `name`.
    #[must_use]
    pub fn derive(provider: &str, name: &str) -> Self {
        Self(derive(provider, name))
    }

    /// Borrow the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepositoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RepositoryKey {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for RepositoryKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_is_pinned_to_crc32_ieee() {
        assert_eq!(derive("branch", "foo"), "920939608");
        assert_eq!(derive("github", "foo"), "1040242264");
    }

    #[test]
    fn derive_is_deterministic() {
        let first = derive("tag", "v1.2.3");
        let second = derive("tag", "v1.2.3");
        assert_eq!(first, second);
        assert_ne!(derive("tag", "v1.2.3"), derive("branch", "v1.2.3"));
    }

    #[test]
    fn derive_renders_unsigned_decimal() {
        let key = derive("gitlab", "");
        assert!(key.chars().all(|c| c.is_ascii_digit()));
        assert!(key.parse::<u32>().is_ok());
    }

    #[test]
    fn typed_keys_wrap_derived_value() {
        assert_eq!(RefKey::derive("branch", "foo").as_str(), "920939608");
        assert_eq!(RepositoryKey::derive("github", "foo").to_string(), "1040242264");
        assert_eq!(RefKey::from("920939608"), RefKey::derive("branch", "foo"));
    }
}
