//! Domain model for git-compare: keys, fuzzy ranking, repositories,
//! references, comparisons and the provider contract.

pub mod comparison;
pub mod error;
pub mod key;
pub mod provider;
pub mod rank;
pub mod reference;
pub mod repository;

pub use comparison::{Author, Commit, Comparison, MAX_LISTED_AUTHORS};
pub use error::{BoxError, Error, Result};
pub use key::{RefKey, RepositoryKey};
pub use provider::{Provider, ProviderType, Providers};
pub use rank::{EmptyFilter, Named, Ranked, Ranker};
pub use reference::{RefKind, Reference, References};
pub use repository::{Repositories, Repository};
