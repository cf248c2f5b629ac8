//! Fuzzy ranking of named entities against a user supplied filter.

use std::sync::Arc;

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Anything that can be looked up by name.
pub trait Named {
    /// Name matched against search filters.
    fn name(&self) -> &str;

    /// Secondary sort key separating items that share a name.
    fn discriminant(&self) -> &str {
        ""
    }
}

impl<T: Named + ?Sized> Named for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn discriminant(&self) -> &str {
        (**self).discriminant()
    }
}

/// Policy applied when the filter is empty.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum EmptyFilter {
    /// An empty filter matches nothing.
    #[default]
    MatchNone,
    /// An empty filter matches every item with rank 0.
    MatchAll,
}

/// Item paired with the rank it obtained for a given filter (0 is best).
#[derive(Debug)]
pub struct Ranked<'a, T: ?Sized> {
    /// Matched item.
    pub item: &'a T,
    /// Distance between the filter and the item name.
    pub rank: usize,
}

/// Scores and orders items by how closely their name matches a filter.
#[derive(Clone, Copy, Debug, Default)]
pub struct Ranker {
    empty_filter: EmptyFilter,
}

impl Ranker {
    /// Build a ranker with the given empty filter policy.
    #[must_use]
    pub const fn new(empty_filter: EmptyFilter) -> Self {
        Self { empty_filter }
    }

    /// Ranker for which an empty filter returns everything.
    #[must_use]
    pub const fn match_all() -> Self {
        Self::new(EmptyFilter::MatchAll)
    }

    /// Ranker for which an empty filter returns nothing.
    #[must_use]
    pub const fn match_none() -> Self {
        Self::new(EmptyFilter::MatchNone)
    }

    /// Rank `items` against `filter` and keep the `limit` best ones.
    ///
    /// Results are ordered by ascending rank. Equal ranks are ordered by
    /// descending name, then by [`Named::discriminant`], so the output does not
    /// depend on iteration order.
    pub fn search<'a, T, I>(&self, items: I, filter: &str, limit: usize) -> Vec<Ranked<'a, T>>
    where
        T: Named + ?Sized + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        let mut ranked: Vec<Ranked<'a, T>> = items
            .into_iter()
            .filter_map(|item| {
                self.rank(filter, item.name())
                    .map(|rank| Ranked { item, rank })
            })
            .collect();

        ranked.sort_by(|a, b| {
            a.rank
                .cmp(&b.rank)
                .then_with(|| b.item.name().cmp(a.item.name()))
                .then_with(|| a.item.discriminant().cmp(b.item.discriminant()))
        });
        ranked.truncate(limit);
        ranked
    }

    /// Return the single best match for `name`, or `None` for an empty name.
    pub fn closest<'a, T, I>(&self, items: I, name: &str) -> Option<&'a T>
    where
        T: Named + ?Sized + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        if name.is_empty() {
            return None;
        }
        self.search(items, name, 1).into_iter().next().map(|ranked| ranked.item)
    }

    fn rank(&self, filter: &str, name: &str) -> Option<usize> {
        if filter.is_empty() {
            return match self.empty_filter {
                EmptyFilter::MatchAll => Some(0),
                EmptyFilter::MatchNone => None,
            };
        }
        rank_match(filter, name)
    }
}

/// Fuzzy-match `source` as a subsequence of `target`.
///
/// Both sides are folded first: decomposed, stripped of combining marks and
/// lowercased. Returns the number of `target` characters left unmatched, or
/// `None` when `source` is not a subsequence of `target`.
#[must_use]
pub fn rank_match(source: &str, target: &str) -> Option<usize> {
    let source = fold(source);
    let target = fold(target);
    if source.len() > target.len() {
        return None;
    }

    let mut remaining = target.iter();
    for wanted in &source {
        remaining.find(|candidate| *candidate == wanted)?;
    }
    Some(target.len() - source.len())
}

fn fold(value: &str) -> Vec<char> {
    value
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}
