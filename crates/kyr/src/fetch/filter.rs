//! Repository name predicates.
//!
//! Predicates are small immutable trees built with `&` and `|`:
//!
//! ```
//! use kyr::fetch::NameMatcher;
//!
//! let m = NameMatcher::starts_with("svc-") | NameMatcher::equals("gateway");
//! assert!(m.matches("svc-billing"));
//! assert!(m.matches("gateway"));
//! assert!(!m.matches("docs"));
//! ```

use std::collections::BTreeSet;
use std::ops::{BitAnd, BitOr};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameMatcher {
    In(BTreeSet<String>),
    StartsWith(String),
    Equals(String),
    And(Box<NameMatcher>, Box<NameMatcher>),
    Or(Box<NameMatcher>, Box<NameMatcher>),
}

impl NameMatcher {
    pub fn one_of<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::In(names.into_iter().map(Into::into).collect())
    }

    pub fn starts_with(prefix: impl Into<String>) -> Self {
        Self::StartsWith(prefix.into())
    }

    pub fn equals(value: impl Into<String>) -> Self {
        Self::Equals(value.into())
    }

    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::In(set) => set.contains(name),
            Self::StartsWith(prefix) => name.starts_with(prefix.as_str()),
            Self::Equals(value) => name == value,
            Self::And(l, r) => l.matches(name) && r.matches(name),
            Self::Or(l, r) => l.matches(name) || r.matches(name),
        }
    }
}

impl BitAnd for NameMatcher {
    type Output = NameMatcher;

    fn bitand(self, rhs: Self) -> Self::Output {
        NameMatcher::And(Box::new(self), Box::new(rhs))
    }
}

impl BitOr for NameMatcher {
    type Output = NameMatcher;

    fn bitor(self, rhs: Self) -> Self::Output {
        NameMatcher::Or(Box::new(self), Box::new(rhs))
    }
}

/// Filter applied to repositories during a pull.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoFilter {
    pub name: Option<NameMatcher>,
}

impl RepoFilter {
    /// A filter that accepts everything.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn by_name(matcher: NameMatcher) -> Self {
        Self {
            name: Some(matcher),
        }
    }

    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.name.as_ref().is_none_or(|m| m.matches(name))
    }

    /// The explicit name set when the predicate is exactly `In`.
    #[must_use]
    pub fn exact_names(&self) -> Option<&BTreeSet<String>> {
        match &self.name {
            Some(NameMatcher::In(names)) => Some(names),
            _ => None,
        }
    }

    /// True when no name predicate narrows the listing.
    #[must_use]
    pub fn is_unfiltered(&self) -> bool {
        self.name.is_none()
    }
}
