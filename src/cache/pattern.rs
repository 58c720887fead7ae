//! Key patterns for bulk cache invalidation.

use std::borrow::Cow;

use regex::Regex;

use crate::Result;

/// Selects the keys removed by [`TtlCache::invalidate`](super::TtlCache::invalidate).
///
/// A `Literal` is compiled as a regular expression and matched anywhere in
/// the key, so `"products"` removes `"products:1"` and `"products:list"`.
/// Use [`InvalidationPattern::prefix`] when the text may contain regex
/// metacharacters and only a leading match is wanted.
#[derive(Debug, Clone)]
pub enum InvalidationPattern {
    Literal(String),
    Regex(Regex),
}

impl InvalidationPattern {
    /// Match keys starting with `prefix`, taken verbatim.
    pub fn prefix(prefix: &str) -> Self {
        Self::Literal(format!("^{}", regex::escape(prefix)))
    }

    /// Compile the pattern, borrowing when it is already a regex.
    pub fn to_regex(&self) -> Result<Cow<'_, Regex>> {
        match self {
            Self::Literal(source) => Ok(Cow::Owned(Regex::new(source)?)),
            Self::Regex(re) => Ok(Cow::Borrowed(re)),
        }
    }
}

impl From<&str> for InvalidationPattern {
    fn from(s: &str) -> Self {
        Self::Literal(s.to_owned())
    }
}

impl From<String> for InvalidationPattern {
    fn from(s: String) -> Self {
        Self::Literal(s)
    }
}

impl From<Regex> for InvalidationPattern {
    fn from(re: Regex) -> Self {
        Self::Regex(re)
    }
}
