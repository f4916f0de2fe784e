//! Regular-expression matching over entry keys or values

use regex::Regex;

use super::Entry;

/// Which side of an entry a pattern is tested against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchField {
    Key,
    Value,
}

/// A compiled pattern bound to a field
///
/// Matching is unanchored: `a` matches `cat`. Use `^`/`$` to anchor.
#[derive(Debug, Clone)]
pub struct Matcher {
    field: MatchField,
    pattern: Regex,
}

impl Matcher {
    pub fn new(field: MatchField, pattern: Regex) -> Self {
        Self { field, pattern }
    }

    /// Compile `pattern` and bind it to `field`
    pub fn compile(field: MatchField, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self::new(field, Regex::new(pattern)?))
    }

    pub fn field(&self) -> MatchField {
        self.field
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn matches(&self, entry: &Entry) -> bool {
        let subject = match self.field {
            MatchField::Key => entry.key.as_text(),
            MatchField::Value => entry.value.as_text(),
        };
        self.pattern.is_match(&subject)
    }
}

impl PartialEq for Matcher {
    fn eq(&self, other: &Self) -> bool {
        self.field == other.field && self.pattern.as_str() == other.pattern.as_str()
    }
}
