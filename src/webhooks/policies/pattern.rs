//! Regular-expression blacklist policy.
//!
//! Patterns are unanchored, like substring rules; use `^`/`$` to anchor.

use regex::Regex;

use super::ImageMatcher;

/// Forbids images in which `pattern` finds a match
#[derive(Debug, Clone)]
pub struct PatternRule {
    source: String,
    regex: Regex,
}

impl PatternRule {
    /// Compile `pattern`; invalid expressions are rejected up front
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            source: pattern.to_string(),
            regex: Regex::new(pattern)?,
        })
    }
}

impl ImageMatcher for PatternRule {
    fn id(&self) -> &str {
        &self.source
    }

    fn matches(&self, image: &str) -> bool {
        self.regex.is_match(image)
    }
}
