//! Registry and repository prefix policy.
//!
//! Bans whole registries (`untrusted.example.com/`) or repository trees
//! (`docker.io/library/`) by leading text.

use super::ImageMatcher;

/// Forbids images starting with `prefix`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixRule {
    prefix: String,
}

impl PrefixRule {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl ImageMatcher for PrefixRule {
    fn id(&self) -> &str {
        &self.prefix
    }

    fn matches(&self, image: &str) -> bool {
        image.starts_with(self.prefix.as_str())
    }
}
