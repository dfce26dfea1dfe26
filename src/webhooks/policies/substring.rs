//! Substring blacklist policy.
//!
//! The baseline rule: a token forbids every image containing it anywhere.
//! Matching is plain containment with no anchoring and no understanding of
//! reference grammar, so `nginx:1.19` also forbids `myrepo/nginx:1.19-alpine`.

use super::ImageMatcher;

/// Forbids images containing `token`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstringRule {
    token: String,
}

impl SubstringRule {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl ImageMatcher for SubstringRule {
    fn id(&self) -> &str {
        &self.token
    }

    fn matches(&self, image: &str) -> bool {
        image.contains(self.token.as_str())
    }
}
