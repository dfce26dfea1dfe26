//! Exact-reference blacklist policy.

use super::ImageMatcher;

/// Forbids one image reference, compared byte-for-byte
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExactRule {
    image: String,
}

impl ExactRule {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
        }
    }
}

impl ImageMatcher for ExactRule {
    fn id(&self) -> &str {
        &self.image
    }

    fn matches(&self, image: &str) -> bool {
        image == self.image
    }
}
