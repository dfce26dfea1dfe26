//! Digest pinning policy.
//!
//! Forbids images referenced by mutable tag alone. With a repository set, only
//! that repository must be pinned. Unparsable references never match.

use super::{ImageMatcher, ImageReference};

/// Id used when the rule covers every repository
const ANY_REPOSITORY_ID: &str = "unpinned";

/// Forbids images without an `@digest`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnpinnedRule {
    id: String,
    repository: Option<String>,
}

impl UnpinnedRule {
    /// Require digests for every image
    pub fn any() -> Self {
        Self {
            id: ANY_REPOSITORY_ID.to_string(),
            repository: None,
        }
    }

    /// Require digests for one repository
    pub fn for_repository(repository: impl Into<String>) -> Self {
        let repository = repository.into();
        Self {
            id: format!("{}:{}", ANY_REPOSITORY_ID, repository),
            repository: Some(repository),
        }
    }
}

impl ImageMatcher for UnpinnedRule {
    fn id(&self) -> &str {
        &self.id
    }

    fn matches(&self, image: &str) -> bool {
        let Some(reference) = ImageReference::parse(image) else {
            return false;
        };
        if let Some(repository) = &self.repository
            && reference.repository != repository.as_str()
        {
            return false;
        }
        !reference.is_pinned()
    }
}
