//! Image reference parsing.
//!
//! Splits `[registry/]repository[:tag][@digest]` without normalizing. Only the
//! reference-aware rules use this; the substring baseline never parses.

/// Borrowed view over the segments of an image reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageReference<'a> {
    pub registry: Option<&'a str>,
    pub repository: &'a str,
    pub tag: Option<&'a str>,
    pub digest: Option<&'a str>,
}

impl<'a> ImageReference<'a> {
    /// Parse an image string. Returns `None` when the reference is unusable:
    /// empty, containing whitespace, or with an empty repository, tag or digest.
    pub fn parse(image: &'a str) -> Option<Self> {
        if image.is_empty() || image.chars().any(char::is_whitespace) {
            return None;
        }

        let (name, digest) = match image.split_once('@') {
            Some((_, "")) => return None,
            Some((name, digest)) => (name, Some(digest)),
            None => (image, None),
        };

        // A colon followed by a slash belongs to a registry port, not a tag
        let (name, tag) = match name.rsplit_once(':') {
            Some((_, tag)) if tag.contains('/') => (name, None),
            Some((_, "")) => return None,
            Some((name, tag)) => (name, Some(tag)),
            None => (name, None),
        };

        let (registry, repository) = match name.split_once('/') {
            Some((first, rest)) if is_registry(first) => (Some(first), rest),
            _ => (None, name),
        };

        if repository.is_empty()
            || repository.starts_with('/')
            || repository.ends_with('/')
            || repository.contains("//")
        {
            return None;
        }

        Some(Self {
            registry,
            repository,
            tag,
            digest,
        })
    }

    /// Whether the reference is pinned to a content digest
    pub fn is_pinned(&self) -> bool {
        self.digest.is_some()
    }
}

/// First path component names a registry when it looks like a host.
fn is_registry(component: &str) -> bool {
    component.contains('.') || component.contains(':') || component == "localhost"
}
