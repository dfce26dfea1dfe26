//! Version range blacklist policy.
//!
//! Forbids tags of one repository that fall inside a semver range, e.g.
//! `nginx` with `<1.20` forbids `nginx:1.19-alpine` but not `nginx:1.21`.
//!
//! Tags are read leniently:
//! - variant suffixes are dropped (`1.19-alpine` → `1.19`)
//! - a leading `v` is dropped (`v2.1.0` → `2.1.0`)
//! - missing components are zero-filled (`6` → `6.0.0`)
//!
//! Tags that still don't parse (`latest`, `stable`) never match. The registry
//! is ignored; the repository path is compared as written.

use semver::{Version, VersionReq};

use super::{ImageMatcher, ImageReference};

/// Forbids `repository` tags satisfying `range`
#[derive(Debug, Clone)]
pub struct VersionRangeRule {
    id: String,
    repository: String,
    range: VersionReq,
}

impl VersionRangeRule {
    pub fn new(repository: &str, range: &str) -> Result<Self, semver::Error> {
        let range = VersionReq::parse(range)?;
        Ok(Self {
            id: format!("{} {}", repository, range),
            repository: repository.to_string(),
            range,
        })
    }
}

impl ImageMatcher for VersionRangeRule {
    fn id(&self) -> &str {
        &self.id
    }

    fn matches(&self, image: &str) -> bool {
        let Some(reference) = ImageReference::parse(image) else {
            return false;
        };
        if reference.repository != self.repository {
            return false;
        }
        reference
            .tag
            .and_then(extract_version)
            .is_some_and(|version| self.range.matches(&version))
    }
}

/// Extract a semver version from an image tag.
fn extract_version(tag: &str) -> Option<Version> {
    let version_part = tag.split('-').next().unwrap_or(tag);
    let version_part = version_part.strip_prefix('v').unwrap_or(version_part);

    // Components are read as integers so zero-padded tags like `18.04` still parse
    let numbers = version_part
        .split('.')
        .map(str::parse::<u64>)
        .collect::<Result<Vec<_>, _>>()
        .ok()?;

    match numbers.as_slice() {
        [major] => Some(Version::new(*major, 0, 0)),
        [major, minor] => Some(Version::new(*major, *minor, 0)),
        [major, minor, patch] => Some(Version::new(*major, *minor, *patch)),
        _ => None,
    }
}
