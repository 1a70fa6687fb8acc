//! Version tag ordering.
//!
//! Step versions are git tags. Most are semantic versions (optionally with a
//! leading `v`); the rest are compared as plain strings.

use std::cmp::Ordering;

/// A parsed semantic version.
pub type Version = semver::Version;

/// Parse a version tag like "1.2.3" or "v1.2.3".
pub fn parse_tag(tag: &str) -> Option<Version> {
    let trimmed = tag.strip_prefix('v').unwrap_or(tag);
    Version::parse(trimmed).ok()
}

/// Compare two tags: semver order when both parse, string order otherwise.
pub fn compare_tags(a: &str, b: &str) -> Ordering {
    match (parse_tag(a), parse_tag(b)) {
        (Some(va), Some(vb)) => va.cmp(&vb).then_with(|| a.cmp(b)),
        _ => a.cmp(b),
    }
}

/// Pick the latest tag.
///
/// Uses semver order only when every tag parses, so a stray non-semver tag
/// never gets ranked against semver ones inconsistently.
pub fn latest<'a, I>(tags: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let tags: Vec<&str> = tags.into_iter().collect();
    if tags.iter().all(|t| parse_tag(t).is_some()) {
        tags.into_iter().max_by(|a, b| compare_tags(a, b))
    } else {
        tags.into_iter().max()
    }
}
