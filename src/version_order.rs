//! Semantic version ordering for version strings stored in the registry.
//!
//! Strings that do not parse as semver sort below every valid version so that
//! sorting stays total; ties between invalid strings fall back to lexical order.

use crate::error::{RegistryError, Result};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Parses a version string, rejecting anything that is not semver written in
/// its canonical form. Stored version strings are compared as text, so two
/// spellings of one version must not both be accepted.
pub fn parse(version: &str) -> Result<semver::Version> {
    let parsed = semver::Version::parse(version)
        .map_err(|e| RegistryError::Validation(format!("invalid version '{version}': {e}")))?;

    if parsed.to_string() != version {
        return Err(RegistryError::Validation(format!(
            "version '{version}' is not written canonically, expected '{parsed}'"
        )));
    }
    Ok(parsed)
}

/// Compares two version strings in ascending semver order.
pub fn compare(a: &str, b: &str) -> Ordering {
    match (semver::Version::parse(a), semver::Version::parse(b)) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        (Ok(_), Err(_)) => Ordering::Greater,
        (Err(_), Ok(_)) => Ordering::Less,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Returns a comparator for the given direction.
pub fn sorter(direction: Direction) -> impl Fn(&str, &str) -> Ordering {
    move |a: &str, b: &str| match direction {
        Direction::Ascending => compare(a, b),
        Direction::Descending => compare(b, a),
    }
}

/// Sorts version strings in place.
pub fn sort<S: AsRef<str>>(versions: &mut [S], direction: Direction) {
    let cmp = sorter(direction);
    versions.sort_by(|a, b| cmp(a.as_ref(), b.as_ref()));
}

/// Returns the highest version string, if any.
pub fn max<'a, I>(versions: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    versions.into_iter().max_by(|a, b| compare(a, b))
}
