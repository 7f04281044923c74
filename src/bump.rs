use crate::error::{BumpError, Result};
use log::debug;
use semver::Version;

/// Parses a strict `MAJOR.MINOR.PATCH` string. Pre-release and build
/// metadata are rejected; leading zeros are accepted and dropped.
pub fn parse_triple(version: &str) -> Result<Version> {
    let malformed = || BumpError::MalformedVersion { version: version.to_string() };

    let parts: Vec<&str> = version.split('.').collect();
    if parts.len() != 3 {
        return Err(malformed());
    }

    let mut numbers = [0u64; 3];
    for (slot, part) in numbers.iter_mut().zip(&parts) {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        *slot = part.parse().map_err(|_| malformed())?;
    }

    Ok(Version::new(numbers[0], numbers[1], numbers[2]))
}

/// Returns the next patch version in canonical `N.N.N` form.
pub fn bump(version: &str) -> Result<String> {
    let current = parse_triple(version)?;
    let patch = current
        .patch
        .checked_add(1)
        .ok_or_else(|| BumpError::MalformedVersion { version: version.to_string() })?;
    let next = Version::new(current.major, current.minor, patch);
    debug!("Incrementing version from {} -> {}", version, next);
    Ok(next.to_string())
}
