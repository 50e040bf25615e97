//! Mod version comparison
//!
//! Versions are dotted numeric strings (`1`, `1.2`, `1.2.3`) with an optional
//! `aN`/`bN` pre-release tag (`1.0a1`, `2.1b3`). Missing components count as
//! zero and a pre-release sorts before its release.

use crate::errors::ModError;
use semver::{Prerelease, Version};

/// Parse a mod version string into a comparable [`Version`]
pub fn parse_version(raw: &str) -> Result<Version, ModError> {
    let invalid = || ModError::InvalidVersion(raw.to_string());
    let trimmed = raw.trim();

    let (numbers, tag) = match trimmed.find(|c: char| c == 'a' || c == 'b') {
        Some(idx) => (&trimmed[..idx], Some(&trimmed[idx..])),
        None => (trimmed, None),
    };

    let parts = numbers
        .split('.')
        .map(|part| part.parse::<u64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| invalid())?;
    if parts.is_empty() || parts.len() > 3 {
        return Err(invalid());
    }

    let mut version = Version::new(
        parts[0],
        parts.get(1).copied().unwrap_or(0),
        parts.get(2).copied().unwrap_or(0),
    );

    if let Some(tag) = tag {
        let (kind, number) = tag.split_at(1);
        let number: u64 = number.parse().map_err(|_| invalid())?;
        version.pre = Prerelease::new(&format!("{}.{}", kind, number)).map_err(|_| invalid())?;
    }

    Ok(version)
}

/// Whether an installed version satisfies a minimum version
///
/// `None` on either side means any version satisfies.
pub fn satisfies(installed: Option<&str>, minimum: Option<&str>) -> Result<bool, ModError> {
    match (installed, minimum) {
        (Some(installed), Some(minimum)) => {
            Ok(parse_version(installed)? >= parse_version(minimum)?)
        }
        _ => Ok(true),
    }
}
