//! # Semantic Versions
//!
//! [`SemVer`] is a strict `MAJOR.MINOR.PATCH` triple. Pre-release and build
//! suffixes are rejected: pack versions and schema compatibility
//! declarations are plain release triples.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::VersionError;

/// A three-component semantic version.
///
/// Ordering is numeric per component, so `1.10.0 > 1.9.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SemVer {
    /// Incompatible schema or API changes.
    pub major: u64,
    /// Backwards-compatible additions.
    pub minor: u64,
    /// Backwards-compatible fixes.
    pub patch: u64,
}

impl SemVer {
    /// Construct a version from its components.
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a strict `MAJOR.MINOR.PATCH` string.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(VersionError::Empty);
        }

        let parts: Vec<&str> = trimmed.split('.').collect();
        if parts.len() != 3 {
            return Err(VersionError::ComponentCount {
                input: input.to_string(),
                found: parts.len(),
            });
        }

        let mut numbers = [0u64; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(VersionError::NonNumeric {
                    input: input.to_string(),
                    component: (*part).to_string(),
                });
            }
            if part.len() > 1 && part.starts_with('0') {
                return Err(VersionError::LeadingZero {
                    input: input.to_string(),
                    component: (*part).to_string(),
                });
            }
            *slot = part.parse().map_err(|_| VersionError::NonNumeric {
                input: input.to_string(),
                component: (*part).to_string(),
            })?;
        }

        Ok(Self::new(numbers[0], numbers[1], numbers[2]))
    }

    /// Parse a compatibility requirement.
    ///
    /// Accepts the plain triple or the triple prefixed with `>=`, the two
    /// spellings used for "minimum schema version".
    pub fn parse_requirement(input: &str) -> Result<Self, VersionError> {
        let trimmed = input.trim();
        let bare = trimmed.strip_prefix(">=").unwrap_or(trimmed);
        Self::parse(bare)
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for SemVer {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for SemVer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SemVer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
