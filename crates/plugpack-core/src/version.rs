use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use anyhow::{bail, Result};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const MAX_SEGMENTS: usize = 4;
const SEGMENT_LIMIT: u64 = 10_000;

/// A package version with a numeric total ordering.
///
/// The textual name is scanned left to right and every maximal run of
/// digits becomes one ordering component; separators and suffix text are
/// ignored ("1.2pre3" has the components [1, 2, 3]). Up to four components
/// of at most four decimal digits each are packed into a single u64 key,
/// so "5.05" and "5.5" compare equal while "5.05" < "5.50".
#[derive(Debug, Clone, Default)]
pub struct VersionName {
    name: String,
    code: u64,
    stable: bool,
}

impl VersionName {
    pub fn parse(name: &str) -> Result<Self> {
        let mut segments: Vec<u64> = Vec::with_capacity(MAX_SEGMENTS);
        let mut current: Option<u64> = None;
        let mut has_letter = false;

        for ch in name.chars() {
            if let Some(digit) = ch.to_digit(10) {
                if current.is_none() && segments.len() == MAX_SEGMENTS {
                    bail!("invalid version name");
                }
                let value = current.unwrap_or(0) * 10 + u64::from(digit);
                if value >= SEGMENT_LIMIT {
                    bail!("version component overflow");
                }
                current = Some(value);
            } else {
                if ch.is_ascii_alphabetic() {
                    has_letter = true;
                }
                if let Some(value) = current.take() {
                    segments.push(value);
                }
            }
        }
        if let Some(value) = current {
            segments.push(value);
        }

        if segments.is_empty() {
            bail!("invalid version name");
        }

        let mut code = 0u64;
        for i in 0..MAX_SEGMENTS {
            code *= SEGMENT_LIMIT;
            code += segments.get(i).copied().unwrap_or(0);
        }

        Ok(Self {
            name: name.to_string(),
            code,
            stable: !has_letter,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The packed ordering key.
    pub fn code(&self) -> u64 {
        self.code
    }

    /// A version number is stable unless its name carries suffix text
    /// ("1.2pre3", "1.0rc1"). The default (empty) version is stable.
    pub fn is_stable(&self) -> bool {
        self.stable || self.name.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

impl fmt::Display for VersionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

// Two versions are the same version iff their packed keys are equal,
// regardless of textual spelling.
impl PartialEq for VersionName {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Eq for VersionName {}

impl PartialOrd for VersionName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.code.cmp(&other.code)
    }
}

impl Hash for VersionName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.code.hash(state);
    }
}

impl Serialize for VersionName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name)
    }
}

impl<'de> Deserialize<'de> for VersionName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw.is_empty() {
            return Ok(Self::default());
        }
        Self::parse(&raw).map_err(D::Error::custom)
    }
}
