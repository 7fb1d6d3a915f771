//! Pfafstetter basin codes.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Deepest HydroBASINS level.
pub const MAX_LEVEL: usize = 12;

/// A Pfafstetter code: leading digits name the coarser containing basins.
///
/// Serialized as an integer, the way HydroBASINS stores `PFAF_ID`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PfafCode(String);

impl PfafCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of digits, i.e. the basin level the code belongs to.
    pub fn level(&self) -> usize {
        self.0.len()
    }

    /// Code of the containing basin at `level` (its leading digits).
    pub fn truncate(&self, level: usize) -> Result<PfafCode, Error> {
        if level == 0 || level > self.level() {
            return Err(Error::InvalidPfaf(format!(
                "cannot take level {} of {}-digit code {}",
                level,
                self.level(),
                self.0
            )));
        }
        Ok(PfafCode(self.0[..level].to_string()))
    }

    pub fn to_u64(&self) -> u64 {
        // Digit-only and at most MAX_LEVEL long, so it always fits.
        self.0.parse().unwrap_or_default()
    }
}

impl FromStr for PfafCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.len() > MAX_LEVEL || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidPfaf(s.to_string()));
        }
        Ok(PfafCode(s.to_string()))
    }
}

impl TryFrom<u64> for PfafCode {
    type Error = Error;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        value.to_string().parse()
    }
}

impl fmt::Display for PfafCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for PfafCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.to_u64())
    }
}

impl<'de> Deserialize<'de> for PfafCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(u64),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Int(v) => PfafCode::try_from(v).map_err(serde::de::Error::custom),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}
