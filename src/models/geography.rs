//! Geography units used as aggregation keys

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Aggregation granularity of a pipeline instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    #[serde(rename = "zip3")]
    ZipPrefix,
    County,
}

impl Granularity {
    pub const ALL: [Granularity; 2] = [Granularity::ZipPrefix, Granularity::County];

    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::ZipPrefix => "zip3",
            Granularity::County => "county",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zip3" | "zip_prefix" | "prefix" => Ok(Granularity::ZipPrefix),
            "county" => Ok(Granularity::County),
            other => Err(format!("unknown granularity '{}'", other)),
        }
    }
}

/// A single geography unit: a 3-digit postal prefix or a county
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeographyKey {
    ZipPrefix { prefix: String },
    County { name: String, state: String },
}

impl GeographyKey {
    pub fn zip_prefix(prefix: impl Into<String>) -> Self {
        GeographyKey::ZipPrefix {
            prefix: prefix.into(),
        }
    }

    pub fn county(name: impl Into<String>, state: impl Into<String>) -> Self {
        GeographyKey::County {
            name: name.into(),
            state: state.into(),
        }
    }

    pub fn granularity(&self) -> Granularity {
        match self {
            GeographyKey::ZipPrefix { .. } => Granularity::ZipPrefix,
            GeographyKey::County { .. } => Granularity::County,
        }
    }

    /// Parse a user-supplied key: `"021"` for prefixes, `"Middlesex, MA"` for counties
    pub fn parse(granularity: Granularity, raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        match granularity {
            Granularity::ZipPrefix => {
                if raw.len() == 3 && raw.bytes().all(|b| b.is_ascii_digit()) {
                    Ok(Self::zip_prefix(raw))
                } else {
                    Err(format!("'{}' is not a 3-digit zip prefix", raw))
                }
            }
            Granularity::County => {
                let (name, state) = raw
                    .rsplit_once(',')
                    .ok_or_else(|| format!("'{}' is not in 'County, ST' form", raw))?;
                let name = name.trim();
                let state = state.trim().to_ascii_uppercase();
                if name.is_empty() || !is_state_code(&state) {
                    return Err(format!("'{}' is not in 'County, ST' form", raw));
                }
                Ok(Self::county(name, state))
            }
        }
    }
}

impl fmt::Display for GeographyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeographyKey::ZipPrefix { prefix } => f.write_str(prefix),
            GeographyKey::County { name, state } => write!(f, "{}, {}", name, state),
        }
    }
}

pub(crate) fn is_state_code(s: &str) -> bool {
    s.len() == 2 && s.bytes().all(|b| b.is_ascii_alphabetic())
}
