//! Postal code → geography unit resolution

use crate::models::geography::{is_state_code, GeographyKey, Granularity};
use crate::models::observation::CountyReference;
use std::collections::HashMap;
use tracing::warn;

/// Normalize a postal code to its 5-digit form. ZIP+4 suffixes are dropped;
/// anything without five leading ASCII digits is rejected.
pub fn normalize_postal_code(raw: &str) -> Option<&str> {
    let raw = raw.trim();
    let five = raw.get(..5)?;
    if !five.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match raw.as_bytes().get(5) {
        None | Some(b'-') => Some(five),
        Some(_) => None,
    }
}

/// Static postal-code → county lookup built from the reference table
#[derive(Debug, Clone, Default)]
pub struct CountyTable {
    counties: HashMap<String, GeographyKey>,
    malformed: usize,
}

impl CountyTable {
    pub fn from_rows(rows: &[CountyReference]) -> Self {
        let mut table = Self::default();
        for row in rows {
            let Some(zip) = normalize_postal_code(&row.postal_code) else {
                table.malformed += 1;
                continue;
            };
            let name = row.county_name.as_deref().map(str::trim).unwrap_or("");
            let state = row
                .state_code
                .as_deref()
                .map(|s| s.trim().to_ascii_uppercase())
                .unwrap_or_default();
            if name.is_empty() || !is_state_code(&state) {
                table.malformed += 1;
                continue;
            }
            table
                .counties
                .insert(zip.to_string(), GeographyKey::county(name, state));
        }

        if table.malformed > 0 {
            warn!(
                malformed = table.malformed,
                "CountyTable: ignored {} malformed reference rows",
                table.malformed
            );
        }
        table
    }

    pub fn county_for(&self, postal_code: &str) -> Option<&GeographyKey> {
        self.counties.get(postal_code)
    }

    pub fn len(&self) -> usize {
        self.counties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counties.is_empty()
    }

    pub fn malformed_rows(&self) -> usize {
        self.malformed
    }
}

/// Maps a postal code to the geography unit of one granularity
#[derive(Debug, Clone)]
pub enum ZipResolver {
    ZipPrefix,
    County(CountyTable),
}

impl ZipResolver {
    pub fn new(granularity: Granularity, counties: CountyTable) -> Self {
        match granularity {
            Granularity::ZipPrefix => ZipResolver::ZipPrefix,
            Granularity::County => ZipResolver::County(counties),
        }
    }

    pub fn granularity(&self) -> Granularity {
        match self {
            ZipResolver::ZipPrefix => Granularity::ZipPrefix,
            ZipResolver::County(_) => Granularity::County,
        }
    }

    pub fn resolve(&self, postal_code: &str) -> Option<GeographyKey> {
        let zip = normalize_postal_code(postal_code)?;
        match self {
            ZipResolver::ZipPrefix => Some(GeographyKey::zip_prefix(&zip[..3])),
            ZipResolver::County(table) => table.county_for(zip).cloned(),
        }
    }
}
