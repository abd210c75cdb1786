//! Supplier → geography membership, computed once per run
//!
//! Observations are joined against this index by supplier id only. Joining
//! prices against raw postal coverage would repeat each price once per
//! matching postal code and inflate both the statistics and supplier counts.

use super::resolver::ZipResolver;
use crate::models::geography::{GeographyKey, Granularity};
use crate::models::observation::{Supplier, SupplierId};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone)]
pub struct GeographyIndex {
    granularity: Granularity,
    membership: HashMap<SupplierId, BTreeSet<GeographyKey>>,
    geographies: BTreeSet<GeographyKey>,
    unmapped_postal_codes: usize,
}

impl GeographyIndex {
    /// Expand every participating supplier's coverage into deduplicated
    /// geography membership
    pub fn build(resolver: &ZipResolver, suppliers: &[Supplier]) -> Self {
        let mut membership: HashMap<SupplierId, BTreeSet<GeographyKey>> = HashMap::new();
        let mut geographies = BTreeSet::new();
        let mut unmapped = 0;

        for supplier in suppliers.iter().filter(|s| s.participates()) {
            for zip in &supplier.postal_codes_served {
                match resolver.resolve(zip) {
                    Some(key) => {
                        geographies.insert(key.clone());
                        membership.entry(supplier.id).or_default().insert(key);
                    }
                    None => unmapped += 1,
                }
            }
        }

        Self {
            granularity: resolver.granularity(),
            membership,
            geographies,
            unmapped_postal_codes: unmapped,
        }
    }

    /// Narrow the index to a single geography
    pub fn restrict_to(mut self, key: &GeographyKey) -> Self {
        self.geographies.retain(|g| g == key);
        self.membership.retain(|_, keys| {
            keys.retain(|g| g == key);
            !keys.is_empty()
        });
        self
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Distinct geographies covered by at least one active supplier, sorted
    pub fn geographies(&self) -> impl Iterator<Item = &GeographyKey> {
        self.geographies.iter()
    }

    pub fn geography_count(&self) -> usize {
        self.geographies.len()
    }

    pub fn contains(&self, key: &GeographyKey) -> bool {
        self.geographies.contains(key)
    }

    pub fn geographies_for(&self, supplier_id: SupplierId) -> Option<&BTreeSet<GeographyKey>> {
        self.membership.get(&supplier_id)
    }

    pub fn supplier_count(&self) -> usize {
        self.membership.len()
    }

    pub fn unmapped_postal_codes(&self) -> usize {
        self.unmapped_postal_codes
    }
}
