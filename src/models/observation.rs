//! Read-only inputs owned by external collaborators

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type SupplierId = i64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supplier {
    pub id: SupplierId,
    pub active: bool,
    pub postal_codes_served: Vec<String>,
}

impl Supplier {
    pub fn new(id: SupplierId, postal_codes: &[&str]) -> Self {
        Self {
            id,
            active: true,
            postal_codes_served: postal_codes.iter().map(|z| z.to_string()).collect(),
        }
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Only active suppliers with some coverage participate in aggregation
    pub fn participates(&self) -> bool {
        self.active && !self.postal_codes_served.is_empty()
    }
}

/// One scraped price point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceObservation {
    pub supplier_id: SupplierId,
    pub price_per_gallon: f64,
    pub fuel_type: String,
    pub observed_at: DateTime<Utc>,
    pub is_valid: bool,
}

impl PriceObservation {
    pub fn new(
        supplier_id: SupplierId,
        fuel_type: &str,
        price_per_gallon: f64,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            supplier_id,
            price_per_gallon,
            fuel_type: fuel_type.to_string(),
            observed_at,
            is_valid: true,
        }
    }

    pub fn invalid(mut self) -> Self {
        self.is_valid = false;
        self
    }
}

/// Row of the static postal-code to county table. Name and state are
/// nullable upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountyReference {
    pub postal_code: String,
    pub county_name: Option<String>,
    pub state_code: Option<String>,
}

impl CountyReference {
    pub fn new(postal_code: &str, county_name: &str, state_code: &str) -> Self {
        Self {
            postal_code: postal_code.to_string(),
            county_name: Some(county_name.to_string()),
            state_code: Some(state_code.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserLocation {
    pub user_id: i64,
    pub postal_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub id: i64,
    pub postal_code: String,
    pub validated: bool,
}
