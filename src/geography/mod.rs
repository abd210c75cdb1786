//! Supplier coverage → geography expansion

pub mod index;
pub mod resolver;

pub use index::GeographyIndex;
pub use resolver::{normalize_postal_code, CountyTable, ZipResolver};
