//! Quality score constants, tuned per granularity

use super::env_parse;
use crate::models::geography::Granularity;
use serde::{Deserialize, Serialize};

/// Relative weight of each quality signal. Must sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityWeights {
    pub supplier: f64,
    pub density: f64,
    pub history: f64,
    pub recency: f64,
}

impl QualityWeights {
    pub fn sum(&self) -> f64 {
        self.supplier + self.density + self.history + self.recency
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityConfig {
    pub target_suppliers: f64,
    pub target_observations: f64,
    pub target_weeks: f64,
    pub weights: QualityWeights,
}

impl QualityConfig {
    pub fn zip_prefix() -> Self {
        Self {
            target_suppliers: 5.0,
            target_observations: 20.0,
            target_weeks: 8.0,
            weights: QualityWeights {
                supplier: 0.35,
                density: 0.25,
                history: 0.25,
                recency: 0.15,
            },
        }
    }

    /// Counties are served more sparsely, so fewer suppliers count as full
    /// coverage and history carries more of the score than raw density.
    pub fn county() -> Self {
        Self {
            target_suppliers: 3.0,
            target_observations: 20.0,
            target_weeks: 8.0,
            weights: QualityWeights {
                supplier: 0.30,
                density: 0.15,
                history: 0.40,
                recency: 0.15,
            },
        }
    }

    pub fn for_granularity(granularity: Granularity) -> Self {
        match granularity {
            Granularity::ZipPrefix => Self::zip_prefix(),
            Granularity::County => Self::county(),
        }
    }

    /// Apply `<PREFIX>_QUALITY_*` overrides on top of the granularity defaults
    pub fn from_lookup<F>(granularity: Granularity, lookup: &F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = Self::for_granularity(granularity);
        let prefix = env_prefix(granularity);
        let key = |name: &str| format!("{}_QUALITY_{}", prefix, name);

        let config = Self {
            target_suppliers: env_parse(lookup, &key("TARGET_SUPPLIERS"), base.target_suppliers)?,
            target_observations: env_parse(
                lookup,
                &key("TARGET_OBSERVATIONS"),
                base.target_observations,
            )?,
            target_weeks: env_parse(lookup, &key("TARGET_WEEKS"), base.target_weeks)?,
            weights: QualityWeights {
                supplier: env_parse(lookup, &key("WEIGHT_SUPPLIER"), base.weights.supplier)?,
                density: env_parse(lookup, &key("WEIGHT_DENSITY"), base.weights.density)?,
                history: env_parse(lookup, &key("WEIGHT_HISTORY"), base.weights.history)?,
                recency: env_parse(lookup, &key("WEIGHT_RECENCY"), base.weights.recency)?,
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        for (name, target) in [
            ("target_suppliers", self.target_suppliers),
            ("target_observations", self.target_observations),
            ("target_weeks", self.target_weeks),
        ] {
            if !(target.is_finite() && target > 0.0) {
                return Err(format!("{} must be positive, got {}", name, target));
            }
        }

        let w = &self.weights;
        if [w.supplier, w.density, w.history, w.recency]
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0)
        {
            return Err("quality weights must be non-negative".to_string());
        }
        if (w.sum() - 1.0).abs() > 1e-3 {
            return Err(format!("quality weights must sum to 1, got {:.3}", w.sum()));
        }
        Ok(())
    }
}

fn env_prefix(granularity: Granularity) -> &'static str {
    match granularity {
        Granularity::ZipPrefix => "ZIP3",
        Granularity::County => "COUNTY",
    }
}
