//! Weekly order statistics over the trailing window

use super::math;
use crate::config::PipelineConfig;
use crate::geography::GeographyIndex;
use crate::models::geography::{GeographyKey, Granularity};
use crate::models::observation::{PriceObservation, SupplierId};
use crate::models::stats::WeeklyStat;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::ops::Range;
use tracing::debug;

/// Monday on or before the observation's UTC date
pub fn week_start(at: DateTime<Utc>) -> NaiveDate {
    let date = at.date_naive();
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

#[derive(Default)]
struct WeekBucket {
    prices: Vec<f64>,
    suppliers: HashSet<SupplierId>,
    last_observed_at: Option<DateTime<Utc>>,
}

impl WeekBucket {
    fn push(&mut self, obs: &PriceObservation) {
        self.prices.push(obs.price_per_gallon);
        self.suppliers.insert(obs.supplier_id);
        if self.last_observed_at.map_or(true, |t| obs.observed_at > t) {
            self.last_observed_at = Some(obs.observed_at);
        }
    }
}

type BucketKey = (GeographyKey, String, NaiveDate);

pub struct WeeklyAggregator {
    granularity: Granularity,
    window_weeks: u32,
}

impl WeeklyAggregator {
    pub fn new(granularity: Granularity, window_weeks: u32) -> Self {
        Self {
            granularity,
            window_weeks: window_weeks.max(1),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.granularity, config.window_weeks)
    }

    /// Start of the oldest whole week in the window. The current (partial)
    /// week counts as one of the `window_weeks`.
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let first = week_start(now) - Duration::weeks(self.window_weeks as i64 - 1);
        DateTime::from_naive_utc_and_offset(first.and_time(NaiveTime::MIN), Utc)
    }

    /// Observation range of a pass as of `now`: from the window start up to,
    /// but excluding, `now`
    pub fn window(&self, now: DateTime<Utc>) -> Range<DateTime<Utc>> {
        self.window_start(now)..now
    }

    /// Group observations by geography, fuel type and week and compute the
    /// order statistics of each group.
    ///
    /// Each observation lands once in every geography its supplier is a
    /// member of, however many postal codes connect the two.
    pub fn aggregate(
        &self,
        observations: &[PriceObservation],
        index: &GeographyIndex,
        window: &Range<DateTime<Utc>>,
    ) -> Vec<WeeklyStat> {
        let mut buckets: BTreeMap<BucketKey, WeekBucket> = BTreeMap::new();
        let mut ignored = 0usize;
        let mut unmatched = 0usize;

        for obs in observations {
            let fuel_type = obs.fuel_type.trim().to_ascii_lowercase();
            if !obs.is_valid
                || !window.contains(&obs.observed_at)
                || !obs.price_per_gallon.is_finite()
                || obs.price_per_gallon <= 0.0
                || fuel_type.is_empty()
            {
                ignored += 1;
                continue;
            }

            let Some(geographies) = index.geographies_for(obs.supplier_id) else {
                unmatched += 1;
                continue;
            };

            let week = week_start(obs.observed_at);
            for geography in geographies {
                buckets
                    .entry((geography.clone(), fuel_type.clone(), week))
                    .or_default()
                    .push(obs);
            }
        }

        let stats: Vec<WeeklyStat> = buckets
            .into_iter()
            .filter_map(|(key, bucket)| self.finish(key, bucket))
            .collect();

        debug!(
            granularity = %self.granularity,
            observations = observations.len(),
            ignored = ignored,
            unmatched = unmatched,
            rows = stats.len(),
            "WeeklyAggregator: built {} weekly rows from {} observations",
            stats.len(),
            observations.len()
        );

        stats
    }

    fn finish(&self, key: BucketKey, mut bucket: WeekBucket) -> Option<WeeklyStat> {
        let (geography, fuel_type, week_start) = key;
        bucket.prices.sort_by(f64::total_cmp);

        let median_price = math::median(&bucket.prices)?;
        let min_price = *bucket.prices.first()?;
        let max_price = *bucket.prices.last()?;
        let avg_price = match self.granularity {
            Granularity::County => math::mean(&bucket.prices),
            Granularity::ZipPrefix => None,
        };

        Some(WeeklyStat {
            geography,
            fuel_type,
            week_start,
            median_price,
            min_price,
            max_price,
            avg_price,
            supplier_count: bucket.suppliers.len() as i64,
            observation_count: bucket.prices.len() as i64,
            last_observed_at: bucket.last_observed_at?,
        })
    }
}
