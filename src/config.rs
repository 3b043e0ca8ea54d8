//! Configuration for wave loading and cohort selection.

use rustc_hash::FxHashMap;

use crate::filter::RecordFilter;
use crate::models::KeyColumn;

/// Default batch size when parsing delimited sources
pub const DEFAULT_BATCH_SIZE: usize = 16384;

/// Configuration for loading the sources of one wave
#[derive(Debug, Clone)]
pub struct WaveConfig {
    /// Canonical labels every source must provide (after normalization
    /// and renaming); sources missing any of them are skipped
    pub required: Vec<String>,
    /// Map from normalized raw label to canonical replacement, for waves
    /// whose weight column name differs (e.g. `PONDIIO` -> `PONDERA`)
    pub renames: FxHashMap<String, String>,
    /// Field delimiter of the source files
    pub delimiter: u8,
    /// Row predicates applied as a conjunction while loading
    pub filters: Vec<RecordFilter>,
    /// Rows per parse batch
    pub batch_size: usize,
}

impl Default for WaveConfig {
    fn default() -> Self {
        Self {
            required: Vec::new(),
            renames: FxHashMap::default(),
            delimiter: b';',
            filters: Vec::new(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl WaveConfig {
    /// Config requiring the given canonical columns
    #[must_use]
    pub fn with_required<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required: columns.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Add a rename from a normalized raw label to its canonical form
    #[must_use]
    pub fn rename(mut self, raw: &str, canonical: &str) -> Self {
        self.renames.insert(raw.to_string(), canonical.to_string());
        self
    }

    /// Add a row predicate
    #[must_use]
    pub fn filter(mut self, filter: RecordFilter) -> Self {
        self.filters.push(filter);
        self
    }
}

/// Demographic/geographic scope shared by the indicator drivers.
///
/// Mirrors the parameters the analysis scripts hard-code: a single region,
/// or a set of geographic clusters, and a minimum age.
#[derive(Debug, Clone, Default)]
pub struct CohortSelection {
    /// Restrict to one region code
    pub region: Option<i32>,
    /// Restrict to a set of geographic cluster codes
    pub clusters: Vec<i32>,
    /// Minimum age (inclusive)
    pub min_age: Option<i32>,
}

impl CohortSelection {
    /// Row predicates equivalent to this selection
    #[must_use]
    pub fn filters(&self) -> Vec<RecordFilter> {
        let mut filters = Vec::new();
        if let Some(region) = self.region {
            filters.push(RecordFilter::RegionEq(region));
        }
        if !self.clusters.is_empty() {
            filters.push(RecordFilter::ClusterIn(self.clusters.clone()));
        }
        if let Some(min_age) = self.min_age {
            filters.push(RecordFilter::MinAge(min_age));
        }
        filters
    }

    /// Geographic key columns this selection depends on; the indicator
    /// drivers add their canonical labels to the required set so that a
    /// source unable to support the filter is skipped, not silently kept.
    #[must_use]
    pub fn required_columns(&self) -> Vec<KeyColumn> {
        let mut columns = Vec::new();
        if self.region.is_some() {
            columns.push(KeyColumn::Region);
        }
        if !self.clusters.is_empty() {
            columns.push(KeyColumn::Cluster);
        }
        if self.min_age.is_some() {
            columns.push(KeyColumn::Age);
        }
        columns
    }
}
