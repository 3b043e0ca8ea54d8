//! Sampling-weight-aware grouping into counts, sums, ratios and shares.
//!
//! Grouping is a pure function of the wave table: records are bucketed by
//! an ordered list of key columns and reduced to a count or a weighted sum.
//! Ratios and percentage-of-total shares are derived from paired group-bys
//! through one primitive each, so the zero-denominator policy lives in
//! exactly one place.
//!
//! Policy decisions, applied uniformly:
//! - a row with missing or non-positive weight is not eligible for weighted
//!   aggregation (excluded, never a silent zero contribution);
//! - a row missing any key component is excluded from grouping, and hence
//!   from share denominators;
//! - a zero denominator yields the undefined sentinel (`None`), which is
//!   distinguishable downstream from a true 0 rate.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::error::{PipelineError, Result};
use crate::filter::RecordFilter;
use crate::models::{CohortKey, KeyColumn, SurveyRecord};

/// How rows are reduced within one cohort
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weighting {
    /// Count of rows
    Count,
    /// Sum of the sampling weight; rows with missing or non-positive
    /// weight are excluded
    Weight,
}

/// One group-by result: a grouping key and one numeric cell per cohort.
///
/// Cells live in a `BTreeMap`, so iteration follows the category sort key,
/// never the order source tables were read.
#[derive(Debug, Clone)]
pub struct Aggregation {
    /// The grouping key columns, in order
    pub key: Vec<KeyColumn>,
    /// Aggregate value per cohort
    pub cells: BTreeMap<CohortKey, f64>,
}

impl Aggregation {
    /// Fold another wave's aggregation into this one, summing shared
    /// cohorts. Both sides must share the same grouping key.
    pub fn merge(&mut self, other: Self) {
        debug_assert_eq!(self.key, other.key, "merging aggregations with different keys");
        for (key, value) in other.cells {
            *self.cells.entry(key).or_insert(0.0) += value;
        }
    }

    /// Total across all cohorts
    #[must_use]
    pub fn total(&self) -> f64 {
        self.cells.values().sum()
    }
}

/// Derived measures with an undefined-ratio sentinel per cohort.
/// `None` marks a zero denominator, never a 0% rate.
#[derive(Debug, Clone)]
pub struct RatioTable {
    /// The grouping key columns, in order
    pub key: Vec<KeyColumn>,
    /// Derived measure per cohort
    pub cells: BTreeMap<CohortKey, Option<f64>>,
}

impl RatioTable {
    /// Keep only cohorts whose key passes the predicate
    #[must_use]
    pub fn retain_keys<F: Fn(&CohortKey) -> bool>(mut self, predicate: F) -> Self {
        self.cells.retain(|key, _| predicate(key));
        self
    }
}

/// Group records by `key` and reduce per cohort.
///
/// `filter` restricts the rows entering the aggregation (e.g. a numerator
/// predicate); rows missing any key component are always excluded.
#[must_use]
pub fn aggregate(
    records: &[SurveyRecord],
    key: &[KeyColumn],
    weighting: Weighting,
    filter: Option<&RecordFilter>,
) -> Aggregation {
    let mut cells: BTreeMap<CohortKey, f64> = BTreeMap::new();
    for record in records {
        if let Some(predicate) = filter
            && !predicate.matches(record)
        {
            continue;
        }
        let Some(cohort) = cohort_key(record, key) else {
            continue;
        };
        let contribution = match weighting {
            Weighting::Count => 1.0,
            Weighting::Weight => match record.weight {
                Some(weight) if weight > 0.0 => weight,
                // Missing or non-positive weight: not eligible
                _ => continue,
            },
        };
        *cells.entry(cohort).or_insert(0.0) += contribution;
    }
    Aggregation {
        key: key.to_vec(),
        cells,
    }
}

/// The cohort key of one record, or `None` when any component is missing
#[must_use]
pub fn cohort_key(record: &SurveyRecord, key: &[KeyColumn]) -> Option<CohortKey> {
    key.iter()
        .map(|column| record.key_component(*column))
        .collect()
}

/// Join a numerator aggregation onto a denominator aggregation sharing the
/// same grouping key and derive numerator / denominator per cohort.
///
/// Cohorts present in the denominator but absent from the numerator get a
/// true `0.0` rate; a zero denominator yields the undefined sentinel.
///
/// # Errors
/// `Reshape` when the two sides were grouped by different keys; joining
/// them would silently pair unrelated cohorts.
pub fn ratio(numerator: &Aggregation, denominator: &Aggregation) -> Result<RatioTable> {
    if numerator.key != denominator.key {
        return Err(PipelineError::Reshape(format!(
            "ratio requires matching grouping keys, got {:?} and {:?}",
            numerator.key, denominator.key
        )));
    }
    let cells = denominator
        .cells
        .iter()
        .map(|(cohort, &total)| {
            let part = numerator.cells.get(cohort).copied().unwrap_or(0.0);
            let value = if total == 0.0 { None } else { Some(part / total) };
            (cohort.clone(), value)
        })
        .collect();
    Ok(RatioTable {
        key: denominator.key.clone(),
        cells,
    })
}

/// Percentage-of-total within a key prefix: each cell divided by the sum of
/// cells sharing its first `prefix_len` key components (typically the
/// period columns).
///
/// # Errors
/// `Reshape` when `prefix_len` does not leave at least one category
/// component.
pub fn share_within(aggregation: &Aggregation, prefix_len: usize) -> Result<RatioTable> {
    if prefix_len >= aggregation.key.len() {
        return Err(PipelineError::Reshape(format!(
            "share prefix of {prefix_len} leaves no category component in a {}-column key",
            aggregation.key.len()
        )));
    }
    let mut totals: FxHashMap<CohortKey, f64> = FxHashMap::default();
    for (cohort, value) in &aggregation.cells {
        let prefix: CohortKey = cohort[..prefix_len].iter().cloned().collect();
        *totals.entry(prefix).or_insert(0.0) += value;
    }

    let cells = aggregation
        .cells
        .iter()
        .map(|(cohort, &value)| {
            let prefix: CohortKey = cohort[..prefix_len].iter().cloned().collect();
            let total = totals.get(&prefix).copied().unwrap_or(0.0);
            let share = if total == 0.0 { None } else { Some(value / total) };
            (cohort.clone(), share)
        })
        .collect();
    Ok(RatioTable {
        key: aggregation.key.clone(),
        cells,
    })
}

/// Mean of a derived per-row value per cohort (e.g. real income by age).
/// Rows where the value is undefined do not enter the mean.
#[must_use]
pub fn mean_of<F>(records: &[SurveyRecord], key: &[KeyColumn], value: F) -> RatioTable
where
    F: Fn(&SurveyRecord) -> Option<f64>,
{
    let mut sums: BTreeMap<CohortKey, (f64, usize)> = BTreeMap::new();
    for record in records {
        let Some(cohort) = cohort_key(record, key) else {
            continue;
        };
        let Some(v) = value(record) else {
            continue;
        };
        let entry = sums.entry(cohort).or_insert((0.0, 0));
        entry.0 += v;
        entry.1 += 1;
    }
    let cells = sums
        .into_iter()
        .map(|(cohort, (sum, count))| (cohort, Some(sum / count as f64)))
        .collect();
    RatioTable {
        key: key.to_vec(),
        cells,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::KeyValue;
    use smallvec::smallvec;

    fn record(year: i32, status: i32, weight: Option<f64>) -> SurveyRecord {
        SurveyRecord {
            year: Some(year),
            activity_status: Some(status),
            weight,
            ..SurveyRecord::default()
        }
    }

    const KEY: [KeyColumn; 1] = [KeyColumn::Year];

    #[test]
    fn test_count_aggregation() {
        let records = vec![record(2021, 1, None), record(2021, 2, None), record(2022, 1, None)];
        let agg = aggregate(&records, &KEY, Weighting::Count, None);
        let k2021: CohortKey = smallvec![KeyValue::Int(2021)];
        let k2022: CohortKey = smallvec![KeyValue::Int(2022)];
        assert_eq!(agg.cells[&k2021], 2.0);
        assert_eq!(agg.cells[&k2022], 1.0);
    }

    #[test]
    fn test_nonpositive_weight_never_contributes() {
        let base = vec![record(2021, 1, Some(10.0)), record(2021, 1, Some(5.0))];
        let agg_base = aggregate(&base, &KEY, Weighting::Weight, None);

        let mut padded = base.clone();
        padded.push(record(2021, 1, Some(0.0)));
        padded.push(record(2021, 1, Some(-3.0)));
        padded.push(record(2021, 1, None));
        let agg_padded = aggregate(&padded, &KEY, Weighting::Weight, None);

        assert_eq!(agg_base.cells, agg_padded.cells);
        assert_eq!(agg_base.total(), 15.0);
    }

    #[test]
    fn test_missing_key_component_is_excluded() {
        let mut no_year = record(2021, 1, None);
        no_year.year = None;
        let records = vec![record(2021, 1, None), no_year];
        let agg = aggregate(&records, &KEY, Weighting::Count, None);
        assert_eq!(agg.total(), 1.0);
    }

    #[test]
    fn test_ratio_with_zero_and_missing_numerator() {
        let records = vec![
            record(2021, 1, Some(30.0)),
            record(2021, 2, Some(5.0)),
            record(2022, 2, Some(4.0)),
        ];
        let employed = aggregate(
            &records,
            &KEY,
            Weighting::Weight,
            Some(&RecordFilter::employed()),
        );
        let total = aggregate(&records, &KEY, Weighting::Weight, None);
        let rates = ratio(&employed, &total).unwrap();

        let k2021: CohortKey = smallvec![KeyValue::Int(2021)];
        let k2022: CohortKey = smallvec![KeyValue::Int(2022)];
        assert!((rates.cells[&k2021].unwrap() - 30.0 / 35.0).abs() < 1e-12);
        // No employed rows in 2022: a true 0% rate, not undefined
        assert_eq!(rates.cells[&k2022], Some(0.0));
    }

    #[test]
    fn test_ratio_matches_direct_formulation() {
        // Computing numerator and denominator independently and joining
        // must equal the rate computed per cohort by hand.
        let records = vec![
            record(2021, 1, Some(10.0)),
            record(2021, 1, Some(10.0)),
            record(2021, 2, Some(5.0)),
            record(2022, 1, Some(8.0)),
            record(2022, 2, Some(4.0)),
        ];
        let employed = aggregate(
            &records,
            &KEY,
            Weighting::Weight,
            Some(&RecordFilter::employed()),
        );
        let total = aggregate(&records, &KEY, Weighting::Weight, None);
        let joined = ratio(&employed, &total).unwrap();

        for (cohort, value) in &joined.cells {
            let direct = employed.cells.get(cohort).copied().unwrap_or(0.0)
                / total.cells[cohort];
            assert!((value.unwrap() - direct).abs() < 1e-12);
        }
    }

    #[test]
    fn test_share_within_sums_to_one() {
        let key = [KeyColumn::Year, KeyColumn::EducationLevel];
        let mut records = Vec::new();
        for (year, level, n) in [(2021, 1, 3), (2021, 2, 5), (2022, 4, 2)] {
            for _ in 0..n {
                records.push(SurveyRecord {
                    year: Some(year),
                    education_level: Some(level),
                    ..SurveyRecord::default()
                });
            }
        }
        let agg = aggregate(&records, &key, Weighting::Count, None);
        let shares = share_within(&agg, 1).unwrap();

        let mut by_year: FxHashMap<i64, f64> = FxHashMap::default();
        for (cohort, share) in &shares.cells {
            let KeyValue::Int(year) = cohort[0] else { panic!() };
            *by_year.entry(year).or_insert(0.0) += share.unwrap();
        }
        for total in by_year.values() {
            assert!((total - 1.0).abs() < 1e-12);
        }
        let k: CohortKey = smallvec![KeyValue::Int(2021), KeyValue::Int(2)];
        assert!((shares.cells[&k].unwrap() - 5.0 / 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_ratio_rejects_mismatched_keys() {
        let records = vec![record(2021, 1, Some(10.0))];
        let by_year = aggregate(&records, &KEY, Weighting::Count, None);
        let by_year_status = aggregate(
            &records,
            &[KeyColumn::Year, KeyColumn::ActivityStatus],
            Weighting::Count,
            None,
        );
        let err = ratio(&by_year_status, &by_year).unwrap_err();
        assert!(matches!(err, PipelineError::Reshape(_)));
    }

    #[test]
    fn test_share_within_rejects_prefix_without_category() {
        let records = vec![record(2021, 1, Some(10.0))];
        let agg = aggregate(&records, &KEY, Weighting::Count, None);
        let err = share_within(&agg, 1).unwrap_err();
        assert!(matches!(err, PipelineError::Reshape(_)));
    }

    #[test]
    fn test_cells_iterate_in_category_order() {
        let key = [KeyColumn::Year, KeyColumn::EducationLevel];
        // Inserted out of order on purpose
        let records: Vec<SurveyRecord> = [4, 1, 3, 2]
            .iter()
            .map(|&level| SurveyRecord {
                year: Some(2021),
                education_level: Some(level),
                ..SurveyRecord::default()
            })
            .collect();
        let agg = aggregate(&records, &key, Weighting::Count, None);
        let levels: Vec<i64> = agg
            .cells
            .keys()
            .map(|cohort| match cohort[1] {
                KeyValue::Int(level) => level,
                KeyValue::Str(_) => panic!(),
            })
            .collect();
        assert_eq!(levels, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_mean_of_skips_undefined_values() {
        let key = [KeyColumn::Year];
        let records = vec![
            SurveyRecord { year: Some(2021), income: Some(100.0), ..SurveyRecord::default() },
            SurveyRecord { year: Some(2021), income: Some(300.0), ..SurveyRecord::default() },
            SurveyRecord { year: Some(2021), income: None, ..SurveyRecord::default() },
        ];
        let means = mean_of(&records, &key, |r| r.income);
        let k: CohortKey = smallvec![KeyValue::Int(2021)];
        assert_eq!(means.cells[&k], Some(200.0));
    }
}
