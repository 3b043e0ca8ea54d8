//! Price-index lookup and income deflation.
//!
//! Real income = raw income / index value at the record's period. A record
//! whose income is missing, non-positive (treated as "no income reported"),
//! or whose period has no index entry is excluded from income statistics;
//! every exclusion is counted per cause, and none of them aborts the run.

use std::collections::HashMap;
use std::str::FromStr;

use rustc_hash::FxHashMap;

use crate::error::{PipelineError, Result};
use crate::models::{Period, SurveyRecord};

/// A Period-keyed table of positive price-index values
#[derive(Debug, Clone, Default)]
pub struct PriceIndex {
    values: FxHashMap<Period, f64>,
}

/// Per-cause exclusion counts from one deflation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeflationReport {
    /// Rows that produced a real income
    pub adjusted: usize,
    /// Rows excluded: income missing or non-positive
    pub no_income: usize,
    /// Rows excluded: period missing or absent from the index
    pub missing_index: usize,
}

impl PriceIndex {
    /// Build an index from (period, value) pairs.
    ///
    /// # Errors
    /// `InvalidIndex` when a value is not positive.
    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Period, f64)>,
    {
        let mut values = FxHashMap::default();
        for (period, value) in pairs {
            if !(value > 0.0) {
                return Err(PipelineError::InvalidIndex {
                    period: period.to_string(),
                    value,
                });
            }
            values.insert(period, value);
        }
        Ok(Self { values })
    }

    /// Parse a JSON mapping literal from period labels to index values,
    /// e.g. `{"2020-T1": 100.0, "2020-T2": 104.3}`.
    ///
    /// # Errors
    /// JSON parse failures, unparseable period labels, or non-positive
    /// values.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: HashMap<String, f64> = serde_json::from_str(json)?;
        let pairs = raw
            .into_iter()
            .map(|(label, value)| Ok((Period::from_str(&label)?, value)))
            .collect::<Result<Vec<_>>>()?;
        Self::from_pairs(pairs)
    }

    /// Index value at a period
    #[must_use]
    pub fn get(&self, period: Period) -> Option<f64> {
        self.values.get(&period).copied()
    }

    /// Deflate one raw income at a period. `None` when the income is
    /// missing/non-positive or the period has no index entry.
    #[must_use]
    pub fn real_income(&self, period: Period, raw: Option<f64>) -> Option<f64> {
        let income = raw.filter(|v| *v > 0.0)?;
        Some(income / self.get(period)?)
    }

    /// Deflate a record's income using its own (year, quarter) period.
    #[must_use]
    pub fn real_income_of(&self, record: &SurveyRecord) -> Option<f64> {
        self.real_income(record.period()?, record.income)
    }

    /// Deflate a slice of records, pairing each adjustable record with its
    /// real income and accounting for every exclusion.
    #[must_use]
    pub fn deflate<'a>(
        &self,
        records: &'a [SurveyRecord],
    ) -> (Vec<(&'a SurveyRecord, f64)>, DeflationReport) {
        let mut adjusted = Vec::new();
        let mut report = DeflationReport::default();
        for record in records {
            if record.income.filter(|v| *v > 0.0).is_none() {
                report.no_income += 1;
                continue;
            }
            let indexed = record.period().and_then(|p| self.get(p));
            match (record.income, indexed) {
                (Some(income), Some(index)) => {
                    report.adjusted += 1;
                    adjusted.push((record, income / index));
                }
                _ => report.missing_index += 1,
            }
        }
        if report.missing_index > 0 {
            log::warn!(
                "deflation excluded {} row(s) with no price-index entry",
                report.missing_index
            );
        }
        (adjusted, report)
    }
}
