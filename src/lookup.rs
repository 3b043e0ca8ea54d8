//! Classification lookup tables (code -> human-readable label).
//!
//! Activity/occupation codes arrive in wildly inconsistent spellings:
//! left-zero-padded text in one wave, bare integers in another, floats
//! (`"401.0"`) in a third. Codes are normalized to a fixed zero-padded
//! width before any comparison. Duplicate normalized codes are a data error
//! in the lookup table and abort enrichment; silently picking one match
//! would corrupt results.

use std::collections::BTreeSet;
use std::io::Read;

use rustc_hash::FxHashMap;

use crate::aggregate::RatioTable;
use crate::config::WaveConfig;
use crate::error::{PipelineError, Result};
use crate::models::{CohortKey, KeyColumn, KeyValue};

/// A code -> label classification table with unique normalized codes
#[derive(Debug, Clone)]
pub struct LookupTable {
    width: usize,
    labels: FxHashMap<String, String>,
}

/// Result of enriching a long table with labels
#[derive(Debug)]
pub struct EnrichedTable {
    /// The grouping key columns of the enriched table
    pub key: Vec<KeyColumn>,
    /// One row per input cohort, in input order; never fewer, never more
    pub rows: Vec<EnrichedRow>,
    /// Normalized codes that had no label (set of codes, not rows)
    pub unmatched: BTreeSet<String>,
}

/// One enriched cohort row
#[derive(Debug, Clone)]
pub struct EnrichedRow {
    /// The cohort key, unchanged
    pub cohort: CohortKey,
    /// The label for the cohort's code component, when matched
    pub label: Option<String>,
    /// The cohort's measure, unchanged
    pub value: Option<f64>,
}

impl LookupTable {
    /// Empty table for codes of the given fixed width
    #[must_use]
    pub fn new(width: usize) -> Self {
        Self {
            width,
            labels: FxHashMap::default(),
        }
    }

    /// Normalize one raw code: trim, strip a trailing `.0` (waves sometimes
    /// encode integer codes as floats), left-pad with zeros to `width`.
    #[must_use]
    pub fn normalize_code(raw: &str, width: usize) -> String {
        let trimmed = raw.trim();
        let bare = trimmed.strip_suffix(".0").unwrap_or(trimmed);
        if bare.len() >= width {
            bare.to_string()
        } else {
            format!("{bare:0>width$}")
        }
    }

    /// Insert one code/label pair.
    ///
    /// # Errors
    /// `AmbiguousLookup` when the normalized code is already present.
    pub fn insert(&mut self, code: &str, label: &str) -> Result<()> {
        let normalized = Self::normalize_code(code, self.width);
        if self
            .labels
            .insert(normalized.clone(), label.to_string())
            .is_some()
        {
            return Err(PipelineError::AmbiguousLookup { code: normalized });
        }
        Ok(())
    }

    /// Build a table from code/label pairs.
    pub fn from_pairs<'a, I>(pairs: I, width: usize) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut table = Self::new(width);
        for (code, label) in pairs {
            table.insert(code, label)?;
        }
        Ok(table)
    }

    /// Read a delimited code/label file. The code column is read as text to
    /// preserve leading zeros.
    pub fn from_reader<R: Read>(
        mut reader: R,
        delimiter: u8,
        width: usize,
        code_column: usize,
        label_column: usize,
    ) -> Result<Self> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        let content = content.trim_start_matches('\u{feff}');

        let mut table = Self::new(width);
        let sep = delimiter as char;
        for line in content.lines().skip(1) {
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(sep).collect();
            let (Some(code), Some(label)) =
                (fields.get(code_column), fields.get(label_column))
            else {
                continue;
            };
            table.insert(code.trim_matches('"'), label.trim().trim_matches('"'))?;
        }
        Ok(table)
    }

    /// Number of distinct codes
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the table holds no codes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Label for a raw code, after normalization
    #[must_use]
    pub fn label(&self, raw: &str) -> Option<&str> {
        self.labels
            .get(&Self::normalize_code(raw, self.width))
            .map(String::as_str)
    }

    /// Left-join labels onto a long table by the key component at
    /// `code_position`.
    ///
    /// Every input row is preserved even with no match; unmatched codes are
    /// collected into a report instead of being dropped or defaulted.
    /// Construction already guarantees unique codes, so the join can
    /// neither drop nor duplicate rows.
    #[must_use]
    pub fn enrich(&self, table: &RatioTable, code_position: usize) -> EnrichedTable {
        let mut rows = Vec::with_capacity(table.cells.len());
        let mut unmatched = BTreeSet::new();
        for (cohort, &value) in &table.cells {
            let code = match &cohort[code_position] {
                KeyValue::Str(code) => code.clone(),
                KeyValue::Int(code) => code.to_string(),
            };
            let normalized = Self::normalize_code(&code, self.width);
            let label = self.labels.get(&normalized).cloned();
            if label.is_none() {
                unmatched.insert(normalized);
            }
            rows.push(EnrichedRow {
                cohort: cohort.clone(),
                label,
                value,
            });
        }
        if !unmatched.is_empty() {
            log::warn!(
                "lookup enrichment left {} code(s) unmatched: {:?}",
                unmatched.len(),
                unmatched
            );
        }
        EnrichedTable {
            key: table.key.clone(),
            rows,
            unmatched,
        }
    }
}

/// Read a lookup table from a delimited file using the wave delimiter
/// convention (code in the first column, label in the second).
pub fn load_lookup<R: Read>(reader: R, config: &WaveConfig, width: usize) -> Result<LookupTable> {
    LookupTable::from_reader(reader, config.delimiter, width, 0, 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::RatioTable;
    use smallvec::smallvec;
    use std::collections::BTreeMap;

    #[test]
    fn test_normalize_code() {
        assert_eq!(LookupTable::normalize_code("401", 4), "0401");
        assert_eq!(LookupTable::normalize_code("401.0", 4), "0401");
        assert_eq!(LookupTable::normalize_code(" 0401 ", 4), "0401");
        assert_eq!(LookupTable::normalize_code("12345", 4), "12345");
    }

    #[test]
    fn test_duplicate_codes_are_ambiguous() {
        let err = LookupTable::from_pairs(
            [("401", "Commerce"), ("0401", "Commerce again")],
            4,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::AmbiguousLookup { .. }));
    }

    #[test]
    fn test_from_reader_preserves_leading_zeros() {
        let content = "codigo;descripcion\n0401;\"Commerce\"\n9999;Other\n";
        let table =
            LookupTable::from_reader(content.as_bytes(), b';', 4, 0, 1).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.label("401.0"), Some("Commerce"));
        assert_eq!(table.label("9999"), Some("Other"));
        assert_eq!(table.label("1234"), None);
    }

    fn long_table(codes: &[&str]) -> RatioTable {
        let mut cells: BTreeMap<CohortKey, Option<f64>> = BTreeMap::new();
        for (i, code) in codes.iter().enumerate() {
            let cohort: CohortKey =
                smallvec![KeyValue::Int(2021), KeyValue::Str((*code).to_string())];
            cells.insert(cohort, Some(i as f64));
        }
        RatioTable {
            key: vec![KeyColumn::Year, KeyColumn::ActivityCode],
            cells,
        }
    }

    #[test]
    fn test_enrich_preserves_all_rows() {
        let table = LookupTable::from_pairs([("0401", "Commerce")], 4).unwrap();
        let long = long_table(&["401.0", "0502", "0401"]);
        let enriched = table.enrich(&long, 1);

        assert_eq!(enriched.rows.len(), long.cells.len());
        assert_eq!(enriched.unmatched, BTreeSet::from(["0502".to_string()]));
        let matched: Vec<_> = enriched
            .rows
            .iter()
            .filter(|row| row.label.as_deref() == Some("Commerce"))
            .collect();
        assert_eq!(matched.len(), 2);
    }
}
