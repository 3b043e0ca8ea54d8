//! Column-label canonicalization and the required-column contract.
//!
//! Waves drift: the same variable arrives as `ano4`, `ANO4 ` or `AÑO4`
//! depending on the extract. Every source table therefore passes through
//! `conform_batch`, which collapses labels to one canonical form, resolves
//! each required column to a source column (the caller's rename map decides
//! which of several weight columns an indicator reads), and restricts the
//! table to the required set. A failed contract is a recoverable
//! `SchemaMismatch`, not a panic.

use std::collections::HashSet;
use std::sync::Arc;

use arrow::array::ArrayRef;
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use rustc_hash::FxHashMap;

use crate::error::{PipelineError, Result};

/// Canonicalize one column label: trim, uppercase, strip diacritics to the
/// base ASCII letter, drop characters with no ASCII equivalent.
///
/// Idempotent: normalizing an already-normalized label is a no-op.
#[must_use]
pub fn normalize_label(raw: &str) -> String {
    raw.trim()
        .chars()
        .flat_map(char::to_uppercase)
        .filter_map(strip_diacritic)
        .filter(char::is_ascii)
        .collect()
}

/// Map an uppercase accented Latin letter to its base ASCII letter.
/// Characters with no mapping and no ASCII form are dropped by the caller.
const fn strip_diacritic(c: char) -> Option<char> {
    Some(match c {
        'Á' | 'À' | 'Â' | 'Ä' | 'Ã' | 'Å' => 'A',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' => 'O',
        'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'Ñ' => 'N',
        'Ç' => 'C',
        other => other,
    })
}

/// Normalize a batch's column labels, resolve the required columns through
/// the rename map, and enforce the required-column contract.
///
/// Returns the batch restricted to the required columns, in the order the
/// required set lists them. `renames` maps normalized raw labels to their
/// canonical replacement (e.g. `PONDIIO` -> `PONDERA`); when a source
/// carries both the raw and the canonical label, the rename source wins, so
/// an indicator weighting by `PONDIIO` reads it even from extracts that also
/// ship a `PONDERA` column. Columns outside the required set are dropped,
/// never renamed.
///
/// # Errors
/// `SchemaMismatch` when a required column has neither a direct nor a
/// renamed source (callers skip the source and continue the wave);
/// `DuplicateColumn` when two raw labels collapse to the same canonical form.
pub fn conform_batch(
    source_name: &str,
    batch: &RecordBatch,
    renames: &FxHashMap<String, String>,
    required: &[String],
) -> Result<RecordBatch> {
    let schema = batch.schema();
    let mut labels = Vec::with_capacity(batch.num_columns());
    let mut seen = HashSet::new();
    for field in schema.fields() {
        let label = normalize_label(field.name());
        if !seen.insert(label.clone()) {
            return Err(PipelineError::DuplicateColumn {
                source_name: source_name.to_string(),
                label,
            });
        }
        labels.push(label);
    }

    let mut projection = Vec::with_capacity(required.len());
    let mut missing = Vec::new();
    for column in required {
        let renamed = labels.iter().position(|label| {
            renames.get(label).is_some_and(|canonical| canonical == column)
        });
        let direct = || labels.iter().position(|label| label == column);
        match renamed.or_else(direct) {
            Some(index) => projection.push(index),
            None => missing.push(column.clone()),
        }
    }
    if !missing.is_empty() {
        return Err(PipelineError::SchemaMismatch {
            source_name: source_name.to_string(),
            missing,
        });
    }

    let fields: Vec<Field> = required
        .iter()
        .zip(&projection)
        .map(|(column, &index)| {
            let field = schema.field(index);
            Field::new(column, field.data_type().clone(), field.is_nullable())
        })
        .collect();
    let columns: Vec<ArrayRef> = projection
        .iter()
        .map(|&index| Arc::clone(batch.column(index)))
        .collect();
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}
