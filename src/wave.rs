//! Wave loading: delimited sources -> one wave-level table.
//!
//! Each collection wave is a set of delimited text files. Every source is
//! parsed as an all-Utf8 arrow table (the header line supplies the raw
//! labels), conformed through the schema contract, converted into typed
//! records with lossy numeric coercion, and filtered. Sources failing the
//! contract or unreadable are skipped and counted; the surviving records of
//! all sources are concatenated. Source files are independent, so they are
//! read in parallel; concatenation order is irrelevant because aggregation
//! is order-independent.

use std::fs;
use std::io::{Cursor, Read};
use std::path::PathBuf;
use std::sync::Arc;

use arrow::array::{Array, StringArray};
use arrow::csv::ReaderBuilder;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use rayon::prelude::*;

use crate::config::WaveConfig;
use crate::error::{PipelineError, Result};
use crate::models::{KeyColumn, SurveyRecord, WaveTable};
use crate::schema::conform_batch;

/// Read all sources of one wave and concatenate the surviving records.
///
/// Sources that fail the schema contract or cannot be read are skipped with
/// a warning and counted in the returned table; they never abort the wave.
///
/// # Errors
/// `EmptyWave` when zero rows survive across all sources. The caller
/// decides whether that is fatal (the indicator drivers skip the wave).
pub fn load_wave(wave: &str, paths: &[PathBuf], config: &WaveConfig) -> Result<WaveTable> {
    let results: Vec<(String, Result<Vec<SurveyRecord>>)> = paths
        .par_iter()
        .map(|path| {
            let name = path.display().to_string();
            let records = fs::read_to_string(path)
                .map_err(PipelineError::from)
                .and_then(|content| read_source(content.as_bytes(), &name, config));
            (name, records)
        })
        .collect();

    let mut records = Vec::new();
    let mut skipped_sources = 0;
    for (name, result) in results {
        match result {
            Ok(rows) => {
                log::debug!("source '{name}': {} usable rows", rows.len());
                records.extend(rows);
            }
            Err(error) => {
                log::warn!("wave '{wave}': skipping source '{name}': {error}");
                skipped_sources += 1;
            }
        }
    }

    if records.is_empty() {
        return Err(PipelineError::EmptyWave {
            wave: wave.to_string(),
        });
    }

    Ok(WaveTable {
        wave: wave.to_string(),
        records,
        skipped_sources,
    })
}

/// Read one delimited source into typed, filtered records.
///
/// # Errors
/// `SchemaMismatch`/`DuplicateColumn` from the contract check, or an arrow
/// error when the content is not parseable as delimited text.
pub fn read_source<R: Read>(
    mut reader: R,
    source_name: &str,
    config: &WaveConfig,
) -> Result<Vec<SurveyRecord>> {
    let mut content = String::new();
    reader.read_to_string(&mut content)?;
    let content = content.trim_start_matches('\u{feff}');
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut records = Vec::new();
    for batch in parse_batches(content, config)? {
        let conformed = conform_batch(source_name, &batch, &config.renames, &config.required)?;
        records.extend(
            records_from_batch(&conformed)
                .into_iter()
                .filter(|record| config.filters.iter().all(|f| f.matches(record))),
        );
    }
    Ok(records)
}

/// Parse delimited text into all-Utf8 record batches. The header line
/// supplies the raw column labels; values stay text until coercion.
fn parse_batches(content: &str, config: &WaveConfig) -> Result<Vec<RecordBatch>> {
    let Some(header) = content.lines().next() else {
        return Ok(Vec::new());
    };
    let fields: Vec<Field> = header
        .split(config.delimiter as char)
        .map(|label| Field::new(label.trim().trim_matches('"'), DataType::Utf8, true))
        .collect();
    let schema = Arc::new(Schema::new(fields));

    let cursor = Cursor::new(content.as_bytes());
    let reader = ReaderBuilder::new(schema)
        .with_header(true)
        .with_batch_size(config.batch_size)
        .with_delimiter(config.delimiter)
        .build(cursor)?;

    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch?);
    }
    Ok(batches)
}

/// Convert a conformed all-Utf8 batch into typed records.
///
/// Numeric coercion is lossy by contract: non-parseable values become the
/// explicit missing marker (`None`), never an error. Integer codes that a
/// wave encoded as floats (`"7.0"`) coerce to their integer value.
fn records_from_batch(batch: &RecordBatch) -> Vec<SurveyRecord> {
    let year = string_column(batch, KeyColumn::Year.label());
    let quarter = string_column(batch, KeyColumn::Quarter.label());
    let region = string_column(batch, KeyColumn::Region.label());
    let cluster = string_column(batch, KeyColumn::Cluster.label());
    let sex = string_column(batch, KeyColumn::Sex.label());
    let age = string_column(batch, KeyColumn::Age.label());
    let activity_status = string_column(batch, KeyColumn::ActivityStatus.label());
    let education_level = string_column(batch, KeyColumn::EducationLevel.label());
    let activity_code = string_column(batch, KeyColumn::ActivityCode.label());
    let income = string_column(batch, "P47T");
    let weight = string_column(batch, "PONDERA");

    (0..batch.num_rows())
        .map(|row| SurveyRecord {
            year: cell(year, row).and_then(parse_int_lossy),
            quarter: cell(quarter, row)
                .and_then(parse_int_lossy)
                .and_then(|q: i32| u8::try_from(q).ok()),
            region: cell(region, row).and_then(parse_int_lossy),
            cluster: cell(cluster, row).and_then(parse_int_lossy),
            sex: cell(sex, row).and_then(parse_int_lossy),
            age: cell(age, row).and_then(parse_int_lossy),
            activity_status: cell(activity_status, row).and_then(parse_int_lossy),
            education_level: cell(education_level, row).and_then(parse_int_lossy),
            activity_code: cell(activity_code, row).map(str::to_string),
            income: cell(income, row).and_then(parse_f64_lossy),
            weight: cell(weight, row).and_then(parse_f64_lossy),
        })
        .collect()
}

fn string_column<'a>(batch: &'a RecordBatch, label: &str) -> Option<&'a StringArray> {
    batch
        .column_by_name(label)?
        .as_any()
        .downcast_ref::<StringArray>()
}

fn cell<'a>(column: Option<&'a StringArray>, row: usize) -> Option<&'a str> {
    let array = column?;
    if array.is_null(row) {
        return None;
    }
    let value = array.value(row).trim();
    if value.is_empty() { None } else { Some(value) }
}

fn parse_f64_lossy(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[allow(clippy::cast_possible_truncation)]
fn parse_int_lossy(value: &str) -> Option<i32> {
    if let Ok(v) = value.parse::<i32>() {
        return Some(v);
    }
    // Some waves encode integer codes as floats ("7.0")
    let v = value.parse::<f64>().ok()?;
    if v.is_finite() && v.fract() == 0.0 && (f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(&v)
    {
        Some(v as i32)
    } else {
        None
    }
}
