//! Delimited-text output of derived tables.
//!
//! The consumers are external reporting/plotting tools, so the surface is
//! deliberately small: a long table (period/key columns plus one measure)
//! or a wide matrix. Undefined measures are written as the literal `NA`,
//! keeping a zero denominator distinguishable from a true 0% rate.

use std::io::{self, Write};

use itertools::Itertools;

use crate::aggregate::RatioTable;
use crate::lookup::EnrichedTable;
use crate::reshape::TimeSeriesMatrix;

/// Sentinel written for undefined measures
pub const NA: &str = "NA";

/// Write a ratio table in long format: one row per cohort, key columns
/// labeled with their canonical names, the measure last.
pub fn write_long<W: Write>(writer: &mut W, table: &RatioTable, delimiter: u8) -> io::Result<()> {
    let sep = delimiter as char;
    let header = table.key.iter().map(|column| column.label()).join(&sep.to_string());
    writeln!(writer, "{header}{sep}VALOR")?;
    for (cohort, value) in &table.cells {
        let key = cohort.iter().map(ToString::to_string).join(&sep.to_string());
        match value {
            Some(v) => writeln!(writer, "{key}{sep}{v}")?,
            None => writeln!(writer, "{key}{sep}{NA}")?,
        }
    }
    Ok(())
}

/// Write an enriched table in long format, with the label column between
/// the key columns and the measure.
pub fn write_enriched<W: Write>(
    writer: &mut W,
    table: &EnrichedTable,
    delimiter: u8,
) -> io::Result<()> {
    let sep = delimiter as char;
    let header = table.key.iter().map(|column| column.label()).join(&sep.to_string());
    writeln!(writer, "{header}{sep}ETIQUETA{sep}VALOR")?;
    for row in &table.rows {
        let key = row.cohort.iter().map(ToString::to_string).join(&sep.to_string());
        let label = row.label.as_deref().unwrap_or("");
        match row.value {
            Some(v) => writeln!(writer, "{key}{sep}{label}{sep}{v}")?,
            None => writeln!(writer, "{key}{sep}{label}{sep}{NA}")?,
        }
    }
    Ok(())
}

/// Write a wide matrix: header row of categories, one row per period.
pub fn write_matrix<W: Write>(
    writer: &mut W,
    matrix: &TimeSeriesMatrix,
    delimiter: u8,
) -> io::Result<()> {
    let sep = delimiter as char;
    let categories = matrix
        .categories
        .iter()
        .map(ToString::to_string)
        .join(&sep.to_string());
    writeln!(writer, "PERIODO{sep}{categories}")?;
    for (period, row) in matrix.periods.iter().zip(&matrix.values) {
        let cells = row.iter().map(ToString::to_string).join(&sep.to_string());
        writeln!(writer, "{period}{sep}{cells}")?;
    }
    Ok(())
}
