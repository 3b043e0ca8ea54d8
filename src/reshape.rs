//! Pivot long-format results into a period x category matrix.
//!
//! Rows are the distinct periods in chronological order (parsed, never
//! lexical), columns the distinct categories in their natural sort order.
//! A period x category combination with no aggregate row fills as `0.0`;
//! at the matrix level that is indistinguishable from a true 0, which is a
//! documented limitation of the wide form. The long form keeps the
//! undefined sentinel.

use itertools::Itertools;
use rustc_hash::FxHashMap;

use crate::aggregate::RatioTable;
use crate::error::{PipelineError, Result};
use crate::models::{KeyValue, Period};

/// One row of a long-format table: (period, category, value)
#[derive(Debug, Clone, PartialEq)]
pub struct LongRow {
    /// The period this row belongs to
    pub period: Period,
    /// The category within the period
    pub category: KeyValue,
    /// The measure; `None` is the undefined sentinel
    pub value: Option<f64>,
}

/// A wide matrix suitable for charting/export: periods as rows,
/// categories as columns
#[derive(Debug, Clone)]
pub struct TimeSeriesMatrix {
    /// Distinct periods, chronologically ordered
    pub periods: Vec<Period>,
    /// Distinct categories, in natural sort order
    pub categories: Vec<KeyValue>,
    /// `values[p][c]` is the cell for `periods[p]` x `categories[c]`
    pub values: Vec<Vec<f64>>,
}

/// Fill value for absent period x category combinations
pub const FILL_VALUE: f64 = 0.0;

/// Pivot long rows into a wide matrix.
///
/// Rows are expected to be unique per (period, category), which holds for
/// anything derived from an aggregation (one cell per cohort). Should
/// duplicates arrive anyway, the last row wins.
#[must_use]
pub fn pivot(rows: &[LongRow]) -> TimeSeriesMatrix {
    let periods: Vec<Period> = rows.iter().map(|row| row.period).unique().sorted().collect();
    let categories: Vec<KeyValue> = rows
        .iter()
        .map(|row| row.category.clone())
        .unique()
        .sorted()
        .collect();

    let period_index: FxHashMap<Period, usize> =
        periods.iter().enumerate().map(|(i, p)| (*p, i)).collect();
    let category_index: FxHashMap<KeyValue, usize> = categories
        .iter()
        .enumerate()
        .map(|(i, c)| (c.clone(), i))
        .collect();

    let mut values = vec![vec![FILL_VALUE; categories.len()]; periods.len()];
    for row in rows {
        if let Some(value) = row.value {
            values[period_index[&row.period]][category_index[&row.category]] = value;
        }
    }

    TimeSeriesMatrix {
        periods,
        categories,
        values,
    }
}

/// Flatten a ratio table keyed as (period columns..., category) into long
/// rows. `period_len` is the number of leading period components: 1 for a
/// bare year, 2 for (year, quarter).
///
/// # Errors
/// `Reshape` when the table's key shape does not match, or a period
/// component is not numeric.
pub fn long_rows(table: &RatioTable, period_len: usize) -> Result<Vec<LongRow>> {
    if !(1..=2).contains(&period_len) || table.key.len() != period_len + 1 {
        return Err(PipelineError::Reshape(format!(
            "expected {} key columns (period + category), table has {}",
            period_len + 1,
            table.key.len()
        )));
    }

    let mut rows = Vec::with_capacity(table.cells.len());
    for (cohort, &value) in &table.cells {
        let year = int_component(&cohort[0])?;
        let year = i32::try_from(year)
            .map_err(|_| PipelineError::Reshape(format!("year out of range: {year}")))?;
        let period = if period_len == 2 {
            let quarter = int_component(&cohort[1])?;
            let quarter = u8::try_from(quarter).map_err(|_| {
                PipelineError::Reshape(format!("quarter out of range: {quarter}"))
            })?;
            Period::Quarter(year, quarter)
        } else {
            Period::Year(year)
        };
        rows.push(LongRow {
            period,
            category: cohort[period_len].clone(),
            value,
        });
    }
    Ok(rows)
}

fn int_component(value: &KeyValue) -> Result<i64> {
    match value {
        KeyValue::Int(v) => Ok(*v),
        KeyValue::Str(v) => Err(PipelineError::Reshape(format!(
            "period component '{v}' is not numeric"
        ))),
    }
}
