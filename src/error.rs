//! Error handling for the survey indicator pipeline.

use thiserror::Error;

/// Specialized error type for pipeline operations.
///
/// Per-source and per-wave conditions (`SchemaMismatch`, `EmptyWave`) are
/// recoverable: callers skip the offending item and continue. Lookup-table
/// integrity violations (`AmbiguousLookup`) abort the enrichment step. A run
/// as a whole fails only with `NoUsableWaves`.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A single source table lacks required columns; the source is skipped.
    #[error("source '{source_name}' is missing required columns: {missing:?}")]
    SchemaMismatch {
        /// Name of the offending source table
        source_name: String,
        /// Canonical labels that were required but absent
        missing: Vec<String>,
    },

    /// Two raw column labels collapse to the same canonical form.
    #[error("source '{source_name}' has duplicate column '{label}' after normalization")]
    DuplicateColumn {
        /// Name of the offending source table
        source_name: String,
        /// The canonical label that appeared more than once
        label: String,
    },

    /// A wave yielded zero usable rows after filtering.
    #[error("wave '{wave}' produced no usable rows after filtering")]
    EmptyWave {
        /// Label of the wave (typically the year-labeled batch directory)
        wave: String,
    },

    /// Duplicate key in a lookup table. Silently picking one match would
    /// corrupt results, so enrichment aborts.
    #[error("ambiguous lookup: code '{code}' appears more than once after normalization")]
    AmbiguousLookup {
        /// The normalized code that is duplicated
        code: String,
    },

    /// A price index entry was not positive.
    #[error("price index for period '{period}' must be positive, got {value}")]
    InvalidIndex {
        /// Display form of the offending period
        period: String,
        /// The rejected index value
        value: f64,
    },

    /// A period string could not be parsed.
    #[error("invalid period '{0}', expected 'YYYY' or 'YYYY-TQ'")]
    InvalidPeriod(String),

    /// A table had the wrong grouping-key shape for the requested
    /// derivation (reshape, ratio join, share prefix).
    #[error("key shape error: {0}")]
    Reshape(String),

    /// Every wave in the run was skipped.
    #[error("no wave produced usable data")]
    NoUsableWaves,

    /// Error reading a source file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error parsing delimited text into a table.
    #[error("table error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error parsing the price-index mapping literal.
    #[error("price index parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
