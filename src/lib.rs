//! A Rust library for aggregating household-survey microdata into weighted
//! labor-market and education indicators, with schema normalization across
//! drifting wave extracts and explicit missing-data policy.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod indicators;
pub mod inflation;
pub mod lookup;
pub mod models;
pub mod reshape;
pub mod schema;
pub mod wave;

// Re-export the most common types for easier use
// Core types
pub use config::{CohortSelection, WaveConfig};
pub use error::{PipelineError, Result};
pub use models::{CohortKey, KeyColumn, KeyValue, Period, SurveyRecord, WaveTable};

// Pipeline stages
pub use aggregate::{Aggregation, RatioTable, Weighting, aggregate, ratio, share_within};
pub use filter::RecordFilter;
pub use inflation::{DeflationReport, PriceIndex};
pub use lookup::{EnrichedTable, LookupTable};
pub use reshape::{LongRow, TimeSeriesMatrix, long_rows, pivot};
pub use wave::{load_wave, read_source};

// Indicator drivers
pub use indicators::{
    IncomeRun, IndicatorRun, RunReport, WaveSources, education_distribution,
    employment_rate_by_sex, mean_real_income_by_age, sector_distribution,
    unemployment_rate_by_education,
};
