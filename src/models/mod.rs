//! Core value types of the pipeline.

pub mod key;
pub mod period;
pub mod record;

pub use key::{CohortKey, KeyColumn, KeyValue};
pub use period::Period;
pub use record::{STATUS_EMPLOYED, STATUS_UNEMPLOYED, SurveyRecord, WaveTable};
