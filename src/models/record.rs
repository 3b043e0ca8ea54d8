//! The canonical per-individual survey record.
//!
//! One `SurveyRecord` is one surveyed individual in one wave, after column
//! normalization and numeric coercion. Column availability varies per wave,
//! so every attribute is optional; a record missing an attribute simply
//! never matches filters or grouping keys that need it.

use crate::models::key::{KeyColumn, KeyValue};
use crate::models::period::Period;

/// One surveyed individual in one collection wave
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurveyRecord {
    /// Survey year (ANO4)
    pub year: Option<i32>,
    /// Collection quarter (TRIMESTRE)
    pub quarter: Option<u8>,
    /// Region code (REGION)
    pub region: Option<i32>,
    /// Geographic cluster code (AGLOMERADO)
    pub cluster: Option<i32>,
    /// Sex code (CH04)
    pub sex: Option<i32>,
    /// Age in years (CH06)
    pub age: Option<i32>,
    /// Activity status code (ESTADO); 1 = employed, 2 = unemployed
    pub activity_status: Option<i32>,
    /// Education level code (NIVEL_ED)
    pub education_level: Option<i32>,
    /// Occupation / activity-sector code (PP04B_COD), textual to preserve
    /// leading zeros
    pub activity_code: Option<String>,
    /// Monthly income (P47T)
    pub income: Option<f64>,
    /// Sampling weight (PONDERA after renaming)
    pub weight: Option<f64>,
}

/// Activity status code for employed individuals
pub const STATUS_EMPLOYED: i32 = 1;
/// Activity status code for unemployed individuals actively seeking work
pub const STATUS_UNEMPLOYED: i32 = 2;

impl SurveyRecord {
    /// The value of one categorical attribute, as a key component.
    /// `None` when the record does not carry the attribute.
    #[must_use]
    pub fn key_component(&self, column: KeyColumn) -> Option<KeyValue> {
        match column {
            KeyColumn::Year => self.year.map(|v| KeyValue::Int(i64::from(v))),
            KeyColumn::Quarter => self.quarter.map(|v| KeyValue::Int(i64::from(v))),
            KeyColumn::Region => self.region.map(|v| KeyValue::Int(i64::from(v))),
            KeyColumn::Cluster => self.cluster.map(|v| KeyValue::Int(i64::from(v))),
            KeyColumn::Sex => self.sex.map(|v| KeyValue::Int(i64::from(v))),
            KeyColumn::Age => self.age.map(|v| KeyValue::Int(i64::from(v))),
            KeyColumn::ActivityStatus => {
                self.activity_status.map(|v| KeyValue::Int(i64::from(v)))
            }
            KeyColumn::EducationLevel => {
                self.education_level.map(|v| KeyValue::Int(i64::from(v)))
            }
            KeyColumn::ActivityCode => self.activity_code.clone().map(KeyValue::Str),
        }
    }

    /// The period this record belongs to: quarterly when the quarter is
    /// known, yearly otherwise, `None` without a year.
    #[must_use]
    pub fn period(&self) -> Option<Period> {
        let year = self.year?;
        Some(match self.quarter {
            Some(quarter) => Period::Quarter(year, quarter),
            None => Period::Year(year),
        })
    }

    /// Whether the record is employed per the survey's activity coding
    #[must_use]
    pub fn is_employed(&self) -> bool {
        self.activity_status == Some(STATUS_EMPLOYED)
    }

    /// Whether the record belongs to the economically active population
    /// (employed or actively seeking work)
    #[must_use]
    pub fn is_economically_active(&self) -> bool {
        matches!(self.activity_status, Some(STATUS_EMPLOYED | STATUS_UNEMPLOYED))
    }
}

/// A wave-level table: all usable records of one collection wave
#[derive(Debug, Clone)]
pub struct WaveTable {
    /// Label of the wave (typically the year-labeled batch directory)
    pub wave: String,
    /// The surviving records, concatenated across the wave's sources
    pub records: Vec<SurveyRecord>,
    /// Number of sources skipped for schema mismatch or read failure
    pub skipped_sources: usize,
}
