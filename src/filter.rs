//! Row predicates for survey records.
//!
//! Composable, enum-based filters applied as a conjunction by the wave
//! loader and as numerator/denominator predicates by the aggregator. A
//! record that does not carry the attribute a criterion inspects never
//! matches that criterion.

use crate::models::SurveyRecord;

/// A filter that can be applied to a survey record
#[derive(Debug, Clone)]
pub enum RecordFilter {
    /// Region code equals the given value
    RegionEq(i32),
    /// Geographic cluster code is in the given set
    ClusterIn(Vec<i32>),
    /// Age is at least the given threshold (inclusive)
    MinAge(i32),
    /// Age lies in the given inclusive range
    AgeBetween(i32, i32),
    /// Sex code equals the given value
    SexEq(i32),
    /// Activity status code is in the given set
    ActivityStatusIn(Vec<i32>),
    /// Education level lies in the given inclusive range
    EducationBetween(i32, i32),
    /// Record reports an income value
    HasIncome,
    /// Combined filter that requires all criteria to be met
    All(Vec<RecordFilter>),
    /// Combined filter that requires any criterion to be met
    Any(Vec<RecordFilter>),
}

impl RecordFilter {
    /// Determine if a record meets the filter criteria
    #[must_use]
    pub fn matches(&self, record: &SurveyRecord) -> bool {
        match self {
            Self::RegionEq(code) => record.region == Some(*code),
            Self::ClusterIn(codes) => {
                record.cluster.is_some_and(|c| codes.contains(&c))
            }
            Self::MinAge(min) => record.age.is_some_and(|age| age >= *min),
            Self::AgeBetween(min, max) => {
                record.age.is_some_and(|age| age >= *min && age <= *max)
            }
            Self::SexEq(code) => record.sex == Some(*code),
            Self::ActivityStatusIn(codes) => record
                .activity_status
                .is_some_and(|status| codes.contains(&status)),
            Self::EducationBetween(min, max) => record
                .education_level
                .is_some_and(|level| level >= *min && level <= *max),
            Self::HasIncome => record.income.is_some(),
            Self::All(filters) => filters.iter().all(|f| f.matches(record)),
            Self::Any(filters) => filters.iter().any(|f| f.matches(record)),
        }
    }

    /// Convenience: filter matching the economically active population
    #[must_use]
    pub fn economically_active() -> Self {
        Self::ActivityStatusIn(vec![
            crate::models::STATUS_EMPLOYED,
            crate::models::STATUS_UNEMPLOYED,
        ])
    }

    /// Convenience: filter matching employed records
    #[must_use]
    pub fn employed() -> Self {
        Self::ActivityStatusIn(vec![crate::models::STATUS_EMPLOYED])
    }
}
