//! Cohort keys for aggregation.
//!
//! A cohort is identified by an ordered tuple of categorical attribute
//! values. Keys derive their ordering from the values themselves, so
//! categories with equal aggregates keep a stable order regardless of the
//! order source tables were read.

use std::fmt;

use smallvec::SmallVec;

/// A categorical attribute that can participate in a grouping key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyColumn {
    /// Survey year (ANO4)
    Year,
    /// Collection quarter (TRIMESTRE)
    Quarter,
    /// Region code (REGION)
    Region,
    /// Geographic cluster code (AGLOMERADO)
    Cluster,
    /// Sex code (CH04)
    Sex,
    /// Age in years (CH06)
    Age,
    /// Activity status code (ESTADO)
    ActivityStatus,
    /// Education level code (NIVEL_ED)
    EducationLevel,
    /// Occupation / activity-sector code (PP04B_COD)
    ActivityCode,
}

impl KeyColumn {
    /// Canonical column label for this key, as used in source tables
    /// and in exported output headers.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Year => "ANO4",
            Self::Quarter => "TRIMESTRE",
            Self::Region => "REGION",
            Self::Cluster => "AGLOMERADO",
            Self::Sex => "CH04",
            Self::Age => "CH06",
            Self::ActivityStatus => "ESTADO",
            Self::EducationLevel => "NIVEL_ED",
            Self::ActivityCode => "PP04B_COD",
        }
    }
}

/// One component of a cohort key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyValue {
    /// Numeric category (year, quarter, sex code, education level, ...)
    Int(i64),
    /// Textual category (occupation codes, kept as text to preserve
    /// leading zeros)
    Str(String),
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for KeyValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for KeyValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

/// An ordered tuple of categorical values identifying one aggregation bucket.
///
/// Grouping keys rarely exceed three components (period plus one category),
/// so the tuple lives inline.
pub type CohortKey = SmallVec<[KeyValue; 4]>;
