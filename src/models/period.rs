//! Time periods for survey waves.
//!
//! A period is either a bare year or a (year, quarter) pair, matching the
//! `"YYYY"` and `"YYYY-TQ"` labels used by the survey's published tables.
//! Ordering is always chronological, never lexical.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::PipelineError;

/// A point on the survey time axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    /// Yearly period (e.g., 2020)
    Year(i32),
    /// Quarterly period (e.g., 2020-T1)
    Quarter(i32, u8), // year, quarter (1-4)
}

impl Period {
    /// Year component of the period
    #[must_use]
    pub const fn year(&self) -> i32 {
        match self {
            Self::Year(year) | Self::Quarter(year, _) => *year,
        }
    }

    /// Quarter component, if this is a quarterly period
    #[must_use]
    pub const fn quarter(&self) -> Option<u8> {
        match self {
            Self::Year(_) => None,
            Self::Quarter(_, quarter) => Some(*quarter),
        }
    }
}

impl Ord for Period {
    fn cmp(&self, other: &Self) -> Ordering {
        // A bare year sorts before any quarter of the same year
        (self.year(), self.quarter().unwrap_or(0)).cmp(&(other.year(), other.quarter().unwrap_or(0)))
    }
}

impl PartialOrd for Period {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Year(year) => write!(f, "{year}"),
            Self::Quarter(year, quarter) => write!(f, "{year}-T{quarter}"),
        }
    }
}

impl FromStr for Period {
    type Err = PipelineError;

    /// Parse a period label.
    ///
    /// Supported formats:
    /// - `"2020"` - year
    /// - `"2020-T1"` - year and quarter
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some((year_part, quarter_part)) = s.split_once('-') {
            let year = year_part
                .parse::<i32>()
                .map_err(|_| PipelineError::InvalidPeriod(s.to_string()))?;
            let quarter = quarter_part
                .strip_prefix('T')
                .and_then(|q| q.parse::<u8>().ok())
                .ok_or_else(|| PipelineError::InvalidPeriod(s.to_string()))?;
            if !(1..=4).contains(&quarter) {
                return Err(PipelineError::InvalidPeriod(s.to_string()));
            }
            Ok(Self::Quarter(year, quarter))
        } else {
            let year = s
                .parse::<i32>()
                .map_err(|_| PipelineError::InvalidPeriod(s.to_string()))?;
            Ok(Self::Year(year))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_from_str() {
        assert_eq!("2020".parse::<Period>().unwrap(), Period::Year(2020));
        assert_eq!("2020-T1".parse::<Period>().unwrap(), Period::Quarter(2020, 1));
        assert_eq!(" 2023-T4 ".parse::<Period>().unwrap(), Period::Quarter(2023, 4));
        assert!("2020-T5".parse::<Period>().is_err());
        assert!("2020-Q1".parse::<Period>().is_err());
        assert!("veinte".parse::<Period>().is_err());
    }

    #[test]
    fn test_period_display_round_trip() {
        for period in [Period::Year(2019), Period::Quarter(2022, 3)] {
            assert_eq!(period.to_string().parse::<Period>().unwrap(), period);
        }
    }

    #[test]
    fn test_chronological_order() {
        let mut periods = vec![
            Period::Quarter(2023, 2),
            Period::Quarter(2022, 4),
            Period::Quarter(2023, 1),
        ];
        periods.sort();
        assert_eq!(
            periods,
            vec![
                Period::Quarter(2022, 4),
                Period::Quarter(2023, 1),
                Period::Quarter(2023, 2),
            ]
        );
    }

    #[test]
    fn test_year_sorts_before_quarters_of_same_year() {
        assert!(Period::Year(2020) < Period::Quarter(2020, 1));
        assert!(Period::Quarter(2019, 4) < Period::Year(2020));
    }
}
