/*! Inclusive coordinate intervals used to restrict where peaks may be reported */
use std::{error::Error, fmt::Display, num::ParseFloatError, ops::RangeInclusive, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::PickerError;

/** An inclusive interval over a single dimension
*/
pub trait Span1D {
    type DimType: PartialOrd + Copy;

    fn start(&self) -> Self::DimType;
    fn end(&self) -> Self::DimType;

    fn contains(&self, i: Self::DimType) -> bool {
        self.start() <= i && i <= self.end()
    }

    fn overlaps<T: Span1D<DimType = Self::DimType>>(&self, interval: &T) -> bool {
        self.start() <= interval.end() && interval.start() <= self.end()
    }

    fn is_contained_in_interval<T: Span1D<DimType = Self::DimType>>(&self, interval: &T) -> bool {
        self.start() >= interval.start() && self.end() <= interval.end()
    }
}

/// The region of the x axis in which a peak's apex must fall to be reported
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "(f64, f64)", into = "(f64, f64)")]
pub struct MzRange {
    pub start: f64,
    pub end: f64,
}

impl MzRange {
    /// Create a new range, checking that both ends are finite and ordered
    pub fn new(start: f64, end: f64) -> Result<Self, PickerError> {
        if !start.is_finite() || !end.is_finite() || start > end {
            return Err(PickerError::InvalidMzRange(start, end));
        }
        Ok(Self { start, end })
    }

    /// The range spanning every value in `x`, or `None` if `x` is empty
    pub fn spanning(x: &[f64]) -> Option<Self> {
        let (lo, hi) = x.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        });
        if lo > hi {
            None
        } else {
            Some(Self { start: lo, end: hi })
        }
    }
}

impl Span1D for MzRange {
    type DimType = f64;

    fn start(&self) -> Self::DimType {
        self.start
    }

    fn end(&self) -> Self::DimType {
        self.end
    }
}

impl Display for MzRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl TryFrom<(f64, f64)> for MzRange {
    type Error = PickerError;

    fn try_from(value: (f64, f64)) -> Result<Self, Self::Error> {
        Self::new(value.0, value.1)
    }
}

impl TryFrom<RangeInclusive<f64>> for MzRange {
    type Error = PickerError;

    fn try_from(value: RangeInclusive<f64>) -> Result<Self, Self::Error> {
        Self::new(*value.start(), *value.end())
    }
}

impl From<MzRange> for (f64, f64) {
    fn from(value: MzRange) -> Self {
        (value.start, value.end)
    }
}

#[derive(Debug)]
pub enum MzRangeParseError {
    MalformedStart(ParseFloatError),
    MalformedEnd(ParseFloatError),
    MissingEnd,
    Invalid(PickerError),
}

impl Display for MzRangeParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MzRangeParseError::MalformedStart(e) => {
                write!(f, "Failed to parse m/z range start {e}")
            }
            MzRangeParseError::MalformedEnd(e) => {
                write!(f, "Failed to parse m/z range end {e}")
            }
            MzRangeParseError::MissingEnd => {
                write!(f, "An m/z range must have two values separated by '-', ':' or ' '")
            }
            MzRangeParseError::Invalid(e) => write!(f, "{e}"),
        }
    }
}

impl Error for MzRangeParseError {}

impl FromStr for MzRange {
    type Err = MzRangeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (start_s, end_s) = if let Some(pair) = s.split_once(' ') {
            pair
        } else if let Some(pair) = s.split_once(':') {
            pair
        } else if let Some(pair) = s.split_once('-') {
            pair
        } else {
            return Err(MzRangeParseError::MissingEnd);
        };
        let start: f64 = start_s
            .trim()
            .parse()
            .map_err(MzRangeParseError::MalformedStart)?;
        let end: f64 = end_s
            .trim()
            .parse()
            .map_err(MzRangeParseError::MalformedEnd)?;
        MzRange::new(start, end).map_err(MzRangeParseError::Invalid)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_mz_range_fromstr() -> Result<(), MzRangeParseError> {
        let r: MzRange = "200-1500.5".parse()?;
        assert_eq!(r.start(), 200.0);
        assert_eq!(r.end(), 1500.5);

        let r: MzRange = "200:1500".parse()?;
        assert_eq!(r.end(), 1500.0);

        let r: MzRange = "200 1500".parse()?;
        assert!(r.contains(1500.0));
        assert!(r.contains(200.0));
        assert!(!r.contains(199.99));
        Ok(())
    }

    #[test]
    fn test_mz_range_fromstr_malformed() {
        assert!(matches!(
            "a-100".parse::<MzRange>(),
            Err(MzRangeParseError::MalformedStart(_))
        ));
        assert!(matches!(
            "100-b".parse::<MzRange>(),
            Err(MzRangeParseError::MalformedEnd(_))
        ));
        assert!(matches!(
            "100".parse::<MzRange>(),
            Err(MzRangeParseError::MissingEnd)
        ));
        assert!(matches!(
            "500-100".parse::<MzRange>(),
            Err(MzRangeParseError::Invalid(PickerError::InvalidMzRange(_, _)))
        ));
    }

    #[test]
    fn test_spanning() {
        let r = MzRange::spanning(&[3.0, 1.0, 7.5]).unwrap();
        assert_eq!(r, MzRange { start: 1.0, end: 7.5 });
        assert!(MzRange::spanning(&[]).is_none());
        let inner = MzRange::new(2.0, 3.0).unwrap();
        assert!(inner.is_contained_in_interval(&r));
        assert!(inner.overlaps(&r));
    }

    #[test]
    fn test_serde_pair() {
        let r: MzRange = serde_json::from_str("[100.0, 200.0]").unwrap();
        assert_eq!(r.start, 100.0);
        assert!(serde_json::from_str::<MzRange>("[200.0, 100.0]").is_err());
        assert_eq!(serde_json::to_string(&r).unwrap(), "[100.0,200.0]");
    }
}
