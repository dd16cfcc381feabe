use std::error::Error;
use std::fmt::Display;
use std::num::ParseFloatError;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use mzpick::peak::PeakAttribute;
use mzpick::picker::FilterCriteria;
use mzpick::PickerError;

/// The peak detection strategy to run on each input
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionMethod {
    #[default]
    /// Select local maxima by height, prominence, distance and width
    Property,
    /// Select samples that dominate a window of neighbors
    LocalMax,
    /// Select sign changes of the first derivative
    Differential,
}

impl Display for DetectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DetectionMethod::Property => "property",
            DetectionMethod::LocalMax => "local-max",
            DetectionMethod::Differential => "differential",
        };
        f.write_str(name)
    }
}

impl DetectionMethod {
    /// The fraction of the tallest peak a peak must exceed when none is given
    pub const fn default_min_intensity(&self) -> f64 {
        match self {
            DetectionMethod::Property | DetectionMethod::LocalMax => 0.01,
            DetectionMethod::Differential => 0.0,
        }
    }
}

/// Keep only peaks whose attribute lies within an inclusive range, denoted `KEY=LOW:HIGH`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeepCriterion {
    pub attribute: PeakAttribute,
    pub start: f64,
    pub end: f64,
}

impl KeepCriterion {
    pub fn new(attribute: PeakAttribute, start: f64, end: f64) -> Self {
        Self {
            attribute,
            start,
            end,
        }
    }

    pub fn criteria(&self) -> FilterCriteria {
        FilterCriteria::Range(self.start, self.end)
    }
}

impl Display for KeepCriterion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}:{}", self.attribute, self.start, self.end)
    }
}

#[derive(Debug)]
pub enum KeepCriterionParseError {
    MissingKey,
    UnknownKey(PickerError),
    NotNumeric(PeakAttribute),
    MissingEnd,
    MalformedStart(ParseFloatError),
    MalformedEnd(ParseFloatError),
}

impl Display for KeepCriterionParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeepCriterionParseError::MissingKey => {
                write!(f, "A criterion must be denoted KEY=LOW:HIGH")
            }
            KeepCriterionParseError::UnknownKey(e) => write!(f, "{e}"),
            KeepCriterionParseError::NotNumeric(attr) => {
                write!(f, "Cannot filter the non-numeric attribute {attr} by range")
            }
            KeepCriterionParseError::MissingEnd => {
                write!(f, "A criterion range must be denoted LOW:HIGH")
            }
            KeepCriterionParseError::MalformedStart(e) => {
                write!(f, "Failed to parse criterion start {e}")
            }
            KeepCriterionParseError::MalformedEnd(e) => {
                write!(f, "Failed to parse criterion end {e}")
            }
        }
    }
}

impl Error for KeepCriterionParseError {}

impl FromStr for KeepCriterion {
    type Err = KeepCriterionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, range) = s
            .split_once('=')
            .ok_or(KeepCriterionParseError::MissingKey)?;
        let attribute: PeakAttribute = key
            .trim()
            .parse()
            .map_err(KeepCriterionParseError::UnknownKey)?;
        if !attribute.is_numeric() {
            return Err(KeepCriterionParseError::NotNumeric(attribute));
        }
        let (start, end) = range
            .split_once(':')
            .ok_or(KeepCriterionParseError::MissingEnd)?;
        let start = if start.trim().is_empty() {
            f64::NEG_INFINITY
        } else {
            start
                .trim()
                .parse()
                .map_err(KeepCriterionParseError::MalformedStart)?
        };
        let end = if end.trim().is_empty() {
            f64::INFINITY
        } else {
            end.trim()
                .parse()
                .map_err(KeepCriterionParseError::MalformedEnd)?
        };
        Ok(Self::new(attribute, start, end))
    }
}

impl TryFrom<String> for KeepCriterion {
    type Error = KeepCriterionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<KeepCriterion> for String {
    fn from(value: KeepCriterion) -> Self {
        value.to_string()
    }
}

pub(crate) fn non_negative_float_f64(s: &str) -> Result<f64, String> {
    let value = s.parse::<f64>().map_err(|e| e.to_string())?;
    if value < 0.0 {
        Err(format!("`{s}` is less than zero"))
    } else {
        Ok(value)
    }
}

pub(crate) fn fraction_f64(s: &str) -> Result<f64, String> {
    let value = non_negative_float_f64(s)?;
    if value > 1.0 {
        Err(format!("`{s}` is greater than one"))
    } else {
        Ok(value)
    }
}
