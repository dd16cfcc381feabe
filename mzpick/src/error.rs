/*! Errors raised while picking, scoring or persisting peaks */
use std::io;

use thiserror::Error;

use crate::peak::{AttributeValue, PeakAttribute};

/// An error that might occur while operating a peak picker
#[derive(Debug, Error)]
pub enum PickerError {
    #[error("The lengths of 'x' ({x}) and 'y' ({y}) vector must be the same")]
    LengthMismatch { x: usize, y: usize },
    #[error("Intensity should be between 0 and 1, got {0}")]
    MinIntensityOutOfRange(f64),
    #[error("The m/z range must be two finite, ordered values, got ({0}, {1})")]
    InvalidMzRange(f64, f64),
    #[error("Cannot set attribute for all peaks since the dimensions do not match! Expected {expected} values, received {received}")]
    AttributeLengthMismatch { expected: usize, received: usize },
    #[error("metric=`{0}` cannot be computed - please use one of these instead `asymmetry`, `tailing`, `slope`")]
    UnsupportedMetric(String),
    #[error("`{0}` is not a peak attribute")]
    UnknownAttribute(String),
    #[error("Could not understand the criteria {criteria} for attribute `{attribute}`")]
    InvalidCriteria {
        attribute: PeakAttribute,
        criteria: String,
    },
    #[error("Cannot assign {value:?} to attribute `{attribute}`")]
    InvalidAttributeValue {
        attribute: PeakAttribute,
        value: AttributeValue,
    },
    #[error("Index {index} is out of bounds for a collection of length {length}")]
    IndexOutOfBounds { index: usize, length: usize },
    #[error("Peak at index {idx} has a degenerate {side} slope")]
    DegenerateSlope { idx: usize, side: &'static str },
    #[error("No peaks have been picked yet")]
    NotPopulated,
    #[error("An IO error occurred: {0}")]
    IOError(
        #[source]
        #[from]
        io::Error,
    ),
    #[error("A JSON error occurred: {0}")]
    JSONError(
        #[source]
        #[from]
        serde_json::Error,
    ),
}
