//! Peak picking for one dimensional signals such as mass spectra and mobilograms.
//!
//! A [`picker::PeakPicker`] owns an `(x, y)` signal, detects peaks in it with one of the
//! strategies in [`detect`], and refines the resulting [`peak_set::PeakSet`] by filtering,
//! scoring ([`metrics`]) and merging nearby peaks. Peaks can be saved to and restored
//! from JSON.
pub mod error;
pub mod interval;
pub mod peak;
pub mod peak_set;
pub mod sort;
pub mod signal;

pub mod detect;
pub mod metrics;
pub mod processing;
pub mod io;
pub mod picker;

pub mod prelude {
    pub use crate::detect::{DetectionResult, DifferentialParams, LocalMaxParams, PeakPropertiesParams};
    pub use crate::error::PickerError;
    pub use crate::interval::{MzRange, Span1D};
    pub use crate::peak::{AttributeValue, Peak, PeakAttribute};
    pub use crate::peak_set::{PeakSet, SortOrder};
    pub use crate::picker::{
        DifferentialPeakPicker, FilterCriteria, LocalMaxPeakPicker, PeakDetector, PeakPicker,
        PropertyPeakPicker, ScoreMetric,
    };
    pub use crate::processing::ProcessingStep;
}

pub use crate::error::PickerError;
pub use crate::peak::Peak;
pub use crate::peak_set::PeakSet;
pub use crate::picker::{DifferentialPeakPicker, LocalMaxPeakPicker, PeakPicker, PropertyPeakPicker};
