/*! A single feature detected on a one dimensional signal */
use std::fmt::{self, Display};
use std::ops::Range;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::PickerError;

pub(crate) fn isclose(a: f64, b: f64, delta: f64) -> bool {
    (a - b).abs() < delta
}

/// The score a peak starts out with before any metric has been applied
pub const DEFAULT_SCORE: f64 = 100.0;

/// Represent a single peak picked from a signal.
///
/// Boundaries are recorded both in the signal's coordinate space (`x_left`, `x_right`)
/// and as indices into the arrays the peak was picked from (`idx_left`, `idx_right`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "PeakRecord")]
pub struct Peak {
    /// The coordinate (e.g. m/z) at which the peak achieves its maximal abundance
    pub x: f64,
    /// The apex height of the peak
    pub y: f64,
    /// The index at which the apex was found in the array it was picked from
    pub idx: usize,
    /// The left-hand side boundary coordinate
    pub x_left: f64,
    /// The right-hand side boundary coordinate
    pub x_right: f64,
    /// The left-hand side boundary index
    pub idx_left: usize,
    /// The right-hand side boundary index
    pub idx_right: usize,
    /// The width of the peak in coordinate units
    pub x_fwhm: f64,
    /// The width of the peak in index units
    pub idx_fwhm: usize,
    /// The area of the peak. Until the peak is integrated this is the apex height.
    pub area: f64,
    pub signal_to_noise: f64,
    /// A quality score whose meaning depends upon the last metric applied
    pub score: f64,
    /// A presentation tag, independent of the numerical attributes
    pub color: Option<String>,
    /// The position of this peak in the owning [`PeakSet`](crate::peak_set::PeakSet)
    pub peak_id: usize,
}

impl Peak {
    /// Create a new peak, deriving the widths from the boundaries and the
    /// area from the apex height.
    pub fn new(
        x: f64,
        y: f64,
        idx: usize,
        x_left: f64,
        x_right: f64,
        idx_left: usize,
        idx_right: usize,
    ) -> Self {
        Self {
            x,
            y,
            idx,
            x_left,
            x_right,
            idx_left,
            idx_right,
            x_fwhm: x_right - x_left,
            idx_fwhm: idx_right.saturating_sub(idx_left),
            area: y,
            signal_to_noise: 0.0,
            score: DEFAULT_SCORE,
            color: None,
            peak_id: 0,
        }
    }

    /// The height at which the full width at half maximum is measured
    pub fn fwhm_height(&self) -> f64 {
        self.y / 2.0
    }

    /// The index range spanned by this peak, padded by `window` on either side,
    /// usable to extract the peak's region from the signal arrays.
    pub fn as_slice(&self, window: usize) -> Range<usize> {
        self.idx_left.saturating_sub(window)..(self.idx_right + window + 1)
    }

    /// Read an attribute by name
    pub fn get(&self, attribute: PeakAttribute) -> AttributeValue {
        match attribute {
            PeakAttribute::X => AttributeValue::Float(self.x),
            PeakAttribute::Y => AttributeValue::Float(self.y),
            PeakAttribute::Idx => AttributeValue::Index(self.idx),
            PeakAttribute::XLeft => AttributeValue::Float(self.x_left),
            PeakAttribute::XRight => AttributeValue::Float(self.x_right),
            PeakAttribute::IdxLeft => AttributeValue::Index(self.idx_left),
            PeakAttribute::IdxRight => AttributeValue::Index(self.idx_right),
            PeakAttribute::XFwhm => AttributeValue::Float(self.x_fwhm),
            PeakAttribute::IdxFwhm => AttributeValue::Index(self.idx_fwhm),
            PeakAttribute::Area => AttributeValue::Float(self.area),
            PeakAttribute::SignalToNoise => AttributeValue::Float(self.signal_to_noise),
            PeakAttribute::Score => AttributeValue::Float(self.score),
            PeakAttribute::Color => AttributeValue::Text(self.color.clone()),
            PeakAttribute::PeakId => AttributeValue::Index(self.peak_id),
        }
    }

    /// Write an attribute by name, converting between numeric representations
    /// when it is lossless to do so.
    pub fn set(&mut self, attribute: PeakAttribute, value: AttributeValue) -> Result<(), PickerError> {
        let invalid = |value: AttributeValue| PickerError::InvalidAttributeValue { attribute, value };
        if attribute.is_index() {
            let v = match value.as_index() {
                Some(v) => v,
                None => return Err(invalid(value)),
            };
            match attribute {
                PeakAttribute::Idx => self.idx = v,
                PeakAttribute::IdxLeft => self.idx_left = v,
                PeakAttribute::IdxRight => self.idx_right = v,
                PeakAttribute::IdxFwhm => self.idx_fwhm = v,
                PeakAttribute::PeakId => self.peak_id = v,
                _ => unreachable!(),
            }
        } else if attribute.is_numeric() {
            let v = match value.as_f64() {
                Some(v) => v,
                None => return Err(invalid(value)),
            };
            match attribute {
                PeakAttribute::X => self.x = v,
                PeakAttribute::Y => self.y = v,
                PeakAttribute::XLeft => self.x_left = v,
                PeakAttribute::XRight => self.x_right = v,
                PeakAttribute::XFwhm => self.x_fwhm = v,
                PeakAttribute::Area => self.area = v,
                PeakAttribute::SignalToNoise => self.signal_to_noise = v,
                PeakAttribute::Score => self.score = v,
                _ => unreachable!(),
            }
        } else {
            match value {
                AttributeValue::Text(v) => self.color = v,
                _ => return Err(invalid(value)),
            }
        }
        Ok(())
    }

    /// Render the peak as the JSON object written by [`PeakPicker::save`](crate::picker::PeakPicker::save)
    pub fn to_json(&self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => unreachable!("A peak always serializes to an object"),
        }
    }
}

/// Peaks are compared on their apex position, signal-to-noise ratio and width alone.
impl PartialEq for Peak {
    fn eq(&self, other: &Self) -> bool {
        isclose(self.x, other.x, 1e-5)
            && isclose(self.signal_to_noise, other.signal_to_noise, 1e-5)
            && isclose(self.x_fwhm, other.x_fwhm, 1e-5)
    }
}

impl Display for Peak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Peak(x={:.3}; y={:.2}; signal-to-noise={}; fwhm={:.4}; area={}; width={}; index={})",
            self.x, self.y, self.signal_to_noise, self.x_fwhm, self.area, self.idx_fwhm, self.idx
        )
    }
}

/// JSON has no `NaN`, so a non-finite value is written as `null` and read back as `NaN`
fn null_as_nan<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(Some(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN)))
}

/// The serialized form of a [`Peak`]. Only the apex and boundaries are required,
/// everything else falls back to the same defaults as [`Peak::new`]. A measure
/// that is present but `null` is restored as `NaN` rather than its default.
///
/// The width is accepted as either `x_fwhm` or `x_width`.
#[derive(Debug, Clone, Deserialize)]
pub struct PeakRecord {
    pub x: f64,
    pub y: f64,
    pub idx: usize,
    pub x_left: f64,
    pub x_right: f64,
    pub idx_left: usize,
    pub idx_right: usize,
    #[serde(alias = "x_width", default, deserialize_with = "null_as_nan")]
    pub x_fwhm: Option<f64>,
    pub idx_fwhm: Option<usize>,
    #[serde(default, deserialize_with = "null_as_nan")]
    pub area: Option<f64>,
    #[serde(default, deserialize_with = "null_as_nan")]
    pub signal_to_noise: Option<f64>,
    #[serde(default, deserialize_with = "null_as_nan")]
    pub score: Option<f64>,
    pub color: Option<String>,
    pub peak_id: Option<usize>,
}

impl From<PeakRecord> for Peak {
    fn from(value: PeakRecord) -> Self {
        let mut peak = Peak::new(
            value.x,
            value.y,
            value.idx,
            value.x_left,
            value.x_right,
            value.idx_left,
            value.idx_right,
        );
        if let Some(x_fwhm) = value.x_fwhm {
            peak.x_fwhm = x_fwhm;
        }
        if let Some(idx_fwhm) = value.idx_fwhm {
            peak.idx_fwhm = idx_fwhm;
        }
        if let Some(area) = value.area {
            peak.area = area;
        }
        if let Some(signal_to_noise) = value.signal_to_noise {
            peak.signal_to_noise = signal_to_noise;
        }
        if let Some(score) = value.score {
            peak.score = score;
        }
        peak.color = value.color;
        peak.peak_id = value.peak_id.unwrap_or_default();
        peak
    }
}

/// The named attributes of a [`Peak`] that can be sorted, filtered or assigned by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeakAttribute {
    #[default]
    X,
    Y,
    Idx,
    XLeft,
    XRight,
    IdxLeft,
    IdxRight,
    #[serde(alias = "x_width")]
    XFwhm,
    IdxFwhm,
    Area,
    SignalToNoise,
    Score,
    Color,
    PeakId,
}

impl PeakAttribute {
    pub const fn name(&self) -> &'static str {
        match self {
            PeakAttribute::X => "x",
            PeakAttribute::Y => "y",
            PeakAttribute::Idx => "idx",
            PeakAttribute::XLeft => "x_left",
            PeakAttribute::XRight => "x_right",
            PeakAttribute::IdxLeft => "idx_left",
            PeakAttribute::IdxRight => "idx_right",
            PeakAttribute::XFwhm => "x_fwhm",
            PeakAttribute::IdxFwhm => "idx_fwhm",
            PeakAttribute::Area => "area",
            PeakAttribute::SignalToNoise => "signal_to_noise",
            PeakAttribute::Score => "score",
            PeakAttribute::Color => "color",
            PeakAttribute::PeakId => "peak_id",
        }
    }

    /// Whether the attribute is stored as an array index
    pub const fn is_index(&self) -> bool {
        matches!(
            self,
            PeakAttribute::Idx
                | PeakAttribute::IdxLeft
                | PeakAttribute::IdxRight
                | PeakAttribute::IdxFwhm
                | PeakAttribute::PeakId
        )
    }

    pub const fn is_numeric(&self) -> bool {
        !matches!(self, PeakAttribute::Color)
    }
}

impl Display for PeakAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PeakAttribute {
    type Err = PickerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let attr = match s {
            "x" => PeakAttribute::X,
            "y" => PeakAttribute::Y,
            "idx" => PeakAttribute::Idx,
            "x_left" => PeakAttribute::XLeft,
            "x_right" => PeakAttribute::XRight,
            "idx_left" => PeakAttribute::IdxLeft,
            "idx_right" => PeakAttribute::IdxRight,
            "x_fwhm" | "x_width" => PeakAttribute::XFwhm,
            "idx_fwhm" => PeakAttribute::IdxFwhm,
            "area" => PeakAttribute::Area,
            "signal_to_noise" => PeakAttribute::SignalToNoise,
            "score" => PeakAttribute::Score,
            "color" => PeakAttribute::Color,
            "peak_id" => PeakAttribute::PeakId,
            _ => return Err(PickerError::UnknownAttribute(s.to_string())),
        };
        Ok(attr)
    }
}

/// A dynamically typed attribute value read from or written to a [`Peak`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Index(usize),
    Float(f64),
    Text(Option<String>),
}

impl AttributeValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Index(i) => Some(*i as f64),
            AttributeValue::Float(v) => Some(*v),
            AttributeValue::Text(_) => None,
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            AttributeValue::Index(i) => Some(*i),
            AttributeValue::Float(v) if *v >= 0.0 && v.fract() == 0.0 => Some(*v as usize),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(v) => v.as_deref(),
            _ => None,
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<usize> for AttributeValue {
    fn from(value: usize) -> Self {
        Self::Index(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(Some(value.to_string()))
    }
}

impl From<Option<String>> for AttributeValue {
    fn from(value: Option<String>) -> Self {
        Self::Text(value)
    }
}
