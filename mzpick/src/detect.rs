/*! Peak detection strategies over a one dimensional signal.

Each strategy scans `(x, y)` and produces a [`DetectionResult`], a set of parallel
columns describing every peak found: its apex and its left and right edges in both
coordinate and index space.

- [`find_peaks_in_spectrum_peak_properties`] filters local maxima by height, distance,
  prominence and width.
- [`find_peaks_in_spectrum_local_max`] accepts samples that dominate a fixed window.
- [`find_peaks_in_spectrum_peakutils`] looks for sign changes in the first derivative.
*/
use serde::{Deserialize, Serialize};

use crate::error::PickerError;
use crate::interval::{MzRange, Span1D};
use crate::peak::Peak;
use crate::peak_set::PeakSet;
use crate::signal::{derivative_peak_indices, find_peaks, peak_widths, PeakConditions};

/// The peaks found by a detector, as parallel columns.
///
/// The optional columns are absent from detector output and are filled with
/// defaults when the result is turned into a [`PeakSet`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub idx: Vec<usize>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub idx_fwhm: Vec<usize>,
    pub x_left: Vec<f64>,
    pub x_right: Vec<f64>,
    pub idx_left: Vec<usize>,
    pub idx_right: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "x_fwhm")]
    pub x_width: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_to_noise: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<Vec<f64>>,
}

impl DetectionResult {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            idx: Vec::with_capacity(capacity),
            x: Vec::with_capacity(capacity),
            y: Vec::with_capacity(capacity),
            idx_fwhm: Vec::with_capacity(capacity),
            x_left: Vec::with_capacity(capacity),
            x_right: Vec::with_capacity(capacity),
            idx_left: Vec::with_capacity(capacity),
            idx_right: Vec::with_capacity(capacity),
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.idx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idx.is_empty()
    }

    /// Record a peak with apex at `idx` extending `half_width` samples to either side,
    /// clamping the edges to the bounds of `x`.
    fn push_symmetric(&mut self, x: &[f64], y: &[f64], idx: usize, half_width: usize, full_width: usize) {
        let last = x.len().saturating_sub(1);
        let idx_left = idx.saturating_sub(half_width);
        let idx_right = (idx + half_width).min(last);
        self.idx.push(idx);
        self.x.push(x[idx]);
        self.y.push(y[idx]);
        self.idx_fwhm.push(full_width);
        self.x_left.push(x[idx_left]);
        self.x_right.push(x[idx_right]);
        self.idx_left.push(idx_left);
        self.idx_right.push(idx_right);
    }

    /// Check that every present column has the same length
    pub fn validate(&self) -> Result<(), PickerError> {
        let expected = self.len();
        let lengths = [
            self.x.len(),
            self.y.len(),
            self.idx_fwhm.len(),
            self.x_left.len(),
            self.x_right.len(),
            self.idx_left.len(),
            self.idx_right.len(),
            self.x_width.as_ref().map_or(expected, Vec::len),
            self.area.as_ref().map_or(expected, Vec::len),
            self.signal_to_noise.as_ref().map_or(expected, Vec::len),
            self.score.as_ref().map_or(expected, Vec::len),
        ];
        match lengths.iter().find(|n| **n != expected) {
            Some(received) => Err(PickerError::AttributeLengthMismatch {
                expected,
                received: *received,
            }),
            None => Ok(()),
        }
    }

    /// Build a [`PeakSet`] from the columns, filling absent ones: the width from the
    /// edges, the area from the height, a signal-to-noise ratio of 1 and a score of 100.
    pub fn to_peak_set(&self) -> Result<PeakSet, PickerError> {
        self.validate()?;
        let mut peaks = Vec::with_capacity(self.len());
        for i in 0..self.len() {
            let mut peak = Peak::new(
                self.x[i],
                self.y[i],
                self.idx[i],
                self.x_left[i],
                self.x_right[i],
                self.idx_left[i],
                self.idx_right[i],
            );
            peak.x_fwhm = self
                .x_width
                .as_ref()
                .map_or(self.x_right[i] - self.x_left[i], |v| v[i]);
            peak.idx_fwhm = self.idx_fwhm[i];
            peak.area = self.area.as_ref().map_or(self.y[i], |v| v[i]);
            peak.signal_to_noise = self.signal_to_noise.as_ref().map_or(1.0, |v| v[i]);
            peak.score = self.score.as_ref().map_or(100.0, |v| v[i]);
            peak.peak_id = i;
            peaks.push(peak);
        }
        Ok(PeakSet::new(peaks))
    }
}

fn in_range(mz_range: Option<&MzRange>, x: f64) -> bool {
    mz_range.map_or(true, |r| r.contains(x))
}

/// Parameters for [`find_peaks_in_spectrum_peak_properties`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakPropertiesParams {
    /// The minimum apex height
    pub threshold: f64,
    /// The minimum width, in samples, measured at `rel_height`
    pub width: f64,
    pub rel_height: f64,
    /// Fraction of the tallest peak in range that a peak must exceed
    pub min_intensity: f64,
    /// The minimum number of samples between neighboring peaks
    pub distance: usize,
    pub mz_range: Option<MzRange>,
    /// Scales the measured width before it is turned into edges
    pub peak_width_modifier: f64,
    pub prominence: f64,
}

impl Default for PeakPropertiesParams {
    fn default() -> Self {
        Self {
            threshold: 250.0,
            width: 0.0,
            rel_height: 0.5,
            min_intensity: 0.01,
            distance: 1,
            mz_range: None,
            peak_width_modifier: 1.0,
            prominence: 1.0,
        }
    }
}

/// Find peaks from the properties of the signal's local maxima.
///
/// Local maxima are filtered by `threshold`, `distance`, `prominence` and `width`,
/// then by `mz_range`, then by `min_intensity` relative to the tallest remaining
/// peak. Edges are placed half the (scaled) width away from the apex.
pub fn find_peaks_in_spectrum_peak_properties(
    x: &[f64],
    y: &[f64],
    params: &PeakPropertiesParams,
) -> DetectionResult {
    let conditions = PeakConditions {
        height: Some(params.threshold),
        distance: (params.distance >= 1).then_some(params.distance as f64),
        prominence: Some(params.prominence),
        width: Some(params.width),
        rel_height: params.rel_height,
    };
    let mut found = find_peaks(y, &conditions);

    if params.mz_range.is_some() {
        let mask: Vec<bool> = found
            .peaks
            .iter()
            .map(|i| in_range(params.mz_range.as_ref(), x[*i]))
            .collect();
        found.retain_mask(&mask);
    }

    let max_height = found.peak_heights.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let cutoff = max_height * params.min_intensity;
    let mask: Vec<bool> = found.peak_heights.iter().map(|h| *h > cutoff).collect();
    found.retain_mask(&mask);

    let mut result = DetectionResult::with_capacity(found.len());
    for (idx, width) in found.peaks.iter().zip(found.widths.widths.iter()) {
        let half_width = ((width / 2.0) * params.peak_width_modifier).ceil() as usize;
        let full_width = (width * params.peak_width_modifier).ceil() as usize;
        result.push_symmetric(x, y, *idx, half_width, full_width);
    }
    tracing::trace!("Peak property search found {} peaks", result.len());
    result
}

/// Parameters for [`find_peaks_in_spectrum_local_max`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalMaxParams {
    /// The number of samples on either side of a candidate it must dominate
    pub window: usize,
    /// Fraction of the signal's maximum that a peak must exceed
    pub min_intensity: f64,
    pub mz_range: Option<MzRange>,
    /// The relative height at which peak widths are measured
    pub rel_height: f64,
}

impl Default for LocalMaxParams {
    fn default() -> Self {
        Self {
            window: 10,
            min_intensity: 0.01,
            mz_range: None,
            rel_height: 0.5,
        }
    }
}

/// Find the indices of samples above `threshold * max(y)` that are the maximum of
/// the `window` samples on either side, skipping all but the first sample of a flat top.
///
/// A `window` of 0 is treated as 1 so that a sample is always compared to its neighbors.
pub fn find_peaks_local_max(y: &[f64], window: usize, threshold: f64) -> Vec<usize> {
    let n = y.len();
    if n == 0 {
        return Vec::new();
    }
    let window = window.max(1);
    let max_intensity = y.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let intensity_threshold = max_intensity * threshold;
    let mut peaks = Vec::new();
    for i in 1..n {
        let value = y[i];
        if value > intensity_threshold {
            let start = i.saturating_sub(window);
            let end = (i + window).min(n - 1);
            let test_value = y[start..=end].iter().copied().fold(f64::NEG_INFINITY, f64::max);
            if value == test_value && value != y[i - 1] {
                peaks.push(i);
            }
        }
    }
    peaks
}

fn widths_to_result(x: &[f64], y: &[f64], peaks: &[usize], rel_height: f64) -> DetectionResult {
    let mut result = DetectionResult::with_capacity(peaks.len());
    if peaks.is_empty() {
        return result;
    }
    let widths = peak_widths(y, peaks, rel_height);
    for (idx, width) in peaks.iter().zip(widths.widths.iter()) {
        let half_width = (width / 2.0).ceil() as usize;
        let full_width = width.ceil() as usize;
        result.push_symmetric(x, y, *idx, half_width, full_width);
    }
    result
}

/// Find peaks with a windowed local maximum search, measuring their widths at `rel_height`.
pub fn find_peaks_in_spectrum_local_max(x: &[f64], y: &[f64], params: &LocalMaxParams) -> DetectionResult {
    let peaks: Vec<usize> = find_peaks_local_max(y, params.window, params.min_intensity)
        .into_iter()
        .filter(|i| in_range(params.mz_range.as_ref(), x[*i]))
        .collect();
    if peaks.is_empty() {
        tracing::debug!("Local maximum search found no peaks");
    }
    widths_to_result(x, y, &peaks, params.rel_height)
}

/// Parameters for [`find_peaks_in_spectrum_peakutils`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DifferentialParams {
    /// Relative to the signal's range when below 1, otherwise an absolute height
    pub min_intensity: f64,
    /// The minimum number of samples between peaks
    pub min_distance: usize,
    pub mz_range: Option<MzRange>,
    pub rel_height: f64,
}

impl Default for DifferentialParams {
    fn default() -> Self {
        Self {
            min_intensity: 0.0,
            min_distance: 30,
            mz_range: None,
            rel_height: 0.5,
        }
    }
}

/// Find peaks from sign changes of the first derivative, measuring their widths at `rel_height`.
pub fn find_peaks_in_spectrum_peakutils(x: &[f64], y: &[f64], params: &DifferentialParams) -> DetectionResult {
    let threshold_abs = params.min_intensity >= 1.0;
    let peaks: Vec<usize> = derivative_peak_indices(y, params.min_intensity, params.min_distance, threshold_abs)
        .into_iter()
        .filter(|i| in_range(params.mz_range.as_ref(), x[*i]))
        .collect();
    widths_to_result(x, y, &peaks, params.rel_height)
}

#[cfg(test)]
mod test {
    use super::*;

    fn gaussian_signal() -> (Vec<f64>, Vec<f64>) {
        let x: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let y: Vec<f64> = x
            .iter()
            .map(|xi| {
                let bump = 10.0 * (-((xi - 50.0).powi(2)) / (2.0 * 3.0f64.powi(2))).exp();
                let ripple = 0.2 * (xi * 0.7).sin().abs();
                bump + ripple
            })
            .collect();
        (x, y)
    }

    #[test]
    fn test_peak_properties_single_bump() {
        let (x, y) = gaussian_signal();
        let params = PeakPropertiesParams {
            threshold: 1.0,
            min_intensity: 0.5,
            ..Default::default()
        };
        let result = find_peaks_in_spectrum_peak_properties(&x, &y, &params);
        assert_eq!(result.len(), 1);
        assert_eq!(result.idx[0], 50);
        assert!((result.y[0] - 10.0).abs() < 0.5);
        assert!(result.idx_left[0] < 50 && result.idx_right[0] > 50);
        assert_eq!(result.idx_right[0] - 50, 50 - result.idx_left[0]);
        result.validate().unwrap();
    }

    #[test]
    fn test_peak_properties_mz_range() {
        let (x, y) = gaussian_signal();
        let params = PeakPropertiesParams {
            threshold: 1.0,
            min_intensity: 0.0,
            mz_range: Some(MzRange::new(0.0, 40.0).unwrap()),
            ..Default::default()
        };
        let result = find_peaks_in_spectrum_peak_properties(&x, &y, &params);
        assert!(result.is_empty());
    }

    #[test]
    fn test_local_max_window_zero() {
        let y = [0.0, 2.0, 1.0, 3.0, 3.0, 1.0, 0.5, 0.6, 0.2];
        let peaks = find_peaks_local_max(&y, 0, 0.0);
        assert_eq!(peaks, vec![1, 3, 7]);
        for p in peaks {
            assert!(y[p] > y[p - 1]);
            assert!(y[p] >= y[p + 1]);
        }
        let peaks = find_peaks_local_max(&y, 2, 0.0);
        assert_eq!(peaks, vec![3]);
        let peaks = find_peaks_local_max(&y, 1, 0.5);
        assert_eq!(peaks, vec![1, 3]);
    }

    #[test]
    fn test_local_max_edges_clamped() {
        let x: Vec<f64> = (0..6).map(|i| i as f64 * 0.5).collect();
        let y = [0.0, 10.0, 0.0, 0.0, 0.0, 8.0];
        let result = find_peaks_in_spectrum_local_max(&x, &y, &LocalMaxParams::default());
        assert_eq!(result.idx, vec![1]);
        let params = LocalMaxParams {
            window: 1,
            ..Default::default()
        };
        let result = find_peaks_in_spectrum_local_max(&x, &y, &params);
        assert_eq!(result.idx, vec![1, 5]);
        assert_eq!(result.idx_right[1], 5);
        assert_eq!(result.x_right[1], 2.5);
        assert!(result.idx_left.iter().all(|i| *i < x.len()));
    }

    #[test]
    fn test_local_max_empty() {
        let x = [0.0, 1.0, 2.0];
        let y = [1.0, 1.0, 1.0];
        let result = find_peaks_in_spectrum_local_max(&x, &y, &LocalMaxParams::default());
        assert!(result.is_empty());
        assert!(result.to_peak_set().unwrap().is_empty());
    }

    #[test]
    fn test_peakutils_bump() {
        let (x, y) = gaussian_signal();
        let params = DifferentialParams {
            min_intensity: 0.5,
            ..Default::default()
        };
        let result = find_peaks_in_spectrum_peakutils(&x, &y, &params);
        assert_eq!(result.idx, vec![50]);
        assert!(result.idx_fwhm[0] >= 6);
    }

    #[test]
    fn test_to_peak_set_defaults() -> Result<(), PickerError> {
        let (x, y) = gaussian_signal();
        let params = PeakPropertiesParams {
            threshold: 1.0,
            ..Default::default()
        };
        let result = find_peaks_in_spectrum_peak_properties(&x, &y, &params);
        let peaks = result.to_peak_set()?;
        let peak = &peaks[0];
        assert_eq!(peak.signal_to_noise, 1.0);
        assert_eq!(peak.score, 100.0);
        assert_eq!(peak.area, peak.y);
        assert_eq!(peak.x_fwhm, peak.x_right - peak.x_left);

        let mut broken = result.clone();
        broken.score = Some(vec![]);
        assert!(matches!(
            broken.to_peak_set(),
            Err(PickerError::AttributeLengthMismatch { .. })
        ));
        Ok(())
    }
}
