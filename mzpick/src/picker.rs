/*! Peak pickers: own a signal, detect peaks in it and refine the resulting [`PeakSet`].

A [`PeakPicker`] is parameterized over a [`PeakDetector`], the parameter struct of one
of the detection strategies in [`crate::detect`]. Every operation that changes the
peaks is recorded in the picker's processing log so the pipeline can be exported
alongside the peaks it produced.

```
use mzpick::prelude::*;

let x: Vec<f64> = (0..100).map(|i| i as f64).collect();
let y: Vec<f64> = x.iter().map(|xi| 10.0 * (-(xi - 50.0).powi(2) / 18.0).exp()).collect();

let mut picker = PropertyPeakPicker::new(x, y).unwrap();
picker.find_peaks(PeakPropertiesParams { threshold: 1.0, ..Default::default() }).unwrap();
assert_eq!(picker.n_peaks(), 1);
```
*/
use std::any::type_name;
use std::fmt::{self, Debug, Display};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::detect::{
    find_peaks_in_spectrum_local_max, find_peaks_in_spectrum_peak_properties,
    find_peaks_in_spectrum_peakutils, DetectionResult, DifferentialParams, LocalMaxParams,
    PeakPropertiesParams,
};
use crate::error::PickerError;
use crate::interval::MzRange;
use crate::io::{read_json_data, write_json_data};
use crate::metrics::{compute_asymmetricity_and_tailing, compute_slopes};
use crate::peak::{AttributeValue, Peak, PeakAttribute};
use crate::peak_set::{PeakSet, SortOrder};
use crate::processing::ProcessingStep;
use crate::signal::{argmax, group_by};

/// The file name used when a processing log is saved to a directory
pub const PROCESSING_CONFIG_FILE: &str = "picker-config.json";
/// The file name used by [`PeakPicker::save_peaks`] when no path is given
pub const EXPORT_LIST_FILE: &str = "export-list.json";

/// A peak detection strategy, expressed by its parameters
pub trait PeakDetector: Debug + Clone + Serialize {
    /// The name of the picker using this strategy
    const NAME: &'static str;

    fn mz_range(&self) -> Option<MzRange>;

    fn set_mz_range(&mut self, mz_range: MzRange);

    /// The relative intensity threshold, which must lie in `[0, 1]`
    fn min_intensity(&self) -> f64;

    /// Scan `(x, y)` for peaks
    fn detect(&self, x: &[f64], y: &[f64]) -> DetectionResult;
}

impl PeakDetector for PeakPropertiesParams {
    const NAME: &'static str = "PropertyPeakPicker";

    fn mz_range(&self) -> Option<MzRange> {
        self.mz_range
    }

    fn set_mz_range(&mut self, mz_range: MzRange) {
        self.mz_range = Some(mz_range)
    }

    fn min_intensity(&self) -> f64 {
        self.min_intensity
    }

    fn detect(&self, x: &[f64], y: &[f64]) -> DetectionResult {
        find_peaks_in_spectrum_peak_properties(x, y, self)
    }
}

impl PeakDetector for LocalMaxParams {
    const NAME: &'static str = "LocalMaxPeakPicker";

    fn mz_range(&self) -> Option<MzRange> {
        self.mz_range
    }

    fn set_mz_range(&mut self, mz_range: MzRange) {
        self.mz_range = Some(mz_range)
    }

    fn min_intensity(&self) -> f64 {
        self.min_intensity
    }

    fn detect(&self, x: &[f64], y: &[f64]) -> DetectionResult {
        find_peaks_in_spectrum_local_max(x, y, self)
    }
}

impl PeakDetector for DifferentialParams {
    const NAME: &'static str = "DifferentialPeakPicker";

    fn mz_range(&self) -> Option<MzRange> {
        self.mz_range
    }

    fn set_mz_range(&mut self, mz_range: MzRange) {
        self.mz_range = Some(mz_range)
    }

    fn min_intensity(&self) -> f64 {
        self.min_intensity
    }

    fn detect(&self, x: &[f64], y: &[f64]) -> DetectionResult {
        find_peaks_in_spectrum_peakutils(x, y, self)
    }
}

/// The quality metric written into each peak's `score`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreMetric {
    #[default]
    Asymmetry,
    Tailing,
    #[serde(alias = "slopes")]
    Slope,
}

impl ScoreMetric {
    pub const fn name(&self) -> &'static str {
        match self {
            ScoreMetric::Asymmetry => "asymmetry",
            ScoreMetric::Tailing => "tailing",
            ScoreMetric::Slope => "slope",
        }
    }
}

impl Display for ScoreMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScoreMetric {
    type Err = PickerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asymmetry" => Ok(Self::Asymmetry),
            "tailing" => Ok(Self::Tailing),
            "slope" | "slopes" => Ok(Self::Slope),
            _ => Err(PickerError::UnsupportedMetric(s.to_string())),
        }
    }
}

/// How [`PeakPicker::clean_by`] and [`PeakPicker::filter_by`] select peaks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterCriteria {
    /// An inclusive range over a numeric attribute
    Range(f64, f64),
    /// An exact match on a text attribute
    Exact(String),
}

impl Display for FilterCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterCriteria::Range(lo, hi) => write!(f, "[{lo}, {hi}]"),
            FilterCriteria::Exact(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<(f64, f64)> for FilterCriteria {
    fn from(value: (f64, f64)) -> Self {
        Self::Range(value.0, value.1)
    }
}

impl From<&str> for FilterCriteria {
    fn from(value: &str) -> Self {
        Self::Exact(value.to_string())
    }
}

/// Owns a signal and the peaks detected in it.
///
/// A picker starts out unpopulated, becomes populated by [`PeakPicker::find_peaks`]
/// or one of the `set_from_*` methods, and is then refined in place. Operations that
/// need peaks fail with [`PickerError::NotPopulated`] until then.
#[derive(Clone)]
pub struct PeakPicker<D: PeakDetector> {
    x_array: Vec<f64>,
    y_array: Vec<f64>,
    peaks: Option<PeakSet>,
    locked: bool,
    processing: Vec<ProcessingStep>,
    _detector: PhantomData<D>,
}

/// Picks peaks by filtering local maxima on their height, prominence, width and spacing
pub type PropertyPeakPicker = PeakPicker<PeakPropertiesParams>;
/// Picks peaks that dominate a fixed window of their neighbors
pub type LocalMaxPeakPicker = PeakPicker<LocalMaxParams>;
/// Picks peaks from sign changes in the first derivative
pub type DifferentialPeakPicker = PeakPicker<DifferentialParams>;

impl<D: PeakDetector> Debug for PeakPicker<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(D::NAME)
            .field("points", &self.x_array.len())
            .field("peaks", &self.peaks)
            .field("locked", &self.locked)
            .field("processing", &self.processing)
            .finish()
    }
}

impl<D: PeakDetector> Display for PeakPicker<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}<{} points; {} peaks; locked={}>",
            D::NAME,
            self.x_array.len(),
            self.n_peaks(),
            self.locked
        )
    }
}

impl<D: PeakDetector> PeakPicker<D> {
    /// Create a picker over the signal `(x, y)`, which must have equal lengths
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Result<Self, PickerError> {
        if x.len() != y.len() {
            return Err(PickerError::LengthMismatch {
                x: x.len(),
                y: y.len(),
            });
        }
        Ok(Self {
            x_array: x,
            y_array: y,
            peaks: None,
            locked: false,
            processing: Vec::new(),
            _detector: PhantomData,
        })
    }

    /// Whether the picker has been marked as locked. This is advisory only, no
    /// operation consults it.
    pub fn locked(&self) -> bool {
        self.locked
    }

    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    pub fn x_array(&self) -> &[f64] {
        &self.x_array
    }

    pub fn y_array(&self) -> &[f64] {
        &self.y_array
    }

    pub fn peaks(&self) -> Option<&PeakSet> {
        self.peaks.as_ref()
    }

    pub fn peaks_mut(&mut self) -> Option<&mut PeakSet> {
        self.peaks.as_mut()
    }

    fn peaks_or_err(&self) -> Result<&PeakSet, PickerError> {
        self.peaks.as_ref().ok_or(PickerError::NotPopulated)
    }

    fn peaks_mut_or_err(&mut self) -> Result<&mut PeakSet, PickerError> {
        self.peaks.as_mut().ok_or(PickerError::NotPopulated)
    }

    pub fn n_peaks(&self) -> usize {
        self.peaks.as_ref().map_or(0, PeakSet::len)
    }

    /// Iterate over the peaks, which is empty until the picker is populated
    pub fn iter(&self) -> std::slice::Iter<'_, Peak> {
        self.peaks.as_ref().map_or(&[][..], PeakSet::as_slice).iter()
    }

    fn collect<T>(&self, f: impl Fn(&Peak) -> T) -> Vec<T> {
        self.iter().map(f).collect()
    }

    /// The apex position of every peak
    pub fn x(&self) -> Vec<f64> {
        self.collect(|p| p.x)
    }

    /// The apex height of every peak
    pub fn y(&self) -> Vec<f64> {
        self.collect(|p| p.y)
    }

    pub fn xy(&self) -> (Vec<f64>, Vec<f64>) {
        (self.x(), self.y())
    }

    /// The left and right edges of every peak in coordinate units
    pub fn x_window(&self) -> (Vec<f64>, Vec<f64>) {
        (self.collect(|p| p.x_left), self.collect(|p| p.x_right))
    }

    pub fn x_width(&self) -> Vec<f64> {
        self.collect(|p| p.x_fwhm)
    }

    /// The left and right edges of every peak in index units
    pub fn idx_window(&self) -> (Vec<usize>, Vec<usize>) {
        (self.collect(|p| p.idx_left), self.collect(|p| p.idx_right))
    }

    pub fn idx_width(&self) -> Vec<usize> {
        self.collect(|p| p.idx_fwhm)
    }

    /// The apex index of every peak
    pub fn idx_value(&self) -> Vec<usize> {
        self.collect(|p| p.idx)
    }

    pub fn scores(&self) -> Vec<f64> {
        self.collect(|p| p.score)
    }

    pub fn colors(&self) -> Vec<Option<String>> {
        self.collect(|p| p.color.clone())
    }

    fn prepare_params(&self, mut params: D) -> Result<D, PickerError> {
        match params.mz_range() {
            Some(r) => {
                params.set_mz_range(MzRange::new(r.start, r.end)?);
            }
            None => {
                if let Some(r) = MzRange::spanning(&self.x_array) {
                    params.set_mz_range(r);
                }
            }
        }
        let min_intensity = params.min_intensity();
        if !(0.0..=1.0).contains(&min_intensity) {
            return Err(PickerError::MinIntensityOutOfRange(min_intensity));
        }
        Ok(params)
    }

    /// Detect peaks in the signal, replacing any existing peaks.
    ///
    /// The processing log is reset and the detection recorded as its first step.
    /// When `params` carries no m/z range, the whole signal is searched.
    pub fn find_peaks(&mut self, params: D) -> Result<(), PickerError> {
        let params = self.prepare_params(params)?;
        self.reset_processing_steps();
        let found = params.detect(&self.x_array, &self.y_array);
        debug!("{} found {} peaks", D::NAME, found.len());
        self.add_processing_step("find_peaks", &params);
        self.set_from_dict(&found)
    }

    /// Run detection without changing the picker and return the raw result
    pub fn preview_peaks(&self, params: D) -> Result<DetectionResult, PickerError> {
        let params = self.prepare_params(params)?;
        Ok(params.detect(&self.x_array, &self.y_array))
    }

    fn filter_indices(
        &self,
        key: PeakAttribute,
        criteria: &FilterCriteria,
    ) -> Result<Vec<usize>, PickerError> {
        let invalid = || PickerError::InvalidCriteria {
            attribute: key,
            criteria: criteria.to_string(),
        };
        let peaks = self.peaks_or_err()?;
        let mut indices = Vec::new();
        for (i, peak) in peaks.iter().enumerate() {
            let value = peak.get(key);
            let keep = match (criteria, key.is_numeric()) {
                (FilterCriteria::Range(lo, hi), true) => {
                    let v = value.as_f64().ok_or_else(invalid)?;
                    *lo <= v && v <= *hi
                }
                (FilterCriteria::Exact(s), false) => value.as_text() == Some(s.as_str()),
                _ => return Err(invalid()),
            };
            if keep {
                indices.push(i);
            }
        }
        Ok(indices)
    }

    fn func_indices<F: FnMut(&Peak) -> bool>(&self, mut func: F) -> Vec<usize> {
        self.iter()
            .enumerate()
            .filter_map(|(i, p)| func(p).then_some(i))
            .collect()
    }

    /// Keep only the peaks whose `key` attribute satisfies `criteria`
    pub fn clean_by(&mut self, key: PeakAttribute, criteria: FilterCriteria) -> Result<(), PickerError> {
        let indices = self.filter_indices(key, &criteria)?;
        let peaks = self.peaks_or_err()?.select(&indices)?;
        debug!(
            "Removed {} peaks [key={key}; criteria={criteria}]",
            self.n_peaks() - indices.len()
        );
        self.set_from_peak_set(peaks);
        self.add_processing_step("clean_by", json!({"key": key, "criteria": criteria}));
        Ok(())
    }

    /// Keep only the peaks for which `func` returns `true`
    pub fn clean_by_func<F: FnMut(&Peak) -> bool>(&mut self, func: F) -> Result<(), PickerError> {
        let indices = self.func_indices(func);
        let peaks = self.peaks_or_err()?.select(&indices)?;
        debug!("Removed {} peaks", self.n_peaks() - indices.len());
        self.set_from_peak_set(peaks);
        self.add_processing_step("clean_by_func", json!({"func": type_name::<F>()}));
        Ok(())
    }

    /// A copy of this picker holding only the peaks whose `key` attribute satisfies `criteria`
    pub fn filter_by(&self, key: PeakAttribute, criteria: FilterCriteria) -> Result<Self, PickerError> {
        let indices = self.filter_indices(key, &criteria)?;
        let peaks = self.peaks_or_err()?.select(&indices)?;
        debug!(
            "Filtered out {} peaks [key={key}; criteria={criteria}]",
            self.n_peaks() - indices.len()
        );
        let mut dup = self.clone();
        dup.set_from_peak_set(peaks);
        Ok(dup)
    }

    /// A copy of this picker holding only the peaks for which `func` returns `true`
    pub fn filter_by_func<F: FnMut(&Peak) -> bool>(&self, func: F) -> Result<Self, PickerError> {
        let indices = self.func_indices(func);
        let peaks = self.peaks_or_err()?.select(&indices)?;
        debug!("Filtered out {} peaks", self.n_peaks() - indices.len());
        let mut dup = self.clone();
        dup.set_from_peak_set(peaks);
        Ok(dup)
    }

    /// Re-read every peak's height from the signal at its apex index
    pub fn fix_y(&mut self) -> Result<(), PickerError> {
        let length = self.y_array.len();
        let peaks = self.peaks.as_mut().ok_or(PickerError::NotPopulated)?;
        for peak in peaks.iter_mut() {
            peak.y = *self.y_array.get(peak.idx).ok_or(PickerError::IndexOutOfBounds {
                index: peak.idx,
                length,
            })?;
        }
        Ok(())
    }

    /// Delete the peaks at `indices`
    pub fn remove(&mut self, indices: &[usize]) -> Result<(), PickerError> {
        self.peaks_mut_or_err()?.remove(indices, false)
    }

    pub fn sort_by(&mut self, key: PeakAttribute, order: SortOrder) -> Result<(), PickerError> {
        self.peaks_mut_or_err()?.reindex_by(key, order);
        Ok(())
    }

    /// Sort peaks by position, ascending
    pub fn sort_by_x(&mut self) -> Result<(), PickerError> {
        self.sort_by(PeakAttribute::X, SortOrder::Ascending)
    }

    /// Sort peaks by height, descending
    pub fn sort_by_y(&mut self) -> Result<(), PickerError> {
        self.sort_by(PeakAttribute::Y, SortOrder::Descending)
    }

    pub fn add_processing_step(&mut self, method: &str, parameters: impl Serialize) {
        self.processing.push(ProcessingStep::new(method, parameters));
    }

    pub fn reset_processing_steps(&mut self) {
        self.processing.clear();
    }

    pub fn processing_steps(&self) -> &[ProcessingStep] {
        &self.processing
    }

    /// Write the processing log as JSON. If `path` is not a `.json` file, it is
    /// treated as a directory and [`PROCESSING_CONFIG_FILE`] is written inside it.
    /// Nothing is written when the log is empty.
    pub fn save_processing_steps<P: AsRef<Path>>(&self, path: P) -> Result<(), PickerError> {
        let mut path = path.as_ref().to_path_buf();
        if path.extension().map_or(true, |e| e != "json") {
            path = path.join(PROCESSING_CONFIG_FILE);
        }
        if !self.processing.is_empty() {
            write_json_data(&path, &self.processing, false)?;
        }
        Ok(())
    }

    /// Write every peak to `path` as a JSON list of objects, each extended with `extras`.
    ///
    /// Unless `overwrite` is set, peaks already in the file are kept and exact
    /// duplicates dropped.
    pub fn save<P: AsRef<Path>>(
        &self,
        path: P,
        overwrite: bool,
        extras: &Map<String, Value>,
    ) -> Result<(), PickerError> {
        let peaks = self.peaks_or_err()?;
        let export: Vec<Value> = peaks
            .iter()
            .map(|peak| {
                let mut record = peak.to_json();
                record.extend(extras.iter().map(|(k, v)| (k.clone(), v.clone())));
                Value::Object(record)
            })
            .collect();
        write_json_data(path, &export, !overwrite)
    }

    /// Replace the peaks with those saved to `path` by [`PeakPicker::save`]
    pub fn restore<P: AsRef<Path>>(&mut self, path: P) -> Result<(), PickerError> {
        let data = read_json_data(path)?;
        let records: Vec<Peak> = serde_json::from_value(data)?;
        self.set_from_list(records);
        Ok(())
    }

    /// Save the peaks along with the details needed to extract them from the raw data
    /// at `dataset_dir`. The file defaults to [`EXPORT_LIST_FILE`] inside `export_dir`.
    pub fn save_peaks(
        &self,
        dataset_dir: &str,
        export_dir: &Path,
        x_offset: f64,
        path: Option<&Path>,
        overwrite: bool,
    ) -> Result<PathBuf, PickerError> {
        let path = path.map_or_else(|| export_dir.join(EXPORT_LIST_FILE), Path::to_path_buf);
        let mut extras = Map::new();
        extras.insert("dataset_dir".into(), json!(dataset_dir));
        extras.insert("export_dir".into(), json!(export_dir.to_string_lossy()));
        extras.insert("applied_offset".into(), json!(false));
        extras.insert("x_offset".into(), json!(x_offset));
        self.save(&path, overwrite, &extras)?;
        info!("Exported extraction list to {}", path.display());
        Ok(path)
    }

    fn check_indices(&self) -> Result<(), PickerError> {
        let length = self.y_array.len();
        for peak in self.iter() {
            for index in [peak.idx_left, peak.idx, peak.idx_right] {
                if index >= length {
                    return Err(PickerError::IndexOutOfBounds { index, length });
                }
            }
        }
        Ok(())
    }

    /// Compute `metric` for every peak and store it as the peak's score.
    ///
    /// When `reorder` is set the peaks are then sorted by score, descending.
    pub fn score(&mut self, metric: ScoreMetric, reorder: bool) -> Result<(), PickerError> {
        self.check_indices()?;
        let peaks = self.peaks_or_err()?;
        let values = match metric {
            ScoreMetric::Asymmetry | ScoreMetric::Tailing => {
                let scores = compute_asymmetricity_and_tailing(&self.y_array, &self.idx_value());
                if metric == ScoreMetric::Asymmetry {
                    scores.asymmetry
                } else {
                    scores.tailing
                }
            }
            ScoreMetric::Slope => compute_slopes(&self.x_array, &self.y_array, peaks)?,
        };
        self.set_attribute(
            PeakAttribute::Score,
            values.into_iter().map(AttributeValue::Float).collect(),
        )?;
        if reorder {
            self.sort_by(PeakAttribute::Score, SortOrder::Descending)?;
        }
        self.add_processing_step("score", json!({"metric": metric, "reorder": reorder}));
        Ok(())
    }

    /// Merge peaks lying within `tolerance` of each other, repeating up to `n_passes`
    /// times or until a pass finds nothing to merge.
    pub fn merge_nearby(&mut self, tolerance: f64, n_passes: usize) -> Result<(), PickerError> {
        self.peaks_or_err()?;
        for _ in 0..n_passes {
            let start = Instant::now();
            let (count, n_groups) = self.merge_pass(tolerance)?;
            debug!(
                "Merged {count} -> {n_groups} with tolerance {tolerance} in {:0.3?}",
                start.elapsed()
            );
            if n_groups == 0 {
                break;
            }
        }
        self.add_processing_step(
            "merge_nearby",
            json!({"tolerance": tolerance, "n_passes": n_passes}),
        );
        Ok(())
    }

    /// Run a single merge pass, returning the number of peaks consumed and the
    /// number of merged peaks produced.
    pub fn merge_pass(&mut self, tolerance: f64) -> Result<(usize, usize), PickerError> {
        let peaks = self.peaks.as_mut().ok_or(PickerError::NotPopulated)?;
        // grouping requires a descending x order
        peaks.sort_transient(PeakAttribute::X, SortOrder::Descending);
        let xs: Vec<f64> = peaks.iter().map(|p| p.x).collect();
        let groups = group_by(&xs, tolerance);

        let mut merged = Vec::with_capacity(groups.len());
        let mut consumed = Vec::new();
        for group in groups.iter() {
            let members: Vec<&Peak> = group.iter().map(|i| &peaks[*i]).collect();
            merged.push(Self::merge_peaks(&self.x_array, &self.y_array, &members)?);
            consumed.extend_from_slice(group);
        }
        let count = consumed.len();
        peaks.remove(&consumed, false)?;
        peaks.add(merged, true);
        Ok((count, groups.len()))
    }

    /// Combine `peaks` into a single peak spanning all of their edges, whose apex is
    /// the highest sample of `y` from the leftmost edge up to, but excluding, the
    /// rightmost edge.
    ///
    /// The merged peak scores 0 if its apex falls on either edge, 100 otherwise.
    pub fn merge_peaks(x: &[f64], y: &[f64], peaks: &[&Peak]) -> Result<Peak, PickerError> {
        let length = y.len().min(x.len());
        let (first, rest) = peaks.split_first().ok_or(PickerError::NotPopulated)?;
        let (mut idx_left, mut idx_right) = (first.idx_left, first.idx_right);
        let (mut x_left, mut x_right) = (first.x_left, first.x_right);
        for peak in rest {
            idx_left = idx_left.min(peak.idx_left);
            idx_right = idx_right.max(peak.idx_right);
            x_left = x_left.min(peak.x_left);
            x_right = x_right.max(peak.x_right);
        }

        let end = idx_right.min(length);
        let idx = if idx_left < end {
            idx_left + argmax(&y[idx_left..end]).unwrap_or_default()
        } else if idx_left < length {
            idx_left
        } else {
            return Err(PickerError::IndexOutOfBounds {
                index: idx_left,
                length,
            });
        };
        let score = if idx == idx_left || idx == idx_right {
            0.0
        } else {
            100.0
        };
        let apex = y[idx];
        let mut peak = Peak::new(x[idx], apex, idx, x_left, x_right, idx_left, idx_right);
        peak.x_fwhm = (x_right - x_left).abs();
        peak.idx_fwhm = idx_right - idx_left;
        peak.area = apex;
        peak.signal_to_noise = 1.0;
        peak.score = score;
        Ok(peak)
    }

    /// Build a [`PeakSet`] from detector output
    pub fn get_from_dict(found: &DetectionResult) -> Result<PeakSet, PickerError> {
        found.to_peak_set()
    }

    pub fn set_from_dict(&mut self, found: &DetectionResult) -> Result<(), PickerError> {
        self.peaks = Some(Self::get_from_dict(found)?);
        Ok(())
    }

    /// Build a [`PeakSet`] from deserialized peak records
    pub fn get_from_list(peaks: Vec<Peak>) -> PeakSet {
        PeakSet::new(peaks)
    }

    pub fn set_from_list(&mut self, peaks: Vec<Peak>) {
        self.peaks = Some(Self::get_from_list(peaks));
    }

    pub fn set_from_peak_set(&mut self, peaks: PeakSet) -> &mut Self {
        self.peaks = Some(peaks);
        self
    }

    /// Assign `values[i]` to attribute `key` of the `i`th peak
    pub fn set_attribute(&mut self, key: PeakAttribute, values: Vec<AttributeValue>) -> Result<(), PickerError> {
        let expected = self.n_peaks();
        if values.len() != expected {
            return Err(PickerError::AttributeLengthMismatch {
                expected,
                received: values.len(),
            });
        }
        let peaks = self.peaks_mut_or_err()?;
        for (peak, value) in peaks.iter_mut().zip(values) {
            peak.set(key, value)?;
        }
        Ok(())
    }

    /// Assign several attributes of the peak at position `peak_id`, then re-index
    pub fn update_peak(
        &mut self,
        peak_id: usize,
        values: impl IntoIterator<Item = (PeakAttribute, AttributeValue)>,
    ) -> Result<(), PickerError> {
        let peaks = self.peaks_mut_or_err()?;
        let length = peaks.len();
        let peak = peaks.get_mut(peak_id).ok_or(PickerError::IndexOutOfBounds {
            index: peak_id,
            length,
        })?;
        for (key, value) in values {
            peak.set(key, value)?;
        }
        peaks.reindex();
        Ok(())
    }

    /// The most intense peak within `tolerance` relative error of `x`
    pub fn get(&self, x: f64, tolerance: f64) -> Option<&Peak> {
        self.peaks.as_ref()?.has_peak(x, tolerance)
    }
}

impl<'a, D: PeakDetector> IntoIterator for &'a PeakPicker<D> {
    type Item = &'a Peak;
    type IntoIter = std::slice::Iter<'a, Peak>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn two_bump_signal() -> (Vec<f64>, Vec<f64>) {
        let x: Vec<f64> = (0..200).map(|i| 100.0 + i as f64 * 0.1).collect();
        let y: Vec<f64> = (0..200)
            .map(|i| {
                let i = i as f64;
                1000.0 * (-(i - 50.0).powi(2) / 18.0).exp() + 500.0 * (-(i - 140.0).powi(2) / 8.0).exp()
            })
            .collect();
        (x, y)
    }

    fn picked() -> PropertyPeakPicker {
        let (x, y) = two_bump_signal();
        let mut picker = PropertyPeakPicker::new(x, y).unwrap();
        picker
            .find_peaks(PeakPropertiesParams {
                threshold: 10.0,
                ..Default::default()
            })
            .unwrap();
        picker
    }

    #[test]
    fn test_construction() {
        assert!(matches!(
            PropertyPeakPicker::new(vec![1.0, 2.0], vec![1.0]),
            Err(PickerError::LengthMismatch { x: 2, y: 1 })
        ));
        let picker = LocalMaxPeakPicker::new(vec![1.0], vec![1.0]).unwrap();
        assert_eq!(picker.n_peaks(), 0);
        assert!(picker.peaks().is_none());
        assert_eq!(
            picker.to_string(),
            "LocalMaxPeakPicker<1 points; 0 peaks; locked=false>"
        );
    }

    #[test]
    fn test_find_peaks() {
        let picker = picked();
        assert_eq!(picker.n_peaks(), 2);
        assert_eq!(picker.idx_value(), vec![50, 140]);
        let steps = picker.processing_steps();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].method, "find_peaks");
        let mz_range = steps[0].parameters["mz_range"].as_array().unwrap();
        assert_eq!(mz_range[0], json!(100.0));
        assert!((mz_range[1].as_f64().unwrap() - 119.9).abs() < 1e-9);
        assert_eq!(steps[0].parameters["threshold"], json!(10.0));
    }

    #[test]
    fn test_find_peaks_validation() {
        let (x, y) = two_bump_signal();
        let mut picker = PropertyPeakPicker::new(x, y).unwrap();
        let err = picker.find_peaks(PeakPropertiesParams {
            min_intensity: 1.5,
            ..Default::default()
        });
        assert!(matches!(err, Err(PickerError::MinIntensityOutOfRange(_))));
        let err = picker.find_peaks(PeakPropertiesParams {
            mz_range: Some(MzRange {
                start: 200.0,
                end: 100.0,
            }),
            ..Default::default()
        });
        assert!(matches!(err, Err(PickerError::InvalidMzRange(_, _))));
        assert!(picker.peaks().is_none());
    }

    #[test]
    fn test_preview_does_not_mutate() {
        let (x, y) = two_bump_signal();
        let picker = DifferentialPeakPicker::new(x, y).unwrap();
        let found = picker
            .preview_peaks(DifferentialParams {
                min_intensity: 0.1,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(found.idx, vec![50, 140]);
        assert_eq!(picker.n_peaks(), 0);
        assert!(picker.processing_steps().is_empty());
    }

    #[test]
    fn test_clean_and_filter() -> Result<(), PickerError> {
        let mut picker = picked();
        let filtered = picker.filter_by(PeakAttribute::Y, FilterCriteria::Range(600.0, 2000.0))?;
        assert_eq!(filtered.n_peaks(), 1);
        assert_eq!(picker.n_peaks(), 2);

        let filtered = picker.filter_by_func(|p| p.idx > 100)?;
        assert_eq!(filtered.idx_value(), vec![140]);

        picker.set_attribute(
            PeakAttribute::Color,
            vec!["#98FB98".into(), "#FFCCCB".into()],
        )?;
        picker.clean_by(PeakAttribute::Color, "#FFCCCB".into())?;
        assert_eq!(picker.idx_value(), vec![140]);
        assert_eq!(picker.processing_steps().last().unwrap().method, "clean_by");

        assert!(matches!(
            picker.clean_by(PeakAttribute::X, "red".into()),
            Err(PickerError::InvalidCriteria { .. })
        ));
        picker.clean_by_func(|p| p.y > 1e6)?;
        assert_eq!(picker.n_peaks(), 0);
        Ok(())
    }

    #[test]
    fn test_set_attribute_length() {
        let mut picker = picked();
        assert!(matches!(
            picker.set_attribute(PeakAttribute::Score, vec![1.0.into()]),
            Err(PickerError::AttributeLengthMismatch {
                expected: 2,
                received: 1
            })
        ));
    }

    #[test]
    fn test_sorting_and_update() -> Result<(), PickerError> {
        let mut picker = picked();
        picker.sort_by_y()?;
        assert_eq!(picker.idx_value(), vec![50, 140]);
        picker.update_peak(1, [(PeakAttribute::Y, AttributeValue::Float(5000.0))])?;
        assert_eq!(picker.idx_value(), vec![140, 50]);
        picker.fix_y()?;
        picker.sort_by_x()?;
        assert_eq!(picker.idx_value(), vec![50, 140]);
        assert!((picker.y()[1] - 500.0).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_get() {
        let picker = picked();
        let peak = picker.get(105.0, 1e-4).unwrap();
        assert_eq!(peak.idx, 50);
        assert!(picker.get(107.0, 1e-4).is_none());
    }

    #[test]
    fn test_score_metrics() -> Result<(), PickerError> {
        let mut picker = picked();
        picker.score(ScoreMetric::Asymmetry, true)?;
        assert!(picker.scores().iter().all(|s| (0.0..=100.0).contains(s)));
        let scores = picker.scores();
        assert!(scores[0] >= scores[1]);
        assert_eq!(picker.peaks().unwrap().index_key(), PeakAttribute::Score);

        picker.score(ScoreMetric::Tailing, false)?;
        picker.score("slopes".parse()?, false)?;
        assert!(matches!(
            "width".parse::<ScoreMetric>(),
            Err(PickerError::UnsupportedMetric(_))
        ));
        assert_eq!(picker.processing_steps().len(), 4);
        Ok(())
    }

    #[test]
    fn test_unpopulated() {
        let (x, y) = two_bump_signal();
        let mut picker = PropertyPeakPicker::new(x, y).unwrap();
        assert!(matches!(
            picker.merge_nearby(0.1, 3),
            Err(PickerError::NotPopulated)
        ));
        assert!(matches!(
            picker.score(ScoreMetric::Asymmetry, true),
            Err(PickerError::NotPopulated)
        ));
        assert!(picker.get(105.0, 1e-4).is_none());
    }

    #[test]
    fn test_merge_peaks_half_open() -> Result<(), PickerError> {
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y = vec![0.0, 1.0, 2.0, 3.0, 4.0, 9.0, 1.0, 0.0, 0.0, 0.0];
        let a = Peak::new(2.0, 2.0, 2, 1.0, 3.0, 1, 3);
        let b = Peak::new(3.0, 3.0, 3, 2.0, 5.0, 2, 5);
        // the tallest sample sits at the right edge, which is excluded
        let merged = PropertyPeakPicker::merge_peaks(&x, &y, &[&a, &b])?;
        assert_eq!(merged.idx, 4);
        assert_eq!(merged.score, 100.0);
        assert_eq!((merged.idx_left, merged.idx_right), (1, 5));
        assert_eq!(merged.idx_fwhm, 4);
        assert_eq!(merged.x_fwhm, 4.0);
        assert_eq!(merged.area, 4.0);
        assert_eq!(merged.signal_to_noise, 1.0);
        Ok(())
    }
}
