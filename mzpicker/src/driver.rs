use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::thread;
use std::time::Instant;

use clap::parser::ValueSource;
use clap::{ArgMatches, FromArgMatches, Parser};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, info};

use mzdata::io::MassSpectrometryFormat;
use mzdata::spectrum::bindata::ArrayRetrievalError;

use mzpick::prelude::*;

use crate::args::{fraction_f64, non_negative_float_f64, DetectionMethod, KeepCriterion};
use crate::progress::ProgressRecord;
use crate::reader::read_signal;

/// The configuration file read from the working directory when present
pub const DEFAULT_CONFIG_FILE: &str = "mzpicker.toml";
/// The prefix of environment variables overriding configuration values
pub const ENV_PREFIX: &str = "MZPICKER_";

#[derive(Debug, Error)]
pub enum MZPickerError {
    #[error("An IO error occurred: {0}")]
    IOError(
        #[source]
        #[from]
        io::Error,
    ),
    #[error("A peak picking error occurred: {0}")]
    PickerError(
        #[source]
        #[from]
        PickerError,
    ),
    #[error("Failed to read signal arrays: {0}")]
    ArrayRetrievalError(
        #[source]
        #[from]
        ArrayRetrievalError,
    ),
    #[error("Failed to parse arguments: {0}")]
    ArgumentError(
        #[source]
        #[from]
        clap::Error,
    ),
    #[error("Failed to read configuration: {0}")]
    ConfigurationError(
        #[source]
        #[from]
        Box<figment::Error>,
    ),
    #[error("Failed to build thread pool: {0}")]
    ThreadPoolError(
        #[source]
        #[from]
        rayon::ThreadPoolBuildError,
    ),
    #[error("The input file format for {0} was either unknown or not supported ({1:?})")]
    FormatUnknownOrNotSupportedError(String, MassSpectrometryFormat),
    #[error("No spectrum at index {1} in {0}")]
    SpectrumNotFound(String, usize),
    #[error("The spectrum read from {0} has no signal arrays")]
    NoSignal(String),
    #[error("Failed to parse line {line_number} of {path}: {content:?}")]
    MalformedLine {
        path: String,
        line_number: usize,
        content: String,
    },
}

impl From<figment::Error> for MZPickerError {
    fn from(value: figment::Error) -> Self {
        Self::ConfigurationError(Box::new(value))
    }
}

/// Peak picking of mass spectra and mobilograms.
///
/// Read one or more signals, detect and refine their peaks, and write the peaks and
/// the steps that produced them as JSON.
#[derive(Parser, Debug, Clone, Deserialize, Serialize)]
#[command(author, version)]
#[serde(default)]
pub struct MZPicker {
    /// The paths to read signals from, either delimited `x y` text (optionally
    /// gzip compressed) or mzML
    #[arg(required = true)]
    pub input_files: Vec<PathBuf>,

    /// The directory to write `<stem>.peaks.json` and `<stem>.picker-config.json` to
    #[arg(short = 'o', long = "output-dir", default_value = ".")]
    pub output_dir: PathBuf,

    /// The path to write a log file to, in addition to STDERR
    #[arg(short = 'l', long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// A TOML configuration file to read additional parameters from.
    ///
    /// Configurations are also read from `mzpicker.toml` in the working directory.
    /// Environment variables prefixed with `MZPICKER_` will be read too.
    #[arg(long = "config-file")]
    pub config_file: Option<PathBuf>,

    /// The number of threads to use, passing a value < 1 to use all available threads
    #[arg(
        short='t',
        long="threads",
        default_value_t=-1,
    )]
    pub threads: i32,

    /// The index of the spectrum to read from mzML inputs
    #[arg(short = 'i', long = "spectrum-index", default_value_t = 0)]
    pub spectrum_index: usize,

    /// The peak detection method to use
    #[arg(short = 'm', long = "method", default_value = "property")]
    pub method: DetectionMethod,

    /// The minimum apex height for the property method
    #[arg(long = "threshold", default_value_t = 250.0)]
    pub threshold: f64,

    /// The minimum peak width in samples for the property method
    #[arg(long = "width", default_value_t = 0.0, value_parser = non_negative_float_f64)]
    pub width: f64,

    /// The relative height at which peak widths are measured
    #[arg(long = "rel-height", default_value_t = 0.5, value_parser = fraction_f64)]
    pub rel_height: f64,

    /// The minimum number of samples between peaks for the property method
    #[arg(long = "distance", default_value_t = 1)]
    pub distance: usize,

    /// The minimum peak prominence for the property method
    #[arg(long = "prominence", default_value_t = 1.0, value_parser = non_negative_float_f64)]
    pub prominence: f64,

    /// The factor applied to measured widths when placing peak edges for the property method
    #[arg(long = "peak-width-modifier", default_value_t = 1.0, value_parser = non_negative_float_f64)]
    pub peak_width_modifier: f64,

    /// The number of samples on either side a peak must dominate for the local-max method
    #[arg(long = "window", default_value_t = 10)]
    pub window: usize,

    /// The minimum number of samples between peaks for the differential method
    #[arg(long = "min-distance", default_value_t = 30)]
    pub min_distance: usize,

    /// The fraction of the tallest peak a peak must exceed, defaulting to 0.01
    /// for the property and local-max methods and 0 for the differential method
    #[arg(long = "min-intensity", value_parser = fraction_f64)]
    pub min_intensity: Option<f64>,

    /// The inclusive range of apex positions to keep, denoted LOW-HIGH
    #[arg(
        short = 'r',
        long = "mz-range",
        value_parser = MzRange::from_str,
        value_name = "LOW-HIGH",
    )]
    pub mz_range: Option<MzRange>,

    /// Keep only peaks whose attribute lies within a range, denoted KEY=LOW:HIGH.
    ///
    /// May be repeated. Either bound may be omitted.
    #[arg(short = 'k', long = "keep", value_parser = KeepCriterion::from_str, value_name = "KEY=LOW:HIGH")]
    pub keep: Vec<KeepCriterion>,

    /// Merge peaks lying within this distance of each other
    #[arg(long = "merge-tolerance", value_parser = non_negative_float_f64)]
    pub merge_tolerance: Option<f64>,

    /// The maximum number of merge passes to run
    #[arg(long = "merge-passes", default_value_t = 3)]
    pub merge_passes: usize,

    /// Score peaks by this metric and order them by score
    #[arg(short = 's', long = "score", value_parser = ScoreMetric::from_str)]
    pub score: Option<ScoreMetric>,

    /// Replace existing peak files instead of merging into them
    #[arg(long = "overwrite")]
    pub overwrite: bool,
}

impl Default for MZPicker {
    fn default() -> Self {
        Self {
            input_files: Vec::new(),
            output_dir: PathBuf::from("."),
            log_file: None,
            config_file: None,
            threads: -1,
            spectrum_index: 0,
            method: DetectionMethod::default(),
            threshold: 250.0,
            width: 0.0,
            rel_height: 0.5,
            distance: 1,
            prominence: 1.0,
            peak_width_modifier: 1.0,
            window: 10,
            min_distance: 30,
            min_intensity: None,
            mz_range: None,
            keep: Vec::new(),
            merge_tolerance: None,
            merge_passes: 3,
            score: None,
            overwrite: false,
        }
    }
}

impl MZPicker {
    /// Build the configuration from parsed command line arguments.
    ///
    /// Defaults are overridden by [`DEFAULT_CONFIG_FILE`], then by `--config-file`, then by
    /// [`ENV_PREFIX`] variables, and finally by the arguments given on the command line.
    pub fn configure(matches: &ArgMatches) -> Result<Self, MZPickerError> {
        let args = Self::from_arg_matches(matches)?;
        let explicit = args.explicit_values(matches)?;
        debug!("Explicit arguments: {explicit:?}");

        let mut config = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(DEFAULT_CONFIG_FILE));
        if let Some(path) = args.config_file.as_ref() {
            config = config.merge(Toml::file_exact(path));
        }
        config = config
            .merge(Env::prefixed(ENV_PREFIX))
            .merge(Serialized::defaults(explicit));
        Ok(config.extract()?)
    }

    /// The values of the arguments that were given on the command line rather than defaulted
    fn explicit_values(&self, matches: &ArgMatches) -> Result<Map<String, Value>, MZPickerError> {
        let Value::Object(values) = serde_json::to_value(self).map_err(io::Error::from)? else {
            return Ok(Map::new());
        };
        Ok(values
            .into_iter()
            .filter(|(key, _)| {
                matches.ids().any(|id| id.as_str() == key)
                    && matches.value_source(key) == Some(ValueSource::CommandLine)
            })
            .collect())
    }

    fn create_threadpool(&self) -> Result<rayon::ThreadPool, MZPickerError> {
        let num_threads = if self.threads > 0 {
            self.threads as usize
        } else {
            thread::available_parallelism().map_or(1, usize::from)
        };
        debug!("Using {} cores", num_threads);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()?;
        Ok(pool)
    }

    fn min_intensity(&self) -> f64 {
        self.min_intensity
            .unwrap_or_else(|| self.method.default_min_intensity())
    }

    pub fn property_params(&self) -> PeakPropertiesParams {
        PeakPropertiesParams {
            threshold: self.threshold,
            width: self.width,
            rel_height: self.rel_height,
            min_intensity: self.min_intensity(),
            distance: self.distance,
            mz_range: self.mz_range,
            peak_width_modifier: self.peak_width_modifier,
            prominence: self.prominence,
        }
    }

    pub fn local_max_params(&self) -> LocalMaxParams {
        LocalMaxParams {
            window: self.window,
            min_intensity: self.min_intensity(),
            mz_range: self.mz_range,
            rel_height: self.rel_height,
        }
    }

    pub fn differential_params(&self) -> DifferentialParams {
        DifferentialParams {
            min_intensity: self.min_intensity(),
            min_distance: self.min_distance,
            mz_range: self.mz_range,
            rel_height: self.rel_height,
        }
    }

    /// The paths the peaks and processing steps for `input` are written to
    pub fn output_paths(&self, input: &Path) -> (PathBuf, PathBuf) {
        let mut stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "signal".to_string());
        if input.extension().is_some_and(|e| e == "gz") {
            if let Some((inner, _)) = stem.rsplit_once('.') {
                stem = inner.to_string();
            }
        }
        (
            self.output_dir.join(format!("{stem}.peaks.json")),
            self.output_dir.join(format!("{stem}.picker-config.json")),
        )
    }

    pub fn main(&self) -> Result<(), MZPickerError> {
        info!(
            "mzpicker v{}",
            option_env!("CARGO_PKG_VERSION").unwrap_or("unknown")
        );
        info!("Inputs: {}", self.input_files.len());
        info!("Output: {}", self.output_dir.display());
        info!("Method: {}", self.method);
        std::fs::create_dir_all(&self.output_dir)?;

        let start = Instant::now();
        let prog = self
            .create_threadpool()?
            .install(|| self.pick_all())?;
        info!(
            "Files: {} | Points: {} | Peaks Detected: {} | Filtered: {} | Merged: {} | Written: {}",
            prog.files,
            prog.points,
            prog.peaks_detected,
            prog.peaks_filtered,
            prog.peaks_merged,
            prog.peaks_written
        );
        info!("Elapsed Time: {:0.3?}", start.elapsed());
        Ok(())
    }

    fn pick_all(&self) -> Result<ProgressRecord, MZPickerError> {
        self.input_files
            .par_iter()
            .map(|path| self.pick_file(path))
            .try_reduce(ProgressRecord::default, |a, b| Ok(a + b))
    }

    /// Read the signal at `path` and pick its peaks with the configured method
    pub fn pick_file(&self, path: &Path) -> Result<ProgressRecord, MZPickerError> {
        let signal = read_signal(path, self.spectrum_index)?;
        debug!("Read {} points from {}", signal.len(), path.display());
        match self.method {
            DetectionMethod::Property => {
                self.run_picker(path, PropertyPeakPicker::new(signal.x, signal.y)?, self.property_params())
            }
            DetectionMethod::LocalMax => {
                self.run_picker(path, LocalMaxPeakPicker::new(signal.x, signal.y)?, self.local_max_params())
            }
            DetectionMethod::Differential => self.run_picker(
                path,
                DifferentialPeakPicker::new(signal.x, signal.y)?,
                self.differential_params(),
            ),
        }
    }

    fn run_picker<D: PeakDetector>(
        &self,
        path: &Path,
        mut picker: PeakPicker<D>,
        params: D,
    ) -> Result<ProgressRecord, MZPickerError> {
        let mut prog = ProgressRecord {
            files: 1,
            points: picker.x_array().len(),
            ..Default::default()
        };

        picker.find_peaks(params)?;
        prog.peaks_detected = picker.n_peaks();

        for crit in self.keep.iter() {
            let before = picker.n_peaks();
            picker.clean_by(crit.attribute, crit.criteria())?;
            debug!(
                "Kept {} of {before} peaks with {crit} in {}",
                picker.n_peaks(),
                path.display()
            );
        }
        prog.peaks_filtered = prog.peaks_detected - picker.n_peaks();

        if let Some(tolerance) = self.merge_tolerance {
            let before = picker.n_peaks();
            picker.merge_nearby(tolerance, self.merge_passes)?;
            prog.peaks_merged = before - picker.n_peaks();
        }

        if let Some(metric) = self.score {
            if !picker.peaks().is_some_and(|p| p.is_empty()) {
                picker.score(metric, true)?;
            }
        }

        let (peaks_path, config_path) = self.output_paths(path);
        let mut extras = Map::new();
        extras.insert("source".into(), json!(path.to_string_lossy()));
        picker.save(&peaks_path, self.overwrite, &extras)?;
        picker.save_processing_steps(&config_path)?;
        prog.peaks_written = picker.n_peaks();

        info!("Picked {} peaks from {}", picker.n_peaks(), path.display());
        Ok(prog)
    }
}
