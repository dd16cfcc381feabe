use std::fs;
use std::io::{self, BufRead};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use tracing::{debug, warn};

use mzdata::io::{infer_from_path, MassSpectrometryFormat, RestartableGzDecoder};
use mzdata::prelude::*;
use mzdata::spectrum::MultiLayerSpectrum;
use mzdata::MzMLReader;

use crate::driver::MZPickerError;

/// A one dimensional signal as parallel coordinate and intensity arrays
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Signal {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl Signal {
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Self {
        Self { x, y }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Read the signal stored at `path`.
///
/// mzML files, compressed or not, are read with `mzdata` and the spectrum at
/// `spectrum_index` is used. Anything else is read as delimited two column text.
pub fn read_signal(path: &Path, spectrum_index: usize) -> Result<Signal, MZPickerError> {
    let (ms_format, compressed) = infer_from_path(path);
    debug!(
        "Detected {ms_format:?} from {} (compressed? {compressed})",
        path.display()
    );
    match ms_format {
        MassSpectrometryFormat::MzML => {
            let spectrum = if compressed {
                let fh = RestartableGzDecoder::new(io::BufReader::new(fs::File::open(path)?));
                let mut reader = MzMLReader::new(fh);
                reader.nth(spectrum_index)
            } else {
                let mut reader = MzMLReader::open_path(path)?;
                reader.get_spectrum_by_index(spectrum_index)
            };
            let spectrum = spectrum.ok_or_else(|| {
                MZPickerError::SpectrumNotFound(path.display().to_string(), spectrum_index)
            })?;
            signal_from_spectrum(path, &spectrum)
        }
        MassSpectrometryFormat::Unknown => {
            let handle = fs::File::open(path)?;
            if compressed {
                read_delimited(path, io::BufReader::new(MultiGzDecoder::new(handle)))
            } else {
                read_delimited(path, io::BufReader::new(handle))
            }
        }
        _ => Err(MZPickerError::FormatUnknownOrNotSupportedError(
            path.display().to_string(),
            ms_format,
        )),
    }
}

fn signal_from_spectrum(path: &Path, spectrum: &MultiLayerSpectrum) -> Result<Signal, MZPickerError> {
    let arrays = spectrum
        .arrays
        .as_ref()
        .ok_or_else(|| MZPickerError::NoSignal(path.display().to_string()))?;
    let x = arrays.mzs()?.to_vec();
    let y: Vec<f64> = arrays.intensities()?.iter().map(|i| *i as f64).collect();
    debug!("Read {} points from spectrum {}", x.len(), spectrum.id());
    Ok(Signal::new(x, y))
}

fn split_fields(line: &str) -> impl Iterator<Item = &str> {
    line.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
}

/// Read `x y` pairs separated by whitespace, tabs or commas, one pair per line.
///
/// Blank lines and lines starting with `#` are skipped, as is a non-numeric first line.
pub fn read_delimited<R: BufRead>(path: &Path, reader: R) -> Result<Signal, MZPickerError> {
    let mut signal = Signal::default();
    let mut seen_content = false;
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let is_header = !seen_content;
        seen_content = true;

        let mut fields = split_fields(line);
        let pair = match (fields.next(), fields.next()) {
            (Some(x), Some(y)) => x.parse::<f64>().ok().zip(y.parse::<f64>().ok()),
            _ => None,
        };
        match pair {
            Some((x, y)) => {
                signal.x.push(x);
                signal.y.push(y);
            }
            None if is_header => {
                debug!("Skipping header line {line:?}");
            }
            None => {
                return Err(MZPickerError::MalformedLine {
                    path: path.display().to_string(),
                    line_number: i + 1,
                    content: line.to_string(),
                })
            }
        }
    }
    if signal.is_empty() {
        warn!("No data points read from {}", path.display());
    }
    Ok(signal)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_read_delimited() -> Result<(), MZPickerError> {
        let text = "# a comment\nmz\tintensity\n100.0\t5\n\n100.1, 7.5\n100.2 2\n";
        let signal = read_delimited(Path::new("test.xy"), io::Cursor::new(text))?;
        assert_eq!(signal.x, vec![100.0, 100.1, 100.2]);
        assert_eq!(signal.y, vec![5.0, 7.5, 2.0]);
        assert_eq!(signal.len(), 3);
        Ok(())
    }

    #[test]
    fn test_read_delimited_malformed() {
        let text = "100.0 5\n100.1 abc\n";
        let result = read_delimited(Path::new("test.xy"), io::Cursor::new(text));
        assert!(matches!(
            result,
            Err(MZPickerError::MalformedLine { line_number: 2, .. })
        ));
    }

    #[test]
    fn test_read_missing_file() {
        let result = read_signal(Path::new("not_real.xy"), 0);
        assert!(matches!(result, Err(MZPickerError::IOError(_))));
    }
}
