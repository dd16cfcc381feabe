use std::path::PathBuf;

use clap::CommandFactory;
use figment::{
    providers::{Format, Toml},
    Figment,
};

use mzpicker::{DetectionMethod, MZPicker};

#[test_log::test]
#[test_log(default_log_filter = "debug")]
fn test_configured() {
    let mut config = Figment::new();
    config = config.merge(Toml::file_exact("tests/data/picker_test.toml"));
    let driver: MZPicker = config.extract().unwrap();
    assert_eq!(driver.method, DetectionMethod::LocalMax);
    assert_eq!(driver.local_max_params().window, 5);
    assert_eq!(driver.threshold, 250.0);
    driver.main().unwrap();

    let peaks: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string("tests/tmp/configured/two_peaks.peaks.json").unwrap(),
    )
    .unwrap();
    let peaks = peaks.as_array().unwrap();
    assert_eq!(peaks.len(), 1);
    assert_eq!(peaks[0]["idx"], 50);
}

#[test_log::test]
fn test_command_line_beats_config_file() {
    let matches = MZPicker::command().get_matches_from([
        "mzpicker",
        "tests/data/two_peaks_gz.xy.gz",
        "--config-file",
        "tests/data/picker_test.toml",
        "--method",
        "differential",
        "--output-dir",
        "tests/tmp/configured_cli",
    ]);
    let driver = MZPicker::configure(&matches).unwrap();
    assert_eq!(driver.method, DetectionMethod::Differential);
    assert_eq!(driver.output_dir, PathBuf::from("tests/tmp/configured_cli"));
    assert_eq!(
        driver.input_files,
        vec![PathBuf::from("tests/data/two_peaks_gz.xy.gz")]
    );
    // Not given on the command line, so the file's values stand
    assert_eq!(driver.window, 5);
    assert_eq!(driver.min_intensity, Some(0.1));
    assert_eq!(driver.keep.len(), 1);
    assert!(driver.overwrite);
    assert_eq!(driver.threshold, 250.0);
}
