use std::fs;
use std::path::PathBuf;

use serde_json::{json, Map, Value};

use mzpick::io::read_json_data;
use mzpick::peak::DEFAULT_SCORE;
use mzpick::picker::{EXPORT_LIST_FILE, PROCESSING_CONFIG_FILE};
use mzpick::prelude::*;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("mzpick-{}-{name}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn picked() -> PropertyPeakPicker {
    let x: Vec<f64> = (0..200).map(|i| 400.0 + i as f64 * 0.05).collect();
    let y: Vec<f64> = (0..200)
        .map(|i| {
            let t = i as f64;
            800.0 * (-(t - 60.0).powi(2) / 18.0).exp() + 300.0 * (-(t - 150.0).powi(2) / 8.0).exp()
        })
        .collect();
    let mut picker = PropertyPeakPicker::new(x, y).unwrap();
    picker
        .find_peaks(PeakPropertiesParams {
            threshold: 10.0,
            ..Default::default()
        })
        .unwrap();
    picker
}

#[test_log::test]
fn test_save_and_restore() -> Result<(), PickerError> {
    let dir = scratch_dir("restore");
    let path = dir.join("peaks.json");
    let picker = picked();
    assert_eq!(picker.n_peaks(), 2);

    let mut extras = Map::new();
    extras.insert("dataset_dir".into(), json!("/data/run-01.raw"));
    picker.save(&path, true, &extras)?;

    let saved = read_json_data(&path)?;
    let records = saved.as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r["dataset_dir"] == "/data/run-01.raw"));

    let (x, y) = (picker.x_array().to_vec(), picker.y_array().to_vec());
    let mut restored = PropertyPeakPicker::new(x, y)?;
    restored.restore(&path)?;
    assert_eq!(restored.n_peaks(), picker.n_peaks());
    for (a, b) in restored.iter().zip(picker.iter()) {
        assert_eq!(a, b);
        assert_eq!(a.idx, b.idx);
        assert_eq!(a.idx_left, b.idx_left);
        assert_eq!(a.idx_right, b.idx_right);
        assert!(!a.to_json().contains_key("dataset_dir"));
    }

    fs::remove_dir_all(dir)?;
    Ok(())
}

#[test]
fn test_restore_keeps_undefined_score() -> Result<(), PickerError> {
    let dir = scratch_dir("nan-score");
    let path = dir.join("peaks.json");
    let mut picker = picked();
    picker.update_peak(0, [(PeakAttribute::Score, AttributeValue::from(f64::NAN))])?;
    picker.save(&path, true, &Map::new())?;

    let saved = read_json_data(&path)?;
    assert!(saved[0]["score"].is_null());

    let (x, y) = (picker.x_array().to_vec(), picker.y_array().to_vec());
    let mut restored = PropertyPeakPicker::new(x, y)?;
    restored.restore(&path)?;
    let scores: Vec<f64> = restored.iter().map(|p| p.score).collect();
    assert!(scores[0].is_nan());
    assert_eq!(scores[1], DEFAULT_SCORE);

    fs::remove_dir_all(dir)?;
    Ok(())
}

#[test]
fn test_save_without_overwrite_merges() -> Result<(), PickerError> {
    let dir = scratch_dir("merge");
    let path = dir.join("peaks.json");
    let mut picker = picked();
    let extras = Map::new();

    picker.save(&path, true, &extras)?;
    picker.save(&path, false, &extras)?;
    assert_eq!(read_json_data(&path)?.as_array().map(Vec::len), Some(2));

    picker.update_peak(0, [(PeakAttribute::Color, AttributeValue::from("red"))])?;
    picker.save(&path, false, &extras)?;
    assert_eq!(read_json_data(&path)?.as_array().map(Vec::len), Some(3));

    picker.save(&path, true, &extras)?;
    assert_eq!(read_json_data(&path)?.as_array().map(Vec::len), Some(2));

    fs::remove_dir_all(dir)?;
    Ok(())
}

#[test]
fn test_save_processing_steps() -> Result<(), PickerError> {
    let dir = scratch_dir("steps");
    let mut picker = picked();
    picker.score(ScoreMetric::Slope, false)?;
    picker.save_processing_steps(&dir)?;

    let steps = read_json_data(dir.join(PROCESSING_CONFIG_FILE))?;
    let steps: Vec<ProcessingStep> = serde_json::from_value(steps)?;
    let methods: Vec<&str> = steps.iter().map(|s| s.method.as_str()).collect();
    assert_eq!(methods, vec!["find_peaks", "score"]);
    assert_eq!(steps[0].parameters["threshold"], 10.0);
    assert_eq!(steps[1].parameters["metric"], "slope");

    picker.save_processing_steps(dir.join("custom.json"))?;
    assert!(dir.join("custom.json").exists());

    fs::remove_dir_all(dir)?;
    Ok(())
}

#[test_log::test]
fn test_save_peaks_export_list() -> Result<(), PickerError> {
    let dir = scratch_dir("export");
    let picker = picked();
    let path = picker.save_peaks("/data/run-01.raw", &dir, 0.25, None, true)?;
    assert_eq!(path, dir.join(EXPORT_LIST_FILE));

    let records = read_json_data(&path)?;
    let first = &records.as_array().unwrap()[0];
    assert_eq!(first["dataset_dir"], "/data/run-01.raw");
    assert_eq!(first["x_offset"], 0.25);
    assert_eq!(first["applied_offset"], Value::Bool(false));
    assert!(first.get("x").is_some());

    fs::remove_dir_all(dir)?;
    Ok(())
}
