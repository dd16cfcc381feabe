/*! Reading and writing JSON documents with four-space indented output. Object keys
are written in sorted order, as `serde_json` keeps them.

When asked to, [`write_json_data`] merges the new document into an existing file
instead of replacing it: arrays are concatenated and exact duplicate objects dropped,
objects are updated key by key.
*/
use std::collections::HashSet;
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Serializer, Value};

use crate::error::PickerError;

/// Read a JSON document from `path`
pub fn read_json_data<P: AsRef<Path>>(path: P) -> Result<Value, PickerError> {
    let handle = fs::File::open(path.as_ref())?;
    let value = serde_json::from_reader(BufReader::new(handle))?;
    Ok(value)
}

/// Drop all but the first occurrence of each object from a list of objects.
/// Lists holding anything other than objects are returned unchanged.
pub fn remove_duplicates(values: Vec<Value>) -> Vec<Value> {
    if !values.iter().all(Value::is_object) {
        return values;
    }
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|v| seen.insert(v.to_string()))
        .collect()
}

fn merge_documents(existing: Value, new: Value) -> Value {
    match (existing, new) {
        (Value::Array(mut existing), Value::Array(new)) => {
            existing.extend(new);
            Value::Array(remove_duplicates(existing))
        }
        (Value::Object(mut existing), Value::Object(new)) => {
            existing.extend(new);
            Value::Object(existing)
        }
        (_, new) => new,
    }
}

fn write_pretty<W: Write>(writer: W, value: &Value) -> Result<(), PickerError> {
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = Serializer::with_formatter(writer, formatter);
    value.serialize(&mut serializer)?;
    Ok(())
}

/// Write `obj` to `path` as JSON with sorted keys and four-space indentation.
///
/// If `check_existing` is set and `path` already exists, the existing document is
/// merged with `obj` and the result written in its place.
pub fn write_json_data<P: AsRef<Path>, T: Serialize>(
    path: P,
    obj: &T,
    check_existing: bool,
) -> Result<(), PickerError> {
    let path = path.as_ref();
    let mut value = serde_json::to_value(obj)?;
    if check_existing && path.exists() {
        let existing = read_json_data(path)?;
        tracing::debug!("Merging into existing file {}", path.display());
        value = merge_documents(existing, value);
    }
    let handle = fs::File::create(path)?;
    let mut writer = BufWriter::new(handle);
    write_pretty(&mut writer, &value)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("mzpick-io-{}-{name}", std::process::id()))
    }

    #[test]
    fn test_write_format() -> Result<(), PickerError> {
        let path = temp_path("format.json");
        write_json_data(&path, &json!([{"b": 1, "a": [1, 2]}]), false)?;
        let text = fs::read_to_string(&path)?;
        let expected = "[\n    {\n        \"a\": [\n            1,\n            2\n        ],\n        \"b\": 1\n    }\n]";
        assert_eq!(text, expected);
        fs::remove_file(path)?;
        Ok(())
    }

    #[test]
    fn test_merge_existing_list() -> Result<(), PickerError> {
        let path = temp_path("merge.json");
        write_json_data(&path, &json!([{"x": 1.0}, {"x": 2.0}]), false)?;
        write_json_data(&path, &json!([{"x": 2.0}, {"x": 3.0}]), true)?;
        let value = read_json_data(&path)?;
        assert_eq!(value, json!([{"x": 1.0}, {"x": 2.0}, {"x": 3.0}]));

        write_json_data(&path, &json!([{"x": 4.0}]), false)?;
        assert_eq!(read_json_data(&path)?, json!([{"x": 4.0}]));
        fs::remove_file(path)?;
        Ok(())
    }

    #[test]
    fn test_merge_existing_object() -> Result<(), PickerError> {
        let path = temp_path("merge-object.json");
        write_json_data(&path, &json!({"a": 1, "b": 2}), false)?;
        write_json_data(&path, &json!({"b": 3}), true)?;
        assert_eq!(read_json_data(&path)?, json!({"a": 1, "b": 3}));
        fs::remove_file(path)?;
        Ok(())
    }

    #[test]
    fn test_remove_duplicates_ignores_key_order() {
        let values = vec![
            json!({"b": 2, "a": 1}),
            json!({"a": 1, "b": 2}),
            json!({"a": 1, "b": 3}),
        ];
        let kept = remove_duplicates(values);
        assert_eq!(kept, vec![json!({"a": 1, "b": 2}), json!({"a": 1, "b": 3})]);
    }

    #[test]
    fn test_read_missing() {
        assert!(matches!(
            read_json_data(temp_path("does-not-exist.json")),
            Err(PickerError::IOError(_))
        ));
    }
}
