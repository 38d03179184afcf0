//! JSON codec for the persisted [`Dataset`].
//!
//! A missing or blank baseline is an empty dataset. A baseline that is present
//! but does not have the expected shape is a fatal `MalformedDataset`.

use crate::core::dataset::{Dataset, VersionBucket, check_version_key};
use crate::core::error::MatrixError;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::fs;
use std::path::Path;

const BUCKET_FIELDS: [&str; 4] = ["notes", "bundle_tests", "release_tests", "job_history_links"];

pub fn load(path: &Path) -> Result<Dataset, MatrixError> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "no baseline found, starting from an empty dataset");
        return Ok(Dataset::new());
    }
    let content = fs::read_to_string(path).map_err(MatrixError::IoError)?;
    let dataset = from_json_str(&content).map_err(|e| match e {
        MatrixError::MalformedDataset(msg) => {
            MatrixError::MalformedDataset(format!("{}: {}", path.display(), msg))
        }
        other => other,
    })?;
    tracing::info!(
        path = %path.display(),
        versions = dataset.len(),
        results = dataset.result_count(),
        "loaded baseline dataset"
    );
    Ok(dataset)
}

pub fn from_json_str(content: &str) -> Result<Dataset, MatrixError> {
    if content.trim().is_empty() {
        return Ok(Dataset::new());
    }
    let doc: JsonValue = serde_json::from_str(content)
        .map_err(|e| MatrixError::MalformedDataset(format!("not valid JSON: {}", e)))?;
    from_json_value(doc)
}

pub fn from_json_value(doc: JsonValue) -> Result<Dataset, MatrixError> {
    let top = match doc {
        JsonValue::Null => return Ok(Dataset::new()),
        JsonValue::Object(map) => map,
        other => {
            return Err(MatrixError::MalformedDataset(format!(
                "top level must be an object keyed by platform version, found {}",
                json_kind(&other)
            )));
        }
    };

    let mut dataset = Dataset::new();
    for (version, value) in top {
        check_version_key(&version).map_err(MatrixError::MalformedDataset)?;
        let bucket = parse_bucket(&version, value)?;
        dataset.insert(version, bucket);
    }
    Ok(dataset)
}

fn parse_bucket(version: &str, value: JsonValue) -> Result<VersionBucket, MatrixError> {
    let obj = value.as_object().ok_or_else(|| {
        MatrixError::MalformedDataset(format!(
            "version {} must map to an object, found {}",
            version,
            json_kind(&value)
        ))
    })?;
    let missing: Vec<&str> = BUCKET_FIELDS
        .iter()
        .copied()
        .filter(|field| !obj.contains_key(*field))
        .collect();
    if !missing.is_empty() {
        return Err(MatrixError::MalformedDataset(format!(
            "version {} is missing field(s): {}",
            version,
            missing.join(", ")
        )));
    }
    serde_json::from_value(value)
        .map_err(|e| MatrixError::MalformedDataset(format!("version {}: {}", version, e)))
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

/// Pretty JSON with four-space indentation and a trailing newline.
pub fn to_json_string(dataset: &Dataset) -> Result<String, MatrixError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    dataset.serialize(&mut ser)?;
    buf.push(b'\n');
    String::from_utf8(buf).map_err(|e| MatrixError::ValidationError(e.to_string()))
}

/// Write through a sibling temp file and rename, so readers never see a half-written file.
pub fn save(dataset: &Dataset, path: &Path) -> Result<(), MatrixError> {
    dataset.check().map_err(|e| {
        MatrixError::ValidationError(format!("refusing to write {}: {}", path.display(), e))
    })?;
    let text = to_json_string(dataset)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(MatrixError::IoError)?;
    }
    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).ok_or_else(|| {
        MatrixError::ValidationError(format!("not a file path: {}", path.display()))
    })?;
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    fs::write(&tmp_path, text).map_err(MatrixError::IoError)?;
    fs::rename(&tmp_path, path).map_err(MatrixError::IoError)?;
    tracing::info!(
        path = %path.display(),
        versions = dataset.len(),
        results = dataset.result_count(),
        "saved merged dataset"
    );
    Ok(())
}
