//! Typed model of the persisted test matrix.
//!
//! A [`Dataset`] maps a platform version key (`"4.17"`) to a [`VersionBucket`]
//! holding human notes, two recency-ordered result lists and job history links.
//! Bucket order follows first appearance and is kept on save.

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};

/// Outcome of one CI run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Success,
    Failure,
    Unknown,
}

/// CI result vocabulary, matched case-insensitively. Unlisted values are `Unknown`.
pub const STATUS_TABLE: &[(&str, Status)] = &[
    ("SUCCESS", Status::Success),
    ("FAILURE", Status::Failure),
    ("ABORTED", Status::Failure),
    ("ERROR", Status::Failure),
];

impl Status {
    pub fn from_ci(raw: &str) -> Status {
        let raw = raw.trim();
        STATUS_TABLE
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(raw))
            .map(|(_, status)| *status)
            .unwrap_or(Status::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Success => "SUCCESS",
            Status::Failure => "FAILURE",
            Status::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Older files carry raw CI vocabulary (`ABORTED`), so reads go through the table.
impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Status::from_ci(&raw))
    }
}

/// Which list of a bucket a result lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    /// Rolling branch build of the component.
    Bundle,
    /// A released component version.
    Release,
}

impl std::fmt::Display for Family {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Family::Bundle => f.write_str("bundle"),
            Family::Release => f.write_str("release"),
        }
    }
}

/// Coerce an epoch-seconds value stored as an integer or a decimal string.
pub fn epoch_from_json(value: &JsonValue) -> Result<i64, String> {
    let secs = match value {
        JsonValue::Number(n) => n
            .as_i64()
            .ok_or_else(|| format!("timestamp {} is not an integer", n))?,
        JsonValue::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Err("timestamp is empty".to_string());
            }
            trimmed
                .parse::<i64>()
                .map_err(|_| format!("timestamp {:?} is not numeric", s))?
        }
        JsonValue::Null => return Err("timestamp is missing".to_string()),
        other => return Err(format!("timestamp has unsupported type: {}", other)),
    };
    if secs < 0 {
        return Err(format!("timestamp {} is negative", secs));
    }
    Ok(secs)
}

fn deserialize_epoch<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = JsonValue::deserialize(deserializer)?;
    epoch_from_json(&value).map_err(serde::de::Error::custom)
}

/// One CI run as stored in a bucket list.
///
/// Legacy field names from the earlier dashboard format are accepted on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    #[serde(alias = "ocp_full_version")]
    pub platform_full_version: String,
    #[serde(
        default,
        alias = "operator_version",
        alias = "gpu_operator_version",
        alias = "nno_operator_version"
    )]
    pub component_version: String,
    #[serde(alias = "test_status")]
    pub status: Status,
    #[serde(alias = "prow_job_url")]
    pub job_url: String,
    #[serde(alias = "job_timestamp", deserialize_with = "deserialize_epoch")]
    pub timestamp: i64,
}

impl TestResult {
    /// Newest first; equal timestamps fall back to job URL order.
    pub fn recency_cmp(&self, other: &TestResult) -> std::cmp::Ordering {
        other
            .timestamp
            .cmp(&self.timestamp)
            .then_with(|| self.job_url.cmp(&other.job_url))
    }
}

/// Everything recorded for one platform version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionBucket {
    pub notes: Vec<String>,
    pub bundle_tests: Vec<TestResult>,
    pub release_tests: Vec<TestResult>,
    pub job_history_links: Vec<String>,
}

impl VersionBucket {
    pub fn tests(&self, family: Family) -> &[TestResult] {
        match family {
            Family::Bundle => &self.bundle_tests,
            Family::Release => &self.release_tests,
        }
    }

    pub fn tests_mut(&mut self, family: Family) -> &mut Vec<TestResult> {
        match family {
            Family::Bundle => &mut self.bundle_tests,
            Family::Release => &mut self.release_tests,
        }
    }
}

/// A classified, normalized result on its way into a [`Dataset`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingResult {
    /// Bucket key, e.g. `4.17`.
    pub platform_version: String,
    pub family: Family,
    pub result: TestResult,
}

impl IncomingResult {
    /// Same rules a saved dataset must satisfy, plus a job URL to dedup on.
    pub fn check(&self) -> Result<(), String> {
        check_version_key(&self.platform_version)?;
        check_result(&self.result)?;
        if self.result.job_url.trim().is_empty() {
            return Err("job_url is empty".to_string());
        }
        Ok(())
    }
}

/// Bucket keys must be non-blank.
pub fn check_version_key(version: &str) -> Result<(), String> {
    if version.trim().is_empty() {
        return Err("empty platform version key".to_string());
    }
    Ok(())
}

pub fn check_result(result: &TestResult) -> Result<(), String> {
    if result.timestamp < 0 {
        return Err(format!(
            "timestamp {} is negative for {}",
            result.timestamp, result.job_url
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    buckets: Vec<(String, VersionBucket)>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn get(&self, version: &str) -> Option<&VersionBucket> {
        self.buckets
            .iter()
            .find(|(key, _)| key == version)
            .map(|(_, bucket)| bucket)
    }

    pub fn get_mut(&mut self, version: &str) -> Option<&mut VersionBucket> {
        self.buckets
            .iter_mut()
            .find(|(key, _)| key == version)
            .map(|(_, bucket)| bucket)
    }

    /// Returns the bucket for `version`, appending an empty one if it is new.
    pub fn bucket_mut(&mut self, version: &str) -> &mut VersionBucket {
        let idx = match self.buckets.iter().position(|(key, _)| key == version) {
            Some(idx) => idx,
            None => {
                self.buckets
                    .push((version.to_string(), VersionBucket::default()));
                self.buckets.len() - 1
            }
        };
        &mut self.buckets[idx].1
    }

    /// Replace the bucket stored under `version`, keeping its position.
    pub fn insert(&mut self, version: impl Into<String>, bucket: VersionBucket) {
        let version = version.into();
        match self.get_mut(&version) {
            Some(existing) => *existing = bucket,
            None => self.buckets.push((version, bucket)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &VersionBucket)> {
        self.buckets
            .iter()
            .map(|(key, bucket)| (key.as_str(), bucket))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut VersionBucket)> {
        self.buckets
            .iter_mut()
            .map(|(key, bucket)| (key.as_str(), bucket))
    }

    pub fn versions(&self) -> Vec<&str> {
        self.buckets.iter().map(|(key, _)| key.as_str()).collect()
    }

    pub fn result_count(&self) -> usize {
        self.buckets
            .iter()
            .map(|(_, b)| b.bundle_tests.len() + b.release_tests.len())
            .sum()
    }

    /// First rule violation that would make the saved file unreadable.
    pub fn check(&self) -> Result<(), String> {
        for (version, bucket) in &self.buckets {
            check_version_key(version)?;
            for result in bucket.bundle_tests.iter().chain(bucket.release_tests.iter()) {
                check_result(result).map_err(|e| format!("version {}: {}", version, e))?;
            }
        }
        Ok(())
    }

    /// SHA-256 of the compact JSON form; equal digests mean identical saved files.
    pub fn digest(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        format!("{:x}", hasher.finalize())
    }
}

impl Serialize for Dataset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.buckets.len()))?;
        for (key, bucket) in &self.buckets {
            map.serialize_entry(key, bucket)?;
        }
        map.end()
    }
}
