//! Turns a raw job-run descriptor plus its classification into a [`TestResult`].

use crate::core::dataset::{Family, IncomingResult, Status, TestResult, epoch_from_json};
use crate::core::error::MatrixError;
use crate::engine::classifier::JobClassification;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::LazyLock;

static EXACT_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d+\.\d+\.\d+(?:-[0-9A-Za-z.-]+)?(?:\+[0-9A-Za-z.-]+)?$").expect("static regex")
});

/// One job run as handed over by the CI fetch layer.
///
/// `timestamp` stays loosely typed so one bad value skips that run instead of
/// failing the whole batch at parse time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawJobRun {
    pub job_name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<JsonValue>,
    pub job_url: String,
    /// Exact platform build from the run's artifacts, when it published one.
    #[serde(default)]
    pub platform_full_version: Option<String>,
    /// Exact component version from the run's artifacts, when it published one.
    #[serde(default)]
    pub component_version: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Skip release runs whose platform or component version is not `X.Y.Z`.
    pub release_requires_exact_versions: bool,
}

pub fn normalize_status(raw: &str) -> Status {
    Status::from_ci(raw)
}

pub fn normalize_timestamp(raw: Option<&JsonValue>, job_url: &str) -> Result<i64, MatrixError> {
    let value = raw.unwrap_or(&JsonValue::Null);
    epoch_from_json(value).map_err(|reason| MatrixError::InvalidTimestamp {
        job_url: job_url.to_string(),
        reason,
    })
}

/// `25.4.0` or `25.4.0(bundle)` style strings; anything after `(` is ignored.
pub fn is_exact_version(version: &str) -> bool {
    let core = version.split('(').next().unwrap_or_default().trim();
    EXACT_VERSION.is_match(core)
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty()).map(str::to_string)
}

pub fn normalize(
    run: &RawJobRun,
    class: &JobClassification,
    opts: &NormalizeOptions,
) -> Result<IncomingResult, MatrixError> {
    let job_url = run.job_url.trim();
    if job_url.is_empty() {
        return Err(MatrixError::InvalidRecord(format!(
            "run of {} has no job URL",
            run.job_name
        )));
    }
    let timestamp = normalize_timestamp(run.timestamp.as_ref(), job_url)?;

    let platform_full_version = non_empty(run.platform_full_version.as_ref()).unwrap_or_default();
    let component_version = non_empty(run.component_version.as_ref())
        .unwrap_or_else(|| class.component_version.clone());

    if class.family == Family::Release
        && opts.release_requires_exact_versions
        && !(is_exact_version(&platform_full_version) && is_exact_version(&component_version))
    {
        return Err(MatrixError::InvalidRecord(format!(
            "release run {} lacks exact versions (platform '{}', component '{}')",
            job_url, platform_full_version, component_version
        )));
    }

    Ok(IncomingResult {
        platform_version: class.platform_version.clone(),
        family: class.family,
        result: TestResult {
            platform_full_version,
            component_version,
            status: normalize_status(&run.status),
            job_url: job_url.to_string(),
            timestamp,
        },
    })
}
