//! Configuration loaded from `cimatrix.toml`.
//!
//! Every field has a default, so a missing file is not an error. Command-line
//! flags override whatever the file sets.

use crate::core::error::MatrixError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "cimatrix.toml";
pub const DEFAULT_JOB_PREFIX: &str = "pull-ci-rh-ecosystem-edge-nvidia-ci-main-";
pub const DEFAULT_PLATFORM_SEPARATOR: &str = "-stable-";
pub const DEFAULT_BUNDLE_TAG: &str = "master";

/// Identifies which operator's e2e jobs a run belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorProfile {
    pub name: String,
    pub display_name: String,
    /// Job-name segment between the platform separator and the version token.
    pub job_pattern: String,
}

impl OperatorProfile {
    pub fn network() -> Self {
        Self {
            name: "nno".to_string(),
            display_name: "Network Operator".to_string(),
            job_pattern: "nvidia-network-operator-e2e".to_string(),
        }
    }

    pub fn gpu() -> Self {
        Self {
            name: "gpu".to_string(),
            display_name: "GPU Operator".to_string(),
            job_pattern: "nvidia-gpu-operator-e2e".to_string(),
        }
    }

    pub fn preset(name: &str) -> Result<Self, MatrixError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "nno" | "network" => Ok(Self::network()),
            "gpu" => Ok(Self::gpu()),
            other => Err(MatrixError::ConfigError(format!(
                "unknown operator preset '{}' (expected nno or gpu)",
                other
            ))),
        }
    }
}

impl Default for OperatorProfile {
    fn default() -> Self {
        Self::network()
    }
}

/// How a dash-encoded release token such as `24-10-x` becomes a component version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionEncoding {
    /// `24-10-x` -> `24.10.x`
    #[default]
    Dotted,
    /// `24-10-x` -> `24.10`
    TrimWildcard,
    /// `24-10-x` -> `24-10-x`
    Verbatim,
}

/// Maximum entries kept per bucket list; `None` keeps everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionLimit(pub Option<usize>);

impl RetentionLimit {
    pub const UNLIMITED: RetentionLimit = RetentionLimit(None);

    pub fn at_most(n: usize) -> Self {
        RetentionLimit(Some(n))
    }

    pub fn get(&self) -> Option<usize> {
        self.0
    }

    /// Accepts a count, or `none` / `unlimited`.
    pub fn parse(raw: &str) -> Result<Self, MatrixError> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("none") || raw.eq_ignore_ascii_case("unlimited") {
            return Ok(Self::UNLIMITED);
        }
        raw.parse::<usize>().map(Self::at_most).map_err(|_| {
            MatrixError::ConfigError(format!(
                "retention limit must be a non-negative integer or 'unlimited', got '{}'",
                raw
            ))
        })
    }
}

impl std::fmt::Display for RetentionLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(n) => write!(f, "{}", n),
            None => f.write_str("unlimited"),
        }
    }
}

impl Serialize for RetentionLimit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Some(n) => serializer.serialize_u64(n as u64),
            None => serializer.serialize_str("unlimited"),
        }
    }
}

impl<'de> Deserialize<'de> for RetentionLimit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Count(u64),
            Word(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Count(n) => Ok(RetentionLimit::at_most(n as usize)),
            Raw::Word(w) => RetentionLimit::parse(&w).map_err(serde::de::Error::custom),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatrixConfig {
    pub operator: OperatorProfile,
    pub job_prefix: String,
    pub platform_separator: String,
    pub bundle_tag: String,
    pub version_encoding: VersionEncoding,
    pub retention_limit: RetentionLimit,
    pub release_requires_exact_versions: bool,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            operator: OperatorProfile::default(),
            job_prefix: DEFAULT_JOB_PREFIX.to_string(),
            platform_separator: DEFAULT_PLATFORM_SEPARATOR.to_string(),
            bundle_tag: DEFAULT_BUNDLE_TAG.to_string(),
            version_encoding: VersionEncoding::default(),
            retention_limit: RetentionLimit::UNLIMITED,
            release_requires_exact_versions: false,
        }
    }
}

impl MatrixConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, MatrixError> {
        let config: MatrixConfig =
            toml::from_str(content).map_err(|e| MatrixError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `path` if it exists; no file means defaults.
    pub fn load(path: &Path) -> Result<Self, MatrixError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(MatrixError::IoError)?;
        Self::from_toml_str(&content)
            .map_err(|e| MatrixError::ConfigError(format!("{}: {}", path.display(), e)))
    }

    pub fn validate(&self) -> Result<(), MatrixError> {
        let required = [
            ("operator.job_pattern", &self.operator.job_pattern),
            ("job_prefix", &self.job_prefix),
            ("platform_separator", &self.platform_separator),
            ("bundle_tag", &self.bundle_tag),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(MatrixError::ConfigError(format!("{} must not be empty", field)));
            }
        }
        Ok(())
    }
}
