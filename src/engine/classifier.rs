//! Job-name classification.
//!
//! A job name has the shape
//! `[rehearse-<n>-]<prefix><platform><separator><job_pattern>-<tag>` where
//! `<platform>` is exactly `MAJOR.MINOR` and
//! `<tag>` is either the bundle branch tag (`master`) or a dash-encoded
//! release token (`24-10-x`). Names that do not match the template exactly are
//! rejected rather than guessed at.

use crate::core::config::{MatrixConfig, VersionEncoding};
use crate::core::dataset::Family;
use crate::core::error::MatrixError;
use regex::Regex;
use serde::Serialize;

const RELEASE_TOKEN: &str = r"\d+(?:-\d+)+(?:-x)?";

/// Turns a dash-encoded release token into a component version.
///
/// Returning `None` rejects the job name.
pub trait VersionTokenDecoder: Send + Sync {
    fn decode(&self, token: &str) -> Option<String>;
}

impl VersionTokenDecoder for VersionEncoding {
    fn decode(&self, token: &str) -> Option<String> {
        let parts: Vec<&str> = token.split('-').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return None;
        }
        match self {
            VersionEncoding::Dotted => Some(parts.join(".")),
            VersionEncoding::TrimWildcard => {
                let numeric = match parts.split_last() {
                    Some((&"x", rest)) => rest,
                    _ => &parts[..],
                };
                if numeric.is_empty() {
                    return None;
                }
                Some(numeric.join("."))
            }
            VersionEncoding::Verbatim => Some(token.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobClassification {
    /// Bucket key, e.g. `4.17`.
    pub platform_version: String,
    pub family: Family,
    /// Raw trailing segment: the branch tag or the dash-encoded token.
    pub version_tag: String,
    /// Decoded release version; empty for bundle jobs.
    pub component_version: String,
}

pub struct Classifier {
    pattern: Regex,
    bundle_tag: String,
    decoder: Box<dyn VersionTokenDecoder>,
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifier")
            .field("pattern", &self.pattern.as_str())
            .field("bundle_tag", &self.bundle_tag)
            .finish()
    }
}

impl Classifier {
    pub fn new(config: &MatrixConfig) -> Result<Self, MatrixError> {
        config.validate()?;
        let source = format!(
            r"^(?:rehearse-\d+-)?{prefix}(?P<platform>\d+\.\d+){sep}{job}-(?P<tag>{bundle}|{release})$",
            prefix = regex::escape(&config.job_prefix),
            sep = regex::escape(&config.platform_separator),
            job = regex::escape(&config.operator.job_pattern),
            bundle = regex::escape(&config.bundle_tag),
            release = RELEASE_TOKEN,
        );
        let pattern = Regex::new(&source)
            .map_err(|e| MatrixError::ConfigError(format!("job name pattern: {}", e)))?;
        Ok(Self {
            pattern,
            bundle_tag: config.bundle_tag.clone(),
            decoder: Box::new(config.version_encoding),
        })
    }

    /// Swap in a custom release-token decoder.
    pub fn with_decoder(mut self, decoder: Box<dyn VersionTokenDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn classify(&self, job_name: &str) -> Result<JobClassification, MatrixError> {
        let reject = || MatrixError::UnrecognizedJobName(job_name.to_string());
        let caps = self.pattern.captures(job_name).ok_or_else(reject)?;
        let platform_version = caps["platform"].to_string();
        let version_tag = caps["tag"].to_string();

        if version_tag == self.bundle_tag {
            return Ok(JobClassification {
                platform_version,
                family: Family::Bundle,
                version_tag,
                component_version: String::new(),
            });
        }

        let component_version = self.decoder.decode(&version_tag).ok_or_else(reject)?;
        Ok(JobClassification {
            platform_version,
            family: Family::Release,
            version_tag,
            component_version,
        })
    }
}
