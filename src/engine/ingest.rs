//! Batch driver: classify, normalize and merge a fetched list of job runs.
//!
//! A run that fails classification or normalization is logged and skipped;
//! the rest of the batch still merges.

use crate::core::config::{MatrixConfig, RetentionLimit};
use crate::core::dataset::{Dataset, IncomingResult};
use crate::core::error::MatrixError;
use crate::engine::classifier::Classifier;
use crate::engine::merger::{self, MergeOutcome};
use crate::engine::normalizer::{self, NormalizeOptions, RawJobRun};
use serde::Serialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRun {
    pub job_name: String,
    pub job_url: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub received: usize,
    pub skipped: Vec<SkippedRun>,
    pub merge: MergeOutcome,
}

impl IngestReport {
    pub fn warning_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn absorb(&mut self, other: IngestReport) {
        self.received += other.received;
        self.skipped.extend(other.skipped);
        self.merge.absorb(&other.merge);
    }
}

/// Everything the pipeline needs besides the data.
pub struct IngestContext {
    pub classifier: Classifier,
    pub options: NormalizeOptions,
    pub limit: RetentionLimit,
}

impl IngestContext {
    pub fn from_config(config: &MatrixConfig) -> Result<Self, MatrixError> {
        Ok(Self {
            classifier: Classifier::new(config)?,
            options: NormalizeOptions {
                release_requires_exact_versions: config.release_requires_exact_versions,
            },
            limit: config.retention_limit,
        })
    }
}

/// Classify and normalize one run.
pub fn prepare_run(ctx: &IngestContext, run: &RawJobRun) -> Result<IncomingResult, MatrixError> {
    let class = ctx.classifier.classify(run.job_name.trim())?;
    normalizer::normalize(run, &class, &ctx.options)
}

/// Classify, normalize and merge one batch.
///
/// Record-level failures skip the run. Any other error aborts the batch
/// before anything is merged.
pub fn ingest_batch(
    dataset: &mut Dataset,
    runs: &[RawJobRun],
    ctx: &IngestContext,
) -> Result<IngestReport, MatrixError> {
    let prepared = runs.iter().map(|run| (run, prepare_run(ctx, run)));
    merge_prepared(dataset, prepared, ctx.limit)
}

fn merge_prepared<'a>(
    dataset: &mut Dataset,
    prepared: impl IntoIterator<Item = (&'a RawJobRun, Result<IncomingResult, MatrixError>)>,
    limit: RetentionLimit,
) -> Result<IngestReport, MatrixError> {
    let mut report = IngestReport::default();
    let mut accepted = Vec::new();

    for (run, outcome) in prepared {
        report.received += 1;
        match outcome {
            Ok(incoming) => accepted.push(incoming),
            Err(err) if err.is_record_level() => {
                tracing::warn!(
                    job_name = %run.job_name,
                    job_url = %run.job_url,
                    error = %err,
                    "skipping job run"
                );
                report.skipped.push(SkippedRun {
                    job_name: run.job_name.clone(),
                    job_url: run.job_url.clone(),
                    reason: err.to_string(),
                });
            }
            Err(err) => return Err(err),
        }
    }

    report.merge = merger::merge_into(dataset, accepted, limit);
    tracing::info!(
        received = report.received,
        inserted = report.merge.inserted,
        duplicates = report.merge.duplicates,
        evicted = report.merge.evicted,
        skipped = report.skipped.len(),
        "batch merged"
    );
    Ok(report)
}

/// Merge several batches one after another, e.g. one per change request.
pub fn ingest_batches<'a>(
    dataset: &mut Dataset,
    batches: impl IntoIterator<Item = &'a [RawJobRun]>,
    ctx: &IngestContext,
) -> Result<IngestReport, MatrixError> {
    let mut total = IngestReport::default();
    for batch in batches {
        total.absorb(ingest_batch(dataset, batch, ctx)?);
    }
    Ok(total)
}

/// Read the fetch layer's output: a JSON array of job-run descriptors.
pub fn load_runs(path: &Path) -> Result<Vec<RawJobRun>, MatrixError> {
    let content = fs::read_to_string(path).map_err(MatrixError::IoError)?;
    serde_json::from_str(&content).map_err(|e| {
        MatrixError::ValidationError(format!("job run list {}: {}", path.display(), e))
    })
}
