//! Folds normalized results into a [`Dataset`].
//!
//! Per incoming result: find or create the platform bucket, skip it if the
//! target list already holds its job URL, otherwise insert it, re-sort the
//! list newest first and evict from the tail down to the retention limit. The
//! job URL is appended to `job_history_links` if it is not there yet. `notes`
//! are never touched. Results the codec could not read back (blank version
//! key or job URL, negative timestamp) are rejected before any of that.
//!
//! Because eviction goes by timestamp rank and duplicates are no-ops, merging
//! batches in any order or any number of times converges on the same lists.

use crate::core::config::RetentionLimit;
use crate::core::dataset::{Dataset, Family, IncomingResult, TestResult, VersionBucket};
use rustc_hash::FxHashSet;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    pub inserted: usize,
    pub duplicates: usize,
    pub evicted: usize,
    pub links_added: usize,
    pub buckets_created: usize,
    /// Results dropped because the saved file could not hold them.
    pub rejected: usize,
}

impl MergeOutcome {
    pub fn changed(&self) -> bool {
        self.inserted > 0 || self.evicted > 0 || self.links_added > 0 || self.buckets_created > 0
    }

    pub fn absorb(&mut self, other: &MergeOutcome) {
        self.inserted += other.inserted;
        self.duplicates += other.duplicates;
        self.evicted += other.evicted;
        self.links_added += other.links_added;
        self.buckets_created += other.buckets_created;
        self.rejected += other.rejected;
    }
}

/// Sort newest first and cut to `limit`, returning how many entries were dropped.
pub fn apply_retention(list: &mut Vec<TestResult>, limit: RetentionLimit) -> usize {
    list.sort_by(|a, b| a.recency_cmp(b));
    match limit.get() {
        Some(max) if list.len() > max => {
            let dropped = list.len() - max;
            list.truncate(max);
            dropped
        }
        _ => 0,
    }
}

fn merge_one(
    bucket: &mut VersionBucket,
    incoming: IncomingResult,
    limit: RetentionLimit,
    outcome: &mut MergeOutcome,
) {
    let url = incoming.result.job_url.clone();
    let list = bucket.tests_mut(incoming.family);

    if list.iter().any(|existing| existing.job_url == url) {
        tracing::debug!(job_url = %url, "run already recorded, keeping existing entry");
        outcome.duplicates += 1;
    } else {
        list.push(incoming.result);
        outcome.inserted += 1;
        let evicted = apply_retention(list, limit);
        if evicted > 0 {
            tracing::debug!(
                version = %incoming.platform_version,
                family = %incoming.family,
                evicted,
                "retention limit reached"
            );
        }
        outcome.evicted += evicted;
    }

    if !bucket.job_history_links.iter().any(|link| *link == url) {
        bucket.job_history_links.push(url);
        outcome.links_added += 1;
    }
}

/// Merge `incoming` into `dataset` in place.
///
/// Every list in the dataset is brought within `limit` afterwards, including
/// lists the batch did not touch.
pub fn merge_into(
    dataset: &mut Dataset,
    incoming: impl IntoIterator<Item = IncomingResult>,
    limit: RetentionLimit,
) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();
    for result in incoming {
        if let Err(reason) = result.check() {
            tracing::warn!(
                version = %result.platform_version,
                job_url = %result.result.job_url,
                reason = %reason,
                "rejecting result"
            );
            outcome.rejected += 1;
            continue;
        }
        if dataset.get(&result.platform_version).is_none() {
            tracing::info!(version = %result.platform_version, "creating bucket for new platform version");
            outcome.buckets_created += 1;
        }
        let bucket = dataset.bucket_mut(&result.platform_version);
        merge_one(bucket, result, limit, &mut outcome);
    }
    for (_, bucket) in dataset.iter_mut() {
        for family in [Family::Bundle, Family::Release] {
            outcome.evicted += apply_retention(bucket.tests_mut(family), limit);
        }
    }
    outcome
}

/// Value-returning form of [`merge_into`].
pub fn merge(baseline: Dataset, incoming: &[IncomingResult], limit: RetentionLimit) -> Dataset {
    let mut dataset = baseline;
    merge_into(&mut dataset, incoming.iter().cloned(), limit);
    dataset
}

/// Report invariant violations in a loaded dataset without changing it.
pub fn audit(dataset: &Dataset, limit: RetentionLimit) -> Vec<String> {
    let mut issues = Vec::new();
    for (version, bucket) in dataset.iter() {
        for family in [Family::Bundle, Family::Release] {
            let list = bucket.tests(family);
            let mut seen = FxHashSet::default();
            for entry in list {
                if !seen.insert(entry.job_url.as_str()) {
                    issues.push(format!(
                        "{} {} tests: duplicate job URL {}",
                        version, family, entry.job_url
                    ));
                }
            }
            if list.windows(2).any(|w| w[0].recency_cmp(&w[1]).is_gt()) {
                issues.push(format!("{} {} tests: not ordered newest first", version, family));
            }
            if let Some(max) = limit.get().filter(|max| list.len() > *max) {
                issues.push(format!(
                    "{} {} tests: {} entries exceed retention limit {}",
                    version,
                    family,
                    list.len(),
                    max
                ));
            }
        }
        let mut links = FxHashSet::default();
        for link in &bucket.job_history_links {
            if !links.insert(link.as_str()) {
                issues.push(format!("{} job_history_links: duplicate {}", version, link));
            }
        }
    }
    issues
}
