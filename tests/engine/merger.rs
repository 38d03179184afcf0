use cimatrix::core::config::RetentionLimit;
use cimatrix::core::dataset::{Dataset, Family, IncomingResult, Status, TestResult, VersionBucket};
use cimatrix::engine::merger::{audit, merge, merge_into};

fn test_result(url: &str, ts: i64) -> TestResult {
    TestResult {
        platform_full_version: String::new(),
        component_version: String::new(),
        status: Status::Success,
        job_url: url.to_string(),
        timestamp: ts,
    }
}

fn incoming(version: &str, family: Family, url: &str, ts: i64) -> IncomingResult {
    IncomingResult {
        platform_version: version.to_string(),
        family,
        result: test_result(url, ts),
    }
}

fn empty_bucket_baseline(version: &str) -> Dataset {
    let mut ds = Dataset::new();
    ds.insert(version, VersionBucket::default());
    ds
}

fn timestamps(list: &[TestResult]) -> Vec<i64> {
    list.iter().map(|r| r.timestamp).collect()
}

/// Test lists must match exactly; link order reflects discovery order so only membership is compared.
fn assert_equivalent(a: &Dataset, b: &Dataset) {
    let mut va = a.versions();
    let mut vb = b.versions();
    va.sort();
    vb.sort();
    assert_eq!(va, vb);
    for version in va {
        let ba = a.get(version).unwrap();
        let bb = b.get(version).unwrap();
        assert_eq!(ba.notes, bb.notes, "notes differ for {}", version);
        assert_eq!(ba.bundle_tests, bb.bundle_tests, "bundle differs for {}", version);
        assert_eq!(ba.release_tests, bb.release_tests, "release differs for {}", version);
        let mut la = ba.job_history_links.clone();
        let mut lb = bb.job_history_links.clone();
        la.sort();
        lb.sort();
        assert_eq!(la, lb, "links differ for {}", version);
    }
}

/// Deterministic pseudo-random batch spread over two versions and both families.
fn scrambled_batch(seed: u64, count: usize) -> Vec<IncomingResult> {
    let mut state = seed;
    (0..count)
        .map(|i| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let ts = ((state >> 33) % 10_000) as i64;
            let version = if state & 1 == 0 { "4.16" } else { "4.17" };
            let family = if state & 2 == 0 { Family::Bundle } else { Family::Release };
            incoming(version, family, &format!("u-{}-{}", seed, i), ts)
        })
        .collect()
}

#[test]
fn single_bundle_run_lands_in_its_bucket() {
    let mut ds = empty_bucket_baseline("4.17");
    let outcome = merge_into(
        &mut ds,
        vec![incoming("4.17", Family::Bundle, "u1", 1000)],
        RetentionLimit::UNLIMITED,
    );
    let bucket = ds.get("4.17").unwrap();
    assert_eq!(bucket.bundle_tests, vec![test_result("u1", 1000)]);
    assert!(bucket.release_tests.is_empty());
    assert_eq!(bucket.job_history_links, vec!["u1".to_string()]);
    assert_eq!(outcome.inserted, 1);
    assert_eq!(outcome.buckets_created, 0);
}

#[test]
fn retention_keeps_the_most_recent_in_descending_order() {
    let mut ds = Dataset::new();
    ds.bucket_mut("4.17").bundle_tests =
        vec![test_result("a", 100), test_result("b", 200), test_result("c", 300)];
    merge_into(
        &mut ds,
        vec![incoming("4.17", Family::Bundle, "d", 250)],
        RetentionLimit::at_most(2),
    );
    let bundle = &ds.get("4.17").unwrap().bundle_tests;
    assert_eq!(timestamps(bundle), vec![300, 250]);
    assert_eq!(bundle[0].job_url, "c");
    assert_eq!(bundle[1].job_url, "d");
}

#[test]
fn new_bucket_is_created_with_empty_lists() {
    let mut ds = Dataset::new();
    let outcome = merge_into(
        &mut ds,
        vec![incoming("4.18", Family::Release, "r1", 5)],
        RetentionLimit::UNLIMITED,
    );
    assert_eq!(outcome.buckets_created, 1);
    let bucket = ds.get("4.18").unwrap();
    assert!(bucket.notes.is_empty());
    assert!(bucket.bundle_tests.is_empty());
    assert_eq!(bucket.release_tests.len(), 1);
}

#[test]
fn existing_bucket_annotations_survive() {
    let mut ds = Dataset::new();
    {
        let bucket = ds.bucket_mut("4.17");
        bucket.notes = vec!["z note".into(), "a note".into()];
        bucket.job_history_links = vec![
            "https://prow/history/z".into(),
            "https://prow/history/a".into(),
        ];
    }
    merge_into(&mut ds, scrambled_batch(7, 30), RetentionLimit::at_most(3));
    let bucket = ds.get("4.17").unwrap();
    assert_eq!(bucket.notes, vec!["z note".to_string(), "a note".to_string()]);
    assert_eq!(bucket.job_history_links[0], "https://prow/history/z");
    assert_eq!(bucket.job_history_links[1], "https://prow/history/a");
}

#[test]
fn duplicate_job_url_keeps_first_write() {
    let mut ds = Dataset::new();
    merge_into(
        &mut ds,
        vec![incoming("4.17", Family::Bundle, "u1", 1000)],
        RetentionLimit::UNLIMITED,
    );

    let mut refetch = incoming("4.17", Family::Bundle, "u1", 1000);
    refetch.result.status = Status::Failure;
    let outcome = merge_into(&mut ds, vec![refetch], RetentionLimit::UNLIMITED);

    let bucket = ds.get("4.17").unwrap();
    assert_eq!(bucket.bundle_tests.len(), 1);
    assert_eq!(bucket.bundle_tests[0].status, Status::Success);
    assert_eq!(bucket.job_history_links.len(), 1);
    assert_eq!(outcome.duplicates, 1);
    assert!(!outcome.changed());
}

#[test]
fn equal_timestamps_order_by_job_url() {
    let mut ds = Dataset::new();
    merge_into(
        &mut ds,
        vec![
            incoming("4.17", Family::Bundle, "b", 10),
            incoming("4.17", Family::Bundle, "c", 10),
            incoming("4.17", Family::Bundle, "a", 10),
        ],
        RetentionLimit::at_most(2),
    );
    let urls: Vec<_> = ds
        .get("4.17")
        .unwrap()
        .bundle_tests
        .iter()
        .map(|r| r.job_url.clone())
        .collect();
    assert_eq!(urls, vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn families_are_kept_apart() {
    let mut ds = Dataset::new();
    merge_into(
        &mut ds,
        vec![
            incoming("4.17", Family::Bundle, "u1", 1),
            incoming("4.17", Family::Release, "u2", 2),
        ],
        RetentionLimit::UNLIMITED,
    );
    let bucket = ds.get("4.17").unwrap();
    assert_eq!(bucket.bundle_tests.len(), 1);
    assert_eq!(bucket.release_tests.len(), 1);
    assert_eq!(bucket.job_history_links, vec!["u1".to_string(), "u2".to_string()]);
}

#[test]
fn each_result_lands_in_exactly_one_bucket() {
    let batch = scrambled_batch(11, 60);
    let mut ds = Dataset::new();
    merge_into(&mut ds, batch.clone(), RetentionLimit::UNLIMITED);
    for item in &batch {
        let holders: Vec<_> = ds
            .iter()
            .filter(|(_, b)| {
                b.bundle_tests
                    .iter()
                    .chain(b.release_tests.iter())
                    .any(|r| r.job_url == item.result.job_url)
            })
            .map(|(v, _)| v.to_string())
            .collect();
        assert_eq!(holders, vec![item.platform_version.clone()]);
    }
}

#[test]
fn merging_twice_is_idempotent() {
    let batch = scrambled_batch(3, 50);
    let mut once = empty_bucket_baseline("4.17");
    once.bucket_mut("4.17").notes.push("hand written".into());
    let baseline = once.clone();

    merge_into(&mut once, batch.clone(), RetentionLimit::at_most(4));
    let mut twice = once.clone();
    let outcome = merge_into(&mut twice, batch.clone(), RetentionLimit::at_most(4));

    assert_eq!(once, twice);
    assert_eq!(once.digest(), twice.digest());
    assert_eq!(outcome.inserted, outcome.evicted);
    assert_eq!(once.get("4.17").unwrap().notes, baseline.get("4.17").unwrap().notes);
}

#[test]
fn batch_order_does_not_matter() {
    let a = scrambled_batch(21, 40);
    let b = scrambled_batch(42, 40);
    let limit = RetentionLimit::at_most(6);

    let mut ab = Dataset::new();
    merge_into(&mut ab, a.clone(), limit);
    merge_into(&mut ab, b.clone(), limit);

    let mut ba = Dataset::new();
    merge_into(&mut ba, b.clone(), limit);
    merge_into(&mut ba, a.clone(), limit);

    assert_equivalent(&ab, &ba);

    let mut reversed: Vec<_> = a.iter().chain(b.iter()).cloned().collect();
    reversed.reverse();
    let mut one_shot = Dataset::new();
    merge_into(&mut one_shot, reversed, limit);
    assert_equivalent(&ab, &one_shot);
}

#[test]
fn retention_bound_holds_and_keeps_top_n() {
    let limit = 5;
    let mut ds = Dataset::new();
    let mut everything = Vec::new();
    for seed in 1..=6 {
        let batch = scrambled_batch(seed, 25);
        everything.extend(batch.clone());
        merge_into(&mut ds, batch, RetentionLimit::at_most(limit));

        for (_, bucket) in ds.iter() {
            assert!(bucket.bundle_tests.len() <= limit);
            assert!(bucket.release_tests.len() <= limit);
        }
    }

    for (version, bucket) in ds.iter() {
        for family in [Family::Bundle, Family::Release] {
            let mut expected: Vec<TestResult> = everything
                .iter()
                .filter(|r| r.platform_version == version && r.family == family)
                .map(|r| r.result.clone())
                .collect();
            expected.sort_by(|x, y| x.recency_cmp(y));
            expected.truncate(limit);
            assert_eq!(bucket.tests(family), expected.as_slice());
        }
    }
}

#[test]
fn job_urls_stay_unique_across_repeated_merges() {
    let mut ds = Dataset::new();
    for seed in [5, 6, 5, 7, 6] {
        merge_into(&mut ds, scrambled_batch(seed, 20), RetentionLimit::UNLIMITED);
    }
    assert!(audit(&ds, RetentionLimit::UNLIMITED).is_empty());
    assert_eq!(ds.result_count(), 60);
}

#[test]
fn oversized_baseline_is_trimmed_even_without_new_runs() {
    let mut ds = Dataset::new();
    ds.bucket_mut("4.15").release_tests =
        vec![test_result("a", 1), test_result("b", 3), test_result("c", 2)];
    let outcome = merge_into(&mut ds, Vec::new(), RetentionLimit::at_most(1));
    assert_eq!(outcome.evicted, 2);
    assert_eq!(timestamps(&ds.get("4.15").unwrap().release_tests), vec![3]);
}

#[test]
fn value_form_returns_merged_dataset() {
    let baseline = empty_bucket_baseline("4.17");
    let merged = merge(
        baseline.clone(),
        &[incoming("4.17", Family::Bundle, "u1", 1000)],
        RetentionLimit::UNLIMITED,
    );
    assert!(baseline.get("4.17").unwrap().bundle_tests.is_empty());
    assert_eq!(merged.get("4.17").unwrap().bundle_tests.len(), 1);
}

#[test]
fn evicted_run_refetched_stays_evicted() {
    let mut ds = Dataset::new();
    merge_into(
        &mut ds,
        vec![
            incoming("4.17", Family::Bundle, "old", 1),
            incoming("4.17", Family::Bundle, "new", 2),
        ],
        RetentionLimit::at_most(1),
    );
    merge_into(
        &mut ds,
        vec![incoming("4.17", Family::Bundle, "old", 1)],
        RetentionLimit::at_most(1),
    );
    let bucket = ds.get("4.17").unwrap();
    assert_eq!(bucket.bundle_tests, vec![test_result("new", 2)]);
    assert_eq!(bucket.job_history_links, vec!["old".to_string(), "new".to_string()]);
}

#[test]
fn results_the_codec_cannot_hold_are_rejected() {
    let mut ds = empty_bucket_baseline("4.17");
    let outcome = merge_into(
        &mut ds,
        vec![
            incoming("4.17", Family::Bundle, "negative", -1),
            incoming("", Family::Release, "no-version", 2),
            incoming("4.17", Family::Bundle, " ", 3),
            incoming("4.17", Family::Bundle, "ok", 4),
        ],
        RetentionLimit::UNLIMITED,
    );
    assert_eq!(outcome.rejected, 3);
    assert_eq!(outcome.inserted, 1);
    assert_eq!(outcome.buckets_created, 0);
    assert_eq!(ds.versions(), vec!["4.17"]);
    assert_eq!(ds.get("4.17").unwrap().job_history_links, vec!["ok".to_string()]);
    assert!(ds.check().is_ok());
}
