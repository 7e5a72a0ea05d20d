//! Retries and unlisted directories

use crate::fixtures::{FlakyLister, context, fast_options, records, site_tree};
use consistency::services::orchestrator::ListingOrchestrator;
use consistency::tree::FileInfo;
use consistency::{AlwaysRunning, EmptyRemover, Filters, RunContext, UNLISTED_MARKER, check_site};
use std::sync::Arc;

#[test]
fn test_transient_failure_is_retried() {
    let ctx = context(&["c"]);
    let remote = site_tree(&[("/store/c/sub/1.root", 1), ("/store/c/2.root", 2)]);
    let flaky = FlakyLister::new(&remote, &[("/store/c/sub", 2)]);
    let mut listers = flaky.pool(3);

    let tree = ListingOrchestrator::new(&ctx)
        .create_dirinfo("/store", "c", &mut listers, None)
        .unwrap();

    assert_eq!(flaky.calls_for("/store/c/sub"), 3);
    assert_eq!(tree.count_files(), 2);
    assert_eq!(tree.count_unlisted(), 0);
    assert!(tree.get_node("sub").unwrap().is_listed());
}

#[test]
fn test_single_worker_retries_after_backoff() {
    let mut options = fast_options(&["c"]);
    options.threads = 1;
    let ctx = RunContext::new("T2_TEST", options, Arc::new(AlwaysRunning));
    let remote = site_tree(&[("/store/c/1.root", 1)]);
    let flaky = FlakyLister::new(&remote, &[("/store/c", 1)]);
    let mut listers = flaky.pool(1);

    let tree = ListingOrchestrator::new(&ctx)
        .create_dirinfo("/store", "c", &mut listers, None)
        .unwrap();

    assert_eq!(flaky.calls_for("/store/c"), 2);
    assert_eq!(tree.count_files(), 1);
}

#[test]
fn test_exhausted_retries_flag_directory_unlisted() {
    let ctx = context(&["c"]);
    let remote = site_tree(&[("/store/c/1.root", 1)]);
    let flaky = FlakyLister::new(&remote, &[("/store/c", usize::MAX)]);
    let mut listers = flaky.pool(2);

    let tree = ListingOrchestrator::new(&ctx)
        .create_dirinfo("/store", "c", &mut listers, None)
        .unwrap();

    assert_eq!(flaky.calls_for("/store/c"), ctx.options.max_attempts);
    assert!(tree.is_unlisted());
    let files: Vec<(&str, &FileInfo)> = tree.files().collect();
    assert_eq!(files, vec![(UNLISTED_MARKER, &FileInfo { size: 0, mtime: 0 })]);
}

#[test]
fn test_unlisted_directory_hides_differences() {
    let ctx = context(&["a", "c"]);
    let remote = site_tree(&[
        ("/store/a/1.root", 1),
        ("/store/c/remote_only.root", 2),
        ("/store/c/deep/more.root", 3),
    ]);
    let flaky = FlakyLister::new(&remote, &[("/store/c/deep", usize::MAX)]);
    let mut listers = flaky.pool(2);
    let mut remover = EmptyRemover::dry_run(&ctx.site, &ctx.options.location, None);

    let report = check_site(
        &ctx,
        records(&[
            ("/store/a/1.root", 1),
            ("/store/c/remote_only.root", 2),
            ("/store/c/deep/inventory_only.root", 4),
        ]),
        &mut listers,
        &mut remover,
        &Filters::new(),
    )
    .unwrap();

    assert!(report.reconciliation.missing.is_empty());
    assert!(report.reconciliation.orphan.is_empty());
    assert_eq!(report.reconciliation.unlisted, vec!["/store/c/deep"]);
    assert!(!report.is_consistent());
}
