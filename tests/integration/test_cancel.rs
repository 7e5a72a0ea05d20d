//! Cancellation through the liveness check

use crate::fixtures::{StoppingLister, context_with, fast_options, records, site_tree};
use consistency::services::orchestrator::ListingOrchestrator;
use consistency::{EmptyRemover, Error, Filters, FlagCheck, Lister, check_site, list_site};
use std::sync::Arc;

fn large_site() -> Arc<consistency::DirectoryInfo> {
    let lfns: Vec<String> = (0..50)
        .map(|i| format!("/store/mc/dir{i}/sub/file.root"))
        .collect();
    let entries: Vec<(&str, u64)> = lfns.iter().map(|lfn| (lfn.as_str(), 1)).collect();
    site_tree(&entries)
}

#[test]
fn test_stopped_site_cancels_listing() {
    let flag = FlagCheck::new();
    let ctx = context_with(fast_options(&["mc"]), Arc::new(flag.clone()));
    let site = large_site();
    let mut listers: Vec<Box<dyn Lister>> =
        vec![Box::new(StoppingLister::new(&site, flag.clone(), 3))];

    let result = ListingOrchestrator::new(&ctx).create_dirinfo("/store", "mc", &mut listers, None);

    match result {
        Err(Error::Cancelled { site }) => assert_eq!(site, ctx.site),
        other => panic!("expected cancellation, got {other:?}"),
    }
}

#[test]
fn test_stopped_site_returns_no_report() {
    let flag = FlagCheck::new();
    let ctx = context_with(fast_options(&["mc"]), Arc::new(flag.clone()));
    let site = large_site();
    let mut listers: Vec<Box<dyn Lister>> = vec![
        Box::new(StoppingLister::new(&site, flag.clone(), 1)),
        Box::new(StoppingLister::new(&site, flag.clone(), 1)),
    ];
    let mut remover = EmptyRemover::dry_run(&ctx.site, &ctx.options.location, None);

    let result = check_site(
        &ctx,
        records(&[("/store/mc/dir0/sub/file.root", 1)]),
        &mut listers,
        &mut remover,
        &Filters::new(),
    );

    assert!(matches!(result, Err(Error::Cancelled { .. })));
}

#[test]
fn test_site_stopped_before_start() {
    let flag = FlagCheck::new();
    flag.stop();
    let ctx = context_with(fast_options(&["mc"]), Arc::new(flag.clone()));
    let site = large_site();
    let mut listers: Vec<Box<dyn Lister>> =
        vec![Box::new(StoppingLister::new(&site, flag, usize::MAX))];

    assert!(matches!(
        list_site(&ctx, &mut listers, None),
        Err(Error::Cancelled { .. })
    ));
}
