//! End-to-end checks against replayed site listings

use crate::fixtures::{context, dump_listers, records, site_tree};
use consistency::services::reconcile::prefix_filter;
use consistency::services::registry::{MemoryRegistry, Request};
use consistency::{EmptyRemover, Filters, check_site, submit_actions};

#[test]
fn test_missing_file_is_reported() {
    let ctx = context(&["a"]);
    let remote = site_tree(&[("/store/a/1.root", 10)]);
    let mut listers = dump_listers(&remote, 2);
    let mut remover = EmptyRemover::dry_run(&ctx.site, &ctx.options.location, None);

    let report = check_site(
        &ctx,
        records(&[("/store/a/1.root", 10), ("/store/a/2.root", 20)]),
        &mut listers,
        &mut remover,
        &Filters::new(),
    )
    .unwrap();

    assert_eq!(report.reconciliation.missing, vec!["/store/a/2.root"]);
    assert_eq!(report.reconciliation.missing_size, 20);
    assert!(report.reconciliation.orphan.is_empty());
    assert!(!report.is_consistent());
    assert_eq!(report.inventory_files, 2);
    assert_eq!(report.remote_files, 1);
}

#[test]
fn test_orphan_file_is_reported() {
    let ctx = context(&["b"]);
    let remote = site_tree(&[("/store/b/x.root", 5)]);
    let mut listers = dump_listers(&remote, 2);
    let mut remover = EmptyRemover::dry_run(&ctx.site, &ctx.options.location, None);

    let report = check_site(&ctx, vec![], &mut listers, &mut remover, &Filters::new()).unwrap();

    assert_eq!(report.reconciliation.orphan, vec!["/store/b/x.root"]);
    assert_eq!(report.reconciliation.orphan_size, 5);
    assert!(report.reconciliation.missing.is_empty());
}

#[test]
fn test_accepted_orphans_are_dropped() {
    let ctx = context(&["b"]);
    let remote = site_tree(&[("/store/b/x.root", 5)]);
    let mut listers = dump_listers(&remote, 2);
    let mut remover = EmptyRemover::dry_run(&ctx.site, &ctx.options.location, None);
    let filters = Filters::new().with_orphan_ok(prefix_filter(vec!["/store/b".to_string()]));

    let report = check_site(&ctx, vec![], &mut listers, &mut remover, &filters).unwrap();

    assert!(report.reconciliation.orphan.is_empty());
    assert_eq!(report.reconciliation.orphan_size, 0);
    assert!(report.is_consistent());
}

#[test]
fn test_identical_site_is_consistent() {
    let entries = [
        ("/store/mc/a/1.root", 10),
        ("/store/mc/a/2.root", 20),
        ("/store/data/x.root", 7),
    ];
    let ctx = context(&["mc", "data"]);
    let remote = site_tree(&entries);
    let mut listers = dump_listers(&remote, 3);
    let mut remover = EmptyRemover::dry_run(&ctx.site, &ctx.options.location, None);

    let report =
        check_site(&ctx, records(&entries), &mut listers, &mut remover, &Filters::new()).unwrap();

    assert!(report.is_consistent());
    assert_eq!(report.remote_files, 3);
    assert_eq!(report.inventory_files, 3);
    assert!(report.finished_at >= report.started_at);
}

#[test]
fn test_only_configured_directories_are_compared() {
    let ctx = context(&["mc"]);
    let remote = site_tree(&[("/store/mc/a.root", 1), ("/store/data/b.root", 2)]);
    let mut listers = dump_listers(&remote, 2);
    let mut remover = EmptyRemover::dry_run(&ctx.site, &ctx.options.location, None);

    // inventory entries outside `mc` must not show up as missing
    let report = check_site(
        &ctx,
        records(&[("/store/mc/a.root", 1), ("/store/user/c.root", 3)]),
        &mut listers,
        &mut remover,
        &Filters::new(),
    )
    .unwrap();

    assert!(report.is_consistent());
    assert_eq!(report.remote_files, 1);
}

#[test]
fn test_submit_actions_forwards_differences() {
    let ctx = context(&["a"]);
    let remote = site_tree(&[("/store/a/1.root", 10), ("/store/a/orphan.root", 3)]);
    let mut listers = dump_listers(&remote, 1);
    let mut remover = EmptyRemover::dry_run(&ctx.site, &ctx.options.location, None);
    let report = check_site(
        &ctx,
        records(&[("/store/a/1.root", 10), ("/store/a/lost.root", 4)]),
        &mut listers,
        &mut remover,
        &Filters::new(),
    )
    .unwrap();

    let registry =
        MemoryRegistry::new().with_unrecoverable(vec!["/store/a/lost.root".to_string()]);
    let summary = submit_actions(&registry, &ctx.site, &report);

    assert_eq!(summary.deleted, 1);
    assert!(summary.no_disk.is_empty());
    assert_eq!(summary.unrecoverable, vec!["/store/a/lost.root"]);
    // nothing to transfer from when no replica is left
    assert_eq!(
        registry.requests(),
        vec![Request::Delete {
            site: ctx.site.clone(),
            path: "/store/a/orphan.root".to_string()
        }]
    );
}
