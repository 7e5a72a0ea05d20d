//! Contract test for JSON output shape

use crate::fixtures::{context, dump_listers, records, site_tree};
use consistency::cli::output::{format_json, format_view_json, summarize_children};
use consistency::io::snapshot::meta_for;
use consistency::{EmptyRemover, Filters, check_site};

#[test]
fn test_check_report_fields() {
    let ctx = context(&["a"]);
    let remote = site_tree(&[("/store/a/1.root", 10), ("/store/a/extra.root", 1)]);
    let mut listers = dump_listers(&remote, 1);
    let mut remover = EmptyRemover::dry_run(&ctx.site, &ctx.options.location, None);
    let report = check_site(
        &ctx,
        records(&[("/store/a/1.root", 10)]),
        &mut listers,
        &mut remover,
        &Filters::new(),
    )
    .unwrap();

    let json: serde_json::Value = serde_json::from_str(&format_json(&report)).unwrap();
    for field in [
        "site",
        "reconciliation",
        "removed_directories",
        "inventory_files",
        "remote_files",
        "remote_nodes",
        "started_at",
        "finished_at",
    ] {
        assert!(json.get(field).is_some(), "missing field {field}");
    }
    let reconciliation = &json["reconciliation"];
    for field in [
        "missing",
        "missing_size",
        "orphan",
        "orphan_size",
        "orphan_directories",
        "unlisted",
    ] {
        assert!(reconciliation.get(field).is_some(), "missing field {field}");
    }
    assert_eq!(reconciliation["orphan"][0], "/store/a/extra.root");
    assert_eq!(reconciliation["orphan_size"], 1);
}

#[test]
fn test_view_fields() {
    let tree = site_tree(&[("/store/mc/a.root", 4)]);
    let (node, children) = summarize_children(&tree, "/store");
    let json: serde_json::Value =
        serde_json::from_str(&format_view_json(&meta_for("T2_TEST", &tree), &node, &children))
            .unwrap();

    assert_eq!(json["site"], "T2_TEST");
    assert_eq!(json["node"]["files"], 1);
    assert_eq!(json["node"]["listed"], true);
    let child = &json["children"][0];
    for field in ["path", "listed", "files", "size_bytes", "directories", "unlisted"] {
        assert!(child.get(field).is_some(), "missing field {field}");
    }
}
