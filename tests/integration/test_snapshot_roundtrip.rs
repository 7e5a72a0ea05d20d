//! Snapshot round-trip tests

use crate::fixtures::{context, create_site_fixture, dump_listers, site_tree};
use consistency::io::snapshot::{meta_for, read_tree, write_tree};
use consistency::{FileEntry, list_site};
use std::process::Command;
use tempfile::TempDir;

#[test]
fn test_listed_tree_survives_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = context(&["mc", "data"]);
    let remote = site_tree(&[
        ("/store/mc/a/1.root", 10),
        ("/store/mc/a/2.root", 20),
        ("/store/mc/b/c/3.root", 5),
        ("/store/data/x.root", 7),
    ]);
    let mut listers = dump_listers(&remote, 2);
    let mut tree = list_site(&ctx, &mut listers, None).unwrap();
    // a pending and an unlisted directory must keep their state
    tree.get_node_mut("mc/pending", true).unwrap();
    tree.get_node_mut("data/broken", true)
        .unwrap()
        .add_files([FileEntry::unlisted_marker()]);
    tree.setup_hash();

    let path = temp_dir.path().join("snapshots/site.parquet");
    let path = path.to_str().unwrap();
    write_tree(path, &meta_for(&ctx.site, &tree), &tree).unwrap();
    let (meta, mut loaded) = read_tree(path).unwrap();
    loaded.setup_hash();

    assert_eq!(meta.root, "/store");
    assert_eq!(meta.site, ctx.site);
    assert_eq!(loaded.count_files(), tree.count_files());
    assert_eq!(loaded.directory_size(), tree.directory_size());
    assert_eq!(loaded.count_nodes(), tree.count_nodes());
    assert_eq!(loaded.hash(), tree.hash());
    assert_eq!(loaded.get_unlisted(), vec!["/store/data/broken"]);
    assert!(!loaded.get_node("mc/pending").unwrap().is_listed());
    assert!(loaded.get_node("mc/b").unwrap().is_listed());
}

#[test]
fn test_list_then_view_commands() {
    let temp_dir = TempDir::new().unwrap();
    let root = create_site_fixture(temp_dir.path()).unwrap();
    let snapshot = temp_dir.path().join("site.parquet");

    let list = Command::new(env!("CARGO_BIN_EXE_consistency"))
        .arg("list")
        .arg(&root)
        .arg("--snapshot")
        .arg(&snapshot)
        .args(["--threads", "2", "--quiet"])
        .output()
        .expect("Failed to execute command");
    assert!(list.status.success(), "{}", String::from_utf8_lossy(&list.stderr));
    assert!(snapshot.exists());

    let view = Command::new(env!("CARGO_BIN_EXE_consistency"))
        .arg("view")
        .arg(&snapshot)
        .args(["--path", "/store/mc", "--json"])
        .output()
        .expect("Failed to execute command");
    assert!(view.status.success(), "{}", String::from_utf8_lossy(&view.stderr));

    let json: serde_json::Value = serde_json::from_slice(&view.stdout).unwrap();
    assert_eq!(json["root"], "/store");
    assert_eq!(json["node"]["path"], "/store/mc");
    assert_eq!(json["node"]["files"], 3);
    assert_eq!(json["node"]["size_bytes"], 35);
    assert_eq!(json["children"][0]["path"], "/store/mc/a");
}

#[test]
fn test_read_missing_snapshot_fails() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nothing.parquet");
    assert!(read_tree(path.to_str().unwrap()).is_err());
}
