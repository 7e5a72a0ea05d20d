//! Checks of a site mounted on the local filesystem, through the API and the binary

use crate::fixtures::{create_site_fixture, fast_options, write_inventory, write_sized};
use consistency::io::inventory::read_inventory_file;
use consistency::services::lister::{LocalLister, build_pool};
use consistency::{AlwaysRunning, EmptyRemover, Filters, Lister, RunContext, check_site};
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use tempfile::TempDir;

const INVENTORY: [(&str, u64); 5] = [
    ("/store/mc/a/1.root", 10),
    ("/store/mc/a/2.root", 20),
    ("/store/mc/b/3.root", 5),
    ("/store/mc/b/lost.root", 9),
    ("/store/data/x.root", 7),
];

fn local_listers(root: &Path, count: usize) -> Vec<Box<dyn Lister>> {
    let endpoints = vec![root.to_string_lossy().into_owned()];
    build_pool("T2_TEST", &endpoints, count, |site, endpoint| {
        Ok(Box::new(LocalLister::new(site, endpoint, "/store")) as Box<dyn Lister>)
    })
    .unwrap()
}

#[test]
fn test_check_local_site_via_api() {
    let temp_dir = TempDir::new().unwrap();
    let root = create_site_fixture(temp_dir.path()).unwrap();
    let inventory_path = temp_dir.path().join("inventory.txt");
    write_inventory(&inventory_path, &INVENTORY).unwrap();

    let ctx = RunContext::new(
        "T2_TEST",
        fast_options(&["mc", "data"]),
        Arc::new(AlwaysRunning),
    );
    let mut listers = local_listers(&root, 3);
    let mut remover = EmptyRemover::dry_run(&ctx.site, &ctx.options.location, None);
    let inventory = read_inventory_file(&inventory_path).unwrap();

    let report = check_site(&ctx, inventory, &mut listers, &mut remover, &Filters::new()).unwrap();

    assert_eq!(report.reconciliation.missing, vec!["/store/mc/b/lost.root"]);
    assert_eq!(report.reconciliation.missing_size, 9);
    assert!(report.reconciliation.orphan.is_empty());
    assert!(report.reconciliation.unlisted.is_empty());
    assert_eq!(report.remote_files, 4);
    let removed: Vec<&str> = report
        .removed_directories
        .iter()
        .map(|dir| dir.path.as_str())
        .collect();
    assert_eq!(removed, vec!["/store/mc/empty"]);

    // dry run: the directory is only reported
    assert!(root.join("mc/empty").is_dir());
}

#[test]
fn test_new_files_are_ignored_with_ignore_age() {
    let temp_dir = TempDir::new().unwrap();
    let root = create_site_fixture(temp_dir.path()).unwrap();
    write_sized(root.join("mc/a/fresh.root"), 3).unwrap();

    let mut options = fast_options(&["mc"]);
    options.ignore_age = Some(std::time::Duration::from_secs(3600));
    let ctx = RunContext::new("T2_TEST", options, Arc::new(AlwaysRunning));
    let mut listers = local_listers(&root, 2);
    let mut remover = EmptyRemover::for_context(&ctx, Box::new(|_| false), None);

    let report = check_site(&ctx, vec![], &mut listers, &mut remover, &Filters::new()).unwrap();

    // everything on disk was just written, so nothing is old enough to report
    assert!(report.reconciliation.orphan.is_empty());
    assert!(report.removed_directories.is_empty());
}

#[test]
fn test_check_command_json() {
    let temp_dir = TempDir::new().unwrap();
    let root = create_site_fixture(temp_dir.path()).unwrap();
    let inventory_path = temp_dir.path().join("inventory.txt");
    write_inventory(&inventory_path, &INVENTORY).unwrap();
    let report_base = temp_dir.path().join("out/site");

    let output = Command::new(env!("CARGO_BIN_EXE_consistency"))
        .arg("check")
        .arg(&root)
        .arg("--inventory")
        .arg(&inventory_path)
        .args(["--dirs", "mc,data", "--threads", "2", "--json", "--report"])
        .arg(&report_base)
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(3));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["site"], "local");
    assert_eq!(json["reconciliation"]["missing"][0], "/store/mc/b/lost.root");

    let missing = std::fs::read_to_string(temp_dir.path().join("out/site_missing.txt")).unwrap();
    assert_eq!(missing.trim(), "/store/mc/b/lost.root");
}

#[test]
fn test_help_command() {
    let output = Command::new(env!("CARGO_BIN_EXE_consistency"))
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Site Consistency CLI"));
    assert!(stdout.contains("check"));
}
