//! Output formatting for CLI

use crate::models::SnapshotMeta;
use crate::tree::{DirectoryInfo, join_path};
use crate::CheckReport;
use serde::Serialize;

/// Longest list of paths printed per category in text output
const MAX_LISTED_PATHS: usize = 20;

const COLOR_RED: &str = "\x1b[31m";
const COLOR_YELLOW: &str = "\x1b[33m";
const COLOR_GREEN: &str = "\x1b[32m";
const COLOR_RESET: &str = "\x1b[0m";

/// Human-readable size with binary units
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    #[allow(clippy::cast_precision_loss)]
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

fn print_paths(title: &str, color: &str, paths: &[String]) {
    if paths.is_empty() {
        return;
    }
    println!("{color}{title} ({}){COLOR_RESET}", paths.len());
    for path in paths.iter().take(MAX_LISTED_PATHS) {
        println!("  {path}");
    }
    if paths.len() > MAX_LISTED_PATHS {
        println!("  ... and {} more", paths.len() - MAX_LISTED_PATHS);
    }
}

/// Print a check report as text
pub fn format_text(report: &CheckReport) {
    let result = &report.reconciliation;
    let status = if report.is_consistent() {
        format!("{COLOR_GREEN}consistent{COLOR_RESET}")
    } else {
        format!("{COLOR_RED}inconsistent{COLOR_RESET}")
    };

    println!("Site {}: {status}", report.site);
    println!(
        "  inventory files: {:>10}   remote files: {:>10}   remote directories: {:>8}",
        report.inventory_files, report.remote_files, report.remote_nodes
    );
    println!(
        "  missing: {:>6} ({:>10})   orphan: {:>6} ({:>10})",
        result.missing.len(),
        format_size(result.missing_size),
        result.orphan.len(),
        format_size(result.orphan_size)
    );
    println!(
        "  orphan directories: {}   unlisted: {}   empty directories: {}",
        result.orphan_directories.len(),
        result.unlisted.len(),
        report.removed_directories.len()
    );

    print_paths("Missing files", COLOR_RED, &result.missing);
    print_paths("Orphan files", COLOR_YELLOW, &result.orphan);
    print_paths("Orphan directories", COLOR_YELLOW, &result.orphan_directories);
    print_paths("Unlisted directories", COLOR_YELLOW, &result.unlisted);
    let removed: Vec<String> = report
        .removed_directories
        .iter()
        .map(|dir| dir.path.clone())
        .collect();
    print_paths("Empty directories", COLOR_YELLOW, &removed);
}

/// Format a check report as JSON
pub fn format_json(report: &CheckReport) -> String {
    serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
}

/// Totals for one directory of a stored tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSummary {
    pub path: String,
    pub listed: bool,
    pub files: u64,
    pub size_bytes: u64,
    pub directories: u64,
    pub unlisted: u64,
}

impl NodeSummary {
    #[must_use]
    pub fn of(node: &DirectoryInfo, path: &str) -> Self {
        Self {
            path: path.to_string(),
            listed: node.is_listed(),
            files: node.count_files(),
            size_bytes: node.directory_size(),
            directories: node.count_nodes().saturating_sub(1),
            unlisted: node.count_unlisted(),
        }
    }
}

/// Summaries of `node` and each of its immediate subdirectories, largest first
#[must_use]
pub fn summarize_children(node: &DirectoryInfo, path: &str) -> (NodeSummary, Vec<NodeSummary>) {
    let mut children: Vec<NodeSummary> = node
        .directories()
        .map(|child| NodeSummary::of(child, &join_path(path, child.name())))
        .collect();
    children.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes).then(a.path.cmp(&b.path)));
    (NodeSummary::of(node, path), children)
}

/// Print a stored tree node and its children as text
pub fn format_view_text(meta: &SnapshotMeta, node: &NodeSummary, children: &[NodeSummary]) {
    println!(
        "Snapshot of {} at {} (created {})",
        meta.root, meta.site, meta.created_at
    );
    println!(
        "{}/ {} files, {}, {} directories",
        node.path,
        node.files,
        format_size(node.size_bytes),
        node.directories
    );
    if node.unlisted > 0 {
        println!(
            "{COLOR_YELLOW}{} directories could not be listed{COLOR_RESET}",
            node.unlisted
        );
    }
    for child in children {
        let marker = match (child.listed, child.unlisted) {
            (false, _) => " [pending]",
            (true, 0) => "",
            (true, _) => " [unlisted below]",
        };
        println!(
            "{:<70} {:>10} {:>10} files{marker}",
            format!("{}/", child.path),
            format_size(child.size_bytes),
            child.files
        );
    }
}

/// Format a stored tree node and its children as JSON
pub fn format_view_json(meta: &SnapshotMeta, node: &NodeSummary, children: &[NodeSummary]) -> String {
    let output = serde_json::json!({
        "root": meta.root,
        "site": meta.site,
        "created_at": meta.created_at,
        "node": node,
        "children": children,
    });

    serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
}
