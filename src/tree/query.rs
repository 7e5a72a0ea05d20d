//! Read-only queries over a directory tree

use super::{DirectoryInfo, is_old, join_path};
use crate::models::UNLISTED_MARKER;
use std::fmt;

impl DirectoryInfo {
    /// Number of files in the subtree, not counting unlisted markers.
    #[must_use]
    pub fn count_files(&self) -> u64 {
        if let Some(summary) = self.summary {
            return summary.files;
        }
        let own = self
            .files()
            .filter(|(name, _)| *name != UNLISTED_MARKER)
            .count() as u64;
        own + self.directories().map(DirectoryInfo::count_files).sum::<u64>()
    }

    /// Number of unlisted markers in the subtree.
    #[must_use]
    pub fn count_unlisted(&self) -> u64 {
        if let Some(summary) = self.summary {
            return summary.unlisted;
        }
        u64::from(self.is_unlisted())
            + self
                .directories()
                .map(DirectoryInfo::count_unlisted)
                .sum::<u64>()
    }

    /// Number of directory nodes in the subtree, including this one.
    #[must_use]
    pub fn count_nodes(&self) -> u64 {
        if let Some(summary) = self.summary {
            return summary.nodes;
        }
        1 + self
            .directories()
            .map(DirectoryInfo::count_nodes)
            .sum::<u64>()
    }

    /// Total size in bytes of every file in the subtree.
    #[must_use]
    pub fn directory_size(&self) -> u64 {
        if let Some(summary) = self.summary {
            return summary.size;
        }
        let own: u64 = self.files().map(|(_, info)| info.size).sum();
        own + self
            .directories()
            .map(DirectoryInfo::directory_size)
            .sum::<u64>()
    }

    /// Full LFNs of every file at or older than `cutoff`, sorted.
    ///
    /// Paths start with this node's name. Unlisted markers are never returned.
    #[must_use]
    pub fn get_files(&self, cutoff: Option<i64>) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_files(&self.name, cutoff, &mut out);
        out.sort();
        out
    }

    fn collect_files(&self, full_path: &str, cutoff: Option<i64>, out: &mut Vec<String>) {
        for (name, info) in self.files() {
            if name != UNLISTED_MARKER && is_old(info.mtime, cutoff) {
                out.push(join_path(full_path, name));
            }
        }
        for child in self.directories() {
            child.collect_files(&join_path(full_path, &child.name), cutoff, out);
        }
    }

    /// Full paths of every directory carrying the unlisted marker, sorted.
    #[must_use]
    pub fn get_unlisted(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_unlisted(&self.name, &mut out);
        out.sort();
        out
    }

    fn collect_unlisted(&self, full_path: &str, out: &mut Vec<String>) {
        if self.is_unlisted() {
            out.push(full_path.to_string());
        }
        for child in self.directories() {
            child.collect_unlisted(&join_path(full_path, &child.name), out);
        }
    }

    /// Full paths of listed directories whose whole subtree holds no files
    /// and which were last modified at or before `cutoff`.
    ///
    /// Children come before their parents, so removing in order works
    /// bottom-up. The root itself is never returned.
    #[must_use]
    pub fn empty_nodes(&self, cutoff: Option<i64>) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_empty(&self.name, cutoff, true, &mut out);
        out
    }

    fn collect_empty(
        &self,
        full_path: &str,
        cutoff: Option<i64>,
        is_root: bool,
        out: &mut Vec<String>,
    ) -> bool {
        let mut empty = self
            .files
            .as_ref()
            .is_some_and(std::collections::BTreeMap::is_empty);

        for child in self.directories() {
            let child_path = join_path(full_path, &child.name);
            if !child.collect_empty(&child_path, cutoff, false, out) {
                empty = false;
            }
        }

        let removable = empty && is_old(self.mtime, cutoff);
        if removable && !is_root {
            out.push(full_path.to_string());
        }
        removable
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = "  ".repeat(depth);
        let state = match (&self.files, self.is_unlisted()) {
            (None, _) => " [pending]",
            (Some(_), true) => " [unlisted]",
            (Some(_), false) => "",
        };
        writeln!(f, "{indent}{}/ mtime={}{state}", self.name, self.mtime)?;
        if let Some(hash) = self.hash {
            writeln!(f, "{indent}  hash={hash}")?;
        }
        for (name, info) in self.files() {
            if name != UNLISTED_MARKER {
                writeln!(f, "{indent}  {name} {} {}", info.size, info.mtime)?;
            }
        }
        for child in self.directories() {
            child.write_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for DirectoryInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}
