//! In-memory directory tree built from inventories and remote listings.
//!
//! A [`DirectoryInfo`] owns its whole subtree. Nodes are created lazily the
//! first time a relative path is referenced and destroyed only by an explicit
//! [`DirectoryInfo::remove_node`] of an empty directory (or by dropping the
//! tree). Invariants:
//!
//! - Child directory names and file names are unique within a directory
//!   (both are kept in ordered maps keyed by name).
//! - Any mutable access through [`DirectoryInfo::get_node_mut`] clears the
//!   cached hash and summary of every node on the path, so a stale subtree
//!   hash can never survive a mutation below it.
//! - A node whose contents were never set is *pending*: it is not empty, it
//!   holds no files, and it can not be pruned.

mod diff;
mod hash;
mod query;

pub use diff::Difference;
pub use hash::TreeHash;

use crate::models::{FileEntry, InventoryRecord, UNLISTED_MARKER};
use crate::{Error, Result};
use std::collections::BTreeMap;

/// Size and modification time of one file within a directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo {
    pub size: u64,
    pub mtime: i64,
}

/// Cached totals for a subtree, filled in by hashing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirSummary {
    pub files: u64,
    pub size: u64,
    pub unlisted: u64,
    pub nodes: u64,
}

/// One directory and everything below it
#[derive(Debug, Clone)]
pub struct DirectoryInfo {
    name: String,
    mtime: i64,
    directories: BTreeMap<String, DirectoryInfo>,
    files: Option<BTreeMap<String, FileInfo>>,
    hash: Option<TreeHash>,
    hash_cutoff: Option<i64>,
    can_compare: bool,
    summary: Option<DirSummary>,
}

impl DirectoryInfo {
    /// Create a pending directory node.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mtime: 0,
            directories: BTreeMap::new(),
            files: None,
            hash: None,
            hash_cutoff: None,
            can_compare: false,
            summary: None,
        }
    }

    /// Build a listed parent directory from independently built subtrees.
    ///
    /// Subtrees sharing a name are merged.
    #[must_use]
    pub fn with_directories(name: impl Into<String>, directories: Vec<DirectoryInfo>) -> Self {
        let mut node = Self::new(name);
        node.mark_listed();
        for directory in directories {
            node.add_directory(directory);
        }
        node
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn mtime(&self) -> i64 {
        self.mtime
    }

    pub fn set_mtime(&mut self, mtime: i64) {
        self.invalidate();
        self.mtime = mtime;
    }

    /// Whether the contents of this directory have been set
    #[must_use]
    pub fn is_listed(&self) -> bool {
        self.files.is_some()
    }

    /// Whether this directory carries the unlisted marker
    #[must_use]
    pub fn is_unlisted(&self) -> bool {
        self.files
            .as_ref()
            .is_some_and(|files| files.contains_key(UNLISTED_MARKER))
    }

    /// A listed directory with no files and no subdirectories
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.directories.is_empty() && self.files.as_ref().is_some_and(BTreeMap::is_empty)
    }

    /// Immediate subdirectories in name order
    pub fn directories(&self) -> impl Iterator<Item = &DirectoryInfo> {
        self.directories.values()
    }

    /// Files of this directory in name order (empty while pending)
    pub fn files(&self) -> impl Iterator<Item = (&str, &FileInfo)> {
        self.files
            .iter()
            .flat_map(|files| files.iter().map(|(name, info)| (name.as_str(), info)))
    }

    /// Cached subtree hash, if [`DirectoryInfo::setup_hash`] ran since the last mutation
    #[must_use]
    pub fn hash(&self) -> Option<TreeHash> {
        self.hash
    }

    /// Mark this directory as listed without adding any file.
    pub fn mark_listed(&mut self) {
        self.invalidate();
        self.files.get_or_insert_with(BTreeMap::new);
    }

    /// Set listing results for this directory, merging with what is already there.
    pub fn add_files<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = FileEntry>,
    {
        self.invalidate();
        let files = self.files.get_or_insert_with(BTreeMap::new);
        for entry in entries {
            files.insert(
                entry.name,
                FileInfo {
                    size: entry.size,
                    mtime: entry.mtime,
                },
            );
        }
    }

    /// Stream a flat list of `(path, size, mtime)` records into the tree.
    ///
    /// Paths are either relative to this node or start with this node's name
    /// (`/store/mc/a.root` for a root named `/store`). Every directory on a
    /// record's path is marked listed.
    pub fn add_file_list<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = InventoryRecord>,
    {
        let mut inserted = 0u64;
        for record in records {
            let relative = self.relative_path(&record.lfn).to_string();
            let (dir, name) = match relative.rsplit_once('/') {
                Some((dir, name)) => (dir, name),
                None => ("", relative.as_str()),
            };
            if name.is_empty() {
                log::warn!("Skipping inventory record without a file name: {}", record.lfn);
                continue;
            }

            let mut node: &mut DirectoryInfo = self;
            node.invalidate();
            node.files.get_or_insert_with(BTreeMap::new);
            for part in split_path(dir) {
                node = node
                    .directories
                    .entry(part.to_string())
                    .or_insert_with(|| DirectoryInfo::new(part));
                node.invalidate();
                node.files.get_or_insert_with(BTreeMap::new);
            }
            node.files.get_or_insert_with(BTreeMap::new).insert(
                name.to_string(),
                FileInfo {
                    size: record.size,
                    mtime: record.mtime,
                },
            );
            inserted += 1;
        }
        log::debug!("Inserted {inserted} files into {}", self.name);
    }

    /// Insert a subtree as a child, merging with an existing child of the same name.
    pub fn add_directory(&mut self, directory: DirectoryInfo) {
        self.invalidate();
        match self.directories.get_mut(&directory.name) {
            Some(existing) => existing.merge(directory),
            None => {
                self.directories.insert(directory.name.clone(), directory);
            }
        }
    }

    /// Merge another node's contents into this one.
    pub fn merge(&mut self, other: DirectoryInfo) {
        self.invalidate();
        self.mtime = self.mtime.max(other.mtime);
        if let Some(other_files) = other.files {
            self.files
                .get_or_insert_with(BTreeMap::new)
                .extend(other_files);
        }
        for (_, child) in other.directories {
            self.add_directory(child);
        }
    }

    /// Look up a node by relative path. An empty path is this node.
    #[must_use]
    pub fn get_node(&self, path: &str) -> Option<&DirectoryInfo> {
        let mut node = self;
        for part in split_path(path) {
            node = node.directories.get(part)?;
        }
        Some(node)
    }

    /// Look up a node for mutation, creating pending nodes on the way when
    /// `make_new` is set. Returns `None` only when `make_new` is false and the
    /// path does not exist.
    pub fn get_node_mut(&mut self, path: &str, make_new: bool) -> Option<&mut DirectoryInfo> {
        if !make_new && self.get_node(path).is_none() {
            return None;
        }

        let mut node: &mut DirectoryInfo = self;
        node.invalidate();
        for part in split_path(path) {
            node = node
                .directories
                .entry(part.to_string())
                .or_insert_with(|| DirectoryInfo::new(part));
            node.invalidate();
        }
        Some(node)
    }

    /// Detach an empty directory and return it.
    ///
    /// # Errors
    /// `NotEmpty` if the directory has files, subdirectories or was never
    /// listed; `Structural` for the root or a path that does not exist.
    pub fn remove_node(&mut self, path: &str) -> Result<DirectoryInfo> {
        let parts: Vec<&str> = split_path(path).collect();
        let Some((last, parents)) = parts.split_last() else {
            return Err(Error::Structural(format!(
                "cannot remove the root directory {}",
                self.name
            )));
        };

        let parent_path = parents.join("/");
        let missing = || Error::Structural(format!("no directory {path} under {}", self.name));
        let is_empty = self
            .get_node(&parent_path)
            .and_then(|parent| parent.directories.get(*last))
            .map(DirectoryInfo::is_empty)
            .ok_or_else(missing)?;
        if !is_empty {
            return Err(Error::NotEmpty(path.to_string()));
        }

        self.get_node_mut(&parent_path, false)
            .and_then(|parent| parent.directories.remove(*last))
            .ok_or_else(|| Error::Structural(format!("no directory {path}")))
    }

    fn relative_path<'a>(&self, path: &'a str) -> &'a str {
        let stripped = path
            .strip_prefix(self.name.as_str())
            .filter(|rest| rest.starts_with('/'))
            .unwrap_or(path);
        stripped.trim_start_matches('/')
    }

    fn invalidate(&mut self) {
        self.hash = None;
        self.hash_cutoff = None;
        self.summary = None;
    }
}

/// Split a relative path into components, ignoring empty and `.` segments.
pub(crate) fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/')
        .filter(|part| !part.is_empty() && *part != ".")
}

/// Join a parent path and a child name with exactly one separator.
#[must_use]
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else if name.is_empty() {
        parent.to_string()
    } else if parent.ends_with('/') {
        format!("{parent}{}", name.trim_start_matches('/'))
    } else {
        format!("{parent}/{}", name.trim_start_matches('/'))
    }
}

/// Whether a timestamp is at or before the cutoff (always true without one).
pub(crate) fn is_old(mtime: i64, cutoff: Option<i64>) -> bool {
    cutoff.is_none_or(|cutoff| mtime <= cutoff)
}
