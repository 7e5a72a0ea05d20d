//! Data models for listings, inventory records, pruned directories and snapshots

use serde::{Deserialize, Serialize};

/// File name injected into a directory whose listing could not be completed.
///
/// Comparison treats every directory holding this marker as unknown: nothing
/// below it is reported as missing or orphan.
pub const UNLISTED_MARKER: &str = "_unlisted_";

/// A file inside one directory, keyed by name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
    pub mtime: i64,
}

impl FileEntry {
    #[must_use]
    pub fn new(name: impl Into<String>, size: u64, mtime: i64) -> Self {
        Self {
            name: name.into(),
            size,
            mtime,
        }
    }

    /// The `("_unlisted_", 0, 0)` flag entry.
    #[must_use]
    pub fn unlisted_marker() -> Self {
        Self::new(UNLISTED_MARKER, 0, 0)
    }

    #[must_use]
    pub fn is_unlisted_marker(&self) -> bool {
        self.name == UNLISTED_MARKER
    }
}

/// An immediate child directory reported by a listing
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubdirEntry {
    pub name: String,
    pub mtime: i64,
}

impl SubdirEntry {
    #[must_use]
    pub fn new(name: impl Into<String>, mtime: i64) -> Self {
        Self {
            name: name.into(),
            mtime,
        }
    }
}

/// Result of listing a single directory.
///
/// A failed listing may still carry whatever entries were read before the
/// failure; the orchestrator merges them across retries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryListing {
    pub ok: bool,
    pub directories: Vec<SubdirEntry>,
    pub files: Vec<FileEntry>,
}

impl DirectoryListing {
    #[must_use]
    pub fn success(directories: Vec<SubdirEntry>, files: Vec<FileEntry>) -> Self {
        Self {
            ok: true,
            directories,
            files,
        }
    }

    #[must_use]
    pub fn failure() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn partial(directories: Vec<SubdirEntry>, files: Vec<FileEntry>) -> Self {
        Self {
            ok: false,
            directories,
            files,
        }
    }
}

/// One record of the inventory source: a full LFN with its size and timestamp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub lfn: String,
    pub size: u64,
    pub mtime: i64,
}

impl InventoryRecord {
    #[must_use]
    pub fn new(lfn: impl Into<String>, size: u64, mtime: i64) -> Self {
        Self {
            lfn: lfn.into(),
            size,
            mtime,
        }
    }
}

/// A directory pruned from the working tree, queued for deletion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedDirectory {
    pub path: String,
    pub mtime: i64,
}

/// Metadata stored alongside a tree snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub root: String,
    pub site: String,
    /// Seconds since the Unix epoch
    pub created_at: i64,
    pub format_version: u32,
}
