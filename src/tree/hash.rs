//! Subtree hashing for quick equality checks between trees

use super::{DirSummary, DirectoryInfo, is_old};
use rayon::prelude::*;
use std::fmt;

/// BLAKE3 digest of a directory subtree
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TreeHash([u8; 32]);

impl TreeHash {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for TreeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "TreeHash({})", hex.get(..16).unwrap_or(&hex))
    }
}

impl fmt::Display for TreeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        f.write_str(hex.get(..16).unwrap_or(&hex))
    }
}

impl DirectoryInfo {
    /// Hash the whole tree, counting every file regardless of age.
    pub fn setup_hash(&mut self) {
        self.setup_hash_with_cutoff(None);
    }

    /// Hash the tree, ignoring files and directories modified after `cutoff`.
    ///
    /// Only file names and sizes enter the hash, so an inventory and a
    /// listing of the same content hash equal even when their timestamps
    /// differ. Also refreshes the cached summary and the `can_compare` flag:
    /// a directory is comparable when it holds old content or is old itself.
    /// Subtrees already hashed with the same cutoff are reused.
    pub fn setup_hash_with_cutoff(&mut self, cutoff: Option<i64>) {
        if self.hash.is_some() && self.hash_cutoff == cutoff {
            return;
        }

        self.directories
            .par_iter_mut()
            .for_each(|(_, child)| child.setup_hash_with_cutoff(cutoff));

        let mut hasher = blake3::Hasher::new();
        let mut summary = DirSummary {
            nodes: 1,
            ..DirSummary::default()
        };
        let mut has_old_content = false;

        if let Some(files) = &self.files {
            for (name, info) in files {
                if name == crate::models::UNLISTED_MARKER {
                    summary.unlisted += 1;
                } else {
                    summary.files += 1;
                    summary.size += info.size;
                }

                if is_old(info.mtime, cutoff) {
                    hasher.update(b"f");
                    hasher.update(name.as_bytes());
                    hasher.update(&[0]);
                    hasher.update(&info.size.to_le_bytes());
                    has_old_content = true;
                }
            }
        }

        for (name, child) in &self.directories {
            if let Some(child_summary) = child.summary {
                summary.files += child_summary.files;
                summary.size += child_summary.size;
                summary.unlisted += child_summary.unlisted;
                summary.nodes += child_summary.nodes;
            }

            if child.can_compare
                && let Some(child_hash) = child.hash
            {
                hasher.update(b"d");
                hasher.update(name.as_bytes());
                hasher.update(&[0]);
                hasher.update(child_hash.as_bytes());
                has_old_content = true;
            }
        }

        self.can_compare = has_old_content || is_old(self.mtime, cutoff);
        self.hash = Some(TreeHash(*hasher.finalize().as_bytes()));
        self.hash_cutoff = cutoff;
        self.summary = Some(summary);
    }

    /// Whether this directory takes part in comparisons under `cutoff`.
    ///
    /// Uses the flag cached by hashing when it was computed for the same cutoff.
    #[must_use]
    pub fn can_compare(&self, cutoff: Option<i64>) -> bool {
        if self.hash.is_some() && self.hash_cutoff == cutoff {
            return self.can_compare;
        }

        is_old(self.mtime, cutoff)
            || self.files().any(|(_, info)| is_old(info.mtime, cutoff))
            || self.directories().any(|child| child.can_compare(cutoff))
    }
}
