//! One-sided tree difference: what one tree has that another lacks

use super::{DirectoryInfo, FileInfo, is_old, join_path};
use crate::models::UNLISTED_MARKER;
use std::collections::BTreeMap;

/// Entries present in one tree and absent from another
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Difference {
    /// Full LFN and size of each unmatched file, sorted by path
    pub files: Vec<(String, u64)>,
    /// Top-most unmatched directories with no comparable files below them
    pub directories: Vec<String>,
}

impl Difference {
    #[must_use]
    pub fn size(&self) -> u64 {
        self.files.iter().map(|(_, size)| size).sum()
    }

    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.files.iter().map(|(path, _)| path.clone()).collect()
    }
}

impl DirectoryInfo {
    /// Files and directories in `self` that `other` does not have.
    ///
    /// Both trees are walked together in name order and files are matched by
    /// a linear merge per directory. Subtrees with equal hashes are skipped,
    /// as is any subtree flagged unlisted on either side. Entries newer than
    /// `cutoff` are never reported. With `other == None` the whole tree is
    /// reported.
    #[must_use]
    pub fn compare(&self, other: Option<&DirectoryInfo>, cutoff: Option<i64>) -> Difference {
        let mut out = Difference::default();
        self.diff_into(other, &self.name, cutoff, &mut out);
        out.files.sort_by(|a, b| a.0.cmp(&b.0));
        out.directories.sort();
        out
    }

    fn diff_into(
        &self,
        other: Option<&DirectoryInfo>,
        full_path: &str,
        cutoff: Option<i64>,
        out: &mut Difference,
    ) {
        if self.is_unlisted() || other.is_some_and(DirectoryInfo::is_unlisted) {
            log::debug!("Skipping unlisted subtree {full_path}");
            return;
        }

        let Some(other) = other else {
            let before = out.files.len();
            self.collect_unmatched(full_path, cutoff, out);
            if out.files.len() == before && self.can_compare(cutoff) {
                out.directories.push(full_path.to_string());
            }
            return;
        };

        if self.hash.is_some()
            && self.hash == other.hash
            && self.hash_cutoff == cutoff
            && other.hash_cutoff == cutoff
        {
            return;
        }

        let no_files = BTreeMap::new();
        let mine = self.files.as_ref().unwrap_or(&no_files);
        let theirs = other.files.as_ref().unwrap_or(&no_files);
        merge_unmatched(mine, theirs, full_path, cutoff, out);

        for (name, child) in &self.directories {
            child.diff_into(
                other.directories.get(name),
                &join_path(full_path, name),
                cutoff,
                out,
            );
        }
    }

    fn collect_unmatched(&self, full_path: &str, cutoff: Option<i64>, out: &mut Difference) {
        if self.is_unlisted() {
            return;
        }
        for (name, info) in self.files() {
            if is_old(info.mtime, cutoff) {
                out.files.push((join_path(full_path, name), info.size));
            }
        }
        for (name, child) in &self.directories {
            child.collect_unmatched(&join_path(full_path, name), cutoff, out);
        }
    }
}

/// Walk two sorted file maps together, pushing names only `mine` holds.
fn merge_unmatched(
    mine: &BTreeMap<String, FileInfo>,
    theirs: &BTreeMap<String, FileInfo>,
    full_path: &str,
    cutoff: Option<i64>,
    out: &mut Difference,
) {
    let mut their_names = theirs.keys().peekable();
    for (name, info) in mine {
        while their_names.next_if(|other| *other < name).is_some() {}
        if their_names.next_if_eq(&name).is_some() {
            continue;
        }
        if name != UNLISTED_MARKER && is_old(info.mtime, cutoff) {
            out.files.push((join_path(full_path, name), info.size));
        }
    }
}
