//! Reconciliation of an inventory tree against a remote listing tree

use crate::tree::DirectoryInfo;
use crate::{Error, Result};
use serde::Serialize;

/// Path predicate; returning true drops the path from a report
pub type PathFilter = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Acceptance filters applied to the raw differences
#[derive(Default)]
pub struct Filters {
    /// Missing files that are expected and must not be re-transferred
    pub missing_ok: Option<PathFilter>,
    /// Orphan files and directories that must not be deleted
    pub orphan_ok: Option<PathFilter>,
}

impl Filters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_missing_ok(mut self, filter: PathFilter) -> Self {
        self.missing_ok = Some(filter);
        self
    }

    #[must_use]
    pub fn with_orphan_ok(mut self, filter: PathFilter) -> Self {
        self.orphan_ok = Some(filter);
        self
    }
}

/// Accepts every path starting with one of `prefixes`.
#[must_use]
pub fn prefix_filter(prefixes: Vec<String>) -> PathFilter {
    Box::new(move |path| prefixes.iter().any(|prefix| path.starts_with(prefix.as_str())))
}

/// Outcome of comparing both trees
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    /// In the inventory, not found at the site
    pub missing: Vec<String>,
    pub missing_size: u64,
    /// Found at the site, unknown to the inventory
    pub orphan: Vec<String>,
    pub orphan_size: u64,
    /// Site directories with no counterpart and no comparable files
    pub orphan_directories: Vec<String>,
    /// Site directories that could not be listed
    pub unlisted: Vec<String>,
}

/// Compare `inventory` and `remote` in both directions.
///
/// Both trees are hashed with `cutoff` first (in parallel), so identical
/// subtrees are skipped. With no filters, `missing` is exactly the
/// inventory files absent remotely and `orphan` the converse, outside
/// unlisted subtrees and ignoring entries newer than `cutoff`.
///
/// # Errors
/// `Structural` when the trees have different roots or the remote root was
/// never listed.
pub fn reconcile(
    inventory: &mut DirectoryInfo,
    remote: &mut DirectoryInfo,
    filters: &Filters,
    cutoff: Option<i64>,
) -> Result<Reconciliation> {
    if inventory.name() != remote.name() {
        return Err(Error::Structural(format!(
            "cannot compare {} with {}",
            inventory.name(),
            remote.name()
        )));
    }
    if !remote.is_listed() {
        return Err(Error::Structural(format!(
            "remote tree {} was never listed",
            remote.name()
        )));
    }

    rayon::join(
        || inventory.setup_hash_with_cutoff(cutoff),
        || remote.setup_hash_with_cutoff(cutoff),
    );

    let missing = inventory.compare(Some(remote), cutoff);
    let orphan = remote.compare(Some(inventory), cutoff);

    let keep_missing = |path: &str| !filters.missing_ok.as_ref().is_some_and(|ok| ok(path));
    let keep_orphan = |path: &str| !filters.orphan_ok.as_ref().is_some_and(|ok| ok(path));

    let mut result = Reconciliation {
        unlisted: remote.get_unlisted(),
        ..Reconciliation::default()
    };
    for (path, size) in missing.files {
        if keep_missing(&path) {
            result.missing_size += size;
            result.missing.push(path);
        }
    }
    for (path, size) in orphan.files {
        if keep_orphan(&path) {
            result.orphan_size += size;
            result.orphan.push(path);
        }
    }
    result.orphan_directories = orphan
        .directories
        .into_iter()
        .filter(|path| keep_orphan(path))
        .collect();

    log::info!(
        "{}: {} missing files ({} bytes), {} orphan files ({} bytes), {} orphan directories, {} unlisted",
        remote.name(),
        result.missing.len(),
        result.missing_size,
        result.orphan.len(),
        result.orphan_size,
        result.orphan_directories.len(),
        result.unlisted.len()
    );
    Ok(result)
}
