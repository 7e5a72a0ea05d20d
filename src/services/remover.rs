//! Pruning of empty directories from a tree under construction

use crate::{Error, RunContext};
use crate::models::RemovedDirectory;
use crate::services::registry::Registry;
use crate::tree::{DirectoryInfo, join_path};
use std::collections::HashSet;
use std::sync::Arc;

/// Predicate for directories that must never be pruned
pub type ProtectFn = Box<dyn Fn(&str) -> bool + Send>;

/// Removes old, listed, file-less directories and forwards them for deletion.
///
/// Meant to run as the orchestrator callback, so it sees the partial tree
/// repeatedly. Paths that refused removal are remembered and not retried.
pub struct EmptyRemover {
    site: String,
    location: String,
    protect: ProtectFn,
    registry: Option<Arc<dyn Registry>>,
    cutoff: Option<i64>,
    not_empty: HashSet<String>,
    removed: Vec<RemovedDirectory>,
}

impl EmptyRemover {
    /// `location` is the parent path of the trees this remover will see.
    /// Without a registry the remover only counts what it would delete.
    #[must_use]
    pub fn new(
        site: &str,
        location: &str,
        protect: ProtectFn,
        registry: Option<Arc<dyn Registry>>,
        cutoff: Option<i64>,
    ) -> Self {
        Self {
            site: site.to_string(),
            location: location.to_string(),
            protect,
            registry,
            cutoff,
            not_empty: HashSet::new(),
            removed: Vec::new(),
        }
    }

    /// Remover for one run; the registry is left out on dry runs.
    #[must_use]
    pub fn for_context(
        ctx: &RunContext,
        protect: ProtectFn,
        registry: Option<Arc<dyn Registry>>,
    ) -> Self {
        let registry = if ctx.options.dry_run { None } else { registry };
        Self::new(
            &ctx.site,
            &ctx.options.location,
            protect,
            registry,
            ctx.cutoff(),
        )
    }

    /// A remover that protects nothing and deletes nothing.
    #[must_use]
    pub fn dry_run(site: &str, location: &str, cutoff: Option<i64>) -> Self {
        Self::new(site, location, Box::new(|_| false), None, cutoff)
    }

    /// Prune every removable directory in `tree` and return what was pruned.
    pub fn remove_empty(&mut self, tree: &mut DirectoryInfo) -> Vec<RemovedDirectory> {
        let root = tree.name().to_string();
        let mut removed = Vec::new();

        for tree_path in tree.empty_nodes(self.cutoff) {
            let path = self.full_path(&tree_path);
            if self.not_empty.contains(&path) || (self.protect)(&path) {
                continue;
            }

            let relative = tree_path
                .strip_prefix(root.as_str())
                .unwrap_or(&tree_path)
                .trim_start_matches('/');
            match tree.remove_node(relative) {
                Ok(node) => removed.push(RemovedDirectory {
                    path,
                    mtime: node.mtime(),
                }),
                Err(Error::NotEmpty(_)) => {
                    log::debug!("Keeping {path}, it still has content");
                    self.not_empty.insert(path);
                }
                Err(err) => log::warn!("Could not prune {path}: {err}"),
            }
        }

        if removed.is_empty() {
            return removed;
        }

        let paths: Vec<String> = removed.iter().map(|dir| dir.path.clone()).collect();
        match &self.registry {
            Some(registry) => {
                let accepted = registry.delete(&self.site, &paths);
                log::info!(
                    "Requested deletion of {accepted} empty directories at {}",
                    self.site
                );
            }
            None => log::info!(
                "{} empty directories at {} would be deleted",
                paths.len(),
                self.site
            ),
        }
        self.removed.extend(removed.iter().cloned());
        removed
    }

    /// Site LFN of a path from `empty_nodes`. A tree rooted at an absolute
    /// name such as `/store` already yields full paths.
    fn full_path(&self, tree_path: &str) -> String {
        if tree_path.starts_with('/') {
            tree_path.to_string()
        } else {
            join_path(&self.location, tree_path)
        }
    }

    #[must_use]
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }

    /// Everything pruned so far, in removal order
    #[must_use]
    pub fn removed(&self) -> &[RemovedDirectory] {
        &self.removed
    }
}
