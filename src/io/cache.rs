//! Age-limited cache of built trees, stored as snapshots

use super::snapshot::{meta_for, read_tree, write_tree};
use crate::tree::DirectoryInfo;
use crate::{Error, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Snapshot files named `{site}_{kind}.parquet` under one directory
#[derive(Debug, Clone)]
pub struct TreeCache {
    dir: PathBuf,
    max_age: Duration,
}

impl TreeCache {
    #[must_use]
    pub fn new(dir: impl AsRef<Path>, max_age: Duration) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            max_age,
        }
    }

    #[must_use]
    pub fn path_for(&self, site: &str, kind: &str) -> PathBuf {
        let site = site.replace(['/', '\\'], "_");
        self.dir.join(format!("{site}_{kind}.parquet"))
    }

    /// Load a cached tree younger than `max_age`, hashed and ready to compare.
    ///
    /// # Errors
    /// I/O errors other than a missing file, or an unreadable snapshot.
    pub fn load(&self, site: &str, kind: &str) -> Result<Option<DirectoryInfo>> {
        let path = self.path_for(site, kind);
        let modified = match std::fs::metadata(&path).and_then(|meta| meta.modified()) {
            Ok(modified) => modified,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or_default();
        if age > self.max_age {
            log::info!(
                "Cached {kind} tree for {site} is {}s old, rebuilding",
                age.as_secs()
            );
            return Ok(None);
        }

        let path_str = path_string(&path)?;
        let (meta, mut tree) = read_tree(path_str).map_err(|err| match err.kind() {
            ErrorKind::InvalidData => Error::Snapshot(format!("{}: {err}", path.display())),
            _ => Error::Io(err),
        })?;
        if meta.site != site {
            log::warn!("{} holds a tree for {}, ignoring it", path.display(), meta.site);
            return Ok(None);
        }
        tree.setup_hash();
        log::info!("Loaded cached {kind} tree for {site} from {}", path.display());
        Ok(Some(tree))
    }

    /// # Errors
    /// Returns an error if the snapshot can not be written.
    pub fn store(&self, site: &str, kind: &str, tree: &DirectoryInfo) -> Result<()> {
        let path = self.path_for(site, kind);
        write_tree(path_string(&path)?, &meta_for(site, tree), tree)?;
        Ok(())
    }

    /// Return the cached tree, or build, cache and return a fresh one.
    ///
    /// # Errors
    /// Whatever `build` returns, or cache I/O errors.
    pub fn load_or_build<F>(&self, site: &str, kind: &str, build: F) -> Result<DirectoryInfo>
    where
        F: FnOnce() -> Result<DirectoryInfo>,
    {
        if let Some(tree) = self.load(site, kind)? {
            return Ok(tree);
        }
        let mut tree = build()?;
        tree.setup_hash();
        self.store(site, kind, &tree)?;
        Ok(tree)
    }
}

fn path_string(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| Error::InvalidInput(format!("non UTF-8 cache path {}", path.display())))
}
