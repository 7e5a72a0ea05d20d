//! Outbound requests to the replica registry

use parking_lot::Mutex;
use std::collections::HashSet;

/// Receives deletion and transfer requests produced by a check
pub trait Registry: Send + Sync {
    /// Request deletion of `paths` at `site`; returns how many were accepted.
    fn delete(&self, site: &str, paths: &[String]) -> usize;

    /// Request re-transfer of `paths` to `site`.
    ///
    /// Returns the paths with no disk replica elsewhere and the paths with
    /// no replica at all.
    fn transfer(&self, site: &str, paths: &[String]) -> (Vec<String>, Vec<String>);
}

/// A request recorded by [`MemoryRegistry`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Delete { site: String, path: String },
    Transfer { site: String, path: String },
}

/// In-process registry that records every request
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    requests: Mutex<Vec<Request>>,
    no_disk: HashSet<String>,
    unrecoverable: HashSet<String>,
}

impl MemoryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths that only have tape replicas elsewhere
    #[must_use]
    pub fn with_no_disk<I: IntoIterator<Item = String>>(mut self, paths: I) -> Self {
        self.no_disk.extend(paths);
        self
    }

    /// Paths with no other replica at all
    #[must_use]
    pub fn with_unrecoverable<I: IntoIterator<Item = String>>(mut self, paths: I) -> Self {
        self.unrecoverable.extend(paths);
        self
    }

    #[must_use]
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }
}

impl Registry for MemoryRegistry {
    fn delete(&self, site: &str, paths: &[String]) -> usize {
        let mut requests = self.requests.lock();
        requests.extend(paths.iter().map(|path| Request::Delete {
            site: site.to_string(),
            path: path.clone(),
        }));
        paths.len()
    }

    fn transfer(&self, site: &str, paths: &[String]) -> (Vec<String>, Vec<String>) {
        let mut no_disk = Vec::new();
        let mut unrecoverable = Vec::new();
        let mut requests = self.requests.lock();
        for path in paths {
            if self.unrecoverable.contains(path) {
                unrecoverable.push(path.clone());
                continue;
            }
            if self.no_disk.contains(path) {
                no_disk.push(path.clone());
            }
            requests.push(Request::Transfer {
                site: site.to_string(),
                path: path.clone(),
            });
        }
        (no_disk, unrecoverable)
    }
}
