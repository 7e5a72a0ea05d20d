//! Lister over a locally mounted copy of the site namespace

use super::Lister;
use crate::models::DirectoryListing;
use crate::tree::split_path;
use std::path::{Path, PathBuf};

/// Maps LFNs under `location` onto a local directory and reads it.
///
/// `/store/mc/a` with location `/store` and root `/mnt/site` is read from
/// `/mnt/site/mc/a`. Paths outside `location` fail to list.
#[derive(Debug, Clone)]
pub struct LocalLister {
    site: String,
    location: String,
    root: PathBuf,
    endpoint: String,
}

impl LocalLister {
    #[must_use]
    pub fn new(site: &str, root: impl AsRef<Path>, location: &str) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            site: site.to_string(),
            location: location.trim_end_matches('/').to_string(),
            endpoint: root.display().to_string(),
            root,
        }
    }

    #[must_use]
    pub fn site(&self) -> &str {
        &self.site
    }

    fn local_path(&self, path: &str) -> Option<PathBuf> {
        let rest = path.strip_prefix(self.location.as_str())?;
        if !rest.is_empty() && !rest.starts_with('/') {
            return None;
        }
        let mut local = self.root.clone();
        for part in split_path(rest) {
            if part == ".." {
                return None;
            }
            local.push(part);
        }
        Some(local)
    }
}

impl Lister for LocalLister {
    fn list(&mut self, path: &str) -> DirectoryListing {
        let Some(local) = self.local_path(path) else {
            log::warn!("{path} is outside {} at {}", self.location, self.site);
            return DirectoryListing::failure();
        };

        #[cfg(unix)]
        {
            super::posix::read_directory(&local)
        }

        #[cfg(not(unix))]
        {
            super::legacy::read_directory(&local)
        }
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
