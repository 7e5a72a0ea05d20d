//! Lister that replays a site dump instead of talking to the site

use super::Lister;
use crate::io::inventory::parse_inventory;
use crate::models::{DirectoryListing, FileEntry, SubdirEntry};
use crate::tree::DirectoryInfo;
use std::io::{self, BufRead};
use std::sync::Arc;

/// Answers listings from a tree built from a file dump of the site.
///
/// Clones share the same tree, so one dump can back a whole worker pool.
#[derive(Debug, Clone)]
pub struct DumpLister {
    site: String,
    tree: Arc<DirectoryInfo>,
}

impl DumpLister {
    #[must_use]
    pub fn new(site: &str, tree: Arc<DirectoryInfo>) -> Self {
        Self {
            site: site.to_string(),
            tree,
        }
    }

    /// Build from dump lines in the inventory format, rooted at `location`.
    ///
    /// # Errors
    /// Returns an error on unreadable input or malformed lines.
    pub fn from_reader<R: BufRead>(site: &str, location: &str, reader: R) -> io::Result<Self> {
        let records = parse_inventory(reader).collect::<io::Result<Vec<_>>>()?;
        let mut tree = DirectoryInfo::new(location);
        tree.mark_listed();
        tree.add_file_list(records);
        log::info!(
            "Loaded dump of {site} with {} files",
            tree.count_files()
        );
        Ok(Self::new(site, Arc::new(tree)))
    }
}

impl Lister for DumpLister {
    fn list(&mut self, path: &str) -> DirectoryListing {
        let node = match path.strip_prefix(self.tree.name()) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => self.tree.get_node(rest),
            _ => None,
        };

        match node {
            Some(node) if node.is_listed() => DirectoryListing::success(
                node.directories()
                    .map(|child| SubdirEntry::new(child.name(), child.mtime()))
                    .collect(),
                node.files()
                    .map(|(name, info)| FileEntry::new(name, info.size, info.mtime))
                    .collect(),
            ),
            _ => {
                log::debug!("{path} is not in the dump of {}", self.site);
                DirectoryListing::failure()
            }
        }
    }

    fn endpoint(&self) -> &str {
        "dump"
    }
}
