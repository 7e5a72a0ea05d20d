//! Test fixtures for deterministic testing
#![allow(dead_code)]

use consistency::services::lister::DumpLister;
use consistency::{
    AlwaysRunning, CheckOptions, DirectoryInfo, DirectoryListing, FlagCheck, InventoryRecord,
    LivenessCheck, Lister, RunContext,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const SITE: &str = "T2_TEST";

/// Options with timings short enough for tests
pub fn fast_options(directories: &[&str]) -> CheckOptions {
    CheckOptions {
        directories: directories.iter().map(|dir| (*dir).to_string()).collect(),
        threads: 2,
        retry_backoff: Duration::from_millis(1),
        poll_interval: Duration::from_millis(10),
        liveness_interval: Duration::ZERO,
        ..CheckOptions::default()
    }
}

pub fn context(directories: &[&str]) -> RunContext {
    RunContext::new(SITE, fast_options(directories), Arc::new(AlwaysRunning))
}

pub fn context_with(options: CheckOptions, liveness: Arc<dyn LivenessCheck>) -> RunContext {
    RunContext::new(SITE, options, liveness)
}

pub fn records(entries: &[(&str, u64)]) -> Vec<InventoryRecord> {
    entries
        .iter()
        .map(|(lfn, size)| InventoryRecord::new(*lfn, *size, 0))
        .collect()
}

/// Fully listed tree rooted at `/store`
pub fn site_tree(entries: &[(&str, u64)]) -> Arc<DirectoryInfo> {
    let mut tree = DirectoryInfo::new("/store");
    tree.mark_listed();
    tree.add_file_list(records(entries));
    Arc::new(tree)
}

/// `count` listers replaying the same site contents
pub fn dump_listers(tree: &Arc<DirectoryInfo>, count: usize) -> Vec<Box<dyn Lister>> {
    (0..count)
        .map(|_| Box::new(DumpLister::new(SITE, Arc::clone(tree))) as Box<dyn Lister>)
        .collect()
}

/// Fails listed paths a fixed number of times across all clones, then
/// answers from the wrapped lister.
#[derive(Clone)]
pub struct FlakyLister {
    inner: DumpLister,
    failures: Arc<Mutex<HashMap<String, usize>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FlakyLister {
    pub fn new(tree: &Arc<DirectoryInfo>, failing: &[(&str, usize)]) -> Self {
        Self {
            inner: DumpLister::new(SITE, Arc::clone(tree)),
            failures: Arc::new(Mutex::new(
                failing
                    .iter()
                    .map(|(path, count)| ((*path).to_string(), *count))
                    .collect(),
            )),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Same failure budget, shared with this lister
    pub fn pool(&self, count: usize) -> Vec<Box<dyn Lister>> {
        (0..count)
            .map(|_| Box::new(self.clone()) as Box<dyn Lister>)
            .collect()
    }

    pub fn calls_for(&self, path: &str) -> usize {
        self.calls.lock().iter().filter(|call| *call == path).count()
    }
}

impl Lister for FlakyLister {
    fn list(&mut self, path: &str) -> DirectoryListing {
        self.calls.lock().push(path.to_string());
        if let Some(remaining) = self.failures.lock().get_mut(path)
            && *remaining > 0
        {
            *remaining -= 1;
            return DirectoryListing::failure();
        }
        self.inner.list(path)
    }

    fn endpoint(&self) -> &str {
        "flaky"
    }
}

/// Stops the site through `flag` once `after` directories were listed
pub struct StoppingLister {
    inner: DumpLister,
    flag: FlagCheck,
    after: usize,
    listed: usize,
}

impl StoppingLister {
    pub fn new(tree: &Arc<DirectoryInfo>, flag: FlagCheck, after: usize) -> Self {
        Self {
            inner: DumpLister::new(SITE, Arc::clone(tree)),
            flag,
            after,
            listed: 0,
        }
    }
}

impl Lister for StoppingLister {
    fn list(&mut self, path: &str) -> DirectoryListing {
        self.listed += 1;
        if self.listed >= self.after {
            self.flag.stop();
        }
        self.inner.list(path)
    }

    fn endpoint(&self) -> &str {
        "stopping"
    }
}

/// Create a file with `size` bytes, making parent directories as needed
pub fn write_sized(path: impl AsRef<Path>, size: usize) -> std::io::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(path)?;
    file.write_all(&vec![b'x'; size])?;
    Ok(())
}

/// A small local site:
///
/// ```text
/// mc/a/1.root     10
/// mc/a/2.root     20
/// mc/b/3.root      5
/// mc/empty/       (no content)
/// data/x.root      7
/// ```
pub fn create_site_fixture(base: &Path) -> std::io::Result<PathBuf> {
    let root = base.join("site");
    write_sized(root.join("mc/a/1.root"), 10)?;
    write_sized(root.join("mc/a/2.root"), 20)?;
    write_sized(root.join("mc/b/3.root"), 5)?;
    fs::create_dir_all(root.join("mc/empty"))?;
    write_sized(root.join("data/x.root"), 7)?;
    Ok(root)
}

/// Write inventory lines `lfn size` to `path`
pub fn write_inventory(path: &Path, entries: &[(&str, u64)]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    writeln!(file, "# inventory for {SITE}")?;
    for (lfn, size) in entries {
        writeln!(file, "{lfn} {size}")?;
    }
    Ok(())
}
