//! Site Consistency Library
//!
//! This library compares the set of files a storage site should hold (a
//! central inventory) against what a concurrent remote listing actually finds
//! there, and reports missing files, orphan files and empty directories while
//! tolerating partial failures of the listing.

pub mod cli;
pub mod io;
pub mod models;
pub mod services;
pub mod tree;

pub use models::{
    DirectoryListing, FileEntry, InventoryRecord, RemovedDirectory, SnapshotMeta, SubdirEntry,
    UNLISTED_MARKER,
};
pub use services::liveness::{
    AlwaysRunning, FlagCheck, LivenessCheck, StopFileCheck, ThrottledCheck,
};
pub use services::lister::Lister;
pub use services::reconcile::{Filters, Reconciliation};
pub use services::registry::Registry;
pub use services::remover::EmptyRemover;
pub use tree::DirectoryInfo;

use serde::Serialize;
use services::orchestrator::ListingOrchestrator;
use std::result;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Custom error type for the library
#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    InvalidInput(String),
    /// Attempted to prune a directory that still has content
    NotEmpty(String),
    /// The liveness check reported the site as stopped
    Cancelled { site: String },
    /// An operation on trees that can not be performed as asked
    Structural(String),
    /// A stored tree is unreadable or has an unknown format version
    Snapshot(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::InvalidInput(msg) => write!(f, "Invalid input: {msg}"),
            Error::NotEmpty(path) => write!(f, "Directory not empty: {path}"),
            Error::Cancelled { site } => write!(f, "Site {site} was stopped"),
            Error::Structural(msg) => write!(f, "Structural error: {msg}"),
            Error::Snapshot(msg) => write!(f, "Snapshot error: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

pub type Result<T> = result::Result<T, Error>;

/// Options for checking one site
#[derive(Debug, Clone)]
pub struct CheckOptions {
    /// LFN prefix holding the top-level directories, e.g. `/store`
    pub location: String,
    /// Top-level directories under `location` to list and compare
    pub directories: Vec<String>,
    /// Number of listing workers; 0 uses available parallelism
    pub threads: usize,
    /// Listing attempts per directory before it is flagged unlisted
    pub max_attempts: usize,
    /// Delay before a worker retries a directory it failed itself
    pub retry_backoff: Duration,
    /// How long the coordinator waits for results before polling workers
    pub poll_interval: Duration,
    /// Minimum time between two calls to the external liveness check
    pub liveness_interval: Duration,
    /// Files and directories younger than this are left out of comparisons
    pub ignore_age: Option<Duration>,
    /// Count empty directories without requesting their deletion
    pub dry_run: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            location: "/store".to_string(),
            directories: Vec::new(),
            threads: 0,
            max_attempts: 3,
            retry_backoff: Duration::from_secs(10),
            poll_interval: Duration::from_millis(250),
            liveness_interval: Duration::from_secs(15),
            ignore_age: None,
            dry_run: false,
        }
    }
}

impl CheckOptions {
    /// Resolve the configured thread count.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        if self.threads > 0 {
            return self.threads;
        }
        std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
    }

    /// Newest modification time, in epoch seconds, still taking part in comparisons.
    #[must_use]
    pub fn cutoff(&self, now: SystemTime) -> Option<i64> {
        let age = self.ignore_age?;
        let threshold = now.checked_sub(age).unwrap_or(UNIX_EPOCH);
        Some(epoch_seconds(threshold))
    }
}

/// State for one site check, created at run start and dropped at run end
pub struct RunContext {
    pub site: String,
    pub options: CheckOptions,
    liveness: ThrottledCheck,
    started_at: SystemTime,
}

impl RunContext {
    /// Wrap `liveness` so that it is consulted at most once per `liveness_interval`.
    #[must_use]
    pub fn new(
        site: impl Into<String>,
        options: CheckOptions,
        liveness: Arc<dyn LivenessCheck>,
    ) -> Self {
        let liveness = ThrottledCheck::new(liveness, options.liveness_interval);
        Self {
            site: site.into(),
            options,
            liveness,
            started_at: SystemTime::now(),
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.liveness.is_running()
    }

    #[must_use]
    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }

    /// Comparison cutoff relative to the start of this run.
    #[must_use]
    pub fn cutoff(&self) -> Option<i64> {
        self.options.cutoff(self.started_at)
    }
}

/// Outcome of a completed site check
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub site: String,
    pub reconciliation: Reconciliation,
    pub removed_directories: Vec<RemovedDirectory>,
    pub inventory_files: u64,
    pub remote_files: u64,
    pub remote_nodes: u64,
    pub started_at: i64,
    pub finished_at: i64,
}

impl CheckReport {
    /// Nothing missing, nothing orphaned and every directory listed.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.reconciliation.missing.is_empty()
            && self.reconciliation.orphan.is_empty()
            && self.reconciliation.unlisted.is_empty()
    }
}

/// Requests forwarded to the registry after a check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActionSummary {
    pub deleted: usize,
    pub no_disk: Vec<String>,
    pub unrecoverable: Vec<String>,
}

/// Build the inventory-side tree from records under the configured directories.
#[must_use]
pub fn build_inventory_tree<I>(options: &CheckOptions, records: I) -> DirectoryInfo
where
    I: IntoIterator<Item = InventoryRecord>,
{
    let mut tree = DirectoryInfo::new(options.location.as_str());
    tree.mark_listed();
    tree.add_file_list(io::inventory::filter_to_directories(
        records,
        &options.location,
        &options.directories,
    ));
    tree
}

/// List every configured top-level directory and merge them under `location`.
///
/// When given, `remover` prunes empty directories while the listing runs.
///
/// # Errors
/// `Cancelled` when the liveness check stops the run; no partial tree is returned.
pub fn list_site(
    ctx: &RunContext,
    listers: &mut [Box<dyn Lister>],
    mut remover: Option<&mut EmptyRemover>,
) -> Result<DirectoryInfo> {
    let options = &ctx.options;
    if options.directories.is_empty() {
        return Err(Error::InvalidInput(
            "no top-level directories configured".to_string(),
        ));
    }

    let orchestrator = ListingOrchestrator::new(ctx);
    let mut subtrees = Vec::with_capacity(options.directories.len());
    for directory in &options.directories {
        let subtree = match remover.as_deref_mut() {
            Some(remover) => {
                let mut prune = |tree: &mut DirectoryInfo| {
                    remover.remove_empty(tree);
                };
                orchestrator.create_dirinfo(
                    &options.location,
                    directory,
                    listers,
                    Some(&mut prune),
                )?
            }
            None => orchestrator.create_dirinfo(&options.location, directory, listers, None)?,
        };
        subtrees.push(subtree);
    }

    if let Some(remover) = remover {
        log::info!(
            "Removed {} empty directories at {}",
            remover.removed_count(),
            ctx.site
        );
    }
    Ok(DirectoryInfo::with_directories(
        options.location.as_str(),
        subtrees,
    ))
}

/// Run a whole check: inventory tree, remote listing, reconciliation.
///
/// # Errors
/// Propagates cancellation and structural errors; listing failures of single
/// directories only show up as unlisted entries in the report.
pub fn check_site<I>(
    ctx: &RunContext,
    inventory: I,
    listers: &mut [Box<dyn Lister>],
    remover: &mut EmptyRemover,
    filters: &Filters,
) -> Result<CheckReport>
where
    I: IntoIterator<Item = InventoryRecord>,
{
    let mut remote = list_site(ctx, listers, Some(&mut *remover))?;
    let inventory = build_inventory_tree(&ctx.options, inventory);
    compare_trees(ctx, inventory, &mut remote, remover, filters)
}

/// Reconcile an inventory tree against an already built remote tree.
///
/// # Errors
/// `Structural` when the two trees do not share a root.
pub fn compare_trees(
    ctx: &RunContext,
    mut inventory: DirectoryInfo,
    remote: &mut DirectoryInfo,
    remover: &EmptyRemover,
    filters: &Filters,
) -> Result<CheckReport> {
    let reconciliation =
        services::reconcile::reconcile(&mut inventory, remote, filters, ctx.cutoff())?;

    Ok(CheckReport {
        site: ctx.site.clone(),
        reconciliation,
        removed_directories: remover.removed().to_vec(),
        inventory_files: inventory.count_files(),
        remote_files: remote.count_files(),
        remote_nodes: remote.count_nodes(),
        started_at: epoch_seconds(ctx.started_at()),
        finished_at: epoch_seconds(SystemTime::now()),
    })
}

/// Ask the registry to delete orphans and re-transfer missing files.
pub fn submit_actions(registry: &dyn Registry, site: &str, report: &CheckReport) -> ActionSummary {
    let deleted = registry.delete(site, &report.reconciliation.orphan);
    let (no_disk, unrecoverable) = registry.transfer(site, &report.reconciliation.missing);
    log::info!(
        "Requested {deleted} deletions and {} transfers at {site} ({} without disk copy, {} unrecoverable)",
        report.reconciliation.missing.len(),
        no_disk.len(),
        unrecoverable.len()
    );
    ActionSummary {
        deleted,
        no_disk,
        unrecoverable,
    }
}

/// Seconds since the Unix epoch, negative for earlier times.
#[must_use]
pub fn epoch_seconds(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX),
        Err(before) => -i64::try_from(before.duration().as_secs()).unwrap_or(i64::MAX),
    }
}
