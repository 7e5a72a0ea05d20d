//! Listing workers and the work queue they share

use crate::models::{FileEntry, SubdirEntry};
use crate::services::lister::Lister;
use crate::tree::join_path;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// A directory waiting to be listed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Full path of the root being crawled, e.g. `/store/mc`
    pub location: String,
    /// Path of this directory relative to `location`; empty for the root
    pub relative: String,
    /// Entries gathered by earlier failed attempts
    pub prior_directories: Vec<SubdirEntry>,
    pub prior_files: Vec<FileEntry>,
    /// Workers that already failed to list this directory
    pub failed_workers: Vec<usize>,
}

impl WorkItem {
    #[must_use]
    pub fn new(location: impl Into<String>, relative: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            relative: relative.into(),
            prior_directories: Vec::new(),
            prior_files: Vec::new(),
            failed_workers: Vec::new(),
        }
    }

    #[must_use]
    pub fn full_path(&self) -> String {
        join_path(&self.location, &self.relative)
    }

    #[must_use]
    pub fn attempts(&self) -> usize {
        self.failed_workers.len()
    }
}

/// Lock-protected LIFO of pending directories shared by all workers
#[derive(Debug, Clone, Default)]
pub struct WorkQueue {
    items: Arc<Mutex<Vec<WorkItem>>>,
}

impl WorkQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, item: WorkItem) {
        self.items.lock().push(item);
    }

    #[must_use]
    pub fn pop(&self) -> Option<WorkItem> {
        self.items.lock().pop()
    }

    /// Pop the newest item `worker` has not failed yet, or the newest item
    /// at all when it failed every pending one.
    #[must_use]
    pub fn pop_for(&self, worker: usize) -> Option<WorkItem> {
        let mut items = self.items.lock();
        match items
            .iter()
            .rposition(|item| !item.failed_workers.contains(&worker))
        {
            Some(pos) => Some(items.remove(pos)),
            None => items.pop(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

/// Coordinator to worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Resume,
    Close,
}

/// Final contents of one directory, sent from a worker to the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingOutput {
    pub relative: String,
    pub directories: Vec<SubdirEntry>,
    pub files: Vec<FileEntry>,
}

pub(crate) struct ListingWorker<'a> {
    pub(crate) id: usize,
    pub(crate) lister: &'a mut dyn Lister,
    pub(crate) queue: WorkQueue,
    pub(crate) control: Receiver<Control>,
    pub(crate) idle: Sender<usize>,
    pub(crate) results: Sender<ListingOutput>,
    pub(crate) max_attempts: usize,
    pub(crate) retry_backoff: Duration,
}

impl ListingWorker<'_> {
    /// Process items until closed. An empty queue reports the worker idle and
    /// blocks until the coordinator resumes or closes it.
    pub(crate) fn run(mut self) {
        log::debug!(
            "Listing worker {} started on {}",
            self.id,
            self.lister.endpoint()
        );
        loop {
            match self.control.try_recv() {
                Ok(Control::Close) | Err(TryRecvError::Disconnected) => break,
                Ok(Control::Resume) | Err(TryRecvError::Empty) => {}
            }

            let Some(item) = self.queue.pop_for(self.id) else {
                if self.idle.send(self.id).is_err() {
                    break;
                }
                match self.control.recv() {
                    Ok(Control::Resume) => continue,
                    Ok(Control::Close) | Err(_) => break,
                }
            };

            if item.failed_workers.contains(&self.id) && !self.back_off(&item) {
                break;
            }
            self.process(item);
        }
        log::debug!("Listing worker {} closed", self.id);
    }

    /// Wait before retrying a directory this worker failed itself.
    /// Returns false when closed while waiting.
    fn back_off(&self, item: &WorkItem) -> bool {
        let attempts = u32::try_from(item.attempts()).unwrap_or(u32::MAX);
        let delay = self.retry_backoff.saturating_mul(attempts);
        log::debug!(
            "Worker {} waiting {delay:?} before retrying {}",
            self.id,
            item.full_path()
        );
        match self.control.recv_timeout(delay) {
            Err(RecvTimeoutError::Timeout) | Ok(Control::Resume) => true,
            Ok(Control::Close) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    fn process(&mut self, mut item: WorkItem) {
        let full_path = item.full_path();
        let listing = self.lister.list(&full_path);
        log::debug!(
            "Worker {} listed {full_path}: ok={} directories={} files={}",
            self.id,
            listing.ok,
            listing.directories.len(),
            listing.files.len()
        );

        if listing.ok {
            self.finish(item.location, item.relative, listing.directories, listing.files);
            return;
        }

        let directories = merge_directories(
            std::mem::take(&mut item.prior_directories),
            listing.directories,
        );
        let mut files = merge_files(std::mem::take(&mut item.prior_files), listing.files);
        item.failed_workers.push(self.id);

        if item.attempts() < self.max_attempts.max(1) {
            log::warn!(
                "Listing {full_path} failed on worker {} (attempt {} of {}), requeueing",
                self.id,
                item.attempts(),
                self.max_attempts
            );
            item.prior_directories = directories;
            item.prior_files = files;
            self.queue.push(item);
        } else {
            log::error!(
                "Giving up on {full_path} after {} attempts; flagging it unlisted",
                item.attempts()
            );
            files.push(FileEntry::unlisted_marker());
            self.finish(item.location, item.relative, directories, files);
        }
    }

    /// Queue the children, then hand the contents to the coordinator.
    ///
    /// Children must be queued before the result is sent: an empty queue
    /// with no pending result means the crawl is over.
    fn finish(
        &self,
        location: String,
        relative: String,
        directories: Vec<SubdirEntry>,
        files: Vec<FileEntry>,
    ) {
        for directory in &directories {
            self.queue
                .push(WorkItem::new(location.as_str(), join_path(&relative, &directory.name)));
        }
        if self
            .results
            .send(ListingOutput {
                relative,
                directories,
                files,
            })
            .is_err()
        {
            log::debug!("Worker {} result dropped, coordinator gone", self.id);
        }
    }
}

fn merge_directories(prior: Vec<SubdirEntry>, found: Vec<SubdirEntry>) -> Vec<SubdirEntry> {
    let merged: BTreeMap<String, i64> = prior
        .into_iter()
        .chain(found)
        .map(|entry| (entry.name, entry.mtime))
        .collect();
    merged
        .into_iter()
        .map(|(name, mtime)| SubdirEntry { name, mtime })
        .collect()
}

fn merge_files(prior: Vec<FileEntry>, found: Vec<FileEntry>) -> Vec<FileEntry> {
    let merged: BTreeMap<String, FileEntry> = prior
        .into_iter()
        .chain(found)
        .map(|entry| (entry.name.clone(), entry))
        .collect();
    merged.into_values().collect()
}
