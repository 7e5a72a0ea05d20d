//! Concurrent listing of one top-level directory into a [`DirectoryInfo`].
//!
//! One worker thread runs per lister. Workers pull directories from a shared
//! LIFO queue, list them, push the subdirectories they find back onto the
//! queue and send the directory contents to the coordinator, which is the
//! only owner of the tree being built. Failed listings are retried on other
//! workers up to `max_attempts` times before the directory is flagged with
//! the unlisted marker. The crawl ends when every worker is idle, the queue
//! is empty and no result is left to insert.

mod worker;

pub use worker::{Control, ListingOutput, WorkItem, WorkQueue};

use crate::services::lister::Lister;
use crate::tree::{DirectoryInfo, join_path, split_path};
use crate::{Error, Result, RunContext};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use std::thread::{self, ScopedJoinHandle};
use std::time::{Duration, Instant};
use worker::ListingWorker;

/// Longest stretch of continuous results without running the callback
const BUSY_CALLBACK_INTERVAL: Duration = Duration::from_secs(30);

/// Progress callback run on the coordinator thread between result batches
pub type TreeCallback<'a> = &'a mut dyn FnMut(&mut DirectoryInfo);

pub struct ListingOrchestrator<'a> {
    ctx: &'a RunContext,
}

impl<'a> ListingOrchestrator<'a> {
    #[must_use]
    pub fn new(ctx: &'a RunContext) -> Self {
        Self { ctx }
    }

    /// List `location/first_dir` and everything below it.
    ///
    /// The returned tree is named after the first component of `first_dir`;
    /// deeper components become a chain of nodes below it. `callback` may
    /// mutate the partial tree, e.g. to prune empty directories.
    ///
    /// # Errors
    /// `Cancelled` when the liveness check stops the site, `InvalidInput`
    /// without listers, `Io` if a worker thread can not be spawned.
    pub fn create_dirinfo(
        &self,
        location: &str,
        first_dir: &str,
        listers: &mut [Box<dyn Lister>],
        mut callback: Option<TreeCallback<'_>>,
    ) -> Result<DirectoryInfo> {
        if listers.is_empty() {
            return Err(Error::InvalidInput("no listers to crawl with".to_string()));
        }
        let Some(root_name) = split_path(first_dir).next().map(str::to_string) else {
            return Err(Error::InvalidInput(format!(
                "empty directory name under {location}"
            )));
        };
        let relative = split_path(first_dir).skip(1).collect::<Vec<_>>().join("/");
        let first = WorkItem::new(join_path(location, &root_name), relative);

        let options = &self.ctx.options;
        log::info!(
            "Listing {} at {} with {} workers",
            first.full_path(),
            self.ctx.site,
            listers.len()
        );
        let started = Instant::now();

        let queue = WorkQueue::new();
        queue.push(first);
        let (results_tx, results_rx) = unbounded();
        let (idle_tx, idle_rx) = unbounded();
        let mut tree = DirectoryInfo::new(root_name);

        thread::scope(|scope| -> Result<()> {
            let mut controls = Vec::with_capacity(listers.len());
            let mut handles = Vec::with_capacity(listers.len());
            for (id, lister) in listers.iter_mut().enumerate() {
                let (control_tx, control_rx) = unbounded();
                let worker = ListingWorker {
                    id,
                    lister: lister.as_mut(),
                    queue: queue.clone(),
                    control: control_rx,
                    idle: idle_tx.clone(),
                    results: results_tx.clone(),
                    max_attempts: options.max_attempts,
                    retry_backoff: options.retry_backoff,
                };
                let handle = thread::Builder::new()
                    .name(format!("lister-{id}"))
                    .spawn_scoped(scope, move || worker.run())?;
                controls.push(control_tx);
                handles.push(handle);
            }
            drop(results_tx);
            drop(idle_tx);

            let mut coordinator = Coordinator {
                ctx: self.ctx,
                queue: &queue,
                results: &results_rx,
                idle_signals: &idle_rx,
                controls: &controls,
                handles: &handles,
                idle: vec![false; controls.len()],
                last_callback: Instant::now(),
            };
            let outcome = coordinator.run(&mut tree, &mut callback);

            for control in &controls {
                let _ = control.send(Control::Close);
            }
            drop(controls);
            for handle in handles {
                if handle.join().is_err() {
                    log::error!("A listing worker panicked");
                }
            }
            outcome
        })?;

        log::info!(
            "Listed {} at {} in {:.1}s: {} files in {} directories",
            tree.name(),
            self.ctx.site,
            started.elapsed().as_secs_f64(),
            tree.count_files(),
            tree.count_nodes()
        );
        Ok(tree)
    }
}

struct Coordinator<'s, 'scope> {
    ctx: &'s RunContext,
    queue: &'s WorkQueue,
    results: &'s Receiver<ListingOutput>,
    idle_signals: &'s Receiver<usize>,
    controls: &'s [Sender<Control>],
    handles: &'s [ScopedJoinHandle<'scope, ()>],
    idle: Vec<bool>,
    last_callback: Instant,
}

impl Coordinator<'_, '_> {
    fn run(
        &mut self,
        tree: &mut DirectoryInfo,
        callback: &mut Option<TreeCallback<'_>>,
    ) -> Result<()> {
        let poll_interval = self.ctx.options.poll_interval;
        loop {
            if !self.ctx.is_running() {
                log::warn!("{} is no longer running; closing workers", self.ctx.site);
                return Err(Error::Cancelled {
                    site: self.ctx.site.clone(),
                });
            }

            match self.results.recv_timeout(poll_interval) {
                Ok(output) => {
                    insert(tree, output);
                    if self.last_callback.elapsed() >= BUSY_CALLBACK_INTERVAL {
                        self.run_callback(tree, callback);
                    }
                    self.collect_idle();
                    self.wake_idle();
                }
                Err(RecvTimeoutError::Timeout) => {
                    log::debug!(
                        "Built so far: {} files in {} directories, {} queued",
                        tree.count_files(),
                        tree.count_nodes(),
                        self.queue.len()
                    );
                    self.run_callback(tree, callback);
                    self.collect_idle();
                    if self.idle.iter().all(|idle| *idle)
                        && self.queue.is_empty()
                        && self.results.is_empty()
                    {
                        return Ok(());
                    }
                    self.wake_idle();
                    self.check_workers()?;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(Error::Structural(
                        "every listing worker exited before the crawl finished".to_string(),
                    ));
                }
            }
        }
    }

    fn run_callback(&mut self, tree: &mut DirectoryInfo, callback: &mut Option<TreeCallback<'_>>) {
        if let Some(callback) = callback.as_deref_mut() {
            callback(tree);
        }
        self.last_callback = Instant::now();
    }

    fn collect_idle(&mut self) {
        while let Ok(id) = self.idle_signals.try_recv() {
            if let Some(idle) = self.idle.get_mut(id) {
                *idle = true;
            }
        }
    }

    fn wake_idle(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        for (id, idle) in self.idle.iter_mut().enumerate() {
            if *idle && self.controls[id].send(Control::Resume).is_ok() {
                *idle = false;
            }
        }
    }

    fn check_workers(&self) -> Result<()> {
        match self.handles.iter().position(|handle| handle.is_finished()) {
            Some(id) => Err(Error::Structural(format!(
                "listing worker {id} exited before the crawl finished"
            ))),
            None => Ok(()),
        }
    }
}

/// Put one directory's contents into the tree, creating pending nodes for
/// its subdirectories.
fn insert(tree: &mut DirectoryInfo, output: ListingOutput) {
    let Some(node) = tree.get_node_mut(&output.relative, true) else {
        return;
    };
    node.add_files(output.files);
    for directory in output.directories {
        if let Some(child) = node.get_node_mut(&directory.name, true) {
            child.set_mtime(directory.mtime);
        }
    }
}
