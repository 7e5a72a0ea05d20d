//! Listers: single-directory listing backends driven by the orchestrator.
//!
//! A lister is owned by exactly one worker for the duration of a crawl and
//! may keep per-connection state. Listing failures are reported through
//! [`DirectoryListing::ok`], never by panicking or by an error value, so the
//! orchestrator can retry the directory on another worker.

pub mod dump;
pub mod local;

#[cfg(not(unix))]
mod legacy;
#[cfg(unix)]
mod posix;

pub use dump::DumpLister;
pub use local::LocalLister;

use crate::models::DirectoryListing;
use crate::{Error, Result};

/// Lists a single remote directory
///
/// `list` must not panic. A panic is not retried: the orchestrator ends the
/// whole crawl with [`Error::Structural`], and release builds abort outright
/// since they are compiled with `panic = "abort"`. Transient trouble belongs
/// in a listing with `ok == false`.
pub trait Lister: Send {
    /// List the immediate children of `path`, a full LFN such as
    /// `/store/mc/ttThings/0000`.
    fn list(&mut self, path: &str) -> DirectoryListing;

    /// Endpoint this lister talks to, for logging
    fn endpoint(&self) -> &str;
}

/// Repeat `endpoints` round-robin until `count` entries are produced.
#[must_use]
pub fn pad_endpoints(endpoints: &[String], count: usize) -> Vec<String> {
    endpoints.iter().cycle().take(count).cloned().collect()
}

/// Build one lister per worker, spreading workers over the site's endpoints.
///
/// With `threads == 0` one lister per endpoint is built.
///
/// # Errors
/// `InvalidInput` when the site has no endpoint, or whatever the factory
/// returns for an endpoint it can not connect to.
pub fn build_pool<F>(
    site: &str,
    endpoints: &[String],
    threads: usize,
    mut factory: F,
) -> Result<Vec<Box<dyn Lister>>>
where
    F: FnMut(&str, &str) -> Result<Box<dyn Lister>>,
{
    if endpoints.is_empty() {
        return Err(Error::InvalidInput(format!(
            "site {site} has no listing endpoint"
        )));
    }

    let count = if threads == 0 { endpoints.len() } else { threads };
    let pool = pad_endpoints(endpoints, count)
        .iter()
        .map(|endpoint| factory(site, endpoint))
        .collect::<Result<Vec<_>>>()?;
    log::info!(
        "Built {} listers for {site} over {} endpoints",
        pool.len(),
        endpoints.len()
    );
    Ok(pool)
}
