//! Site liveness checks used to cancel a running listing

use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Answers whether the site being checked should keep running
pub trait LivenessCheck: Send + Sync {
    fn is_running(&self) -> bool;
}

/// Never cancels
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysRunning;

impl LivenessCheck for AlwaysRunning {
    fn is_running(&self) -> bool {
        true
    }
}

/// Running until [`FlagCheck::stop`] is called on any clone
#[derive(Debug, Clone)]
pub struct FlagCheck {
    running: Arc<AtomicBool>,
}

impl Default for FlagCheck {
    fn default() -> Self {
        Self::new()
    }
}

impl FlagCheck {
    #[must_use]
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl LivenessCheck for FlagCheck {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Running until a stop file appears
#[derive(Debug, Clone)]
pub struct StopFileCheck {
    path: PathBuf,
}

impl StopFileCheck {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LivenessCheck for StopFileCheck {
    fn is_running(&self) -> bool {
        !self.path.exists()
    }
}

/// Rate-limits an expensive check to one call per interval.
///
/// Callers inside the interval get the cached answer. A stop answer is
/// sticky: once the site is reported stopped the inner check is not asked again.
pub struct ThrottledCheck {
    inner: Arc<dyn LivenessCheck>,
    interval: Duration,
    last: Mutex<Option<(Instant, bool)>>,
}

impl ThrottledCheck {
    #[must_use]
    pub fn new(inner: Arc<dyn LivenessCheck>, interval: Duration) -> Self {
        Self {
            inner,
            interval,
            last: Mutex::new(None),
        }
    }
}

impl LivenessCheck for ThrottledCheck {
    fn is_running(&self) -> bool {
        let mut last = self.last.lock();
        let now = Instant::now();
        if let Some((checked_at, running)) = *last
            && (!running || now.saturating_duration_since(checked_at) < self.interval)
        {
            return running;
        }

        let running = self.inner.is_running();
        if !running {
            log::warn!("Liveness check reports the site as stopped");
        }
        *last = Some((now, running));
        running
    }
}
