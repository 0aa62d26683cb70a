//! Core functionality for actual scanning behaviour.
//!
//! Both engines follow the same shape: `start` spawns the sweep onto a
//! background tokio task and returns a [`SessionHandle`]; the sweep pushes
//! immutable event snapshots into the channel the caller supplied, and the
//! caller consumes them on its own context. Collections stay owned by the
//! worker task — only copies cross the channel — so no locking is needed.

mod discovery;
mod ports;

pub use discovery::{DiscoveryConfig, DiscoveryEvent, HostDiscovery, SweepSummary};
pub use ports::{PortScan, PortScanConfig, PortScanEvent};

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::services;

/// Periodic snapshot of a sweep in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanProgress {
    /// Suffixes or ports probed so far.
    pub processed: usize,
    /// Total suffixes or ports in the sweep.
    pub total: usize,
    /// Hosts or open ports found so far.
    pub found: usize,
}

impl ScanProgress {
    /// Completion percentage, rounded down.
    #[must_use]
    pub fn percent(&self) -> usize {
        if self.total == 0 {
            100
        } else {
            self.processed * 100 / self.total
        }
    }
}

/// An open port paired with its resolved service label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRecord {
    /// The open TCP port.
    pub port: u16,
    /// Service label from the static lookup table, `"Unknown"` otherwise.
    pub service: &'static str,
}

impl PortRecord {
    /// Builds a record with the service label resolved.
    #[must_use]
    pub fn new(port: u16) -> Self {
        PortRecord {
            port,
            service: services::lookup(port),
        }
    }
}

impl fmt::Display for PortRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.port, self.service)
    }
}

/// Handle to a running scan session.
///
/// Cancellation is cooperative: the worker checks the flag before every probe
/// and before entering the inter-sweep delay, so an in-flight probe may still
/// run out its timeout after `stop` returns. Once stopped a session never
/// becomes active again.
#[derive(Debug)]
pub struct SessionHandle {
    active: Arc<AtomicBool>,
    wake: Arc<Notify>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub(crate) fn new(active: Arc<AtomicBool>, wake: Arc<Notify>, task: JoinHandle<()>) -> Self {
        SessionHandle { active, wake, task }
    }

    /// Requests the session to stop. Idempotent — repeated calls are no-ops
    /// and at most one terminal event is emitted.
    pub fn stop(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            // notify_one stores a permit, so the wakeup also reaches an idle
            // wait that has not been polled yet.
            self.wake.notify_one();
        }
    }

    /// True until `stop` has been called or the sweep completed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Waits for the background task to finish draining.
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

/// Shared cancellation state handed to the worker task.
#[derive(Debug, Clone)]
pub(crate) struct Session {
    pub(crate) active: Arc<AtomicBool>,
    pub(crate) wake: Arc<Notify>,
}

impl Session {
    pub(crate) fn new() -> Self {
        Session {
            active: Arc::new(AtomicBool::new(true)),
            wake: Arc::new(Notify::new()),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Marks the session inactive once a sweep ran its range to completion,
    /// so the handle reports the terminal state either way.
    pub(crate) fn finish(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    /// Sleeps for `duration`, returning early when the session is stopped.
    pub(crate) async fn idle(&self, duration: std::time::Duration) {
        tokio::select! {
            () = tokio::time::sleep(duration) => {}
            () = self.wake.notified() => {}
        }
    }
}
