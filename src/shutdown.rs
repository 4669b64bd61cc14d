//! Graceful shutdown coordination
//!
//! A [`ShutdownFlag`] is shared across the crawler and the download
//! dispatcher so a Ctrl+C stops new work from being claimed while in-flight
//! downloads finish and the run still emits its report.

use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Shared handle to a shutdown flag.
pub type SharedShutdown = Arc<ShutdownFlag>;

static GLOBAL: OnceCell<SharedShutdown> = OnceCell::new();

/// Register the process-wide shutdown handle. Later registrations are
/// ignored.
pub fn install_global(handle: SharedShutdown) {
    let _ = GLOBAL.set(handle);
}

/// The process-wide shutdown handle, if one was installed.
pub fn global() -> Option<SharedShutdown> {
    GLOBAL.get().cloned()
}

/// A latch that flips once and notifies every waiter.
#[derive(Debug, Default)]
pub struct ShutdownFlag {
    triggered: AtomicBool,
    notify: Notify,
}

impl ShutdownFlag {
    /// Create a fresh, untriggered flag wrapped for sharing.
    pub fn shared() -> SharedShutdown {
        Arc::new(Self::default())
    }

    /// Trigger shutdown; waiters are notified exactly once.
    pub fn trigger(&self) {
        if !self.triggered.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    /// Whether shutdown has been triggered.
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Wait until the flag is triggered; returns immediately if it already
    /// is.
    pub async fn wait(&self) {
        if self.is_triggered() {
            return;
        }
        self.notify.notified().await;
    }
}
