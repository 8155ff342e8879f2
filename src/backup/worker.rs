//! Background execution with cooperative cancellation
//!
//! Long exports and imports run on a dedicated thread; the caller keeps a
//! [`CancelFlag`] and waits on a single-slot result channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::Receiver;
use tracing::debug;

use crate::error::{MineralogError, MineralogResult};

/// Shared cancellation request, polled between entries and records
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once cancellation was requested
    pub fn check(&self) -> MineralogResult<()> {
        if self.is_cancelled() {
            Err(MineralogError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// An operation running on its own thread
pub struct BackgroundJob<T> {
    result_rx: Receiver<MineralogResult<T>>,
    cancel: CancelFlag,
    handle: JoinHandle<()>,
}

impl<T: Send + 'static> BackgroundJob<T> {
    /// Start `work` on a named thread
    pub fn spawn<F>(name: &str, work: F) -> MineralogResult<Self>
    where
        F: FnOnce(&CancelFlag) -> MineralogResult<T> + Send + 'static,
    {
        let (result_tx, result_rx) = crossbeam_channel::bounded(1);
        let cancel = CancelFlag::new();
        let worker_cancel = cancel.clone();
        let thread_name = name.to_string();

        let handle = std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                debug!(job = %thread_name, "background job started");
                let result = work(&worker_cancel);
                let _ = result_tx.send(result);
            })
            .map_err(|e| MineralogError::Io(format!("Failed to start {}: {}", name, e)))?;

        Ok(Self {
            result_rx,
            cancel,
            handle,
        })
    }

    /// Handle for requesting cancellation from elsewhere
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until the job completes
    pub fn wait(self) -> MineralogResult<T> {
        let received = self.result_rx.recv();
        let _ = self.handle.join();

        received.unwrap_or_else(|_| {
            Err(MineralogError::Io(
                "Background job stopped without a result".into(),
            ))
        })
    }
}
