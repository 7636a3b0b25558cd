//! Lifecycle-bound work queue for a single screen.
//!
//! Every view-model owns one [`ScreenScope`]. Operations launched through it
//! run on the tokio runtime, failures are caught once (logged, and optionally
//! shown in the snackbar), and everything still in flight is cancelled when
//! the scope is dropped together with its screen.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error};

use crate::app::error::Result;
use crate::app::snackbar::ErrorSink;

pub struct ScreenScope {
    screen: &'static str,
    sink: Arc<dyn ErrorSink>,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl ScreenScope {
    pub fn new(screen: &'static str, sink: Arc<dyn ErrorSink>) -> Self {
        Self {
            screen,
            sink,
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Runs `operation` in the background; a failure is logged and reported
    /// to the error sink.
    pub fn launch_catching<F>(&self, operation: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.launch(true, operation);
    }

    /// Like [`launch_catching`](Self::launch_catching) but failures are only
    /// logged. For flows that surface their own error state.
    pub fn launch_catching_quietly<F>(&self, operation: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.launch(false, operation);
    }

    fn launch<F>(&self, snackbar: bool, operation: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let screen = self.screen;
        let sink = Arc::clone(&self.sink);
        let cancel = self.cancel.clone();

        self.tracker.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(screen, "operation cancelled with its screen");
                }
                result = operation => {
                    if let Err(err) = result {
                        error!(screen, error = %err, "operation failed");
                        if snackbar {
                            sink.report(err.to_string());
                        }
                    }
                }
            }
        });
    }

    /// Waits until every launched operation has finished.
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

impl Drop for ScreenScope {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
