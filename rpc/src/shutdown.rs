//! Stop signal for the ledger service's tasks.
//!
//! The signal is latched: once [`ShutdownController::shutdown`] has run,
//! every [`ShutdownSignal`] resolves, including ones taken afterwards.

use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

/// Owns the stop flag. Dropping the controller also releases every signal.
pub struct ShutdownController {
    stopped: watch::Sender<bool>,
}

/// A task's view of the stop flag.
#[derive(Clone)]
pub struct ShutdownSignal {
    stopped: watch::Receiver<bool>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (stopped, _) = watch::channel(false);
        Self { stopped }
    }

    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            stopped: self.stopped.subscribe(),
        }
    }

    pub fn shutdown(&self) {
        if !self.stopped.send_replace(true) {
            info!("shutdown requested");
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.stopped.borrow()
    }

    /// Trigger shutdown on SIGINT or SIGTERM.
    pub async fn wait_for_signal(&self) {
        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(e) => {
                    warn!(error = %e, "SIGTERM handler unavailable, only SIGINT stops the service");
                    std::future::pending::<()>().await;
                }
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = signal::ctrl_c() => info!("SIGINT received"),
            _ = terminate => info!("SIGTERM received"),
        }
        self.shutdown();
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    /// Resolve once shutdown has been requested or the controller is gone.
    pub async fn triggered(&mut self) {
        let _ = self.stopped.wait_for(|stopped| *stopped).await;
    }

    pub fn is_triggered(&self) -> bool {
        *self.stopped.borrow()
    }
}
