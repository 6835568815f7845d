use std::future::Future;

use tokio::signal;
use tokio::sync::watch;

use crate::error::{AppError, Result};

/// Wait for a shutdown signal (SIGINT or SIGTERM).
pub async fn wait_for_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, cancelling remediation...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, cancelling remediation...");
        }
    }
}

/// Fires the paired [`CancelSignal`].
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Cooperative cancellation observed by long-running stages.
#[derive(Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// `Err(Cancelled)` once cancellation has been requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        Ok(())
    }

    /// Run `work` unless cancelled first; abandon it if cancellation arrives
    /// while it is pending. Only for work that is safe to drop midway.
    pub async fn guard<T>(&self, work: impl Future<Output = Result<T>>) -> Result<T> {
        self.check()?;
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(AppError::Cancelled),
            result = work => result,
        }
    }

    /// Resolve once cancellation is requested. Pends forever if the handle
    /// was dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Cancel `handle` when the process receives SIGINT or SIGTERM.
pub fn cancel_on_shutdown(handle: CancelHandle) {
    tokio::spawn(async move {
        wait_for_shutdown().await;
        handle.cancel();
    });
}
