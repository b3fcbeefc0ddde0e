//! Sleeping and shutdown
//!
//! Every wait the engine performs goes through a [`Scheduler`] and is raced
//! against a [`Shutdown`] signal, so both can be substituted in tests.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

/// Source of delays between cycles and retries.
#[async_trait]
pub trait Scheduler: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real wall-clock sleeping.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

#[async_trait]
impl Scheduler for TokioScheduler {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Create a linked trigger and listener.
pub fn shutdown_channel() -> (ShutdownHandle, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownHandle { tx }, Shutdown { rx })
}

/// Requests termination of the engine.
#[derive(Debug)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Another listener on this channel.
    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            rx: self.tx.subscribe(),
        }
    }
}

/// Observes termination requests.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// A listener that never fires.
    pub fn never() -> Self {
        let (_, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown is requested. Pends forever if every handle was
    /// dropped without triggering.
    pub async fn wait(&mut self) {
        if self.rx.wait_for(|triggered| *triggered).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
