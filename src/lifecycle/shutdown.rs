//! Shutdown coordination for the listener process.

use std::fmt;

use tokio::sync::broadcast;

/// What asked the listener to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// The owning server closed our stdin, or died.
    StdinClosed,
    CtrlC,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::StdinClosed => f.write_str("stdin closed"),
            ShutdownReason::CtrlC => f.write_str("ctrl-c"),
        }
    }
}

/// Coordinator for graceful shutdown.
///
/// The signal watchers trigger it, the HTTP listener waits on it. Triggering
/// more than once is harmless.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<ShutdownReason>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe before starting any watcher, or an early trigger is missed.
    pub fn subscribe(&self) -> broadcast::Receiver<ShutdownReason> {
        self.tx.subscribe()
    }

    pub fn trigger(&self, reason: ShutdownReason) {
        let _ = self.tx.send(reason);
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for a shutdown request. A coordinator dropped without triggering
/// counts as stdin closing.
pub async fn requested(mut rx: broadcast::Receiver<ShutdownReason>) -> ShutdownReason {
    loop {
        match rx.recv().await {
            Ok(reason) => return reason,
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => return ShutdownReason::StdinClosed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_reason_reaches_every_subscriber() {
        let shutdown = Shutdown::new();
        let a = shutdown.subscribe();
        let b = shutdown.clone().subscribe();

        shutdown.trigger(ShutdownReason::CtrlC);
        assert_eq!(requested(a).await, ShutdownReason::CtrlC);
        assert_eq!(requested(b).await, ShutdownReason::CtrlC);
    }

    #[tokio::test]
    async fn test_dropped_coordinator_releases_waiters() {
        let shutdown = Shutdown::new();
        let rx = shutdown.subscribe();
        drop(shutdown);

        assert_eq!(requested(rx).await, ShutdownReason::StdinClosed);
    }
}
