//! A fixed set of listeners started, stopped and reported on together.
//!
//! # Responsibilities
//! - Start every listener concurrently and wait for all of them
//! - Tear the whole group down on the first unexpected failure
//! - Abrupt close and deadline-bounded graceful shutdown
//!
//! # Design Decisions
//! - Close and shutdown are best-effort: every listener is attempted
//!   regardless of earlier failures
//! - Only the last observed error is returned; each individual outcome
//!   goes to the [`LifecycleObserver`] first
//! - Membership never changes after construction, so no locking

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::lifecycle::observer::{LifecycleEvent, LifecycleObserver, Phase, TracingObserver};
use crate::net::{Listener, ListenerError};

/// Listeners sharing one lifecycle. Index in the group is the listener's
/// identity in every report.
pub struct ListenerGroup<L: Listener> {
    listeners: Vec<Arc<L>>,
    observer: Arc<dyn LifecycleObserver>,
}

impl<L: Listener> ListenerGroup<L> {
    /// Create a group that reports through `tracing`.
    pub fn new(listeners: Vec<L>) -> Self {
        Self::with_observer(listeners, Arc::new(TracingObserver))
    }

    pub fn with_observer(listeners: Vec<L>, observer: Arc<dyn LifecycleObserver>) -> Self {
        Self {
            listeners: listeners.into_iter().map(Arc::new).collect(),
            observer,
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn listeners(&self) -> &[Arc<L>] {
        &self.listeners
    }

    pub fn addresses(&self) -> Vec<SocketAddr> {
        self.listeners.iter().map(|l| l.addr()).collect()
    }

    /// Serve on every listener until all of them stop.
    ///
    /// Returns `Ok(())` when every listener stopped on request. The first
    /// real failure closes the whole group and is returned (or the close
    /// error, if closing failed too) without waiting for the others.
    pub async fn run(&self) -> Result<(), ListenerError> {
        let (tx, mut rx) = mpsc::channel(self.listeners.len().max(1));
        for (index, listener) in self.listeners.iter().enumerate() {
            let listener = Arc::clone(listener);
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = listener.serve().await;
                let _ = tx.send((index, result)).await;
            });
        }
        drop(tx);

        tracing::info!(listeners = self.listeners.len(), "Listener group started");

        for _ in 0..self.listeners.len() {
            let Some((index, result)) = rx.recv().await else {
                tracing::error!("Listener task ended without reporting, closing group");
                return self.close();
            };
            self.report(Phase::Serve, index, &result);

            if let Err(error) = result {
                tracing::warn!(index, "Listener failed, closing remaining listeners");
                return match self.close() {
                    Ok(()) => Err(error),
                    Err(close_error) => Err(close_error),
                };
            }
        }

        Ok(())
    }

    /// Stop every listener immediately, in index order.
    pub fn close(&self) -> Result<(), ListenerError> {
        let mut last = Ok(());
        for (index, listener) in self.listeners.iter().enumerate() {
            let result = listener.close();
            self.report(Phase::Close, index, &result);
            if result.is_err() {
                last = result;
            }
        }
        last
    }

    /// Gracefully stop every listener concurrently, bounded by `deadline`.
    ///
    /// Always waits for one outcome per listener, timeouts included.
    pub async fn shutdown(&self, deadline: Instant) -> Result<(), ListenerError> {
        let (tx, mut rx) = mpsc::channel(self.listeners.len().max(1));
        for (index, listener) in self.listeners.iter().enumerate() {
            let listener = Arc::clone(listener);
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = listener.shutdown(deadline).await;
                let _ = tx.send((index, result)).await;
            });
        }
        drop(tx);

        let mut last = Ok(());
        let mut collected = 0;
        while let Some((index, result)) = rx.recv().await {
            collected += 1;
            self.report(Phase::Shutdown, index, &result);
            if result.is_err() {
                last = result;
            }
        }

        if collected != self.listeners.len() {
            tracing::error!(
                expected = self.listeners.len(),
                collected,
                "Shutdown task ended without reporting"
            );
        }
        last
    }

    fn report(&self, phase: Phase, index: usize, result: &Result<(), ListenerError>) {
        self.observer.record(LifecycleEvent {
            phase,
            index,
            addr: self.listeners[index].addr(),
            outcome: result.as_ref().map(|_| ()),
        });
    }
}
