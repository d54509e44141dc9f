//! TCP listener implementation with backpressure.
//!
//! # Responsibilities
//! - Bind to one configured address
//! - Accept incoming TCP connections
//! - Enforce max_connections limit via semaphore
//! - Stop abruptly (close) or after in-flight requests finish (shutdown)

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use axum::Router;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};

use crate::net::connection::serve_connection;

/// Error type for listener operations.
///
/// A listener that stops because it was told to (close or shutdown)
/// reports `Ok(())`, never one of these.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// Failed to accept connection.
    #[error("failed to accept on {addr}: {source}")]
    Accept {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// In-flight requests were still running when the shutdown deadline
    /// passed; the listener was force-stopped.
    #[error("shutdown of {addr} timed out")]
    ShutdownTimeout { addr: SocketAddr },
}

/// Lifecycle contract of one network endpoint managed by a
/// [`ListenerGroup`](crate::lifecycle::ListenerGroup).
#[async_trait]
pub trait Listener: Send + Sync + 'static {
    /// Configured address.
    fn addr(&self) -> SocketAddr;

    /// Bind and serve until stopped. `Ok(())` means the stop was requested.
    async fn serve(&self) -> Result<(), ListenerError>;

    /// Stop immediately, dropping in-flight work. Safe to call repeatedly.
    fn close(&self) -> Result<(), ListenerError>;

    /// Stop accepting, let in-flight work finish, force-stop at `deadline`.
    async fn shutdown(&self, deadline: Instant) -> Result<(), ListenerError>;
}

/// Stop request, shared with every connection task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stop {
    None,
    Drain,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Serving,
    /// Accepting has stopped; connections are still finishing.
    Draining,
    Stopped,
}

/// An HTTP endpoint serving the shared router on one address.
pub struct HttpListener {
    addr: SocketAddr,
    router: Router,
    max_connections: usize,
    stop: watch::Sender<Stop>,
    phase: watch::Sender<Phase>,
    local_addr: OnceLock<SocketAddr>,
}

impl HttpListener {
    pub fn new(addr: SocketAddr, router: Router, max_connections: usize) -> Self {
        Self {
            addr,
            router,
            max_connections,
            stop: watch::Sender::new(Stop::None),
            phase: watch::Sender::new(Phase::Idle),
            local_addr: OnceLock::new(),
        }
    }

    /// Address actually bound, once serving (differs from `addr` for port 0).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    /// Get configured maximum connections.
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    fn finish(&self) {
        self.phase.send_replace(Phase::Stopped);
    }

    async fn accept_loop(
        &self,
        listener: TcpListener,
        stop: &mut watch::Receiver<Stop>,
    ) -> Result<(), ListenerError> {
        let connection_limit = Arc::new(Semaphore::new(self.max_connections));
        let mut connections = JoinSet::new();

        let outcome = loop {
            tokio::select! {
                biased;

                _ = stop_requested(stop, |s| *s != Stop::None) => break Ok(()),

                accepted = accept(&listener, &connection_limit) => match accepted {
                    Ok((stream, peer, permit)) => {
                        tracing::debug!(
                            listener = %self.addr,
                            peer_addr = %peer,
                            available_permits = connection_limit.available_permits(),
                            "Connection accepted"
                        );
                        connections.spawn(serve_connection(
                            stream,
                            peer,
                            self.router.clone(),
                            self.stop.subscribe(),
                            permit,
                        ));
                    }
                    Err(e) if is_transient(&e) => {
                        tracing::warn!(listener = %self.addr, error = %e, "Transient accept error");
                    }
                    Err(source) => break Err(ListenerError::Accept { addr: self.addr, source }),
                },

                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        };

        // Stop accepting before waiting on connections.
        drop(listener);

        let draining = *stop.borrow() == Stop::Drain;
        if outcome.is_ok() && draining && !connections.is_empty() {
            self.phase.send_replace(Phase::Draining);
            tracing::info!(
                listener = %self.addr,
                in_flight = connections.len(),
                "Draining connections"
            );
            loop {
                tokio::select! {
                    next = connections.join_next() => if next.is_none() { break },
                    _ = stop_requested(stop, |s| *s == Stop::Close) => break,
                }
            }
        }

        connections.shutdown().await;
        outcome
    }
}

#[async_trait]
impl Listener for HttpListener {
    fn addr(&self) -> SocketAddr {
        self.addr
    }

    async fn serve(&self) -> Result<(), ListenerError> {
        let mut stop = self.stop.subscribe();

        let claimed = self.phase.send_if_modified(|phase| {
            if *phase == Phase::Idle {
                *phase = Phase::Serving;
                true
            } else {
                false
            }
        });
        if !claimed {
            tracing::debug!(listener = %self.addr, "Listener already started or stopped");
            return Ok(());
        }
        if *stop.borrow_and_update() != Stop::None {
            self.finish();
            return Ok(());
        }

        let listener = match TcpListener::bind(self.addr).await {
            Ok(listener) => listener,
            Err(source) => {
                self.finish();
                return Err(ListenerError::Bind {
                    addr: self.addr,
                    source,
                });
            }
        };

        if let Ok(local) = listener.local_addr() {
            let _ = self.local_addr.set(local);
        }
        tracing::info!(
            address = %self.addr,
            local_addr = ?self.local_addr(),
            max_connections = self.max_connections,
            "Listener bound"
        );

        let outcome = self.accept_loop(listener, &mut stop).await;
        self.finish();
        outcome
    }

    fn close(&self) -> Result<(), ListenerError> {
        let previous = self.stop.send_replace(Stop::Close);
        if previous != Stop::Close {
            tracing::debug!(listener = %self.addr, "Close requested");
        }
        Ok(())
    }

    async fn shutdown(&self, deadline: Instant) -> Result<(), ListenerError> {
        self.stop.send_if_modified(|stop| {
            if *stop == Stop::None {
                *stop = Stop::Drain;
                true
            } else {
                false
            }
        });

        // The accept loop answers a drain request without waiting on
        // connections, so only in-flight work is raced against the deadline.
        let mut phase = self.phase.subscribe();
        phase_reached(&mut phase, |p| *p != Phase::Serving).await;
        let current = *phase.borrow();
        if current != Phase::Draining {
            return Ok(());
        }

        let drained = timeout_at(
            deadline,
            phase_reached(&mut phase, |p| *p == Phase::Stopped),
        )
        .await
        .is_ok();
        if drained {
            return Ok(());
        }

        tracing::warn!(listener = %self.addr, "Shutdown deadline passed, forcing close");
        self.stop.send_replace(Stop::Close);
        phase_reached(&mut phase, |p| *p == Phase::Stopped).await;
        Err(ListenerError::ShutdownTimeout { addr: self.addr })
    }
}

/// Accept a new connection, respecting the connection limit.
///
/// Waits for a free slot first, so a saturated listener stops pulling
/// connections off the backlog.
async fn accept(
    listener: &TcpListener,
    limit: &Arc<Semaphore>,
) -> io::Result<(TcpStream, SocketAddr, OwnedSemaphorePermit)> {
    let permit = limit
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| io::Error::other("connection limit closed"))?;
    let (stream, addr) = listener.accept().await?;
    Ok((stream, addr, permit))
}

/// Errors that concern a single pending connection, not the socket.
fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}

pub(crate) async fn stop_requested(stop: &mut watch::Receiver<Stop>, f: impl FnMut(&Stop) -> bool) {
    let _ = stop.wait_for(f).await;
}

async fn phase_reached(phase: &mut watch::Receiver<Phase>, f: impl FnMut(&Phase) -> bool) {
    let _ = phase.wait_for(f).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn listener(addr: &str) -> Arc<HttpListener> {
        Arc::new(HttpListener::new(addr.parse().unwrap(), Router::new(), 8))
    }

    #[tokio::test]
    async fn close_stops_serving() {
        let l = listener("127.0.0.1:0");
        let task = tokio::spawn({
            let l = l.clone();
            async move { l.serve().await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(l.local_addr().is_some());

        l.close().unwrap();
        let result = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());

        // idempotent
        assert!(l.close().is_ok());
    }

    #[tokio::test]
    async fn serve_after_close_does_not_bind() {
        let l = listener("127.0.0.1:0");
        l.close().unwrap();
        assert!(l.serve().await.is_ok());
        assert!(l.local_addr().is_none());
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let l = HttpListener::new(taken.local_addr().unwrap(), Router::new(), 8);

        match l.serve().await {
            Err(ListenerError::Bind { addr, .. }) => assert_eq!(addr, taken.local_addr().unwrap()),
            other => panic!("expected bind error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn shutdown_of_idle_listener_is_clean() {
        let l = listener("127.0.0.1:0");
        let task = tokio::spawn({
            let l = l.clone();
            async move { l.serve().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let deadline = Instant::now() + Duration::from_secs(1);
        assert!(l.shutdown(deadline).await.is_ok());
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn shutdown_past_deadline_without_connections_is_clean() {
        let l = listener("127.0.0.1:0");
        let task = tokio::spawn({
            let l = l.clone();
            async move { l.serve().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(l.local_addr().is_some());

        let deadline = Instant::now() - Duration::from_millis(50);
        assert!(l.shutdown(deadline).await.is_ok());
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn shutdown_past_deadline_with_request_in_flight_times_out() {
        use axum::routing::get;
        use tokio::io::AsyncWriteExt;

        let router = Router::new().route(
            "/",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                "late"
            }),
        );
        let l = Arc::new(HttpListener::new("127.0.0.1:0".parse().unwrap(), router, 8));
        let task = tokio::spawn({
            let l = l.clone();
            async move { l.serve().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut stream = TcpStream::connect(l.local_addr().unwrap()).await.unwrap();
        stream
            .write_all(b"GET / HTTP/1.1\r\nhost: localhost\r\n\r\n")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let deadline = Instant::now() - Duration::from_millis(50);
        match l.shutdown(deadline).await {
            Err(ListenerError::ShutdownTimeout { addr }) => assert_eq!(addr, l.addr()),
            other => panic!("expected timeout, got {:?}", other),
        }
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn shutdown_of_unstarted_listener_returns_immediately() {
        let l = listener("127.0.0.1:0");
        assert!(l.shutdown(Instant::now()).await.is_ok());
    }
}
