//! Worker pool and dispatch queue
//!
//! Accepted connections are not handled on the accept loop. They are pushed
//! onto an unbounded FIFO queue and a fixed number of workers take them off
//! one at a time, so at most `size` clients are served at once. Clients past
//! that limit stay connected and wait in the queue.
//!
//! ```text
//!   accept loop ──enqueue──> [ c5 | c4 | c3 ] ──dequeue──> worker 0 (c1)
//!                                              └─────────> worker 1 (c2)
//! ```
//!
//! Enqueueing never waits. Dequeueing waits on a shared receiver, and the
//! lock around it hands the next connection to whichever idle worker asked
//! first.

use crate::commands::CommandHandler;
use crate::connection::{handle_connection, ConnectionStats};
use crate::storage::Directory;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// An accepted connection waiting for a worker.
#[derive(Debug)]
pub struct PendingConnection {
    pub stream: TcpStream,
    pub peer: SocketAddr,
}

impl PendingConnection {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self { stream, peer }
    }
}

/// Returned when a connection is enqueued after every worker has stopped.
#[derive(Debug, Error)]
#[error("dispatch queue is closed")]
pub struct QueueClosed(pub PendingConnection);

/// Sending side of the dispatch queue.
#[derive(Debug, Clone)]
pub struct DispatchQueue {
    sender: mpsc::UnboundedSender<PendingConnection>,
}

impl DispatchQueue {
    /// Appends a connection to the back of the queue without waiting.
    pub fn enqueue(&self, connection: PendingConnection) -> Result<(), QueueClosed> {
        self.sender
            .send(connection)
            .map_err(|mpsc::error::SendError(connection)| QueueClosed(connection))
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

type SharedReceiver = Arc<Mutex<mpsc::UnboundedReceiver<PendingConnection>>>;

struct Worker {
    id: usize,
    handle: JoinHandle<()>,
}

impl Worker {
    fn spawn(
        id: usize,
        receiver: SharedReceiver,
        mut shutdown: watch::Receiver<bool>,
        handler: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            debug!(worker = id, "Worker started");

            loop {
                let next = tokio::select! {
                    biased;
                    _ = shutdown.changed() => None,
                    next = async { receiver.lock().await.recv().await } => next,
                };

                let Some(PendingConnection { stream, peer }) = next else {
                    break;
                };

                debug!(worker = id, client = %peer, "Worker took connection");
                handle_connection(stream, peer, handler.clone(), Arc::clone(&stats)).await;
            }

            debug!(worker = id, "Worker stopped");
        });

        Self { id, handle }
    }
}

/// A fixed group of workers serving connections from one dispatch queue.
pub struct WorkerPool {
    workers: Vec<Worker>,
    shutdown: watch::Sender<bool>,
}

impl WorkerPool {
    /// Spawns `size` workers serving `directory` and returns the pool with
    /// the queue that feeds it.
    ///
    /// `size` must be at least one; [`crate::Config::validate`] enforces this
    /// for the binary.
    pub fn spawn(
        size: usize,
        directory: Arc<Directory>,
        stats: Arc<ConnectionStats>,
    ) -> (Self, DispatchQueue) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let receiver: SharedReceiver = Arc::new(Mutex::new(receiver));
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handler = CommandHandler::new(directory);

        let workers = (0..size)
            .map(|id| {
                Worker::spawn(
                    id,
                    Arc::clone(&receiver),
                    shutdown_rx.clone(),
                    handler.clone(),
                    Arc::clone(&stats),
                )
            })
            .collect();

        info!(workers = size, "Worker pool started");
        (Self { workers, shutdown }, DispatchQueue { sender })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Stops the pool.
    ///
    /// Idle workers stop at once and queued connections are dropped. Busy
    /// workers get `grace` to finish their current connection before they
    /// are aborted.
    pub async fn shutdown(self, grace: Duration) {
        let _ = self.shutdown.send(true);
        let deadline = tokio::time::Instant::now() + grace;

        for worker in self.workers {
            let Worker { id, mut handle } = worker;
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(worker = id, error = %e, "Worker task failed"),
                Err(_) => {
                    warn!(worker = id, "Worker still busy at shutdown, aborting");
                    handle.abort();
                    let _ = handle.await;
                }
            }
        }

        info!("Worker pool stopped");
    }
}
