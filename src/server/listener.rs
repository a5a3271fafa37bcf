//! TCP server front end
//!
//! [`Server`] owns the listening socket and the worker pool. Its accept loop
//! does nothing but hand sockets to the dispatch queue, so a busy pool never
//! stops new clients from connecting.

use crate::config::{Config, ConfigError};
use crate::connection::ConnectionStats;
use crate::server::pool::{DispatchQueue, PendingConnection, WorkerPool};
use crate::storage::Directory;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// How long busy workers get to finish when the server stops.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// A bound server, ready to accept clients.
pub struct Server {
    listener: TcpListener,
    queue: DispatchQueue,
    pool: WorkerPool,
    directory: Arc<Directory>,
    stats: Arc<ConnectionStats>,
}

impl Server {
    /// Validates `config`, binds the listening socket and starts the workers.
    ///
    /// The served directory is not checked here. Each connection checks it
    /// when it starts.
    pub async fn bind(config: &Config) -> Result<Self, ServerError> {
        config.validate()?;

        let addr = config.bind_address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        let directory = Arc::new(Directory::new(&config.datadir));
        let stats = Arc::new(ConnectionStats::new());
        let (pool, queue) =
            WorkerPool::spawn(config.workers, Arc::clone(&directory), Arc::clone(&stats));

        Ok(Self {
            listener,
            queue,
            pool,
            directory,
            stats,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn stats(&self) -> Arc<ConnectionStats> {
        Arc::clone(&self.stats)
    }

    /// Accepts clients until the process is stopped.
    pub async fn run(self) {
        self.run_until(std::future::pending()).await
    }

    /// Accepts clients until `shutdown` resolves, then stops the pool.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let Server {
            listener,
            queue,
            pool,
            stats,
            ..
        } = self;

        tokio::select! {
            _ = accept_loop(&listener, &queue) => {}
            _ = shutdown => info!("Shutdown signal received, stopping server..."),
        }

        drop(listener);
        drop(queue);
        pool.shutdown(SHUTDOWN_GRACE).await;

        let totals = stats.snapshot();
        info!(
            connections = totals.connections_accepted,
            requests = totals.requests_processed,
            bytes_read = totals.bytes_read,
            bytes_written = totals.bytes_written,
            "Server shutdown complete"
        );
    }
}

/// Main loop that accepts incoming connections.
///
/// Returns only if the dispatch queue has been closed.
async fn accept_loop(listener: &TcpListener, queue: &DispatchQueue) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!(client = %peer, "Connection accepted");
                if let Err(closed) = queue.enqueue(PendingConnection::new(stream, peer)) {
                    warn!(client = %closed.0.peer, "Dispatch queue closed, dropping connection");
                    return;
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to accept connection");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    fn test_config(datadir: &std::path::Path) -> Config {
        Config {
            port: 0,
            datadir: datadir.to_path_buf(),
            workers: 2,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_bind_rejects_invalid_config() {
        let temp_dir = tempdir().unwrap();
        let config = Config {
            workers: 0,
            ..test_config(temp_dir.path())
        };

        let err = Server::bind(&config).await.err().unwrap();
        assert!(matches!(err, ServerError::Config(ConfigError::NoWorkers)));
    }

    #[tokio::test]
    async fn test_bind_address_in_use() {
        let temp_dir = tempdir().unwrap();
        let first = Server::bind(&test_config(temp_dir.path())).await.unwrap();
        let port = first.local_addr().unwrap().port();

        let config = Config {
            port,
            ..test_config(temp_dir.path())
        };
        let err = Server::bind(&config).await.err().unwrap();
        assert!(matches!(err, ServerError::Bind { .. }));
    }

    #[tokio::test]
    async fn test_run_until_shutdown() {
        let temp_dir = tempdir().unwrap();
        std::fs::write(temp_dir.path().join("a.txt"), b"hello").unwrap();

        let server = Server::bind(&test_config(temp_dir.path())).await.unwrap();
        let addr = server.local_addr().unwrap();
        let stats = server.stats();
        let (stop, stopped) = oneshot::channel::<()>();
        let running = tokio::spawn(server.run_until(async {
            let _ = stopped.await;
        }));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"FILE_INFO a.txt\r\nQUIT\r\n").await.unwrap();
        let mut buf = Vec::new();
        client.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"0 OK\r\n5\r\n0 OK\r\n");

        stop.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), running)
            .await
            .expect("server did not stop")
            .unwrap();

        assert_eq!(stats.snapshot().requests_processed, 2);
        assert!(TcpStream::connect(addr).await.is_err());
    }
}
