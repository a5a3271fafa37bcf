//! Connection Handler Module
//!
//! This module handles individual client connections. Each connection is
//! driven by one worker from start to finish, through an explicit state
//! machine.
//!
//! ## Connection Lifecycle
//!
//! ```text
//!              root missing
//!   (start) ─────────────────────────────┐
//!      │                                 │
//!      ▼                                 ▼
//! ┌─────────────────┐  line   ┌─────────────┐ response ┌────────────┐
//! │ AwaitingRequest │───────>│ Dispatching │────────>│ Responding │
//! └─────────────────┘         └─────────────┘          └─────┬──────┘
//!      ▲   │ framing error                                   │
//!      │   └───────────────────────────────────────────────>│
//!      │                                                     │
//!      │          Ok / Recoverable                           │
//!      └─────────────────────────────────────────────────────┤
//!                                                            │ Fatal / QUIT
//!                                                            ▼
//!                                                      ┌──────────┐
//!                                                      │  Closed  │
//!                                                      └──────────┘
//! ```
//!
//! Every pass through `Responding` sends exactly one status line followed
//! by its payload. Only the state machine closes the socket, and only
//! because of the status class or an explicit `QUIT`.

use crate::commands::CommandHandler;
use crate::protocol::{parse_command, write_response, FrameError, LineReader, Response, StatusCode};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, error, info, trace, warn};

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections handled
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total requests answered (including rejected ones)
    pub requests_processed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

/// A point-in-time copy of [`ConnectionStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub connections_accepted: u64,
    pub active_connections: u64,
    pub requests_processed: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn request_processed(&self) {
        self.requests_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: u64) {
        self.bytes_read.fetch_add(count, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            requests_processed: self.requests_processed.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
        }
    }
}

/// States of the per-connection protocol machine.
#[derive(Debug)]
enum ConnectionState {
    /// Waiting for the next request line
    AwaitingRequest,
    /// A line has been framed and must be parsed and executed
    Dispatching(String),
    /// A response is ready to be sent
    Responding { response: Response, quit: bool },
    Closed,
}

impl ConnectionState {
    fn name(&self) -> &'static str {
        match self {
            ConnectionState::AwaitingRequest => "awaiting_request",
            ConnectionState::Dispatching(_) => "dispatching",
            ConnectionState::Responding { .. } => "responding",
            ConnectionState::Closed => "closed",
        }
    }
}

/// Handles a single client connection.
///
/// This struct owns the framed reader, the buffered writer and the command
/// handler for one connected client. Nothing else touches its buffers.
pub struct ConnectionHandler {
    /// Framed read half of the socket
    reader: LineReader<OwnedReadHalf>,

    /// Buffered write half of the socket
    writer: BufWriter<OwnedWriteHalf>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// The command handler (shares the served directory)
    command_handler: CommandHandler,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl ConnectionHandler {
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `stream` - The TCP stream for this connection
    /// * `addr` - The client's socket address
    /// * `command_handler` - The command handler for executing commands
    /// * `stats` - Shared connection statistics
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();
        let (read_half, write_half) = stream.into_split();

        Self {
            reader: LineReader::new(read_half),
            writer: BufWriter::new(write_half),
            addr,
            command_handler,
            stats,
        }
    }

    /// Runs the connection until it reaches the `Closed` state or an I/O
    /// error ends it, then closes the socket.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected"),
            Err(ConnectionError::Io(io_err))
                if matches!(
                    io_err.kind(),
                    std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::BrokenPipe
                ) =>
            {
                debug!(client = %self.addr, "Connection reset by client")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "Connection error"),
        }

        if let Err(e) = self.writer.shutdown().await {
            trace!(client = %self.addr, error = %e, "Socket shutdown failed");
        }

        result
    }

    /// The state machine loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        let mut state = self.initial_state().await;

        loop {
            trace!(client = %self.addr, state = state.name(), "Connection state");

            state = match state {
                ConnectionState::AwaitingRequest => self.await_request().await,
                ConnectionState::Dispatching(line) => self.dispatch(&line).await,
                ConnectionState::Responding { response, quit } => {
                    self.respond(&response, quit).await?
                }
                ConnectionState::Closed => return Ok(()),
            };
        }
    }

    /// Checks that the served directory exists before taking requests.
    async fn initial_state(&self) -> ConnectionState {
        if self.command_handler.directory().exists().await {
            ConnectionState::AwaitingRequest
        } else {
            error!(
                client = %self.addr,
                root = %self.command_handler.directory().root().display(),
                "Served directory is missing"
            );
            ConnectionState::Responding {
                response: Response::status(StatusCode::InternalError),
                quit: false,
            }
        }
    }

    /// Reads one request line.
    async fn await_request(&mut self) -> ConnectionState {
        match self.reader.read_line().await {
            Ok(line) => ConnectionState::Dispatching(line),
            Err(e) => {
                match &e {
                    FrameError::Closed => debug!(client = %self.addr, "Stream closed by client"),
                    _ => warn!(client = %self.addr, error = %e, "Framing error"),
                }
                ConnectionState::Responding {
                    response: Response::status(e.status()),
                    quit: false,
                }
            }
        }
    }

    /// Parses and executes one request line.
    async fn dispatch(&mut self, line: &str) -> ConnectionState {
        let (response, quit) = match parse_command(line) {
            Ok(command) => {
                debug!(client = %self.addr, command = %command, "Executing request");
                let response = self.command_handler.execute(&command).await;
                (response, command.is_quit())
            }
            Err(e) => {
                warn!(client = %self.addr, error = %e, "Rejected request");
                (Response::status(e.status()), false)
            }
        };

        self.stats.request_processed();
        ConnectionState::Responding { response, quit }
    }

    /// Sends a response and decides whether the connection stays open.
    async fn respond(
        &mut self,
        response: &Response,
        quit: bool,
    ) -> Result<ConnectionState, ConnectionError> {
        let written = write_response(&mut self.writer, response).await?;
        self.stats.bytes_written(written);
        debug!(client = %self.addr, response = %response, bytes = written, "Sent response");

        if response.is_fatal() || quit {
            Ok(ConnectionState::Closed)
        } else {
            Ok(ConnectionState::AwaitingRequest)
        }
    }
}

impl Drop for ConnectionHandler {
    // Runs on normal completion and when a worker is aborted mid-connection.
    fn drop(&mut self) {
        self.stats.bytes_read(self.reader.bytes_read());
        self.stats.connection_closed();
    }
}

/// Errors that can end a connection early.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error while sending a response
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Handles a client connection.
///
/// This is a convenience function that creates a ConnectionHandler
/// and runs it to completion.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
) {
    let handler = ConnectionHandler::new(stream, addr, command_handler, stats);
    if let Err(e) = handler.run().await {
        debug!(client = %addr, error = %e, "Connection ended with error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Directory;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const TIMEOUT: Duration = Duration::from_secs(2);

    async fn create_test_server(root: PathBuf) -> (SocketAddr, Arc<ConnectionStats>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let directory = Arc::new(Directory::new(root));
        let stats = Arc::new(ConnectionStats::new());

        let stats_clone = Arc::clone(&stats);
        tokio::spawn(async move {
            while let Ok((stream, client_addr)) = listener.accept().await {
                let handler = CommandHandler::new(Arc::clone(&directory));
                let stats = Arc::clone(&stats_clone);
                tokio::spawn(handle_connection(stream, client_addr, handler, stats));
            }
        });

        (addr, stats)
    }

    fn create_served_dir() -> TempDir {
        let temp_dir = tempdir().unwrap();
        std::fs::write(temp_dir.path().join("a.txt"), b"hello").unwrap();
        std::fs::write(temp_dir.path().join("b.bin"), [1u8, 2, 3]).unwrap();
        temp_dir
    }

    async fn expect_response(client: &mut TcpStream, expected: &[u8]) {
        let mut buf = vec![0u8; expected.len()];
        tokio::time::timeout(TIMEOUT, client.read_exact(&mut buf))
            .await
            .expect("timed out waiting for response")
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&buf), String::from_utf8_lossy(expected));
    }

    async fn read_until_closed(client: &mut TcpStream) -> Vec<u8> {
        let mut buf = Vec::new();
        tokio::time::timeout(TIMEOUT, client.read_to_end(&mut buf))
            .await
            .expect("server did not close the connection")
            .unwrap();
        buf
    }

    #[tokio::test]
    async fn test_list_info_slice() {
        let served = create_served_dir();
        let (addr, _) = create_test_server(served.path().to_path_buf()).await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"LIST_FILES\r\n").await.unwrap();
        expect_response(&mut client, b"0 OK\r\na.txt\r\nb.bin\r\n\r\n").await;

        client.write_all(b"FILE_INFO a.txt\r\n").await.unwrap();
        expect_response(&mut client, b"0 OK\r\n5\r\n").await;

        client.write_all(b"SLICE_FILE a.txt 0 5\r\n").await.unwrap();
        expect_response(&mut client, b"0 OK\r\naGVsbG8=\r\n").await;
    }

    #[tokio::test]
    async fn test_recoverable_errors_keep_connection() {
        let served = create_served_dir();
        let (addr, _) = create_test_server(served.path().to_path_buf()).await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"SLICE_FILE a.txt 3 10\r\n").await.unwrap();
        expect_response(&mut client, b"203 OFFSET EXCEEDS FILE SIZE\r\n").await;

        client.write_all(b"FILE_INFO missing\r\n").await.unwrap();
        expect_response(&mut client, b"202 FILE NOT FOUND\r\n").await;

        client.write_all(b"SLICE_FILE a.txt x 1\r\n").await.unwrap();
        expect_response(&mut client, b"201 INVALID ARGUMENTS FOR COMMAND\r\n").await;

        client.write_all(b"FILE_INFO a.txt\r\n").await.unwrap();
        expect_response(&mut client, b"0 OK\r\n5\r\n").await;
    }

    #[tokio::test]
    async fn test_quit_closes_connection() {
        let served = create_served_dir();
        let (addr, _) = create_test_server(served.path().to_path_buf()).await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"FILE_INFO ..\r\nQUIT\r\n").await.unwrap();
        let received = read_until_closed(&mut client).await;
        assert_eq!(received, b"201 INVALID ARGUMENTS FOR COMMAND\r\n0 OK\r\n");
    }

    #[tokio::test]
    async fn test_bare_line_feed_is_fatal() {
        let served = create_served_dir();
        let (addr, _) = create_test_server(served.path().to_path_buf()).await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"LIST_FILES\nQUIT\r\n").await.unwrap();
        let received = read_until_closed(&mut client).await;
        assert_eq!(received, b"100 BAD EOL\r\n");
    }

    #[tokio::test]
    async fn test_missing_terminator_before_eof() {
        let served = create_served_dir();
        let (addr, _) = create_test_server(served.path().to_path_buf()).await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"LIST_FILES").await.unwrap();
        client.shutdown().await.unwrap();
        let received = read_until_closed(&mut client).await;
        assert_eq!(received, b"101 BAD REQUEST\r\n");
    }

    #[tokio::test]
    async fn test_unknown_command_is_fatal() {
        let served = create_served_dir();
        let (addr, _) = create_test_server(served.path().to_path_buf()).await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"DELETE a.txt\r\n").await.unwrap();
        let received = read_until_closed(&mut client).await;
        assert_eq!(received, b"102 NO SUCH COMMAND\r\n");
    }

    #[tokio::test]
    async fn test_missing_root_reports_internal_error() {
        let served = create_served_dir();
        let (addr, _) = create_test_server(served.path().join("gone")).await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        let received = read_until_closed(&mut client).await;
        assert_eq!(received, b"199 INTERNAL SERVER ERROR\r\n");
    }

    #[tokio::test]
    async fn test_connection_stats() {
        let served = create_served_dir();
        let (addr, stats) = create_test_server(served.path().to_path_buf()).await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"FILE_INFO a.txt\r\n").await.unwrap();
        expect_response(&mut client, b"0 OK\r\n5\r\n").await;

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.connections_accepted, 1);
        assert_eq!(snapshot.active_connections, 1);
        assert_eq!(snapshot.requests_processed, 1);

        client.write_all(b"QUIT\r\n").await.unwrap();
        read_until_closed(&mut client).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.active_connections, 0);
        assert_eq!(snapshot.requests_processed, 2);
        assert_eq!(snapshot.bytes_read, 23);
        assert_eq!(snapshot.bytes_written, 15);
    }
}
