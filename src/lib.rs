//! # hftpd - A Line-Framed File Access Server
//!
//! hftpd exposes one directory to clients over a small text protocol on
//! TCP. Clients can list the directory, ask for the size of a file, fetch
//! any byte range of a file (base64-encoded), and quit.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                               hftpd                                     │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│  Dispatch   │───>│ Worker Pool │                  │
//! │  │ (Listener)  │    │   Queue     │    │  (N tasks)  │                  │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘                  │
//! │                                               │                         │
//! │                                               ▼                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │   Line      │<───│ Connection  │───>│  Command    │                  │
//! │  │   Codec     │    │ State Mach. │    │  Handler    │                  │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘                  │
//! │                                               │                         │
//! │                                               ▼                         │
//! │                                        ┌─────────────┐                  │
//! │                                        │  Directory  │                  │
//! │                                        │ (read-only) │                  │
//! │                                        └─────────────┘                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use hftpd::{Config, Server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config {
//!         datadir: "/srv/files".into(),
//!         ..Config::default()
//!     };
//!
//!     let server = Server::bind(&config).await?;
//!     server.run().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Protocol
//!
//! Requests and responses are lines ending in `\r\n`. Every request gets a
//! status line `<code> <message>` followed by its payload.
//!
//! - `LIST_FILES` - one line per entry, then an empty line
//! - `FILE_INFO filename` - one line with the size in bytes
//! - `SLICE_FILE filename offset size` - one line of base64
//! - `QUIT` - no payload; the server closes the connection
//!
//! Status codes in the `1xx` range are fatal and close the connection;
//! codes in the `2xx` range reject one request and keep it open.
//!
//! ## Module Overview
//!
//! - [`protocol`]: status codes, responses, line framing and request parsing
//! - [`storage`]: read-only access to the served directory
//! - [`commands`]: the command handlers
//! - [`connection`]: the per-client state machine
//! - [`server`]: listener, dispatch queue and worker pool
//! - [`config`]: command-line configuration

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::CommandHandler;
pub use config::{Config, ConfigError};
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{parse_command, Command, Response, StatusCode};
pub use server::{Server, ServerError, WorkerPool};
pub use storage::Directory;

/// The default port the server listens on
pub const DEFAULT_PORT: u16 = 19500;

/// The default address the server binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// The default served directory
pub const DEFAULT_DIR: &str = "testdata";

/// The default number of clients served at the same time
pub const DEFAULT_WORKERS: usize = 10;

/// Version of hftpd
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
