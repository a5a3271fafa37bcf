//! Connection Handler Module
//!
//! This module runs the protocol for one client at a time. A worker from
//! the pool takes an accepted socket off the dispatch queue and drives it
//! through the connection state machine until it closes.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Dispatch Queue                          │
//! │                    (server module)                          │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ dequeue
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐      │
//! │  │ Frame line  │───>│ Parse line  │───>│ Execute cmd │      │
//! │  └─────────────┘    └─────────────┘    └─────────────┘      │
//! │         ▲                                     │             │
//! │         │                                     ▼             │
//! │         │  Ok / Recoverable           ┌─────────────┐       │
//! │         └─────────────────────────────│ Send resp   │       │
//! │                                       └─────────────┘       │
//! │                                   Fatal / QUIT │            │
//! │                                                ▼ close      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Pipelining**: several requests in one TCP segment are answered in order
//! - **Strict framing**: a bare `\n` or a missing marker ends the session
//! - **Statistics**: tracks connection, request and byte counters
//!
//! ## Example
//!
//! ```ignore
//! use hftpd::commands::CommandHandler;
//! use hftpd::connection::{handle_connection, ConnectionStats};
//! use hftpd::storage::Directory;
//! use std::sync::Arc;
//!
//! let directory = Arc::new(Directory::new("testdata"));
//! let stats = Arc::new(ConnectionStats::new());
//! let handler = CommandHandler::new(directory);
//!
//! let (stream, addr) = listener.accept().await?;
//! handle_connection(stream, addr, handler, stats).await;
//! ```

pub mod handler;

// Re-export commonly used types
pub use handler::{
    handle_connection, ConnectionError, ConnectionHandler, ConnectionStats, StatsSnapshot,
};
