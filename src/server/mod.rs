//! Server Module
//!
//! The network front end: one accept loop feeding a fixed pool of workers.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  enqueue   ┌────────────────┐  dequeue  ┌──────────────┐
//! │ TcpListener  │──────────>│ DispatchQueue  │─────────>│  WorkerPool  │
//! │ (listener)   │            │ (unbounded)    │           │  N workers   │
//! └──────────────┘            └────────────────┘           └──────┬───────┘
//!                                                                 │
//!                                                                 ▼
//!                                                      ConnectionHandler
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use hftpd::{Config, Server};
//!
//! let server = Server::bind(&Config::default()).await?;
//! server.run_until(async { tokio::signal::ctrl_c().await.ok(); }).await;
//! ```

pub mod listener;
pub mod pool;

pub use listener::{Server, ServerError, SHUTDOWN_GRACE};
pub use pool::{DispatchQueue, PendingConnection, QueueClosed, WorkerPool};
