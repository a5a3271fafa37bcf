//! Storage Module
//!
//! This module gives the server read-only access to the directory it
//! serves. It is the only place that touches the filesystem.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Directory (Arc, shared)                    │
//! │                                                             │
//! │   list_entries()      file_size(name)    read_range(...)    │
//! │         │                   │                  │            │
//! │         └───────────┬───────┴──────────────────┘            │
//! │                     ▼                                       │
//! │          resolve(name)  ── is_valid_filename ──> reject     │
//! │                     │                                       │
//! │                     ▼                                       │
//! │                 tokio::fs                                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The root never changes after startup, so it is shared between workers
//! without any locking.
//!
//! ## Example
//!
//! ```ignore
//! use hftpd::storage::Directory;
//!
//! let directory = Directory::new("testdata");
//! let size = directory.file_size("a.txt").await?;
//! let head = directory.read_range("a.txt", 0, size.min(16)).await?;
//! ```

pub mod directory;
pub mod validation;

// Re-export commonly used types
pub use directory::{Directory, StorageError};
pub use validation::{is_valid_filename, MAX_FILENAME_LENGTH};
