//! Command Handler Module
//!
//! This module implements the command processing layer. It receives parsed
//! commands, executes them against the served directory, and returns the
//! response to send.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  Line Parser    │  (protocol module)
//! └────────┬────────┘
//!          │ Command
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Validate     │
//! │  - Execute      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │   Directory     │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! - `LIST_FILES`, `FILE_INFO`, `SLICE_FILE`, `QUIT`

pub mod handler;

// Re-export the main command handler
pub use handler::CommandHandler;
