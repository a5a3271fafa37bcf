//! Command Handler Module
//!
//! This module implements the four protocol commands. It receives parsed
//! [`Command`] values, runs them against the served [`Directory`] and
//! returns the [`Response`] to send back.
//!
//! ## Supported Commands
//!
//! - `LIST_FILES` - List the entries of the served directory
//! - `FILE_INFO filename` - Size of a file in bytes
//! - `SLICE_FILE filename offset size` - Bytes `[offset, offset+size)`, base64
//! - `QUIT` - Acknowledge and end the session
//!
//! ## Validation Order
//!
//! Every handler validates its arguments before touching the filesystem:
//!
//! 1. filename allow-list (`INVALID ARGUMENTS`)
//! 2. numeric range sign (`OFFSET EXCEEDS FILE SIZE`)
//! 3. existence (`FILE NOT FOUND`)
//! 4. range against the file length (`OFFSET EXCEEDS FILE SIZE`)
//!
//! Handlers never write to the socket or close it; they only describe the
//! outcome. The connection decides what to do with it.

use crate::protocol::{Command, Payload, Response, StatusCode};
use crate::storage::{is_valid_filename, Directory, StorageError};
use std::sync::Arc;
use tracing::{debug, error};

/// Executes commands against the served directory.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    /// The served directory (shared by every connection)
    directory: Arc<Directory>,
}

impl CommandHandler {
    /// Creates a new command handler for the given directory.
    pub fn new(directory: Arc<Directory>) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Executes a command and returns the response.
    pub async fn execute(&self, command: &Command) -> Response {
        match command {
            Command::ListFiles => self.cmd_list_files().await,
            Command::FileInfo { filename } => self.cmd_file_info(filename).await,
            Command::SliceFile {
                filename,
                offset,
                size,
            } => self.cmd_slice_file(filename, *offset, *size).await,
            Command::Quit => Response::ok(Payload::Empty),
        }
    }

    /// LIST_FILES
    async fn cmd_list_files(&self) -> Response {
        match self.directory.list_entries().await {
            Ok(names) => Response::lines(names),
            Err(e) => storage_failure(e),
        }
    }

    /// FILE_INFO filename
    async fn cmd_file_info(&self, filename: &str) -> Response {
        if !is_valid_filename(filename) {
            return Response::status(StatusCode::InvalidArguments);
        }

        match self.directory.file_size(filename).await {
            Ok(size) => Response::line(size.to_string()),
            Err(e) => storage_failure(e),
        }
    }

    /// SLICE_FILE filename offset size
    async fn cmd_slice_file(&self, filename: &str, offset: i64, size: i64) -> Response {
        if !is_valid_filename(filename) {
            return Response::status(StatusCode::InvalidArguments);
        }

        let (Ok(offset), Ok(size)) = (u64::try_from(offset), u64::try_from(size)) else {
            return Response::status(StatusCode::BadOffset);
        };

        match self.directory.read_range(filename, offset, size).await {
            Ok(data) => Response::binary(data),
            Err(e) => storage_failure(e),
        }
    }
}

/// Converts a storage error into its status response, logging the ones
/// that point at a server-side problem.
fn storage_failure(err: StorageError) -> Response {
    let status = err.status();
    if status.is_fatal() {
        error!(error = %err, "Storage failure");
    } else {
        debug!(error = %err, "Request rejected");
    }
    Response::status(status)
}
