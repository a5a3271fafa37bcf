//! Served Directory
//!
//! The server exposes exactly one directory, fixed at startup. This module
//! wraps it and offers the three read operations the protocol needs:
//!
//! - list the entries of the directory
//! - get the size of a file
//! - read a byte range of a file
//!
//! All operations go through `tokio::fs`, so a slow disk suspends only the
//! worker that issued the request. Names are re-validated here even though
//! the command handlers already check them.

use crate::protocol::StatusCode;
use crate::storage::validation::is_valid_filename;
use bytes::Bytes;
use std::fs::Metadata;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, warn};

/// Errors returned by directory operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("invalid filename: {0:?}")]
    InvalidName(String),

    /// The requested range does not fit inside the file
    #[error("range {offset}+{len} is outside {name} ({size} bytes)")]
    OutOfRange {
        name: String,
        offset: u64,
        len: u64,
        size: u64,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// The status reported to the client for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            StorageError::NotFound(_) => StatusCode::FileNotFound,
            StorageError::InvalidName(_) => StatusCode::InvalidArguments,
            StorageError::OutOfRange { .. } => StatusCode::BadOffset,
            StorageError::Io(_) => StatusCode::InternalError,
        }
    }
}

/// The read-only directory tree served to clients.
#[derive(Debug, Clone)]
pub struct Directory {
    root: PathBuf,
}

impl Directory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns true if the root exists and is a directory.
    pub async fn exists(&self) -> bool {
        fs::metadata(&self.root)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false)
    }

    /// Lists the names of the entries in the root, sorted.
    ///
    /// Only names a client could send back are listed: names that are not
    /// valid UTF-8 or fail [`is_valid_filename`] are skipped.
    pub async fn list_entries(&self) -> Result<Vec<String>, StorageError> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut names = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            match entry.file_name().into_string() {
                Ok(name) if is_valid_filename(&name) => names.push(name),
                Ok(name) => debug!(name = %name, "Skipping entry clients cannot name"),
                Err(raw) => warn!(name = ?raw, "Skipping entry with non UTF-8 name"),
            }
        }

        names.sort();
        debug!(root = %self.root.display(), entries = names.len(), "Listed directory");
        Ok(names)
    }

    /// Returns the size in bytes of the regular file `name`.
    pub async fn file_size(&self, name: &str) -> Result<u64, StorageError> {
        let path = self.resolve(name)?;
        Ok(regular_file_metadata(&path, name).await?.len())
    }

    /// Reads exactly `len` bytes of `name` starting at `offset`.
    ///
    /// Fails with [`StorageError::OutOfRange`] if `offset + len` exceeds the
    /// file size, including when the file shrinks while it is being read.
    pub async fn read_range(&self, name: &str, offset: u64, len: u64) -> Result<Bytes, StorageError> {
        let path = self.resolve(name)?;
        regular_file_metadata(&path, name).await?;
        let mut file = fs::File::open(&path)
            .await
            .map_err(|e| not_found_or_io(e, name))?;

        let meta = file.metadata().await?;
        if !meta.is_file() {
            return Err(StorageError::NotFound(name.to_string()));
        }

        let size = meta.len();
        let out_of_range = || StorageError::OutOfRange {
            name: name.to_string(),
            offset,
            len,
            size,
        };

        let end = offset.checked_add(len).ok_or_else(out_of_range)?;
        if end > size {
            return Err(out_of_range());
        }
        let len_usize = usize::try_from(len).map_err(|_| out_of_range())?;

        file.seek(SeekFrom::Start(offset)).await?;
        let mut data = vec![0u8; len_usize];
        // read_exact keeps reading through short reads until the range is full
        match file.read_exact(&mut data).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Err(out_of_range()),
            Err(e) => return Err(StorageError::Io(e)),
        }

        debug!(file = name, offset, len, "Read file range");
        Ok(Bytes::from(data))
    }

    /// Maps a client-supplied name to a path inside the root.
    fn resolve(&self, name: &str) -> Result<PathBuf, StorageError> {
        if !is_valid_filename(name) {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }
}

/// Looks up `path` without following symlinks. Anything but a regular
/// file, a link included, is reported as not found.
async fn regular_file_metadata(path: &Path, name: &str) -> Result<Metadata, StorageError> {
    let meta = fs::symlink_metadata(path)
        .await
        .map_err(|e| not_found_or_io(e, name))?;

    if !meta.is_file() {
        return Err(StorageError::NotFound(name.to_string()));
    }
    Ok(meta)
}

fn not_found_or_io(err: std::io::Error, name: &str) -> StorageError {
    if err.kind() == ErrorKind::NotFound {
        StorageError::NotFound(name.to_string())
    } else {
        StorageError::Io(err)
    }
}
