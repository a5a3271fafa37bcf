//! Line Protocol Implementation
//!
//! This module implements the wire protocol spoken between clients and the
//! server: CRLF-framed text lines carrying requests, and responses made of a
//! status line plus an optional payload.
//!
//! ## Modules
//!
//! - `types`: status codes, status classes and the `Response` value
//! - `codec`: line framing over async byte streams
//! - `parser`: request line to `Command`
//!
//! ## Example
//!
//! ```ignore
//! use hftpd::protocol::{parse_command, LineReader, write_response, Response};
//!
//! let mut reader = LineReader::new(read_half);
//! let line = reader.read_line().await?;
//! let command = parse_command(&line)?;
//!
//! write_response(&mut write_half, &Response::line("5")).await?;
//! ```

pub mod codec;
pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use codec::{write_binary, write_line, write_response, FrameError, LineReader, MAX_LINE_LENGTH};
pub use parser::{parse_command, Command, ParseError};
pub use types::{Payload, Response, StatusClass, StatusCode, EOL};
