//! Protocol Data Types
//!
//! This module defines the status-code taxonomy and the response values
//! that the server sends back to clients.
//!
//! ## Response Format
//!
//! Every response starts with a status line, `<code> <message>`, terminated
//! by CRLF. A successful response is followed by the payload declared by its
//! command:
//!
//! ```text
//! LIST_FILES            0 OK\r\n a.txt\r\n b.bin\r\n \r\n
//! FILE_INFO a.txt       0 OK\r\n 5\r\n
//! SLICE_FILE a.txt 0 5  0 OK\r\n aGVsbG8=\r\n
//! QUIT                  0 OK\r\n
//! ```
//!
//! Failed requests send the status line alone, e.g. `202 FILE NOT FOUND\r\n`.
//!
//! ## Status Classes
//!
//! | Range | Class       | Effect on the connection |
//! |-------|-------------|--------------------------|
//! | `0`   | Ok          | stays open               |
//! | `1xx` | Fatal       | closed after reporting   |
//! | `2xx` | Recoverable | stays open               |

use base64::Engine;
use bytes::Bytes;
use std::fmt;

/// The end-of-line marker terminating every protocol line.
pub const EOL: &[u8] = b"\r\n";

/// Class of a status code, derived from its numeric range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// The request succeeded.
    Ok,
    /// The request was rejected but the connection stays usable.
    Recoverable,
    /// The connection must be closed once the status has been reported.
    Fatal,
}

/// A protocol status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Ok,
    /// A line contained a bare LF before its CRLF terminator.
    BadEol,
    /// The request line was malformed or the stream ended mid-request.
    BadRequest,
    /// The command name is not part of the protocol.
    InvalidCommand,
    /// The server could not complete the request (missing root, I/O failure).
    InternalError,
    /// Wrong argument count, disallowed filename or non-numeric value.
    InvalidArguments,
    FileNotFound,
    /// The requested byte range lies outside the file.
    BadOffset,
}

impl StatusCode {
    /// All status codes, in numeric order.
    pub const ALL: [StatusCode; 8] = [
        StatusCode::Ok,
        StatusCode::BadEol,
        StatusCode::BadRequest,
        StatusCode::InvalidCommand,
        StatusCode::InternalError,
        StatusCode::InvalidArguments,
        StatusCode::FileNotFound,
        StatusCode::BadOffset,
    ];

    /// Returns the numeric wire code.
    pub fn code(self) -> u16 {
        match self {
            StatusCode::Ok => 0,
            StatusCode::BadEol => 100,
            StatusCode::BadRequest => 101,
            StatusCode::InvalidCommand => 102,
            StatusCode::InternalError => 199,
            StatusCode::InvalidArguments => 201,
            StatusCode::FileNotFound => 202,
            StatusCode::BadOffset => 203,
        }
    }

    /// Returns the human-readable message sent after the code.
    pub fn message(self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::BadEol => "BAD EOL",
            StatusCode::BadRequest => "BAD REQUEST",
            StatusCode::InvalidCommand => "NO SUCH COMMAND",
            StatusCode::InternalError => "INTERNAL SERVER ERROR",
            StatusCode::InvalidArguments => "INVALID ARGUMENTS FOR COMMAND",
            StatusCode::FileNotFound => "FILE NOT FOUND",
            StatusCode::BadOffset => "OFFSET EXCEEDS FILE SIZE",
        }
    }

    /// Returns the class of this status.
    pub fn class(self) -> StatusClass {
        match self.code() {
            0 => StatusClass::Ok,
            100..=199 => StatusClass::Fatal,
            _ => StatusClass::Recoverable,
        }
    }

    #[inline]
    pub fn is_ok(self) -> bool {
        self.class() == StatusClass::Ok
    }

    #[inline]
    pub fn is_fatal(self) -> bool {
        self.class() == StatusClass::Fatal
    }

    /// Renders the status line without its terminator: `"<code> <message>"`.
    pub fn status_line(self) -> String {
        format!("{} {}", self.code(), self.message())
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.message())
    }
}

/// The payload following a successful status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Nothing after the status line.
    Empty,
    /// A single text line.
    Line(String),
    /// Zero or more text lines followed by a blank terminator line.
    Lines(Vec<String>),
    /// Raw bytes, sent as one base64-encoded line.
    Binary(Bytes),
}

/// A complete response: one status line plus its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: StatusCode,
    payload: Payload,
}

impl Response {
    /// Creates a successful response carrying `payload`.
    pub fn ok(payload: Payload) -> Self {
        Self {
            status: StatusCode::Ok,
            payload,
        }
    }

    /// Creates a response consisting of the status line only.
    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            payload: Payload::Empty,
        }
    }

    /// Creates a successful single-line response.
    pub fn line(text: impl Into<String>) -> Self {
        Self::ok(Payload::Line(text.into()))
    }

    /// Creates a successful listing response.
    pub fn lines(lines: Vec<String>) -> Self {
        Self::ok(Payload::Lines(lines))
    }

    /// Creates a successful binary response.
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::ok(Payload::Binary(data.into()))
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Returns true if the connection must close after this response.
    pub fn is_fatal(&self) -> bool {
        self.status.is_fatal()
    }

    /// Serializes the response to its exact wire bytes.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the response into an existing buffer.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        encode_line(buf, &self.status.status_line());
        match &self.payload {
            Payload::Empty => {}
            Payload::Line(text) => encode_line(buf, text),
            Payload::Lines(lines) => {
                for line in lines {
                    encode_line(buf, line);
                }
                buf.extend_from_slice(EOL);
            }
            Payload::Binary(data) => encode_binary(buf, data),
        }
    }
}

/// Appends `text` and the EOL marker to `buf`.
pub fn encode_line(buf: &mut Vec<u8>, text: &str) {
    buf.extend_from_slice(text.as_bytes());
    buf.extend_from_slice(EOL);
}

/// Appends the base64 encoding of `data` and the EOL marker to `buf`.
pub fn encode_binary(buf: &mut Vec<u8>, data: &[u8]) {
    let encoded = base64::prelude::BASE64_STANDARD.encode(data);
    buf.extend_from_slice(encoded.as_bytes());
    buf.extend_from_slice(EOL);
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            Payload::Empty => write!(f, "{}", self.status),
            Payload::Line(text) => write!(f, "{} ({})", self.status, text),
            Payload::Lines(lines) => write!(f, "{} ({} entries)", self.status, lines.len()),
            Payload::Binary(data) => write!(f, "{} ({} bytes)", self.status, data.len()),
        }
    }
}
