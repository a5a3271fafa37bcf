//! Line Framing Codec
//!
//! TCP is a stream protocol: a single read may return part of a request
//! line, or several pipelined lines at once. [`LineReader`] accumulates
//! incoming bytes in a `BytesMut` buffer and hands out one CRLF-terminated
//! line at a time, keeping any bytes after the first marker for the next
//! call.
//!
//! ## Framing Rules
//!
//! - A line ends at the first `\r\n`.
//! - A `\n` that is not preceded by `\r` is a framing error (`BAD EOL`).
//!   It is reported as soon as it arrives, without waiting for a marker.
//! - End-of-stream before a marker is a framing error (`BAD REQUEST`).
//! - A pending line longer than [`MAX_LINE_LENGTH`] is rejected.
//!
//! The writing side is symmetrical: [`write_line`] appends the marker and
//! [`write_binary`] base64-encodes a payload into one terminated line.

use crate::protocol::types::{encode_binary, encode_line, Payload, Response, StatusCode};
use bytes::{Buf, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum length of a request line, marker excluded.
pub const MAX_LINE_LENGTH: usize = 4096;

/// Initial capacity of the read buffer.
const INITIAL_BUFFER_SIZE: usize = 1024;

/// Errors produced while framing a request line.
#[derive(Debug, Error)]
pub enum FrameError {
    /// A `\n` appeared without a preceding `\r`
    #[error("bare line feed inside a request line")]
    BareLineFeed,

    /// The line is not valid UTF-8
    #[error("request line is not valid UTF-8")]
    InvalidUtf8,

    /// No marker within the allowed line length
    #[error("request line exceeds {max} bytes")]
    LineTooLong { max: usize },

    /// The stream ended with a partial line buffered
    #[error("stream ended before end of line")]
    UnexpectedEof,

    /// The stream ended between requests
    #[error("stream closed by peer")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// The status reported to the client for this framing failure.
    pub fn status(&self) -> StatusCode {
        match self {
            FrameError::BareLineFeed => StatusCode::BadEol,
            FrameError::InvalidUtf8
            | FrameError::LineTooLong { .. }
            | FrameError::UnexpectedEof
            | FrameError::Closed => StatusCode::BadRequest,
            FrameError::Io(_) => StatusCode::InternalError,
        }
    }
}

/// Where the first line of a buffer ends, if it is complete.
#[derive(Debug, PartialEq, Eq)]
enum LineEnd {
    /// A full line of `len` bytes followed by CRLF.
    Complete(usize),
    /// A `\n` without `\r` before it.
    BareLineFeed,
    /// No `\n` yet.
    Incomplete,
}

/// Locates the end of the first line in `buf`.
///
/// The first `\n` either terminates a CRLF marker or is a bare line feed,
/// so a single scan decides both cases.
#[inline]
fn find_line_end(buf: &[u8]) -> LineEnd {
    match buf.iter().position(|&b| b == b'\n') {
        Some(pos) if pos > 0 && buf[pos - 1] == b'\r' => LineEnd::Complete(pos - 1),
        Some(_) => LineEnd::BareLineFeed,
        None => LineEnd::Incomplete,
    }
}

/// Reads CRLF-terminated lines from an async byte stream.
#[derive(Debug)]
pub struct LineReader<R> {
    reader: R,
    buffer: BytesMut,
    bytes_read: u64,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            bytes_read: 0,
        }
    }

    /// Reads the next request line.
    ///
    /// Returns the line with the marker removed and surrounding whitespace
    /// trimmed. Suspends until a full line is buffered or the stream fails.
    pub async fn read_line(&mut self) -> Result<String, FrameError> {
        loop {
            match find_line_end(&self.buffer) {
                LineEnd::Complete(len) if len > MAX_LINE_LENGTH => {
                    return Err(FrameError::LineTooLong {
                        max: MAX_LINE_LENGTH,
                    });
                }
                LineEnd::Complete(len) => {
                    let line = self.buffer.split_to(len);
                    self.buffer.advance(2);
                    let text = std::str::from_utf8(&line).map_err(|_| FrameError::InvalidUtf8)?;
                    return Ok(text.trim().to_string());
                }
                LineEnd::BareLineFeed => return Err(FrameError::BareLineFeed),
                LineEnd::Incomplete => {}
            }

            // a trailing '\r' may still belong to the marker
            if self.buffer.len() > MAX_LINE_LENGTH + 1 {
                return Err(FrameError::LineTooLong {
                    max: MAX_LINE_LENGTH,
                });
            }

            if self.buffer.capacity() - self.buffer.len() < 256 {
                self.buffer.reserve(INITIAL_BUFFER_SIZE);
            }

            let n = self.reader.read_buf(&mut self.buffer).await?;
            if n == 0 {
                return Err(if self.buffer.is_empty() {
                    FrameError::Closed
                } else {
                    FrameError::UnexpectedEof
                });
            }
            self.bytes_read += n as u64;
        }
    }

    /// Number of bytes still buffered after the last returned line.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Total bytes received from the stream so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

/// Writes `text` followed by the EOL marker.
///
/// `write_all` keeps writing until the whole line is accepted or the
/// stream reports an error.
pub async fn write_line<W>(writer: &mut W, text: &str) -> std::io::Result<usize>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::with_capacity(text.len() + 2);
    encode_line(&mut buf, text);
    writer.write_all(&buf).await?;
    Ok(buf.len())
}

/// Writes `data` base64-encoded as a single terminated line.
pub async fn write_binary<W>(writer: &mut W, data: &[u8]) -> std::io::Result<usize>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::with_capacity(data.len().div_ceil(3) * 4 + 2);
    encode_binary(&mut buf, data);
    writer.write_all(&buf).await?;
    Ok(buf.len())
}

/// Writes a full response (status line and payload) and flushes.
///
/// Returns the number of bytes written.
pub async fn write_response<W>(writer: &mut W, response: &Response) -> std::io::Result<usize>
where
    W: AsyncWrite + Unpin,
{
    let mut written = write_line(writer, &response.status_code().status_line()).await?;
    match response.payload() {
        Payload::Empty => {}
        Payload::Line(text) => written += write_line(writer, text).await?,
        Payload::Lines(lines) => {
            for line in lines {
                written += write_line(writer, line).await?;
            }
            written += write_line(writer, "").await?;
        }
        Payload::Binary(data) => written += write_binary(writer, data).await?,
    }
    writer.flush().await?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tokio_test::io::Builder;

    #[test]
    fn test_find_line_end() {
        assert_eq!(find_line_end(b"QUIT\r\n"), LineEnd::Complete(4));
        assert_eq!(find_line_end(b"\r\n"), LineEnd::Complete(0));
        assert_eq!(find_line_end(b"QUIT\r"), LineEnd::Incomplete);
        assert_eq!(find_line_end(b"QU\nIT\r\n"), LineEnd::BareLineFeed);
        assert_eq!(find_line_end(b"\n"), LineEnd::BareLineFeed);
    }

    #[tokio::test]
    async fn test_read_single_line() {
        let mock = Builder::new().read(b"LIST_FILES\r\n").build();
        let mut reader = LineReader::new(mock);

        assert_eq!(reader.read_line().await.unwrap(), "LIST_FILES");
        assert_eq!(reader.buffered(), 0);
    }

    #[tokio::test]
    async fn test_read_line_across_reads() {
        let mock = Builder::new()
            .read(b"FILE_")
            .read(b"INFO a.txt\r")
            .read(b"\n")
            .build();
        let mut reader = LineReader::new(mock);

        assert_eq!(reader.read_line().await.unwrap(), "FILE_INFO a.txt");
        assert_eq!(reader.bytes_read(), 17);
    }

    #[tokio::test]
    async fn test_read_pipelined_lines() {
        let mock = Builder::new().read(b"LIST_FILES\r\nQUIT\r\n").build();
        let mut reader = LineReader::new(mock);

        assert_eq!(reader.read_line().await.unwrap(), "LIST_FILES");
        assert_eq!(reader.buffered(), 6);
        assert_eq!(reader.read_line().await.unwrap(), "QUIT");
    }

    #[tokio::test]
    async fn test_read_line_trims_whitespace() {
        let mock = Builder::new().read(b"  QUIT \t\r\n").build();
        let mut reader = LineReader::new(mock);

        assert_eq!(reader.read_line().await.unwrap(), "QUIT");
    }

    #[tokio::test]
    async fn test_bare_line_feed() {
        let mock = Builder::new().read(b"LIST_FILES\nQUIT\r\n").build();
        let mut reader = LineReader::new(mock);

        let err = reader.read_line().await.unwrap_err();
        assert!(matches!(err, FrameError::BareLineFeed));
        assert_eq!(err.status(), StatusCode::BadEol);
    }

    #[tokio::test]
    async fn test_eof_mid_line() {
        let mock = Builder::new().read(b"LIST_FILES").build();
        let mut reader = LineReader::new(mock);

        let err = reader.read_line().await.unwrap_err();
        assert!(matches!(err, FrameError::UnexpectedEof));
        assert!(err.status().is_fatal());
    }

    #[tokio::test]
    async fn test_eof_between_lines() {
        let mock = Builder::new().read(b"QUIT\r\n").build();
        let mut reader = LineReader::new(mock);

        assert_eq!(reader.read_line().await.unwrap(), "QUIT");
        let err = reader.read_line().await.unwrap_err();
        assert!(matches!(err, FrameError::Closed));
        assert_eq!(err.status(), StatusCode::BadRequest);
    }

    #[tokio::test]
    async fn test_invalid_utf8() {
        let mock = Builder::new().read(b"FILE_INFO \xff\xfe\r\n").build();
        let mut reader = LineReader::new(mock);

        let err = reader.read_line().await.unwrap_err();
        assert!(matches!(err, FrameError::InvalidUtf8));
    }

    #[tokio::test]
    async fn test_line_too_long() {
        let long = vec![b'A'; MAX_LINE_LENGTH + 2];
        let mock = Builder::new().read(&long).build();
        let mut reader = LineReader::new(mock);

        let err = reader.read_line().await.unwrap_err();
        assert!(matches!(err, FrameError::LineTooLong { .. }));
    }

    #[tokio::test]
    async fn test_terminated_line_too_long() {
        let mut tail = vec![b'A'; 1000];
        tail.extend_from_slice(b"\r\n");
        let mock = Builder::new()
            .read(&vec![b'A'; 4000])
            .read(&tail)
            .build();
        let mut reader = LineReader::new(mock);

        let err = reader.read_line().await.unwrap_err();
        assert!(matches!(err, FrameError::LineTooLong { .. }));
        assert_eq!(err.status(), StatusCode::BadRequest);
    }

    #[tokio::test]
    async fn test_line_at_max_length() {
        let mut line = vec![b'A'; MAX_LINE_LENGTH];
        line.extend_from_slice(b"\r\n");
        let mock = Builder::new().read(&line).build();
        let mut reader = LineReader::new(mock);

        assert_eq!(reader.read_line().await.unwrap().len(), MAX_LINE_LENGTH);
    }

    #[tokio::test]
    async fn test_write_line() {
        let mut out = Vec::new();
        let n = write_line(&mut out, "0 OK").await.unwrap();
        assert_eq!(out, b"0 OK\r\n");
        assert_eq!(n, 6);
    }

    #[tokio::test]
    async fn test_write_binary() {
        let mut out = Vec::new();
        write_binary(&mut out, b"hello").await.unwrap();
        assert_eq!(out, b"aGVsbG8=\r\n");
    }

    #[tokio::test]
    async fn test_write_response_matches_serialize() {
        let responses = [
            Response::status(StatusCode::InvalidArguments),
            Response::line("5"),
            Response::lines(vec!["a.txt".into(), "b.bin".into()]),
            Response::binary(Bytes::from_static(b"\x00\x01binary\r\n")),
        ];

        for response in responses {
            let mut out = Vec::new();
            let n = write_response(&mut out, &response).await.unwrap();
            assert_eq!(out, response.serialize());
            assert_eq!(n, out.len());
        }
    }
}
