//! Request Line Parser
//!
//! Turns one framed request line into a typed [`Command`].
//!
//! ## Grammar
//!
//! ```text
//! request  = name *( SP argument )
//! name     = "LIST_FILES" / "FILE_INFO" / "SLICE_FILE" / "QUIT"
//! ```
//!
//! | Command      | Arguments                 |
//! |--------------|---------------------------|
//! | `LIST_FILES` | none                      |
//! | `FILE_INFO`  | `filename`                |
//! | `SLICE_FILE` | `filename offset size`    |
//! | `QUIT`       | none                      |
//!
//! Names are case-sensitive. The parser checks the argument count and that
//! numeric arguments are integers; filename rules and range checks belong
//! to the command handlers, which run before any filesystem access.

use crate::protocol::types::StatusCode;
use std::fmt;
use thiserror::Error;

pub const LIST_FILES: &str = "LIST_FILES";
pub const FILE_INFO: &str = "FILE_INFO";
pub const SLICE_FILE: &str = "SLICE_FILE";
pub const QUIT: &str = "QUIT";

/// Errors that can occur while parsing a request line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The line held no command name at all
    #[error("empty request line")]
    EmptyRequest,

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("wrong number of arguments for '{command}': expected {expected}, got {got}")]
    WrongArity {
        command: &'static str,
        expected: usize,
        got: usize,
    },

    /// An offset or size that is not an integer
    #[error("invalid integer argument '{0}'")]
    InvalidInteger(String),
}

impl ParseError {
    /// The status reported to the client for this parse failure.
    pub fn status(&self) -> StatusCode {
        match self {
            ParseError::EmptyRequest => StatusCode::BadRequest,
            ParseError::UnknownCommand(_) => StatusCode::InvalidCommand,
            ParseError::WrongArity { .. } | ParseError::InvalidInteger(_) => {
                StatusCode::InvalidArguments
            }
        }
    }
}

/// A parsed client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ListFiles,
    FileInfo {
        filename: String,
    },
    /// Offset and size are kept signed so that negative values can be
    /// told apart from malformed ones.
    SliceFile {
        filename: String,
        offset: i64,
        size: i64,
    },
    Quit,
}

impl Command {
    /// The wire name of this command.
    pub fn name(&self) -> &'static str {
        match self {
            Command::ListFiles => LIST_FILES,
            Command::FileInfo { .. } => FILE_INFO,
            Command::SliceFile { .. } => SLICE_FILE,
            Command::Quit => QUIT,
        }
    }

    pub fn is_quit(&self) -> bool {
        matches!(self, Command::Quit)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::ListFiles | Command::Quit => f.write_str(self.name()),
            Command::FileInfo { filename } => write!(f, "{} {}", FILE_INFO, filename),
            Command::SliceFile {
                filename,
                offset,
                size,
            } => write!(f, "{} {} {} {}", SLICE_FILE, filename, offset, size),
        }
    }
}

/// Parses one request line (already stripped of its EOL marker).
pub fn parse_command(line: &str) -> Result<Command, ParseError> {
    let mut parts = line.split_whitespace();
    let name = parts.next().ok_or(ParseError::EmptyRequest)?;
    let args: Vec<&str> = parts.collect();

    match name {
        LIST_FILES => {
            expect_arity(LIST_FILES, &args, 0)?;
            Ok(Command::ListFiles)
        }
        FILE_INFO => {
            expect_arity(FILE_INFO, &args, 1)?;
            Ok(Command::FileInfo {
                filename: args[0].to_string(),
            })
        }
        SLICE_FILE => {
            expect_arity(SLICE_FILE, &args, 3)?;
            Ok(Command::SliceFile {
                filename: args[0].to_string(),
                offset: parse_integer(args[1])?,
                size: parse_integer(args[2])?,
            })
        }
        QUIT => {
            expect_arity(QUIT, &args, 0)?;
            Ok(Command::Quit)
        }
        other => Err(ParseError::UnknownCommand(other.to_string())),
    }
}

fn expect_arity(command: &'static str, args: &[&str], expected: usize) -> Result<(), ParseError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(ParseError::WrongArity {
            command,
            expected,
            got: args.len(),
        })
    }
}

fn parse_integer(s: &str) -> Result<i64, ParseError> {
    s.parse()
        .map_err(|_| ParseError::InvalidInteger(s.to_string()))
}
