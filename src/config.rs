//! Server configuration
//!
//! Everything here is fixed at startup. Options come from the command line
//! through clap; [`Config::default`] gives the same values without parsing,
//! which is what tests use.

use crate::{DEFAULT_DIR, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_WORKERS};
use clap::Parser;
use std::path::PathBuf;
use thiserror::Error;

/// Errors found while validating a configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("listen address cannot be empty")]
    EmptyAddress,

    #[error("worker pool needs at least one worker")]
    NoWorkers,
}

/// Command-line configuration for the server.
#[derive(Debug, Clone, Parser)]
#[command(version, about = "Serve a directory over a line-framed TCP protocol")]
pub struct Config {
    /// Address to listen on
    #[arg(short = 'a', long = "address", default_value = DEFAULT_HOST)]
    pub address: String,

    /// Port to listen on
    #[arg(short = 'p', long = "port", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Directory to serve
    #[arg(short = 'd', long = "datadir", default_value = DEFAULT_DIR)]
    pub datadir: PathBuf,

    /// Maximum number of clients served at the same time
    #[arg(short = 'w', long = "workers", default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Log filter used when RUST_LOG is not set
    #[arg(long = "log-level", default_value = "info")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            datadir: PathBuf::from(DEFAULT_DIR),
            workers: DEFAULT_WORKERS,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.address.trim().is_empty() {
            return Err(ConfigError::EmptyAddress);
        }
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.bind_address(), "127.0.0.1:19500");
        assert_eq!(config.datadir, PathBuf::from("testdata"));
        assert_eq!(config.workers, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_matches_defaults() {
        let parsed = Config::try_parse_from(["hftpd"]).unwrap();
        let default = Config::default();
        assert_eq!(parsed.bind_address(), default.bind_address());
        assert_eq!(parsed.datadir, default.datadir);
        assert_eq!(parsed.workers, default.workers);
        assert_eq!(parsed.log_level, default.log_level);
    }

    #[test]
    fn test_parse_short_flags() {
        let config =
            Config::try_parse_from(["hftpd", "-a", "0.0.0.0", "-p", "2121", "-d", "/srv", "-w", "3"])
                .unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:2121");
        assert_eq!(config.datadir, PathBuf::from("/srv"));
        assert_eq!(config.workers, 3);
    }

    #[test]
    fn test_parse_rejects_bad_port() {
        assert!(Config::try_parse_from(["hftpd", "--port", "70000"]).is_err());
        assert!(Config::try_parse_from(["hftpd", "--port", "abc"]).is_err());
    }

    #[test]
    fn test_validate() {
        let config = Config {
            workers: 0,
            ..Config::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NoWorkers));

        let config = Config {
            address: " ".to_string(),
            ..Config::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptyAddress));
    }
}
