//! CLI error types.

use std::path::PathBuf;
use thiserror::Error;

/// CLI errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The database file does not exist.
    ///
    /// This typically means the service has never run.
    #[error("database not found at {path}. Run 'rideclaim run' first")]
    DatabaseNotFound { path: PathBuf },

    /// No data directory could be determined for this platform.
    #[error("no data directory available; set `store` in the config file")]
    NoDataDir,

    /// Configuration is invalid or missing required fields.
    #[error("config error: {0}")]
    Config(String),

    /// An input line could not be understood.
    #[error("line {line}: {source}")]
    Input {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// An error occurred in the claim engine.
    #[error(transparent)]
    Claims(#[from] claims::ClaimError),

    /// An error occurred in the storage layer.
    #[error(transparent)]
    Storage(#[from] storage::Error),

    /// An error occurred in the policy layer.
    #[error(transparent)]
    Policy(#[from] policy::Error),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
