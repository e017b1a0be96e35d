//! Error types for isoforge.

use std::io;
use thiserror::Error;

/// Result type for isoforge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for isoforge operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The stream ended in the middle of a box or field.
    #[error("Truncated input while reading {0}")]
    Truncated(&'static str),

    /// A box header declares an impossible size.
    #[error("Invalid size {size} for box '{box_type}'")]
    InvalidSize { box_type: String, size: u64 },

    /// A full box carries a version this parser does not implement.
    #[error("Unsupported version {version} in box '{box_type}'")]
    UnsupportedVersion { box_type: String, version: u8 },

    /// A sample table disagrees with its declared counts, or a sample
    /// query fell outside the table's coverage.
    #[error("Malformed sample table: {0}")]
    MalformedTable(String),

    /// A required box was not found under the track.
    #[error("Missing required box: {0}")]
    MissingBox(&'static str),

    /// The tree holds a by-reference box whose body was never loaded, and
    /// no source stream is available to copy it back out.
    #[error("Cannot serialize '{0}' without the source stream")]
    Unserializable(String),
}

impl Error {
    /// Create a malformed-table error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedTable(msg.into())
    }
}
