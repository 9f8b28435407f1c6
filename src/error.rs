//! Typed errors for the dialer subsystems.
//!
//! - `TransportError`: a single call placement failed; recovered per number
//! - `ConfigError`: the dialer cannot be constructed; fatal before dialing
//! - `StorageError`: the number list, DNC list or event log is unavailable

use std::path::PathBuf;
use thiserror::Error;

/// Failure placing one outbound call.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("telephony request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("telephony provider rejected credentials (HTTP {status})")]
    Unauthorized { status: u16 },

    #[error("telephony provider rejected the call (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("{0}")]
    Unsupported(&'static str),
}

/// Invalid or incomplete configuration detected at construction time.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("run controller must be constructed inside a Tokio runtime")]
    NoRuntime,
}

/// Failure reading or writing persisted campaign data.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("event log error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("event payload could not be encoded: {0}")]
    Payload(#[source] serde_json::Error),

    #[error("storage lock poisoned")]
    LockPoisoned,
}
