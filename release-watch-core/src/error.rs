//! Error types shared by the pipeline stages.
//!
//! Remote access failures are reported as [`RemoteError`]; everything the
//! cycle can run into while handling candidates is a [`WatchError`]. None of
//! these are fatal to the process: the cycle logs them and moves on to the
//! next group or the next poll.

use std::path::PathBuf;

/// Failure while talking to the remote file source.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("failed to connect to {server}: {reason}")]
    Connection { server: String, reason: String },

    #[error("failed to log in as {user}: {reason}")]
    Auth { user: String, reason: String },

    #[error("failed to change directory to {dir}: {reason}")]
    Directory { dir: String, reason: String },

    #[error("failed to list files: {0}")]
    List(String),

    #[error("failed to retrieve {name}: {reason}")]
    Retrieve { name: String, reason: String },
}

/// Failure reported by a [`crate::contract::Notifier`].
#[derive(Debug, Clone, thiserror::Error)]
#[error("failed to send notification: {0}")]
pub struct SendError(pub String);

/// Failure raised by a polling cycle or one of its groups.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// Listing the remote directory failed; aborts the whole cycle.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Retrieving one manifest of a group failed; aborts that group.
    #[error("failed to download file {file}: {source}")]
    Fetch {
        file: String,
        #[source]
        source: RemoteError,
    },

    #[error("failed to parse JSON from file {file}: {source}")]
    Parse {
        file: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Send(#[from] SendError),

    #[error("sent-ledger {path:?}: {source}")]
    LedgerIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid file pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Rejected configuration values.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("remote.period must be at least one minute")]
    ZeroPeriod,

    #[error("remote.pattern must not be empty")]
    EmptyPattern,

    #[error("notify.to must list at least one recipient")]
    NoRecipients,

    #[error(transparent)]
    Pattern(#[from] WatchError),
}
