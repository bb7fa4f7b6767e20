//! # contract: data types and collaborator traits of the pipeline
//!
//! The pipeline never talks to a file server or a mail server directly. It
//! consumes two narrow traits:
//!
//! - [`RemoteSource`] lists a remote directory and retrieves single files.
//! - [`Notifier`] delivers one rendered [`Notification`].
//!
//! Both are annotated for `mockall`, so tests (and downstream crates with the
//! `test-export-mocks` feature) get `MockRemoteSource` and `MockNotifier`.
//!
//! The binary crate provides the FTP and SMTP implementations.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::error::{RemoteError, SendError};

/// Date format of group keys and ledger lines.
pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// One file as reported by a remote listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    /// Modification time exactly as reported by the source; no timezone conversion.
    pub modified: NaiveDateTime,
}

impl RemoteEntry {
    pub fn new(name: impl Into<String>, modified: NaiveDateTime) -> Self {
        Self {
            name: name.into(),
            modified,
        }
    }

    /// Calendar day of the modification time, `YYYY-MM-DD`.
    pub fn day(&self) -> String {
        self.modified.format(DAY_FORMAT).to_string()
    }

    /// The `name|YYYY-MM-DD` identity recorded in the sent-ledger.
    pub fn ledger_line(&self) -> String {
        format!("{}|{}", self.name, self.day())
    }
}

/// One build artifact described by a release manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ReleaseRecord {
    pub target_folder: String,
    pub target_file: String,
    pub zip_file_name: String,
    pub hash: String,
    pub platform: String,
    pub major: i64,
    pub minor: i64,
    pub patch: i64,
    pub build: i64,
    pub teamcity_build_counter: i64,
    pub tag: String,
    pub sha: String,
    pub short_sha: String,
    pub branch_name: String,
    pub when: Option<DateTime<FixedOffset>>,
    pub version: String,
    pub full_version: String,
}

/// A file attached to a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content: Vec<u8>,
}

/// A fully rendered notification, ready for a [`Notifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
}

/// Lists and retrieves files on the remote endpoint.
///
/// Implementations open a fresh connection per call; a failing call must not
/// affect later ones.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// List the entries of `directory`.
    async fn list(&self, directory: &str) -> Result<Vec<RemoteEntry>, RemoteError>;

    /// Retrieve the raw bytes of `remote_name`, relative to the configured directory.
    async fn retrieve(&self, remote_name: &str) -> Result<Vec<u8>, RemoteError>;
}

/// Delivers notifications (mail, chat, ...).
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<(), SendError>;
}
