#![doc = "FTP implementation of the core `RemoteSource` trait."]
//
//! # FTP source
//!
//! [`FtpSource`] opens a new control connection for every call: connect,
//! log in, change into the configured directory, do one listing or `RETR`,
//! quit. Listing prefers `MLSD` and falls back to `LIST` when the server
//! rejects it. Listing connects with a short timeout, retrieval with a longer
//! one.
//!
//! `suppaftp` is blocking, so each call runs on tokio's blocking pool and is
//! awaited right away; the pipeline stays strictly sequential.

use async_trait::async_trait;
use chrono::{DateTime, Months, NaiveDateTime, Utc};
use release_watch_core::config::RemoteConfig;
use release_watch_core::contract::{RemoteEntry, RemoteSource};
use release_watch_core::error::RemoteError;
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;
use std::time::Duration;
use suppaftp::list::File;
use suppaftp::FtpStream;

const LIST_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const RETRIEVE_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct FtpSource {
    config: RemoteConfig,
}

impl FtpSource {
    pub fn new(config: RemoteConfig) -> Self {
        Self { config }
    }
}

fn address(config: &RemoteConfig) -> String {
    format!("{}:{}", config.server, config.port)
}

fn resolve(config: &RemoteConfig) -> Result<SocketAddr, RemoteError> {
    let server = address(config);
    let connection_err = |reason: String| RemoteError::Connection {
        server: server.clone(),
        reason,
    };
    server
        .to_socket_addrs()
        .map_err(|e| connection_err(e.to_string()))?
        .next()
        .ok_or_else(|| connection_err("no address found".into()))
}

/// Connect, log in and enter `dir`.
fn open(config: &RemoteConfig, dir: &str, timeout: Duration) -> Result<FtpStream, RemoteError> {
    let socket = resolve(config)?;
    let mut ftp = FtpStream::connect_timeout(socket, timeout).map_err(|e| {
        RemoteError::Connection {
            server: address(config),
            reason: e.to_string(),
        }
    })?;
    ftp.login(&config.user, &config.password)
        .map_err(|e| RemoteError::Auth {
            user: config.user.clone(),
            reason: e.to_string(),
        })?;
    ftp.cwd(dir).map_err(|e| RemoteError::Directory {
        dir: dir.to_owned(),
        reason: e.to_string(),
    })?;
    Ok(ftp)
}

fn close(mut ftp: FtpStream) {
    if let Err(e) = ftp.quit() {
        tracing::debug!(error = %e, "FTP QUIT failed");
    }
}

/// Which command produced a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListingFormat {
    /// `MLSD`: machine-readable facts with exact UTC timestamps.
    Mlsd,
    /// `LIST`: human-readable lines; recent files carry no year.
    List,
}

/// A `LIST` line without a year gets the current year, which puts files from
/// late last year into the future. Move those back by one year.
fn roll_back_future(modified: NaiveDateTime, now: NaiveDateTime) -> NaiveDateTime {
    if modified <= now {
        return modified;
    }
    modified.checked_sub_months(Months::new(12)).unwrap_or(modified)
}

/// Turn listing output into entries, skipping directories and lines we cannot parse.
fn parse_listing(lines: &[String], format: ListingFormat, now: NaiveDateTime) -> Vec<RemoteEntry> {
    let mut entries = Vec::with_capacity(lines.len());
    for line in lines {
        let parsed = match format {
            ListingFormat::Mlsd => File::from_mlsx_line(line),
            ListingFormat::List => File::from_str(line),
        };
        match parsed {
            Ok(file) if file.is_directory() || matches!(file.name(), "." | "..") => {}
            Ok(file) => {
                let mut modified = DateTime::<Utc>::from(file.modified()).naive_utc();
                if format == ListingFormat::List {
                    modified = roll_back_future(modified, now);
                }
                entries.push(RemoteEntry::new(file.name(), modified));
            }
            Err(e) => {
                tracing::warn!(line = %line, error = ?e, "Skipping unparsable listing line");
            }
        }
    }
    entries
}

fn list_blocking(config: &RemoteConfig, dir: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
    let mut ftp = open(config, dir, LIST_CONNECT_TIMEOUT)?;
    let lines = match ftp.mlsd(None) {
        Ok(lines) => Ok((lines, ListingFormat::Mlsd)),
        Err(e) => {
            tracing::debug!(error = %e, "MLSD not available, falling back to LIST");
            ftp.list(None)
                .map(|lines| (lines, ListingFormat::List))
                .map_err(|e| RemoteError::List(e.to_string()))
        }
    };
    close(ftp);
    let (lines, format) = lines?;
    Ok(parse_listing(&lines, format, Utc::now().naive_utc()))
}

fn retrieve_blocking(config: &RemoteConfig, name: &str) -> Result<Vec<u8>, RemoteError> {
    let mut ftp = open(config, &config.dir, RETRIEVE_CONNECT_TIMEOUT)?;
    let content = ftp
        .retr_as_buffer(name)
        .map(|cursor| cursor.into_inner())
        .map_err(|e| RemoteError::Retrieve {
            name: name.to_owned(),
            reason: e.to_string(),
        });
    close(ftp);
    content
}

fn join_error(config: &RemoteConfig, e: tokio::task::JoinError) -> RemoteError {
    RemoteError::Connection {
        server: address(config),
        reason: format!("FTP task failed: {e}"),
    }
}

#[async_trait]
impl RemoteSource for FtpSource {
    async fn list(&self, directory: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
        tracing::debug!(server = %address(&self.config), dir = directory, "Listing FTP directory");
        let config = self.config.clone();
        let dir = directory.to_owned();
        tokio::task::spawn_blocking(move || list_blocking(&config, &dir))
            .await
            .map_err(|e| join_error(&self.config, e))?
    }

    async fn retrieve(&self, remote_name: &str) -> Result<Vec<u8>, RemoteError> {
        tracing::debug!(server = %address(&self.config), file = remote_name, "Retrieving FTP file");
        let config = self.config.clone();
        let name = remote_name.to_owned();
        tokio::task::spawn_blocking(move || retrieve_blocking(&config, &name))
            .await
            .map_err(|e| join_error(&self.config, e))?
    }
}
