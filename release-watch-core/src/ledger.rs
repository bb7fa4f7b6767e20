//! Sent-ledger: the flat `name|YYYY-MM-DD` file recording every manifest that
//! has already been part of a delivered notification.
//!
//! The file is only ever appended to. Membership is an exact match of the
//! entry's [`RemoteEntry::ledger_line`] against a stored line. Lines that do
//! not have the `name|YYYY-MM-DD` shape are left untouched and never match.

use chrono::NaiveDate;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::contract::{RemoteEntry, DAY_FORMAT};
use crate::error::WatchError;

/// Handle on the ledger file. Holds no state besides the path.
#[derive(Debug, Clone)]
pub struct SentLedger {
    path: PathBuf,
}

/// In-memory view of the ledger taken at the start of a cycle.
#[derive(Debug, Clone, Default)]
pub struct LedgerSnapshot {
    lines: HashSet<String>,
    malformed: usize,
}

impl LedgerSnapshot {
    pub fn contains(&self, entry: &RemoteEntry) -> bool {
        self.lines.contains(&entry.ledger_line())
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of lines skipped because they did not parse as `name|YYYY-MM-DD`.
    pub fn malformed(&self) -> usize {
        self.malformed
    }

    fn parse(content: &str) -> Self {
        let mut snapshot = LedgerSnapshot::default();
        for line in content.lines() {
            if is_well_formed(line) {
                snapshot.lines.insert(line.to_owned());
            } else if !line.is_empty() {
                snapshot.malformed += 1;
            }
        }
        snapshot
    }
}

fn is_well_formed(line: &str) -> bool {
    match line.rsplit_once('|') {
        Some((name, day)) => {
            !name.is_empty() && NaiveDate::parse_from_str(day, DAY_FORMAT).is_ok()
        }
        None => false,
    }
}

impl SentLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole ledger. A missing file is an empty ledger.
    pub fn load(&self) -> Result<LedgerSnapshot, WatchError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "[LEDGER] No ledger file yet, starting empty");
                return Ok(LedgerSnapshot::default());
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "[LEDGER] Failed to read sent-ledger");
                return Err(WatchError::LedgerIo {
                    path: self.path.clone(),
                    source: e,
                });
            }
        };

        let snapshot = LedgerSnapshot::parse(&content);
        if snapshot.malformed() > 0 {
            warn!(
                path = %self.path.display(),
                malformed = snapshot.malformed(),
                "[LEDGER] Ignoring malformed ledger lines"
            );
        }
        debug!(path = %self.path.display(), entries = snapshot.len(), "[LEDGER] Loaded sent-ledger");
        Ok(snapshot)
    }

    /// Append one line per entry, creating the file if needed.
    ///
    /// Stops at the first failed write; lines written before it stay recorded.
    /// Returns the number of lines written.
    pub fn commit(&self, entries: &[RemoteEntry]) -> Result<usize, WatchError> {
        let io_err = |source: std::io::Error| WatchError::LedgerIo {
            path: self.path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                error!(path = %self.path.display(), error = %e, "[LEDGER] Failed to open sent-ledger");
                io_err(e)
            })?;

        let written = self.append_lines(&mut file, entries)?;
        file.flush().map_err(io_err)?;

        info!(path = %self.path.display(), written, "[LEDGER] Marked files as sent");
        Ok(written)
    }

    fn append_lines(&self, out: &mut impl Write, entries: &[RemoteEntry]) -> Result<usize, WatchError> {
        let mut written = 0;
        for entry in entries {
            let line = format!("{}\n", entry.ledger_line());
            if let Err(e) = out.write_all(line.as_bytes()) {
                error!(
                    path = %self.path.display(),
                    file = %entry.name,
                    written,
                    error = %e,
                    "[LEDGER] Failed to write to sent-ledger"
                );
                return Err(WatchError::LedgerIo {
                    path: self.path.clone(),
                    source: e,
                });
            }
            written += 1;
        }
        Ok(written)
    }
}
