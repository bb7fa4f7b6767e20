//! Candidate selection: list the remote directory and keep the entries that
//! match the file mask and are not yet in the sent-ledger.

use regex::Regex;
use tracing::{debug, info};

use crate::config::RemoteConfig;
use crate::contract::{RemoteEntry, RemoteSource};
use crate::error::WatchError;
use crate::ledger::LedgerSnapshot;

/// File mask where `*` matches any sequence and everything else is literal.
///
/// The whole name must match; matching is case-sensitive.
#[derive(Debug, Clone)]
pub struct NamePattern {
    regex: Regex,
}

impl NamePattern {
    pub fn compile(mask: &str) -> Result<Self, WatchError> {
        let body = mask
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        let regex = Regex::new(&format!("^{body}$")).map_err(|source| {
            WatchError::InvalidPattern {
                pattern: mask.to_owned(),
                source,
            }
        })?;
        Ok(Self { regex })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }
}

/// Return the new candidates of this cycle, in listing order.
///
/// Listing failures abort the cycle; the ledger is never touched here.
pub async fn select_candidates<S>(
    source: &S,
    remote: &RemoteConfig,
    ledger: &LedgerSnapshot,
) -> Result<Vec<RemoteEntry>, WatchError>
where
    S: RemoteSource + ?Sized,
{
    let pattern = NamePattern::compile(&remote.pattern)?;
    let listed = source.list(&remote.dir).await?;
    debug!(dir = %remote.dir, listed = listed.len(), "[SELECT] Listed remote directory");

    let candidates: Vec<RemoteEntry> = listed
        .into_iter()
        .filter(|entry| pattern.matches(&entry.name) && !ledger.contains(entry))
        .inspect(|entry| {
            info!(
                file = %entry.name,
                modified = %entry.modified.and_utc().to_rfc3339(),
                "[SELECT] Found new file"
            );
        })
        .collect();

    Ok(candidates)
}
