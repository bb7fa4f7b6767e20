//! Manifest aggregation: fetch every manifest of a group and concatenate the
//! release records they describe.

use tracing::{debug, error};

use crate::contract::{ReleaseRecord, RemoteEntry, RemoteSource};
use crate::error::WatchError;

/// Parse one manifest: a JSON array of release records.
pub fn parse_manifest(file: &str, content: &[u8]) -> Result<Vec<ReleaseRecord>, WatchError> {
    serde_json::from_slice(content).map_err(|source| WatchError::Parse {
        file: file.to_owned(),
        source,
    })
}

/// Collect the records of every file in `entries`, file order then record order.
///
/// The first failing file aborts the group; nothing partial is returned.
pub async fn aggregate_group<S>(
    source: &S,
    entries: &[RemoteEntry],
) -> Result<Vec<ReleaseRecord>, WatchError>
where
    S: RemoteSource + ?Sized,
{
    let mut records = Vec::new();

    for entry in entries {
        let content = source.retrieve(&entry.name).await.map_err(|e| {
            error!(file = %entry.name, error = %e, "[AGGREGATE] Failed to download manifest");
            WatchError::Fetch {
                file: entry.name.clone(),
                source: e,
            }
        })?;

        let parsed = parse_manifest(&entry.name, &content).map_err(|e| {
            error!(file = %entry.name, error = %e, "[AGGREGATE] Failed to parse manifest");
            e
        })?;
        debug!(file = %entry.name, records = parsed.len(), "[AGGREGATE] Parsed manifest");
        records.extend(parsed);
    }

    Ok(records)
}
