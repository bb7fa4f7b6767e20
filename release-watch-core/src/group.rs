use std::collections::BTreeMap;
use tracing::debug;

use crate::contract::RemoteEntry;

/// Partition entries by modification day (`YYYY-MM-DD`).
///
/// Keys iterate in ascending date order; entries keep their listing order
/// inside a group.
pub fn group_by_date(entries: Vec<RemoteEntry>) -> BTreeMap<String, Vec<RemoteEntry>> {
    let mut groups: BTreeMap<String, Vec<RemoteEntry>> = BTreeMap::new();
    for entry in entries {
        let day = entry.day();
        debug!(file = %entry.name, date = %day, "[GROUP] Grouping file by date");
        groups.entry(day).or_default().push(entry);
    }
    groups
}
