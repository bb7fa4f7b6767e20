//! One polling cycle: select → group → (per group) aggregate → dispatch → commit.
//!
//! # Failure policy
//! - Reading the ledger or listing the remote directory fails the whole cycle.
//! - Download and parse failures skip their group only.
//! - A failed send skips the ledger commit, so the group's files are selected
//!   again next cycle.
//! - A failed ledger write is logged and reported; lines already written stay.
//!
//! Groups are handled one after another in ascending date order.

use tracing::{error, info};

use crate::aggregate::aggregate_group;
use crate::config::WatchConfig;
use crate::contract::{Notifier, RemoteSource};
use crate::error::WatchError;
use crate::group::group_by_date;
use crate::ledger::SentLedger;
use crate::notify::dispatch;
use crate::select::select_candidates;

#[derive(Debug)]
pub struct CycleReport {
    pub candidates: usize,
    pub groups: Vec<GroupReport>,
}

#[derive(Debug)]
pub struct GroupReport {
    pub date: String,
    pub files: Vec<String>,
    pub outcome: GroupOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupOutcome {
    /// Notification delivered and every file recorded in the ledger.
    Sent { records: usize, ledger_lines: usize },
    /// Notification delivered but recording it in the ledger failed.
    LedgerFailed { records: usize, reason: String },
    AggregationFailed(String),
    SendFailed(String),
}

impl CycleReport {
    pub fn sent(&self) -> usize {
        self.groups
            .iter()
            .filter(|g| {
                matches!(
                    g.outcome,
                    GroupOutcome::Sent { .. } | GroupOutcome::LedgerFailed { .. }
                )
            })
            .count()
    }
}

pub async fn run_cycle<S, N>(
    config: &WatchConfig,
    source: &S,
    notifier: &N,
    ledger: &SentLedger,
) -> Result<CycleReport, WatchError>
where
    S: RemoteSource + ?Sized,
    N: Notifier + ?Sized,
{
    let snapshot = ledger.load()?;
    let candidates = select_candidates(source, &config.remote, &snapshot).await?;

    let mut report = CycleReport {
        candidates: candidates.len(),
        groups: Vec::new(),
    };
    if candidates.is_empty() {
        info!("[CYCLE] No new files to send");
        return Ok(report);
    }

    for (date, entries) in group_by_date(candidates) {
        let files: Vec<String> = entries.iter().map(|e| e.name.clone()).collect();

        let records = match aggregate_group(source, &entries).await {
            Ok(records) => records,
            Err(e) => {
                error!(date = %date, error = %e, "[CYCLE] Error processing JSON files for date");
                report.groups.push(GroupReport {
                    date,
                    files,
                    outcome: GroupOutcome::AggregationFailed(e.to_string()),
                });
                continue;
            }
        };

        if let Err(e) = dispatch(source, notifier, &config.notify, &date, &records).await {
            error!(date = %date, error = %e, "[CYCLE] Error sending notification for date");
            report.groups.push(GroupReport {
                date,
                files,
                outcome: GroupOutcome::SendFailed(e.to_string()),
            });
            continue;
        }
        info!(date = %date, "[CYCLE] Notification for date sent successfully");

        let outcome = match ledger.commit(&entries) {
            Ok(ledger_lines) => GroupOutcome::Sent {
                records: records.len(),
                ledger_lines,
            },
            Err(e) => {
                error!(date = %date, error = %e, "[CYCLE] Failed to record sent files");
                GroupOutcome::LedgerFailed {
                    records: records.len(),
                    reason: e.to_string(),
                }
            }
        };
        report.groups.push(GroupReport {
            date,
            files,
            outcome,
        });
    }

    Ok(report)
}
