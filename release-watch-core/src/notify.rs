//! Notification rendering and dispatch.
//!
//! [`render`] is a pure function of the configuration, the group date and the
//! aggregated records. [`dispatch`] fetches the attachments it asks for and
//! hands the finished [`Notification`] to a [`Notifier`].

use chrono::SecondsFormat;
use std::path::Path;
use tracing::{info, warn};

use crate::config::NotifyConfig;
use crate::contract::{Attachment, Notification, Notifier, ReleaseRecord, RemoteSource};
use crate::error::WatchError;

pub const CHANGES_LABEL: &str = "Change information";
pub const WEB_CLIENT_LABEL: &str = "Web client";
pub const CROSS_PLATFORM_LABEL: &str = "Cross-platform build for win, mac, debian (requires .NET)";
pub const SERVICES_LABEL: &str = "Services";
pub const NOT_APPLICABLE_LABEL: &str = "Not applicable";
/// Rendered for records without a `When` timestamp (the zero time).
pub const MISSING_TIMESTAMP: &str = "0001-01-01T00:00:00Z";

/// Human description of an archive. First match wins, in this order.
pub fn describe(zip_file_name: &str) -> &'static str {
    if zip_file_name.contains("info") {
        CHANGES_LABEL
    } else if zip_file_name.contains("web") {
        WEB_CLIENT_LABEL
    } else if zip_file_name.contains("any-cpu") {
        CROSS_PLATFORM_LABEL
    } else {
        SERVICES_LABEL
    }
}

pub fn platform_label(platform: &str) -> &str {
    match platform {
        "none" => NOT_APPLICABLE_LABEL,
        other => other,
    }
}

/// Records whose target file gets attached to the notification.
pub fn wants_attachment(record: &ReleaseRecord) -> bool {
    record.target_file.contains("info")
}

/// Subject, body and remote paths to attach, before any network access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedNotice {
    pub subject: String,
    pub body: String,
    pub attachment_paths: Vec<String>,
}

pub fn render(config: &NotifyConfig, date: &str, records: &[ReleaseRecord]) -> RenderedNotice {
    let mut body = format!("{} for {}\n", config.text, date);
    let mut last_counter = 0;
    let mut attachment_paths = Vec::new();

    for (i, record) in records.iter().enumerate() {
        let when = record
            .when
            .map(|w| w.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_else(|| MISSING_TIMESTAMP.to_owned());

        body.push_str(&format!(
            concat!(
                "  File {}:\n",
                "  Description: {}\n",
                "  Folder: {}\n",
                "  File: {}\n",
                "  Archive: {}\n",
                "  Platform: {}\n",
                "  Version: {}\n",
                "  Date: {}\n",
                "  Build: {}\n",
                "\n",
            ),
            i + 1,
            describe(&record.zip_file_name),
            record.target_folder,
            record.target_file,
            record.zip_file_name,
            platform_label(&record.platform),
            record.version,
            when,
            record.teamcity_build_counter,
        ));
        last_counter = record.teamcity_build_counter;

        if wants_attachment(record) {
            body.push_str(&format!("Attached change log: {}\n", record.target_file));
            attachment_paths.push(record.target_file.clone());
        }
    }

    RenderedNotice {
        subject: format!("{} - {} {}", config.subject, last_counter, date),
        body,
        attachment_paths,
    }
}

fn attachment_name(remote_path: &str) -> String {
    Path::new(remote_path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| remote_path.to_owned())
}

/// Render, fetch attachments and send one notification for a group.
///
/// A failed attachment download is logged and skipped. A failed send is
/// returned so the caller keeps the group out of the ledger.
pub async fn dispatch<S, N>(
    source: &S,
    notifier: &N,
    config: &NotifyConfig,
    date: &str,
    records: &[ReleaseRecord],
) -> Result<(), WatchError>
where
    S: RemoteSource + ?Sized,
    N: Notifier + ?Sized,
{
    let notice = render(config, date, records);

    let mut attachments = Vec::with_capacity(notice.attachment_paths.len());
    for path in &notice.attachment_paths {
        match source.retrieve(path).await {
            Ok(content) => attachments.push(Attachment {
                filename: attachment_name(path),
                content,
            }),
            Err(e) => {
                warn!(file = %path, date = %date, error = %e, "[NOTIFY] Failed to download attachment, skipping it");
            }
        }
    }

    let notification = Notification {
        from: config.from.clone(),
        to: config.to.clone(),
        subject: notice.subject,
        body: notice.body,
        attachments,
    };
    let attached = notification.attachments.len();

    notifier.send(notification).await?;
    info!(date = %date, records = records.len(), attached, "[NOTIFY] Notification sent");
    Ok(())
}
