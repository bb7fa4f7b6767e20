use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;

use release_watch_core::config::{NotifyConfig, RemoteConfig, WatchConfig};
use release_watch_core::contract::{MockNotifier, MockRemoteSource, Notification, RemoteEntry};
use release_watch_core::cycle::{run_cycle, GroupOutcome};
use release_watch_core::error::{RemoteError, SendError, WatchError};
use release_watch_core::ledger::SentLedger;
use release_watch_core::watch::{watch, WatchOptions};

fn config() -> WatchConfig {
    WatchConfig {
        remote: RemoteConfig {
            server: "ftp.example.org".into(),
            port: 21,
            user: "builds".into(),
            password: "secret".into(),
            dir: "/releases".into(),
            pattern: "rel_*.json".into(),
            period: 1,
        },
        notify: NotifyConfig {
            host: "smtp.example.org".into(),
            port: 465,
            from: "builds@example.org".into(),
            password: "secret".into(),
            to: vec!["team@example.org".into(), "qa@example.org".into()],
            subject: "Release".into(),
            text: "New builds".into(),
            accept_invalid_certs: true,
        },
    }
}

fn at(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, day)
        .unwrap()
        .and_hms_opt(hour, 15, 0)
        .unwrap()
}

fn manifest(zip: &str, target: &str, counter: i64) -> Vec<u8> {
    format!(
        r#"[{{"TargetFolder":"builds","TargetFile":"{target}","ZipFileName":"{zip}","Platform":"none",
            "TeamcityBuildCounter":{counter},"When":"2024-05-01T10:00:00Z","Version":"5.1.0"}}]"#
    )
    .into_bytes()
}

/// A remote directory with a fixed listing; unknown files fail to retrieve.
fn fake_source(listing: Vec<RemoteEntry>, files: HashMap<&'static str, Vec<u8>>) -> MockRemoteSource {
    let mut source = MockRemoteSource::new();
    source
        .expect_list()
        .returning(move |_dir: &str| Ok(listing.clone()));
    source.expect_retrieve().returning(move |name: &str| {
        files
            .get(name)
            .cloned()
            .ok_or_else(|| RemoteError::Retrieve {
                name: name.to_owned(),
                reason: "550 file not found".into(),
            })
    });
    source
}

fn recording_notifier(sent: Arc<Mutex<Vec<Notification>>>) -> MockNotifier {
    let mut notifier = MockNotifier::new();
    notifier.expect_send().returning(move |n: Notification| {
        sent.lock().unwrap().push(n);
        Ok(())
    });
    notifier
}

fn two_day_listing() -> (Vec<RemoteEntry>, HashMap<&'static str, Vec<u8>>) {
    let listing = vec![
        RemoteEntry::new("rel_2024-05-01.json", at(1, 9)),
        RemoteEntry::new("rel_2024-05-02.json", at(2, 9)),
    ];
    let files = HashMap::from([
        ("rel_2024-05-01.json", manifest("server.zip", "server.zip", 10)),
        ("rel_2024-05-02.json", manifest("web.zip", "web.zip", 11)),
    ]);
    (listing, files)
}

#[tokio::test]
async fn two_days_send_two_notifications_and_commit_both() {
    let tmp = tempdir().unwrap();
    let ledger = SentLedger::new(tmp.path().join("sent_files.log"));
    let (listing, files) = two_day_listing();
    let source = fake_source(listing, files);
    let sent = Arc::new(Mutex::new(Vec::new()));
    let notifier = recording_notifier(sent.clone());

    let report = run_cycle(&config(), &source, &notifier, &ledger)
        .await
        .expect("cycle should succeed");

    assert_eq!(report.candidates, 2);
    assert_eq!(report.sent(), 2);
    for group in &report.groups {
        assert_eq!(
            group.outcome,
            GroupOutcome::Sent {
                records: 1,
                ledger_lines: 1
            }
        );
    }

    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].subject, "Release - 10 2024-05-01");
    assert_eq!(sent[1].subject, "Release - 11 2024-05-02");
    assert_eq!(sent[0].from, "builds@example.org");
    assert_eq!(sent[0].to, vec!["team@example.org", "qa@example.org"]);
    assert!(sent[0].body.starts_with("New builds for 2024-05-01\n"));
    assert!(sent[1].body.contains("  Platform: Not applicable\n"));

    let content = fs::read_to_string(ledger.path()).unwrap();
    assert_eq!(
        content,
        "rel_2024-05-01.json|2024-05-01\nrel_2024-05-02.json|2024-05-02\n"
    );
}

#[tokio::test]
async fn committed_files_are_not_selected_again() {
    let tmp = tempdir().unwrap();
    let ledger = SentLedger::new(tmp.path().join("sent_files.log"));
    let (listing, files) = two_day_listing();

    let sent = Arc::new(Mutex::new(Vec::new()));
    let source = fake_source(listing.clone(), files.clone());
    let notifier = recording_notifier(sent.clone());
    run_cycle(&config(), &source, &notifier, &ledger).await.unwrap();

    // Second cycle with the same remote state: nothing to send.
    let source = fake_source(listing, files);
    let silent = MockNotifier::new();
    let report = run_cycle(&config(), &source, &silent, &ledger).await.unwrap();
    assert_eq!(report.candidates, 0);
    assert!(report.groups.is_empty());
    assert_eq!(sent.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn ledger_match_is_per_day_and_pattern_filters_names() {
    let tmp = tempdir().unwrap();
    let ledger = SentLedger::new(tmp.path().join("sent_files.log"));
    fs::write(ledger.path(), "rel_a.json|2024-05-01\n").unwrap();

    let listing = vec![
        RemoteEntry::new("rel_a.json", at(1, 8)),
        // Same name, re-uploaded on a later day.
        RemoteEntry::new("rel_a.json", at(3, 8)),
        RemoteEntry::new("notes.txt", at(3, 8)),
        RemoteEntry::new("REL_b.json", at(3, 8)),
    ];
    let files = HashMap::from([("rel_a.json", manifest("server.zip", "server.zip", 4))]);
    let source = fake_source(listing, files);
    let sent = Arc::new(Mutex::new(Vec::new()));
    let notifier = recording_notifier(sent.clone());

    let report = run_cycle(&config(), &source, &notifier, &ledger).await.unwrap();
    assert_eq!(report.candidates, 1);
    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].date, "2024-05-03");
    assert_eq!(report.groups[0].files, vec!["rel_a.json"]);

    let content = fs::read_to_string(ledger.path()).unwrap();
    assert_eq!(content, "rel_a.json|2024-05-01\nrel_a.json|2024-05-03\n");
}

#[tokio::test]
async fn failed_send_leaves_ledger_untouched_and_retries_next_cycle() {
    let tmp = tempdir().unwrap();
    let ledger = SentLedger::new(tmp.path().join("sent_files.log"));
    let (listing, files) = two_day_listing();

    let source = fake_source(listing.clone(), files.clone());
    let mut failing = MockNotifier::new();
    failing
        .expect_send()
        .times(2)
        .returning(|_| Err(SendError("421 service not available".into())));

    let report = run_cycle(&config(), &source, &failing, &ledger).await.unwrap();
    assert_eq!(report.sent(), 0);
    assert!(report
        .groups
        .iter()
        .all(|g| matches!(g.outcome, GroupOutcome::SendFailed(_))));
    assert!(!ledger.path().exists());

    let source = fake_source(listing, files);
    let sent = Arc::new(Mutex::new(Vec::new()));
    let notifier = recording_notifier(sent.clone());
    let retry = run_cycle(&config(), &source, &notifier, &ledger).await.unwrap();
    assert_eq!(retry.candidates, 2);
    assert_eq!(retry.sent(), 2);

    let content = fs::read_to_string(ledger.path()).unwrap();
    assert_eq!(content.lines().count(), 2);
}

#[tokio::test]
async fn ledger_write_failure_still_counts_as_sent_and_moves_on() {
    let tmp = tempdir().unwrap();
    // Loads as empty, but the append cannot create the file.
    let ledger = SentLedger::new(tmp.path().join("missing-dir").join("sent_files.log"));
    let (listing, files) = two_day_listing();
    let source = fake_source(listing, files);
    let sent = Arc::new(Mutex::new(Vec::new()));
    let notifier = recording_notifier(sent.clone());

    let report = run_cycle(&config(), &source, &notifier, &ledger)
        .await
        .expect("a ledger write failure does not abort the cycle");

    assert_eq!(report.groups.len(), 2);
    for group in &report.groups {
        match &group.outcome {
            GroupOutcome::LedgerFailed { records, reason } => {
                assert_eq!(*records, 1);
                assert!(reason.contains("sent_files.log"), "reason: {reason}");
            }
            other => panic!("expected ledger failure, got {other:?}"),
        }
    }
    assert_eq!(report.sent(), 2);
    assert_eq!(sent.lock().unwrap().len(), 2);
    assert!(!ledger.path().exists());
}

#[tokio::test]
async fn parse_failure_skips_only_its_group() {
    let tmp = tempdir().unwrap();
    let ledger = SentLedger::new(tmp.path().join("sent_files.log"));
    let listing = vec![
        RemoteEntry::new("rel_1.json", at(1, 9)),
        RemoteEntry::new("rel_1b.json", at(1, 10)),
        RemoteEntry::new("rel_2.json", at(2, 9)),
    ];
    let files = HashMap::from([
        ("rel_1.json", manifest("server.zip", "server.zip", 1)),
        ("rel_1b.json", b"{ not json".to_vec()),
        ("rel_2.json", manifest("server.zip", "server.zip", 2)),
    ]);
    let source = fake_source(listing, files);
    let sent = Arc::new(Mutex::new(Vec::new()));
    let notifier = recording_notifier(sent.clone());

    let report = run_cycle(&config(), &source, &notifier, &ledger).await.unwrap();
    assert_eq!(report.groups.len(), 2);
    match &report.groups[0].outcome {
        GroupOutcome::AggregationFailed(reason) => assert!(reason.contains("rel_1b.json")),
        other => panic!("expected aggregation failure, got {other:?}"),
    }
    assert!(matches!(report.groups[1].outcome, GroupOutcome::Sent { .. }));

    assert_eq!(sent.lock().unwrap().len(), 1);
    let content = fs::read_to_string(ledger.path()).unwrap();
    assert_eq!(content, "rel_2.json|2024-05-02\n");
}

#[tokio::test]
async fn records_of_a_group_are_concatenated_in_file_order() {
    let tmp = tempdir().unwrap();
    let ledger = SentLedger::new(tmp.path().join("sent_files.log"));
    let listing = vec![
        RemoteEntry::new("rel_b.json", at(1, 9)),
        RemoteEntry::new("rel_a.json", at(1, 11)),
    ];
    let files = HashMap::from([
        ("rel_b.json", manifest("first.zip", "first.zip", 30)),
        ("rel_a.json", manifest("second.zip", "second.zip", 7)),
    ]);
    let source = fake_source(listing, files);
    let sent = Arc::new(Mutex::new(Vec::new()));
    let notifier = recording_notifier(sent.clone());

    run_cycle(&config(), &source, &notifier, &ledger).await.unwrap();

    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    let first = sent[0].body.find("first.zip").unwrap();
    let second = sent[0].body.find("second.zip").unwrap();
    assert!(first < second);
    // Last record iterated, not the highest counter.
    assert_eq!(sent[0].subject, "Release - 7 2024-05-01");
}

#[tokio::test]
async fn info_attachment_is_sent_when_available() {
    let tmp = tempdir().unwrap();
    let ledger = SentLedger::new(tmp.path().join("sent_files.log"));
    let listing = vec![RemoteEntry::new("rel_1.json", at(1, 9))];
    let files = HashMap::from([
        ("rel_1.json", manifest("release-info.zip", "notes/build-info.txt", 3)),
        ("notes/build-info.txt", b"fixed things".to_vec()),
    ]);
    let source = fake_source(listing, files);
    let sent = Arc::new(Mutex::new(Vec::new()));
    let notifier = recording_notifier(sent.clone());

    run_cycle(&config(), &source, &notifier, &ledger).await.unwrap();

    let sent = sent.lock().unwrap();
    assert_eq!(sent[0].attachments.len(), 1);
    assert_eq!(sent[0].attachments[0].filename, "build-info.txt");
    assert_eq!(sent[0].attachments[0].content, b"fixed things");
    assert!(sent[0]
        .body
        .contains("Attached change log: notes/build-info.txt\n"));
}

#[tokio::test]
async fn missing_attachment_still_sends_notification() {
    let tmp = tempdir().unwrap();
    let ledger = SentLedger::new(tmp.path().join("sent_files.log"));
    let listing = vec![RemoteEntry::new("rel_1.json", at(1, 9))];
    // build-info.txt is not retrievable.
    let files = HashMap::from([("rel_1.json", manifest("info.zip", "build-info.txt", 3))]);
    let source = fake_source(listing, files);
    let sent = Arc::new(Mutex::new(Vec::new()));
    let notifier = recording_notifier(sent.clone());

    let report = run_cycle(&config(), &source, &notifier, &ledger).await.unwrap();
    assert_eq!(report.sent(), 1);

    let sent = sent.lock().unwrap();
    assert!(sent[0].attachments.is_empty());
    assert!(sent[0].body.contains("Attached change log: build-info.txt\n"));
    assert!(sent[0].body.contains("  Description: Change information\n"));
    assert_eq!(
        fs::read_to_string(ledger.path()).unwrap(),
        "rel_1.json|2024-05-01\n"
    );
}

#[tokio::test]
async fn listing_failure_aborts_cycle_without_touching_ledger() {
    let tmp = tempdir().unwrap();
    let ledger = SentLedger::new(tmp.path().join("sent_files.log"));
    let mut source = MockRemoteSource::new();
    source.expect_list().returning(|_| {
        Err(RemoteError::Auth {
            user: "builds".into(),
            reason: "530 login incorrect".into(),
        })
    });
    source.expect_retrieve().never();
    let notifier = MockNotifier::new();

    let err = run_cycle(&config(), &source, &notifier, &ledger)
        .await
        .unwrap_err();
    assert!(matches!(err, WatchError::Remote(RemoteError::Auth { .. })));
    assert!(!ledger.path().exists());
}

#[tokio::test]
async fn watch_runs_cycles_sequentially_and_survives_errors() {
    let tmp = tempdir().unwrap();
    let ledger = SentLedger::new(tmp.path().join("sent_files.log"));
    let mut source = MockRemoteSource::new();
    let mut calls = 0;
    source.expect_list().times(3).returning(move |_| {
        calls += 1;
        if calls == 1 {
            Err(RemoteError::Connection {
                server: "ftp.example.org:21".into(),
                reason: "timed out".into(),
            })
        } else {
            Ok(Vec::new())
        }
    });
    let notifier = MockNotifier::new();

    let options = WatchOptions {
        period: Duration::from_millis(5),
        max_cycles: Some(3),
    };
    let cycles = watch(&config(), &source, &notifier, &ledger, options).await;
    assert_eq!(cycles, 3);
}
