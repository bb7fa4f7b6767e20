///
/// This module implements the CLI of release-watch: command parsing and the
/// wiring of the FTP source, SMTP notifier and sent-ledger into the pipeline of
/// [`release-watch-core`].
///
/// ## Commands
/// - `watch`: poll on the configured period until stopped (or `--max-cycles`)
/// - `once`: run a single cycle now and print its report
///
/// For programmatic and integration use, call [`run`] with a constructed [`Cli`].
///
/// [`release-watch-core`]: ../../release-watch-core/
use crate::ftp::FtpSource;
use crate::load_config::load_config;
use crate::mail::SmtpNotifier;
use anyhow::Result;
use clap::{Parser, Subcommand};
use release_watch_core::cycle::run_cycle;
use release_watch_core::ledger::SentLedger;
use release_watch_core::watch::{watch, WatchOptions};
use std::path::PathBuf;

/// CLI for release-watch: notify about new release manifests on an FTP server.
#[derive(Parser)]
#[clap(
    name = "release-watch",
    version,
    about = "Poll an FTP directory for release manifests and mail a summary per day"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Poll the remote directory on the configured period
    Watch {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Path to the sent-ledger file
        #[clap(long, default_value = "sent_files.log")]
        ledger: PathBuf,
        /// Stop after this many cycles
        #[clap(long)]
        max_cycles: Option<usize>,
    },
    /// Run a single polling cycle immediately
    Once {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Path to the sent-ledger file
        #[clap(long, default_value = "sent_files.log")]
        ledger: PathBuf,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Watch {
            config,
            ledger,
            max_cycles,
        } => {
            let config = load_config(config)?;
            let source = FtpSource::new(config.remote.clone());
            let notifier = SmtpNotifier::new(&config.notify)?;
            let ledger = SentLedger::new(ledger);
            let options = WatchOptions {
                max_cycles,
                ..WatchOptions::from_config(&config)
            };
            tracing::info!(
                command = "watch",
                period_secs = options.period.as_secs(),
                ledger = %ledger.path().display(),
                "Starting to watch remote directory"
            );
            let cycles = watch(&config, &source, &notifier, &ledger, options).await;
            tracing::info!(command = "watch", cycles, "Watch finished");
            Ok(())
        }
        Commands::Once { config, ledger } => {
            let config = load_config(config)?;
            let source = FtpSource::new(config.remote.clone());
            let notifier = SmtpNotifier::new(&config.notify)?;
            let ledger = SentLedger::new(ledger);
            tracing::info!(command = "once", "Running a single cycle");
            match run_cycle(&config, &source, &notifier, &ledger).await {
                Ok(report) => {
                    tracing::info!(command = "once", sent = report.sent(), "Cycle complete");
                    println!("{:#?}", report);
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "once", error = %e, "Cycle failed");
                    Err(anyhow::Error::new(e))
                }
            }
        }
    }
}
