//! Periodic driver around [`run_cycle`].

use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

use crate::config::WatchConfig;
use crate::contract::{Notifier, RemoteSource};
use crate::cycle::run_cycle;
use crate::ledger::SentLedger;

#[derive(Debug, Clone, Copy)]
pub struct WatchOptions {
    pub period: Duration,
    /// Stop after this many cycles; `None` polls until the process is stopped.
    pub max_cycles: Option<usize>,
}

impl WatchOptions {
    pub fn from_config(config: &WatchConfig) -> Self {
        Self {
            period: config.remote.poll_period(),
            max_cycles: None,
        }
    }
}

/// Run a cycle every `options.period`, the first one after one full period.
///
/// Cycles run one at a time: a slow cycle delays the next tick instead of
/// overlapping with it. Cycle errors are logged and polling continues.
/// Returns the number of cycles that ran.
pub async fn watch<S, N>(
    config: &WatchConfig,
    source: &S,
    notifier: &N,
    ledger: &SentLedger,
    options: WatchOptions,
) -> usize
where
    S: RemoteSource + ?Sized,
    N: Notifier + ?Sized,
{
    let mut ticker = interval_at(Instant::now() + options.period, options.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut cycles = 0;
    loop {
        if options.max_cycles.is_some_and(|max| cycles >= max) {
            return cycles;
        }
        ticker.tick().await;
        cycles += 1;

        info!(cycle = cycles, "[WATCH] Starting remote file check");
        match run_cycle(config, source, notifier, ledger).await {
            Ok(report) => info!(
                cycle = cycles,
                candidates = report.candidates,
                groups = report.groups.len(),
                sent = report.sent(),
                "[WATCH] Cycle finished"
            ),
            Err(e) => error!(cycle = cycles, error = %e, "[WATCH] Error fetching new files"),
        }
    }
}
