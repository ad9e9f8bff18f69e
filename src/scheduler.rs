//! The interval loop driving poll cycles.
//!
//! One cycle runs to completion before the next tick is honored, so the
//! registry is never mutated by two overlapping cycles; missed ticks are
//! skipped rather than bursted.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::engine::{self, CycleOptions};
use crate::notify::Notifier;
use crate::storage::Database;

/// Handle to a running scheduler, used to request shutdown.
pub struct SchedulerHandle {
    cancel_tx: broadcast::Sender<()>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Ask the scheduler to stop and wait for the in-flight cycle to finish.
    pub async fn stop(self) -> Result<(), tokio::task::JoinError> {
        let _ = self.cancel_tx.send(());
        self.join.await
    }
}

/// Spawn the scheduler: one fetch-deliver-collect cycle per `interval`.
///
/// The first cycle runs immediately. Cycle errors are logged and never stop
/// the loop — the next interval is always honored.
pub fn spawn_scheduler(
    db: Database,
    client: reqwest::Client,
    notifier: Notifier,
    interval: Duration,
    opts: CycleOptions,
) -> SchedulerHandle {
    let (cancel_tx, mut cancel_rx) = broadcast::channel(1);
    let join = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel_rx.recv() => {
                    tracing::info!("Scheduler shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    match engine::run_cycle(&db, &client, &notifier, &opts).await {
                        Ok(summary) => {
                            tracing::info!(
                                sites = summary.sites_polled,
                                fetch_failures = summary.fetch_failures,
                                new = summary.new_articles,
                                delivered = summary.delivered,
                                dispatch_failures = summary.dispatch_failures,
                                purged = summary.purged_sites,
                                "Poll cycle complete"
                            );
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Poll cycle failed");
                        }
                    }
                }
            }
        }
    });

    SchedulerHandle { cancel_tx, join }
}
