//! Periodic driver for the monitor. One pass per tick, late ticks skipped
//! rather than bunched.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::monitor::SlaMonitor;

pub fn spawn(
    monitor: Arc<SlaMonitor>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            event_name = "monitor.ticker.started",
            interval_secs = interval.as_secs(),
            "periodic monitoring started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match monitor.monitor_all().await {
                        Ok(summary) => {
                            info!(
                                event_name = "monitor.ticker.pass",
                                evaluated = summary.evaluated,
                                escalated = summary.escalated,
                                skipped_no_policy = summary.skipped_no_policy,
                                failed = summary.failed,
                                pruned = summary.pruned,
                                "monitoring pass finished"
                            );
                        }
                        Err(error) => {
                            error!(
                                event_name = "monitor.ticker.pass_failed",
                                error = %error,
                                "monitoring pass aborted"
                            );
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(event_name = "monitor.ticker.stopped", "periodic monitoring stopped");
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::watch;

    use inboxly_db::repositories::{
        InMemoryPolicyRepository, InMemorySlaStatusStore, InMemoryThreadRepository,
    };

    use crate::escalation::RecordingSink;
    use crate::monitor::{MonitorSettings, SlaMonitor};

    fn idle_monitor() -> SlaMonitor {
        SlaMonitor::new(
            Arc::new(InMemoryThreadRepository::new()),
            Arc::new(InMemoryPolicyRepository::new()),
            Arc::new(InMemorySlaStatusStore::new()),
            Arc::new(RecordingSink::new()),
            MonitorSettings::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_signal_stops_the_ticker() {
        let (tx, rx) = watch::channel(false);
        let handle = super::spawn(Arc::new(idle_monitor()), Duration::from_secs(60), rx);

        tx.send(true).expect("send shutdown");
        handle.await.expect("ticker task exits cleanly");
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_sender_stops_the_ticker() {
        let (tx, rx) = watch::channel(false);
        let handle = super::spawn(Arc::new(idle_monitor()), Duration::from_secs(60), rx);

        drop(tx);
        handle.await.expect("ticker task exits cleanly");
    }
}
