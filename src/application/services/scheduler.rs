//! Periodic and on-demand refresh scheduling.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::application::services::refresh::{RefreshOutcome, RefreshService};
use crate::application::{ApplicationError, ApplicationResult};

/// Control side of a running scheduler.
pub struct SchedulerHandle {
    trigger: mpsc::Sender<()>,
    interval: watch::Sender<Duration>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Request an immediate refresh.
    ///
    /// Returns `false` when a manual refresh is already queued or the
    /// scheduler has stopped.
    pub fn refresh_now(&self) -> bool {
        self.trigger.try_send(()).is_ok()
    }

    /// Replace the periodic timer; `Duration::ZERO` disables it.
    pub fn set_interval(&self, interval: Duration) {
        self.interval.send_replace(interval);
    }

    pub fn interval(&self) -> Duration {
        *self.interval.borrow()
    }

    /// Stop the loop and wait for the current cycle to finish.
    pub async fn shutdown(self) -> ApplicationResult<()> {
        let _ = self.shutdown.send(true);
        self.task
            .await
            .map_err(|e| ApplicationError::OperationFailed {
                context: "refresh scheduler task".into(),
                source: Box::new(e),
            })
    }
}

pub struct RefreshScheduler;

impl RefreshScheduler {
    /// Start the refresh loop on the current tokio runtime.
    pub fn spawn(service: Arc<RefreshService>, interval: Duration) -> SchedulerHandle {
        let (trigger, trigger_rx) = mpsc::channel(1);
        let (interval_tx, interval_rx) = watch::channel(interval);
        let (shutdown, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(run(service, trigger_rx, interval_rx, shutdown_rx));
        SchedulerHandle {
            trigger,
            interval: interval_tx,
            shutdown,
            task,
        }
    }
}

async fn run(
    service: Arc<RefreshService>,
    mut trigger_rx: mpsc::Receiver<()>,
    mut interval_rx: watch::Receiver<Duration>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = make_ticker(*interval_rx.borrow_and_update());
    info!("refresh scheduler started");

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,

            Some(()) = trigger_rx.recv() => {
                run_cycle(&service, "manual").await;
            }

            changed = interval_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let interval = *interval_rx.borrow_and_update();
                debug!("refresh interval set to {:?}", interval);
                ticker = make_ticker(interval);
            }

            _ = tick(&mut ticker) => {
                run_cycle(&service, "timer").await;
            }
        }
    }
    info!("refresh scheduler stopped");
}

fn make_ticker(period: Duration) -> Option<Interval> {
    if period.is_zero() {
        return None;
    }
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(ticker)
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn run_cycle(service: &RefreshService, trigger: &str) {
    match service.refresh_async().await {
        Ok(RefreshOutcome::Updated(report)) => {
            debug!(trigger, changes = report.applied.len(), "refresh applied");
        }
        Ok(outcome) => debug!(trigger, %outcome, "refresh finished"),
        Err(e) => warn!(trigger, "refresh failed: {}", e),
    }
}
