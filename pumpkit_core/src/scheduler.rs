// Fixed-interval job runner. One spawned task per schedule; nothing is
// persisted and there is no jitter.

use crate::error::CoreError;
use log::{debug, info, warn};
use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// What happens when a tick fires while the previous run is still going.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapPolicy {
    /// Drop the tick.
    #[default]
    Skip,
    /// Run again as soon as the current run ends.
    Queue,
}

impl FromStr for OverlapPolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(OverlapPolicy::Skip),
            "queue" => Ok(OverlapPolicy::Queue),
            other => Err(CoreError::Validation(format!(
                "unknown overlap policy '{}', expected 'skip' or 'queue'",
                other
            ))),
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    runs: AtomicUsize,
    skipped: AtomicUsize,
}

/// Handle to a running schedule. Dropping it stops the schedule too.
pub struct ScheduledTask {
    cancel_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
    counters: Arc<Counters>,
}

impl ScheduledTask {
    /// Run `job` now and then once every `interval`. A zero interval is
    /// rejected.
    pub fn start<F, Fut>(interval: Duration, policy: OverlapPolicy, job: F) -> Result<Self, CoreError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if interval.is_zero() {
            return Err(CoreError::Validation("schedule interval must be > 0".to_string()));
        }
        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let counters = Arc::new(Counters::default());
        let task_counters = counters.clone();

        let handle = tokio::spawn(async move {
            let busy = Arc::new(AtomicBool::new(false));
            let mut in_flight: Option<JoinHandle<()>> = None;
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!("Scheduler started: every {:?}, overlap {:?}", interval, policy);

            loop {
                tokio::select! {
                    changed = cancel_rx.changed() => {
                        if changed.is_err() || *cancel_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => match policy {
                        OverlapPolicy::Skip => {
                            if busy.swap(true, Ordering::SeqCst) {
                                let n = task_counters.skipped.fetch_add(1, Ordering::SeqCst) + 1;
                                warn!("Previous run still in progress, skipping tick ({} skipped)", n);
                                continue;
                            }
                            let run = task_counters.runs.fetch_add(1, Ordering::SeqCst) + 1;
                            debug!("Scheduled run #{}", run);
                            let fut = job();
                            let busy = busy.clone();
                            in_flight = Some(tokio::spawn(async move {
                                fut.await;
                                busy.store(false, Ordering::SeqCst);
                            }));
                        }
                        OverlapPolicy::Queue => {
                            let run = task_counters.runs.fetch_add(1, Ordering::SeqCst) + 1;
                            debug!("Scheduled run #{}", run);
                            job().await;
                        }
                    }
                }
            }
            if let Some(run) = in_flight.take() {
                if !run.is_finished() {
                    info!("Waiting for the running job to finish");
                }
                if let Err(e) = run.await {
                    warn!("Scheduled run ended abnormally: {}", e);
                }
            }
            info!("Scheduler stopped");
        });

        Ok(Self { cancel_tx, handle, counters })
    }

    /// Stop scheduling new runs. A run already in flight is not interrupted.
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    /// Cancel and wait for the scheduling loop and any run in flight.
    pub async fn stop(self) {
        self.cancel();
        let _ = self.handle.await;
    }

    pub fn runs(&self) -> usize {
        self.counters.runs.load(Ordering::SeqCst)
    }

    pub fn skipped(&self) -> usize {
        self.counters.skipped.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
