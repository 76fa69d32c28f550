use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::schedule::compute_next_run;
use crate::types::Schedule;

/// Cancellable handle to one armed trigger.
///
/// Dropping the handle also cancels the trigger: the timer task exits as
/// soon as the shutdown sender is gone.
pub struct TriggerHandle {
    label: String,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl TriggerHandle {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Stop future firings. A job body already spawned by this trigger keeps
    /// running to completion.
    pub fn cancel(self) {
        let _ = self.shutdown.send(true);
        self.task.abort();
        debug!(trigger = %self.label, "trigger cancelled");
    }
}

/// Arm a timer that calls `on_fire` at every instant `schedule` produces.
///
/// `on_fire` must not block: it runs on the timer task, which only re-arms
/// after it returns.
pub fn spawn_trigger<F>(label: String, schedule: Schedule, on_fire: F) -> TriggerHandle
where
    F: Fn() + Send + Sync + 'static,
{
    let (shutdown, mut shutdown_rx) = watch::channel(false);
    let task_label = label.clone();

    let task = tokio::spawn(async move {
        let mut last_fired: Option<DateTime<Local>> = None;
        loop {
            // Never compute from before the instant we just fired, in case the
            // timer woke a hair early.
            let now = Local::now();
            let from = match last_fired {
                Some(fired) if fired > now => fired,
                _ => now,
            };
            let Some(next) = compute_next_run(&schedule, &from) else {
                warn!(trigger = %task_label, "trigger has no upcoming run; disarming");
                break;
            };
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            debug!(trigger = %task_label, next_run = %next.to_rfc3339(), "trigger armed");

            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                _ = tokio::time::sleep(wait) => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                    last_fired = Some(next);
                    on_fire();
                }
            }
        }
    });

    TriggerHandle {
        label,
        shutdown,
        task,
    }
}
