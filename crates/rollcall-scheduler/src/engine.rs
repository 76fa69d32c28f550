use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::Local;
use futures_util::FutureExt;
use rollcall_core::{ConfigProvider, RunOutcome, SingleFlight};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::{
    error::{Result, SchedulerError},
    runner::JobRunner,
    schedule::{compute_next_run, parse_cron},
    task::{spawn_trigger, TriggerHandle},
    types::{FireResult, Schedule, ScheduleConfig, ScheduleMode, ScheduleSnapshot, StartOptions},
};

/// Owns the single active schedule.
///
/// Every start replaces the previous schedule. All triggers of one schedule
/// share one busy flag, so at most one job body runs at a time and any
/// firing that lands while it runs is dropped, not queued.
pub struct Scheduler {
    config: Arc<dyn ConfigProvider>,
    active: Mutex<Option<ActiveSchedule>>,
}

struct ActiveSchedule {
    triggers: Vec<TriggerHandle>,
    snapshot: ScheduleSnapshot,
    job: Arc<JobSlot>,
}

/// The job body plus the busy flag shared by every trigger of a schedule.
struct JobSlot {
    label: String,
    runner: Arc<dyn JobRunner>,
    flight: SingleFlight,
}

/// Validated triggers, ready to arm.
struct Plan {
    config: ScheduleConfig,
    triggers: Vec<(String, Schedule)>,
}

impl Scheduler {
    pub fn new(config: Arc<dyn ConfigProvider>) -> Self {
        Self {
            config,
            active: Mutex::new(None),
        }
    }

    /// Replace any running schedule with one driving `runner`.
    ///
    /// Returns `None` when no schedule could be started (nothing configured,
    /// an invalid cron expression, or unreadable configuration). That is a
    /// valid disabled state, not a failure.
    pub fn start(
        &self,
        runner: Arc<dyn JobRunner>,
        options: StartOptions,
    ) -> Option<ScheduleSnapshot> {
        let mut active = self.lock();
        if let Some(previous) = active.take() {
            shutdown(previous);
        }

        let plan = match self.plan(&options) {
            Ok(plan) => plan,
            Err(SchedulerError::NotConfigured) => {
                warn!(
                    job = %options.label,
                    "scheduler not started: configure run times or a cron expression"
                );
                return None;
            }
            Err(e) => {
                error!(job = %options.label, error = %e, "scheduler not started");
                return None;
            }
        };

        let job = Arc::new(JobSlot {
            label: options.label.clone(),
            runner,
            flight: SingleFlight::new(),
        });

        let now = Local::now();
        let mut next_runs: Vec<_> = plan
            .triggers
            .iter()
            .filter_map(|(_, schedule)| compute_next_run(schedule, &now))
            .collect();
        // Stable: equal instants keep trigger order.
        next_runs.sort();

        let triggers: Vec<TriggerHandle> = plan
            .triggers
            .into_iter()
            .map(|(label, schedule)| {
                info!(trigger = %label, ?schedule, "job scheduled");
                let slot = Arc::clone(&job);
                spawn_trigger(label, schedule, move || {
                    slot.fire();
                })
            })
            .collect();

        let snapshot = ScheduleSnapshot {
            job_label: options.label.clone(),
            cron_expression: plan.config.cron_expression.clone(),
            run_times: plan
                .config
                .daily_times
                .iter()
                .map(ToString::to_string)
                .collect(),
            next_run: next_runs.first().copied(),
            schedule_count: triggers.len(),
        };

        info!(
            job = %snapshot.job_label,
            cron = %snapshot.cron_expression,
            run_times = ?snapshot.run_times,
            next_run = ?snapshot.next_run.map(|t| t.to_rfc3339()),
            schedule_count = snapshot.schedule_count,
            "scheduler started"
        );

        if options.run_immediately && !triggers.is_empty() {
            job.fire();
        }

        *active = Some(ActiveSchedule {
            triggers,
            snapshot: snapshot.clone(),
            job,
        });
        Some(snapshot)
    }

    /// Cancel every trigger and clear the snapshot. No-op when idle.
    ///
    /// A job body that is already running is not interrupted.
    pub fn stop(&self) {
        if let Some(previous) = self.lock().take() {
            shutdown(previous);
        }
    }

    pub fn snapshot(&self) -> Option<ScheduleSnapshot> {
        self.lock().as_ref().map(|a| a.snapshot.clone())
    }

    /// Fire the active job now, through the same busy flag as its triggers.
    pub fn trigger(&self) -> FireResult {
        match self.lock().as_ref() {
            Some(active) => active.job.fire(),
            None => FireResult::Idle,
        }
    }

    /// Whether a job body of the active schedule is running.
    pub fn is_busy(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|a| a.job.flight.is_busy())
    }

    fn plan(&self, options: &StartOptions) -> Result<Plan> {
        let settings = self.config.load()?;
        let config = ScheduleConfig::resolve(&settings.schedule, &options.overrides);

        let triggers = match config.mode() {
            Some(ScheduleMode::Daily) => config
                .daily_times
                .iter()
                .map(|t| (format!("{} (daily@{t})", options.label), Schedule::from(*t)))
                .collect(),
            Some(ScheduleMode::Cron) => {
                parse_cron(&config.cron_expression)?;
                vec![(
                    options.label.clone(),
                    Schedule::Cron {
                        expression: config.cron_expression.clone(),
                    },
                )]
            }
            None => return Err(SchedulerError::NotConfigured),
        };

        Ok(Plan { config, triggers })
    }

    fn lock(&self) -> MutexGuard<'_, Option<ActiveSchedule>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn shutdown(schedule: ActiveSchedule) {
    for trigger in schedule.triggers {
        trigger.cancel();
    }
    info!(job = %schedule.snapshot.job_label, "scheduler stopped");
}

impl JobSlot {
    /// Spawn the job body unless one is already running.
    fn fire(&self) -> FireResult {
        let Some(permit) = self.flight.try_acquire() else {
            warn!(
                job = %self.label,
                "job skipped because previous run is still in progress"
            );
            return FireResult::Skipped;
        };

        let runner = Arc::clone(&self.runner);
        let label = self.label.clone();
        let run_id = Uuid::now_v7();
        let span = info_span!("job", job = %label, %run_id);

        tokio::spawn(
            async move {
                let _permit = permit;
                let started = Instant::now();
                info!("job started");
                match AssertUnwindSafe(runner.run()).catch_unwind().await {
                    Ok(outcome) => log_outcome(&outcome, started.elapsed().as_millis()),
                    Err(_) => error!("job panicked"),
                }
            }
            .instrument(span),
        );
        FireResult::Started
    }
}

fn log_outcome(outcome: &RunOutcome, elapsed_ms: u128) {
    match outcome {
        RunOutcome::Completed { summary } => info!(elapsed_ms, %summary, "job completed"),
        RunOutcome::Skipped(reason) => warn!(elapsed_ms, %reason, "job skipped"),
        RunOutcome::Failed { error } => error!(elapsed_ms, %error, "job failed"),
    }
}
