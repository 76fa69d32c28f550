//! `rollcall-scheduler`: single-flight job scheduling on local wall-clock time.
//!
//! # Overview
//!
//! A [`Scheduler`] drives one [`JobRunner`] at a time. Starting it arms one
//! timer per configured daily run time, or a single cron timer when no run
//! times are configured. All timers of a schedule share one busy flag: a
//! firing that lands while the previous execution is still running is logged
//! and dropped.
//!
//! # Schedule variants
//!
//! | Variant | Behaviour                                                |
//! |---------|----------------------------------------------------------|
//! | `Daily` | Fire at HH:MM local time every day                       |
//! | `Cron`  | 5-field (minute precision) or 6-field cron, local time   |

pub mod engine;
pub mod error;
pub mod runner;
pub mod schedule;
pub mod task;
pub mod types;

pub use engine::Scheduler;
pub use error::{Result, SchedulerError};
pub use runner::JobRunner;
pub use schedule::{compute_next_run, parse_cron};
pub use types::{
    normalize_run_times, FireResult, RunTime, Schedule, ScheduleConfig, ScheduleMode,
    ScheduleOverrides, ScheduleSnapshot, StartOptions,
};
