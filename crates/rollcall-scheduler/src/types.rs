use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local};
use rollcall_core::config::ScheduleSettings;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A validated `HH:MM` (24h) local wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunTime {
    pub hour: u8,
    pub minute: u8,
}

impl FromStr for RunTime {
    type Err = String;

    /// Accepts exactly two-digit hours `00`–`23` and minutes `00`–`59`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("invalid run time: {s:?} (expected HH:MM)");
        let (h, m) = s.split_once(':').ok_or_else(invalid)?;
        if h.len() != 2 || m.len() != 2 {
            return Err(invalid());
        }
        if !h.bytes().chain(m.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let hour: u8 = h.parse().map_err(|_| invalid())?;
        let minute: u8 = m.parse().map_err(|_| invalid())?;
        if hour > 23 || minute > 59 {
            return Err(invalid());
        }
        Ok(RunTime { hour, minute })
    }
}

impl fmt::Display for RunTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// When a single trigger fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    /// Every day at HH:MM:00 local time.
    Daily { hour: u8, minute: u8 },

    /// Cron expression, 5 fields (minute precision) or 6 (with seconds).
    Cron { expression: String },
}

impl From<RunTime> for Schedule {
    fn from(t: RunTime) -> Self {
        Schedule::Daily {
            hour: t.hour,
            minute: t.minute,
        }
    }
}

/// Which kind of trigger a [`ScheduleConfig`] arms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleMode {
    Daily,
    Cron,
}

/// Caller-supplied schedule values that win over the persisted ones.
#[derive(Debug, Clone, Default)]
pub struct ScheduleOverrides {
    pub cron_expression: Option<String>,
    pub daily_run_times: Option<Vec<String>>,
}

/// The effective schedule for one start.
///
/// Non-empty `daily_times` take precedence over `cron_expression`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub daily_times: Vec<RunTime>,
    pub cron_expression: String,
}

impl ScheduleConfig {
    pub fn resolve(settings: &ScheduleSettings, overrides: &ScheduleOverrides) -> Self {
        let cron_expression = overrides
            .cron_expression
            .as_deref()
            .unwrap_or(&settings.cron)
            .trim()
            .to_string();
        let raw_times = overrides
            .daily_run_times
            .as_deref()
            .unwrap_or(&settings.daily_run_times);
        Self {
            daily_times: normalize_run_times(raw_times),
            cron_expression,
        }
    }

    pub fn mode(&self) -> Option<ScheduleMode> {
        if !self.daily_times.is_empty() {
            Some(ScheduleMode::Daily)
        } else if !self.cron_expression.is_empty() {
            Some(ScheduleMode::Cron)
        } else {
            None
        }
    }
}

/// Parse run times, dropping blanks silently and malformed entries with a
/// warning. Duplicates keep their first position.
pub fn normalize_run_times<S: AsRef<str>>(values: &[S]) -> Vec<RunTime> {
    let mut valid: Vec<RunTime> = Vec::with_capacity(values.len());
    for value in values {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            continue;
        }
        match trimmed.parse::<RunTime>() {
            Ok(t) if !valid.contains(&t) => valid.push(t),
            Ok(_) => {}
            Err(_) => warn!(time = %value.as_ref(), "ignoring invalid run time"),
        }
    }
    valid
}

/// Read-only view of the running schedule, rebuilt on every start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSnapshot {
    pub job_label: String,
    /// Configured cron expression, or empty.
    pub cron_expression: String,
    pub run_times: Vec<String>,
    /// Earliest upcoming fire instant across all triggers.
    pub next_run: Option<DateTime<Local>>,
    pub schedule_count: usize,
}

/// Arguments to [`Scheduler::start`](crate::Scheduler::start).
#[derive(Debug, Clone)]
pub struct StartOptions {
    pub label: String,
    /// Fire once right after the triggers are armed.
    pub run_immediately: bool,
    pub overrides: ScheduleOverrides,
}

impl StartOptions {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            run_immediately: true,
            overrides: ScheduleOverrides::default(),
        }
    }

    pub fn run_immediately(mut self, yes: bool) -> Self {
        self.run_immediately = yes;
        self
    }

    pub fn overrides(mut self, overrides: ScheduleOverrides) -> Self {
        self.overrides = overrides;
        self
    }
}

impl Default for StartOptions {
    fn default() -> Self {
        Self::new("integration-job")
    }
}

/// What happened when a trigger (or a manual [`trigger`](crate::Scheduler::trigger)) fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireResult {
    /// The job body was spawned.
    Started,
    /// A previous execution was still running; nothing was spawned.
    Skipped,
    /// No schedule is active.
    Idle,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_time_accepts_full_range() {
        assert_eq!(
            "00:00".parse::<RunTime>().unwrap(),
            RunTime { hour: 0, minute: 0 }
        );
        assert_eq!(
            "23:59".parse::<RunTime>().unwrap(),
            RunTime {
                hour: 23,
                minute: 59
            }
        );
        assert_eq!("07:05".parse::<RunTime>().unwrap().to_string(), "07:05");
    }

    #[test]
    fn run_time_rejects_malformed_values() {
        for bad in ["9:00", "24:00", "12:60", "12-00", "1200", "ab:cd", "+1:00", "12:5", ""] {
            assert!(bad.parse::<RunTime>().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn normalize_drops_invalid_and_duplicates() {
        let times = normalize_run_times(&[
            "18:00", "09:00", " 18:00 ", "9:00", "24:00", "12:60", "", "09:00",
        ]);
        assert_eq!(
            times.iter().map(ToString::to_string).collect::<Vec<_>>(),
            vec!["18:00", "09:00"]
        );
    }

    #[test]
    fn daily_times_take_precedence_over_cron() {
        let settings = ScheduleSettings {
            cron: "*/5 * * * *".to_string(),
            daily_run_times: vec!["09:00".to_string()],
            run_on_start: true,
        };
        let config = ScheduleConfig::resolve(&settings, &ScheduleOverrides::default());
        assert_eq!(config.mode(), Some(ScheduleMode::Daily));
        assert_eq!(config.cron_expression, "*/5 * * * *");
    }

    #[test]
    fn overrides_replace_persisted_values() {
        let settings = ScheduleSettings::default();
        let overrides = ScheduleOverrides {
            cron_expression: Some("0 6 * * *".to_string()),
            daily_run_times: Some(Vec::new()),
        };
        let config = ScheduleConfig::resolve(&settings, &overrides);
        assert!(config.daily_times.is_empty());
        assert_eq!(config.mode(), Some(ScheduleMode::Cron));
    }

    #[test]
    fn empty_schedule_has_no_mode() {
        let settings = ScheduleSettings {
            cron: "  ".to_string(),
            daily_run_times: vec!["bogus".to_string()],
            run_on_start: false,
        };
        let config = ScheduleConfig::resolve(&settings, &ScheduleOverrides::default());
        assert_eq!(config.mode(), None);
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let snapshot = ScheduleSnapshot {
            job_label: "CSV data sender".to_string(),
            cron_expression: String::new(),
            run_times: vec!["09:00".to_string()],
            next_run: None,
            schedule_count: 1,
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["jobLabel"], "CSV data sender");
        assert_eq!(json["scheduleCount"], 1);
        assert!(json["nextRun"].is_null());
    }
}
