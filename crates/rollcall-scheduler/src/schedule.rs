use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, NaiveTime, TimeZone};
use tracing::warn;

use crate::error::{Result, SchedulerError};
use crate::types::Schedule;

/// Compute the next execution time for `schedule` strictly *after* `from`,
/// in `from`'s timezone.
///
/// Daily times falling into a DST gap move to the next day that has them.
/// Returns `None` for an unparseable cron expression or one with no future
/// occurrence.
pub fn compute_next_run<Tz: TimeZone>(schedule: &Schedule, from: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    match schedule {
        Schedule::Daily { hour, minute } => {
            let time = NaiveTime::from_hms_opt(u32::from(*hour), u32::from(*minute), 0)?;
            let tz = from.timezone();
            let mut day = from.date_naive();
            // Today, tomorrow, or the day after if tomorrow's slot is skipped by DST.
            for _ in 0..3 {
                if let Some(candidate) = tz.from_local_datetime(&day.and_time(time)).earliest() {
                    if candidate > *from {
                        return Some(candidate);
                    }
                }
                day = day.succ_opt()?;
            }
            None
        }

        Schedule::Cron { expression } => match parse_cron(expression) {
            Ok(cron) => cron.after(from).next(),
            Err(e) => {
                warn!(cron = %expression, error = %e, "cannot compute next run");
                None
            }
        },
    }
}

/// Parse a 5- or 6-field cron expression.
pub fn parse_cron(expression: &str) -> Result<cron::Schedule> {
    let normalized = normalize_cron(expression);
    cron::Schedule::from_str(&normalized)
        .map_err(|e| SchedulerError::InvalidSchedule(format!("{expression:?}: {e}")))
}

/// Normalize a cron expression to the `cron` crate's dialect.
///
/// The crate requires `sec min hour day-of-month month day-of-week`, so a
/// 5-field expression gets `0` seconds prepended. Numeric days of the week
/// are written 0-7 with 0 and 7 both Sunday; the crate counts 1-7 from
/// Sunday, so numeric day-of-week items are rewritten as explicit lists.
pub(crate) fn normalize_cron(expression: &str) -> String {
    let trimmed = expression.trim();
    let mut fields: Vec<String> = trimmed.split_whitespace().map(str::to_string).collect();
    if fields.len() == 5 {
        fields.insert(0, "0".to_string());
    }
    if fields.len() < 6 {
        return trimmed.to_string();
    }
    fields[DAY_OF_WEEK] = day_of_week_field(&fields[DAY_OF_WEEK]);
    fields.join(" ")
}

const DAY_OF_WEEK: usize = 5;

fn day_of_week_field(field: &str) -> String {
    let mut days = BTreeSet::new();
    let mut kept = Vec::new();
    for item in field.split(',') {
        match expand_days(item) {
            Some(expanded) => days.extend(expanded.into_iter().map(crate_day)),
            None => kept.push(item.to_string()),
        }
    }
    kept.extend(days.into_iter().map(|d| d.to_string()));
    kept.join(",")
}

/// Days named by one numeric list item (`n`, `a-b`, `*/s`, `a-b/s`, `n/s`).
/// `None` for bare `*`, names and anything malformed; those pass through.
fn expand_days(item: &str) -> Option<Vec<u8>> {
    let (base, step) = match item.split_once('/') {
        Some((base, step)) => (base, Some(step.parse::<usize>().ok().filter(|s| *s > 0)?)),
        None => (item, None),
    };
    let (start, end) = match base.split_once('-') {
        Some((a, b)) => (a.parse::<u8>().ok()?, b.parse::<u8>().ok()?),
        None if base == "*" && step.is_some() => (0, 6),
        None => {
            let day = base.parse::<u8>().ok()?;
            (day, if step.is_some() { 7 } else { day })
        }
    };
    if start > end || end > 7 {
        return None;
    }
    Some((start..=end).step_by(step.unwrap_or(1)).collect())
}

fn crate_day(day: u8) -> u8 {
    match day {
        0 | 7 => 1,
        d => d + 1,
    }
}
