use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use rollcall_artemis::{fetch_attendance_for_day, fetch_person_list, ArtemisClient};
use rollcall_core::config::SchoolConfig;
use rollcall_core::{ConfigProvider, FileConfig, Integration, RollcallConfig, RunOutcome};
use rollcall_jobs::{AttendanceForwarder, CsvUploader, IntegrationManager};
use rollcall_scheduler::{JobRunner, ScheduleSnapshot, Scheduler, StartOptions};
use tracing::{info, warn};

use crate::watch::ConfigWatcher;

/// Schedule the configured integration and keep it in step with the
/// configuration file until Ctrl-C.
pub async fn run(config: FileConfig, watch_interval: Duration) -> anyhow::Result<()> {
    let path = config.path().to_path_buf();
    let manager = Arc::new(IntegrationManager::new(Arc::new(config)));

    if manager.start().is_none() {
        warn!("no schedule active; waiting for a configuration change");
    }

    let reloader = Arc::clone(&manager);
    let watcher = ConfigWatcher::spawn(path, watch_interval, move || {
        reloader.reload();
    });

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("shutdown requested");

    watcher.stop().await;
    manager.deactivate();
    Ok(())
}

/// Run one job body directly, outside any schedule.
pub async fn run_once(runner: &dyn JobRunner) -> anyhow::Result<()> {
    match runner.run().await {
        RunOutcome::Completed { summary } => {
            println!("{summary}");
            Ok(())
        }
        RunOutcome::Skipped(reason) => {
            println!("skipped: {reason}");
            Ok(())
        }
        RunOutcome::Failed { error } => bail!(error),
    }
}

pub async fn send_csv(config: FileConfig, date: Option<NaiveDate>) -> anyhow::Result<()> {
    run_once(&CsvUploader::new(Arc::new(config)).with_day(date)).await
}

pub async fn forward(config: FileConfig, date: Option<NaiveDate>) -> anyhow::Result<()> {
    run_once(&AttendanceForwarder::new(Arc::new(config)).with_day(date)).await
}

pub async fn attendance(config: &FileConfig, date: Option<NaiveDate>) -> anyhow::Result<()> {
    let settings = config.load()?;
    let client = ArtemisClient::new(&settings.vendor)?;
    let school = SchoolConfig {
        id: settings.school.id.clone(),
        domain: settings.school.domain.clone(),
    };
    let day = date.unwrap_or_else(|| Local::now().date_naive());
    let records = fetch_attendance_for_day(&client, &school, day).await?;
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

pub async fn persons(config: &FileConfig) -> anyhow::Result<()> {
    let client = ArtemisClient::new(&config.load()?.vendor)?;
    let Some(list) = fetch_person_list(&client).await else {
        bail!("person list request failed");
    };
    println!("{}", serde_json::to_string_pretty(&list)?);
    Ok(())
}

/// Job body for a dry schedule: never invoked because nothing fires.
struct Idle;

#[async_trait]
impl JobRunner for Idle {
    async fn run(&self) -> RunOutcome {
        RunOutcome::Completed {
            summary: String::new(),
        }
    }
}

/// The snapshot a start with `config` would produce, without running jobs.
pub fn preview_schedule(
    config: Arc<dyn ConfigProvider>,
) -> anyhow::Result<Option<ScheduleSnapshot>> {
    let settings = config.load()?;
    let integration = Integration::normalize(Some(&settings.integration.active));
    let scheduler = Scheduler::new(config);
    let snapshot = scheduler.start(
        Arc::new(Idle),
        StartOptions::new(integration.label()).run_immediately(false),
    );
    scheduler.stop();
    Ok(snapshot)
}

pub fn schedule(config: FileConfig) -> anyhow::Result<()> {
    match preview_schedule(Arc::new(config))? {
        Some(snapshot) => println!("{}", serde_json::to_string_pretty(&snapshot)?),
        None => println!("no schedule: configure schedule.daily_run_times or schedule.cron"),
    }
    Ok(())
}

pub fn config_show(config: &FileConfig) -> anyhow::Result<()> {
    let settings = config.load()?;
    print!("{}", toml::to_string_pretty(&settings)?);
    Ok(())
}

pub fn config_init(config: &FileConfig, force: bool) -> anyhow::Result<()> {
    if config.path().exists() && !force {
        bail!(
            "{} already exists; pass --force to overwrite",
            config.path().display()
        );
    }
    config.save(&RollcallConfig::default())?;
    println!("wrote {}", config.path().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use rollcall_core::MemoryConfig;

    use super::*;

    #[tokio::test]
    async fn preview_reports_the_configured_job() {
        let mut settings = RollcallConfig::default();
        settings.integration.active = "csvUploader".to_string();
        let snapshot = preview_schedule(Arc::new(MemoryConfig::new(settings)))
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.job_label, "CSV data sender");
        assert_eq!(snapshot.run_times, vec!["09:00", "18:00"]);
        assert!(snapshot.next_run.is_some());
    }

    #[tokio::test]
    async fn preview_without_schedule_is_none() {
        let mut settings = RollcallConfig::default();
        settings.schedule.daily_run_times.clear();
        assert!(preview_schedule(Arc::new(MemoryConfig::new(settings)))
            .unwrap()
            .is_none());
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let config = FileConfig::new(dir.path().join("nested").join("rollcall.toml"));

        config_init(&config, false).unwrap();
        assert!(config.path().exists());
        assert!(config_init(&config, false).is_err());
        config_init(&config, true).unwrap();

        let loaded = config.load().unwrap();
        assert_eq!(loaded.schedule.daily_run_times, vec!["09:00", "18:00"]);
    }

    #[tokio::test]
    async fn skipped_runs_are_not_errors() {
        let settings = RollcallConfig::default();
        let uploader = CsvUploader::new(Arc::new(MemoryConfig::new(settings)));
        run_once(&uploader).await.unwrap();
    }
}
