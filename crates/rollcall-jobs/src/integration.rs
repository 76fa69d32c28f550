use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rollcall_core::{ConfigProvider, Integration};
use rollcall_scheduler::{JobRunner, ScheduleSnapshot, Scheduler, StartOptions};
use tracing::{info, warn};

use crate::{AttendanceForwarder, CsvUploader};

/// Chooses which job the scheduler drives.
///
/// Every transition stops the current schedule before starting the next,
/// so at most one integration is ever scheduled.
pub struct IntegrationManager {
    scheduler: Scheduler,
    config: Arc<dyn ConfigProvider>,
    forwarder: Arc<dyn JobRunner>,
    csv: Arc<dyn JobRunner>,
    active: Mutex<Option<Integration>>,
}

impl IntegrationManager {
    pub fn new(config: Arc<dyn ConfigProvider>) -> Self {
        let forwarder = Arc::new(AttendanceForwarder::new(Arc::clone(&config)));
        let csv = Arc::new(CsvUploader::new(Arc::clone(&config)));
        Self::with_runners(config, forwarder, csv)
    }

    /// Build with explicit job bodies for each integration.
    pub fn with_runners(
        config: Arc<dyn ConfigProvider>,
        forwarder: Arc<dyn JobRunner>,
        csv: Arc<dyn JobRunner>,
    ) -> Self {
        Self {
            scheduler: Scheduler::new(Arc::clone(&config)),
            config,
            forwarder,
            csv,
            active: Mutex::new(None),
        }
    }

    /// Activate the integration named in the configuration.
    pub fn start(&self) -> Option<ScheduleSnapshot> {
        let requested = match self.config.load() {
            Ok(config) => config.integration.active,
            Err(e) => {
                warn!(error = %e, "cannot read configured integration; using the default");
                String::new()
            }
        };
        self.activate(Some(&requested))
    }

    /// Re-read the configuration and re-activate. Called whenever the
    /// persisted configuration changes.
    pub fn reload(&self) -> Option<ScheduleSnapshot> {
        info!("reloading integration");
        self.start()
    }

    /// Stop the current schedule and schedule `requested` instead. Unknown or
    /// missing names select the attendance forwarder.
    pub fn activate(&self, requested: Option<&str>) -> Option<ScheduleSnapshot> {
        self.activate_integration(Integration::normalize(requested))
    }

    pub fn activate_integration(&self, integration: Integration) -> Option<ScheduleSnapshot> {
        let mut active = self.lock();
        self.scheduler.stop();

        let run_immediately = self
            .config
            .load()
            .map(|c| c.schedule.run_on_start)
            .unwrap_or(true);
        let runner = match integration {
            Integration::AttendanceForwarder => Arc::clone(&self.forwarder),
            Integration::CsvUploader => Arc::clone(&self.csv),
        };
        let options = StartOptions::new(integration.label()).run_immediately(run_immediately);

        let snapshot = self.scheduler.start(runner, options);
        *active = Some(integration);
        info!(
            integration = %integration,
            job = integration.label(),
            schedule_count = snapshot.as_ref().map_or(0, |s| s.schedule_count),
            next_run = ?snapshot.as_ref().and_then(|s| s.next_run).map(|t| t.to_rfc3339()),
            "integration activated"
        );
        snapshot
    }

    /// Stop scheduling and forget the active integration.
    pub fn deactivate(&self) {
        let mut active = self.lock();
        self.scheduler.stop();
        *active = None;
        info!("integrations stopped");
    }

    pub fn active(&self) -> Option<Integration> {
        *self.lock()
    }

    pub fn snapshot(&self) -> Option<ScheduleSnapshot> {
        self.scheduler.snapshot()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    fn lock(&self) -> MutexGuard<'_, Option<Integration>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
