//! Scheduled inactivity sweep

use anyhow::Result;
use chrono::Utc;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::{
    error::UserResult,
    service::{SweepReport, UserService},
};

/// Default schedule: midnight UTC on the first day of every month
/// (`sec min hour day-of-month month day-of-week`)
pub const DEFAULT_SCHEDULE: &str = "0 0 0 1 * *";

/// Runs [`UserService::cleanup_inactive_users`] on a cron schedule
///
/// At most one sweep runs at a time; a trigger that fires while a sweep is
/// in progress is skipped.
#[derive(Clone)]
pub struct SweepScheduler {
    service: UserService,
    running: Arc<AtomicBool>,
}

/// Clears the running flag when a sweep ends, even by panic
struct RunGuard(Arc<AtomicBool>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SweepScheduler {
    pub fn new(service: UserService) -> Self {
        Self {
            service,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Sweep now, or return `None` if a sweep is already running
    pub async fn run_once(&self) -> Option<UserResult<SweepReport>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Inactive user sweep already running, skipping this trigger");
            return None;
        }
        let _guard = RunGuard(self.running.clone());

        Some(self.service.cleanup_inactive_users(Utc::now()).await)
    }

    /// Sweep now and log the outcome
    pub async fn run_logged(&self) {
        info!("Running clean up job for inactive users");
        match self.run_once().await {
            Some(Ok(report)) => info!(
                deactivated = report.deactivated,
                archived = report.archived,
                "Inactive user sweep finished"
            ),
            Some(Err(e)) => error!("Inactive user sweep failed: {}", e),
            None => {}
        }
    }

    /// Register the sweep with a new cron scheduler and start it
    pub async fn start(&self, schedule: &str) -> Result<JobScheduler> {
        let sweeper = self.clone();

        let scheduler = JobScheduler::new().await?;

        let job = Job::new_async(schedule, move |_, _| {
            let sweeper = sweeper.clone();
            Box::pin(async move {
                sweeper.run_logged().await;
            })
        })?;

        scheduler.add(job).await?;
        scheduler.start().await?;

        info!("Started inactive user sweep with schedule: {}", schedule);
        Ok(scheduler)
    }
}
