//! Timer-driven coordination of the expiry and notification sweeps.
//!
//! Each named job is owned by one `Scheduler` instance: an explicit registry
//! maps job names to their cron schedule, the handle of the scheduled job (if
//! running) and a busy flag. A tick that fires while the previous tick of the
//! same job is still executing is skipped, since a sweep may outlast its
//! interval under load.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

use crate::{
    config::SchedulerConfig,
    error::{AppError, Result},
    service::{SweepReport, SweepService},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobName {
    /// Hourly transition of past-window rentals to `Expired`.
    ExpirySweep,
    /// Half-hourly expiring-soon warning dispatch.
    ExpiryNotice,
}

impl JobName {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobName::ExpirySweep => "expiry-sweep",
            JobName::ExpiryNotice => "expiry-notice",
        }
    }

    pub fn all() -> [JobName; 2] {
        [JobName::ExpirySweep, JobName::ExpiryNotice]
    }
}

impl FromStr for JobName {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "expiry-sweep" => Ok(JobName::ExpirySweep),
            "expiry-notice" => Ok(JobName::ExpiryNotice),
            _ => Err(AppError::NotFound(format!("Unknown job: {}", s))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobStatus {
    pub name: &'static str,
    pub schedule: String,
    pub running: bool,
}

struct JobEntry {
    schedule: String,
    /// Handle of the scheduled cron job while the job is started.
    handle: Option<Uuid>,
    /// Set while a tick is executing; a new tick that finds it set is skipped.
    busy: Arc<AtomicBool>,
}

pub struct Scheduler {
    inner: JobScheduler,
    timezone: Tz,
    sweeps: Arc<SweepService>,
    registry: Mutex<HashMap<JobName, JobEntry>>,
}

impl Scheduler {
    pub async fn new(config: &SchedulerConfig, sweeps: Arc<SweepService>) -> Result<Self> {
        let timezone: Tz = config
            .timezone
            .parse()
            .map_err(|_| AppError::Validation(format!("Invalid timezone: {}", config.timezone)))?;

        let inner = JobScheduler::new()
            .await
            .map_err(|e| AppError::External(format!("Scheduler init failed: {}", e)))?;
        inner
            .start()
            .await
            .map_err(|e| AppError::External(format!("Scheduler start failed: {}", e)))?;

        let mut registry = HashMap::new();
        registry.insert(
            JobName::ExpirySweep,
            JobEntry {
                schedule: config.expiry_sweep_cron.clone(),
                handle: None,
                busy: Arc::new(AtomicBool::new(false)),
            },
        );
        registry.insert(
            JobName::ExpiryNotice,
            JobEntry {
                schedule: config.expiry_notice_cron.clone(),
                handle: None,
                busy: Arc::new(AtomicBool::new(false)),
            },
        );

        Ok(Self {
            inner,
            timezone,
            sweeps,
            registry: Mutex::new(registry),
        })
    }

    pub async fn start(&self, name: JobName) -> Result<()> {
        let mut registry = self.registry.lock().await;
        let entry = registry
            .get_mut(&name)
            .ok_or_else(|| AppError::NotFound(format!("Unknown job: {}", name.as_str())))?;

        if entry.handle.is_some() {
            return Ok(());
        }

        let sweeps = self.sweeps.clone();
        let busy = entry.busy.clone();

        let job = Job::new_async_tz(entry.schedule.as_str(), self.timezone, move |_id, _lock| {
            let sweeps = sweeps.clone();
            let busy = busy.clone();
            Box::pin(async move {
                run_tick(name, &sweeps, &busy).await;
            })
        })
        .map_err(|e| AppError::Validation(format!("Bad cron expression: {}", e)))?;

        let handle = self
            .inner
            .add(job)
            .await
            .map_err(|e| AppError::External(format!("Failed to schedule job: {}", e)))?;

        entry.handle = Some(handle);
        tracing::info!(job = name.as_str(), schedule = %entry.schedule, "Job started");
        Ok(())
    }

    pub async fn stop(&self, name: JobName) -> Result<()> {
        let mut registry = self.registry.lock().await;
        let entry = registry
            .get_mut(&name)
            .ok_or_else(|| AppError::NotFound(format!("Unknown job: {}", name.as_str())))?;

        if let Some(handle) = entry.handle.take() {
            self.inner
                .remove(&handle)
                .await
                .map_err(|e| AppError::External(format!("Failed to unschedule job: {}", e)))?;
            tracing::info!(job = name.as_str(), "Job stopped");
        }

        Ok(())
    }

    pub async fn start_all(&self) -> Result<()> {
        for name in JobName::all() {
            self.start(name).await?;
        }
        Ok(())
    }

    pub async fn stop_all(&self) -> Result<()> {
        for name in JobName::all() {
            self.stop(name).await?;
        }
        Ok(())
    }

    pub async fn status(&self) -> Vec<JobStatus> {
        let registry = self.registry.lock().await;
        let mut statuses: Vec<JobStatus> = JobName::all()
            .into_iter()
            .filter_map(|name| {
                registry.get(&name).map(|entry| JobStatus {
                    name: name.as_str(),
                    schedule: entry.schedule.clone(),
                    running: entry.handle.is_some(),
                })
            })
            .collect();
        statuses.sort_by_key(|s| s.name);
        statuses
    }

    /// Run one job synchronously, outside its timer. Shares the tick path the
    /// cron trigger uses, including the overlap guard.
    pub async fn run_now(&self, name: JobName) -> Result<Option<SweepReport>> {
        let busy = {
            let registry = self.registry.lock().await;
            registry
                .get(&name)
                .ok_or_else(|| AppError::NotFound(format!("Unknown job: {}", name.as_str())))?
                .busy
                .clone()
        };

        execute_sweep(name, &self.sweeps, &busy).await
    }
}

/// Cron-side wrapper: a tick never propagates an error into the scheduler.
async fn run_tick(name: JobName, sweeps: &SweepService, busy: &AtomicBool) {
    match execute_sweep(name, sweeps, busy).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            tracing::warn!(job = name.as_str(), "Previous tick still running, skipping");
        }
        Err(e) => {
            tracing::error!(job = name.as_str(), error = %e, "Job tick failed");
        }
    }
}

/// Clears the busy flag when the tick finishes, including when the tick
/// future is dropped at an await point; a cancelled sweep must not leave the
/// job permanently skipping.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Shared sweep entry point for timer ticks and `run_now`. Returns `None`
/// when the overlap guard rejected the run.
async fn execute_sweep(
    name: JobName,
    sweeps: &SweepService,
    busy: &AtomicBool,
) -> Result<Option<SweepReport>> {
    if busy
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Ok(None);
    }
    let _guard = BusyGuard(busy);

    let result = match name {
        JobName::ExpirySweep => sweeps.run_expiry_sweep(Utc::now()).await,
        JobName::ExpiryNotice => sweeps.run_notification_sweep(Utc::now()).await,
    };

    result.map(Some)
}
