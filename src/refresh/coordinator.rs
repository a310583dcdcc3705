//! Background execution of the refresh job
//!
//! The admin endpoint answers immediately; the job itself can take minutes.
//! At most one run is active per process.

use super::{Caller, InitializeOutcome, RefreshJob, RefreshReport};
use crate::error::GatewayResult;
use crate::logging::log_error;
use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerStatus {
    Started,
    Skipped,
    #[serde(rename = "running")]
    AlreadyRunning,
}

impl TriggerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Skipped => "skipped",
            Self::AlreadyRunning => "running",
        }
    }
}

#[derive(Debug)]
pub struct RefreshCoordinator {
    job: Arc<RefreshJob>,
    running: Arc<AtomicBool>,
    last_report: Arc<Mutex<Option<RefreshReport>>>,
}

/// Clears the running flag when the background task ends, including on panic
struct RunningFlag(Arc<AtomicBool>);

impl Drop for RunningFlag {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl RefreshCoordinator {
    pub fn new(job: Arc<RefreshJob>) -> Self {
        Self {
            job,
            running: Arc::new(AtomicBool::new(false)),
            last_report: Arc::new(Mutex::new(None)),
        }
    }

    pub fn job(&self) -> &Arc<RefreshJob> {
        &self.job
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn last_report(&self) -> Option<RefreshReport> {
        self.last_report.lock().clone()
    }

    /// Authorize, then start the job in the background unless one is active
    /// or the current month is already populated (and `force` is off).
    pub async fn trigger(&self, caller: &Caller, force: bool) -> GatewayResult<TriggerStatus> {
        caller.require_admin("cache initialization")?;

        let month = super::month_of(Utc::now());
        if !force && self.job.is_populated(&month).await {
            info!(month = %month, "Cache already initialized, not starting refresh");
            return Ok(TriggerStatus::Skipped);
        }

        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(TriggerStatus::AlreadyRunning);
        }

        let flag = RunningFlag(Arc::clone(&self.running));
        let job = Arc::clone(&self.job);
        let last_report = Arc::clone(&self.last_report);
        let caller = caller.clone();

        tokio::spawn(async move {
            let _flag = flag;
            // Populated check already ran above, so go straight to the run
            match job.initialize_cache(&caller, true).await {
                Ok(InitializeOutcome::Refreshed(report)) => {
                    *last_report.lock() = Some(report);
                }
                Ok(InitializeOutcome::Skipped { .. }) => {}
                Err(e) => log_error("refresh", "background_run", &e.to_string(), None),
            }
        });

        Ok(TriggerStatus::Started)
    }
}
