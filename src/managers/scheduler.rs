//! Scheduler - polls the job store and dispatches due jobs
//!
//! One loop ticks every `tick_seconds`. Each due job runs on a blocking worker;
//! a job still in flight on this scheduler is skipped for that minute, never
//! queued. A `running` slot in the store is left to the executor: it rejects the
//! run while another process holds the job lock and recovers the slot otherwise.

use crate::error::{BackupError, Result};
use crate::jobs::{BackupJob, BackupRun, JobId};
use crate::managers::backup::BackupExecutor;
use crate::store::JobStore;
use chrono::{Duration as ChronoDuration, Local, NaiveDateTime, Timelike};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Minutes looked back when ticks were delayed (suspend, slow store)
const MAX_CATCH_UP_MINUTES: i64 = 10;

/// Something that can run a job to completion
pub trait JobRunner: Send + Sync {
    fn run_job(&self, job_id: JobId) -> Result<BackupRun>;
}

impl JobRunner for BackupExecutor {
    fn run_job(&self, job_id: JobId) -> Result<BackupRun> {
        self.execute(job_id)
    }
}

/// Removes a job from the in-flight set when the worker finishes
struct InFlightGuard {
    set: Arc<Mutex<HashSet<JobId>>>,
    job_id: JobId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.lock().remove(&self.job_id);
    }
}

pub struct Scheduler {
    store: Arc<dyn JobStore>,
    runner: Arc<dyn JobRunner>,
    tick: Duration,
    in_flight: Arc<Mutex<HashSet<JobId>>>,
    last_fired: HashMap<JobId, NaiveDateTime>,
    last_tick: Option<NaiveDateTime>,
}

impl Scheduler {
    pub fn new(store: Arc<dyn JobStore>, runner: Arc<dyn JobRunner>, tick: Duration) -> Self {
        Self {
            store,
            runner,
            tick,
            in_flight: Arc::default(),
            last_fired: HashMap::new(),
            last_tick: None,
        }
    }

    /// Jobs currently executing on a worker
    pub fn in_flight(&self) -> Vec<JobId> {
        self.in_flight.lock().iter().copied().collect()
    }

    /// Minutes to evaluate for a tick at `now`, oldest first
    fn minutes_to_check(&self, now: NaiveDateTime) -> Vec<NaiveDateTime> {
        let current = truncate_to_minute(now);
        let first = match self.last_tick {
            Some(prev) if prev < current => {
                let earliest = current - ChronoDuration::minutes(MAX_CATCH_UP_MINUTES);
                (prev + ChronoDuration::minutes(1)).max(earliest)
            }
            _ => current,
        };

        let mut minutes = Vec::new();
        let mut minute = first;
        while minute <= current {
            minutes.push(minute);
            minute += ChronoDuration::minutes(1);
        }
        minutes
    }

    /// Select the jobs to dispatch for a tick at `now` (local time).
    ///
    /// A job is selected at most once per matching minute, however many ticks
    /// fall inside that minute.
    pub fn due_jobs(&mut self, now: NaiveDateTime) -> Result<Vec<BackupJob>> {
        let minutes = self.minutes_to_check(now);
        self.last_tick = minutes.last().copied();

        let mut due = Vec::new();
        for job in self.store.scheduled_jobs()? {
            let Some(schedule) = &job.schedule else {
                continue;
            };
            let Some(minute) = minutes.iter().rev().find(|m| schedule.matches(m)).copied() else {
                continue;
            };
            if self.last_fired.get(&job.id).is_some_and(|fired| *fired >= minute) {
                continue;
            }
            self.last_fired.insert(job.id, minute);

            if self.in_flight.lock().contains(&job.id) {
                warn!(
                    "Job {} ('{}') is still running, skipping run for {}",
                    job.id, job.name, minute
                );
                continue;
            }
            due.push(job);
        }
        Ok(due)
    }

    /// Evaluate schedules at `now` and dispatch due jobs on blocking workers.
    /// Must be called from within a tokio runtime.
    pub fn tick(&mut self, now: NaiveDateTime) -> Result<Vec<JobId>> {
        let due = self.due_jobs(now)?;
        let mut dispatched = Vec::with_capacity(due.len());

        for job in due {
            if !self.in_flight.lock().insert(job.id) {
                continue;
            }
            let guard = InFlightGuard {
                set: self.in_flight.clone(),
                job_id: job.id,
            };
            let runner = self.runner.clone();

            info!("Dispatching scheduled job {} ('{}')", job.id, job.name);
            tokio::task::spawn_blocking(move || {
                let _guard = guard;
                match runner.run_job(job.id) {
                    Ok(run) => debug!("Scheduled job {} finished: {}", job.id, run.status),
                    Err(BackupError::AlreadyRunning(id)) => {
                        warn!("Job {} is running in another process, skipping this run", id)
                    }
                    Err(e) => error!("Scheduled job {} did not run: {}", job.id, e),
                }
            });
            dispatched.push(job.id);
        }
        Ok(dispatched)
    }

    /// Poll until `shutdown` resolves. Tick failures are logged and never stop the loop.
    pub async fn run<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!("Scheduler started (tick every {}s)", self.tick.as_secs());

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Scheduler stopping");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.tick(Local::now().naive_local()) {
                        error!("Scheduler tick failed: {}", e);
                    }
                }
            }
        }

        let running = self.in_flight();
        if !running.is_empty() {
            info!("Waiting for {} in-flight job(s) to finish", running.len());
        }
        Ok(())
    }
}

fn truncate_to_minute(t: NaiveDateTime) -> NaiveDateTime {
    t.with_second(0).and_then(|t| t.with_nanosecond(0)).unwrap_or(t)
}
