//! # Recurring jobs
//!
//! A [`Scheduler`] runs each registered [`Job`] on its own fixed interval in
//! its own task. Runs of the same job never overlap: the periodic tick and
//! any on-demand [`JobTrigger::run_now`] share one lock per job. A failed run
//! is logged and the job simply waits for its next tick.

pub mod housekeeping;

pub use housekeeping::*;

use crate::engine::StatusSweep;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// A unit of recurring work.
#[async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self) -> Result<()>;
}

#[async_trait]
impl Job for StatusSweep {
    fn name(&self) -> &str {
        "status_sweep"
    }

    async fn run(&self) -> Result<()> {
        self.run_once().await.map(|_| ())
    }
}

struct SerializedJob {
    job: Arc<dyn Job>,
    lock: Mutex<()>,
    runs: AtomicU64,
    failures: AtomicU64,
}

impl SerializedJob {
    async fn run(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        let started = Instant::now();
        let result = self.job.run().await;
        self.runs.fetch_add(1, Ordering::Relaxed);
        match &result {
            Ok(()) => debug!(job = self.job.name(), elapsed_ms = started.elapsed().as_millis() as u64, "Job run finished"),
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!(job = self.job.name(), error = %e, "Job run failed");
            }
        }
        result
    }
}

/// Cloneable handle for running a scheduled job outside its timer.
#[derive(Clone)]
pub struct JobTrigger {
    inner: Arc<SerializedJob>,
}

impl JobTrigger {
    /// Wraps `job` without scheduling it; see [`Scheduler::schedule`].
    pub fn new(job: Arc<dyn Job>) -> Self {
        Self {
            inner: Arc::new(SerializedJob {
                job,
                lock: Mutex::new(()),
                runs: AtomicU64::new(0),
                failures: AtomicU64::new(0),
            }),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.job.name()
    }

    /// Runs the job now, waiting for any in-flight run to finish first.
    pub async fn run_now(&self) -> Result<()> {
        self.inner.run().await
    }

    /// Holds the job's lock, so no run starts until the guard is dropped.
    pub(crate) async fn exclusive(&self) -> MutexGuard<'_, ()> {
        self.inner.lock.lock().await
    }

    /// Completed runs, including failed ones.
    pub fn runs(&self) -> u64 {
        self.inner.runs.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.inner.failures.load(Ordering::Relaxed)
    }
}

struct JobHandle {
    name: String,
    task: JoinHandle<()>,
}

pub struct Scheduler {
    shutdown: watch::Sender<bool>,
    jobs: Vec<JobHandle>,
}

impl Scheduler {
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            shutdown,
            jobs: Vec::new(),
        }
    }

    /// Starts `job` on a fixed `interval`. The first run happens immediately.
    pub fn spawn(&mut self, job: Arc<dyn Job>, interval: Duration) -> JobTrigger {
        let trigger = JobTrigger::new(job);
        self.schedule(trigger.clone(), interval);
        trigger
    }

    /// Runs an existing trigger's job on a fixed `interval`.
    ///
    /// Ticks missed while a run is still in progress are skipped rather than
    /// queued.
    pub fn schedule(&mut self, runner: JobTrigger, interval: Duration) {
        let name = runner.name().to_string();
        let mut shutdown = self.shutdown.subscribe();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        // Errors are already logged by the runner.
                        let _ = runner.run_now().await;
                    }
                    _ = shutdown.changed() => break,
                }
            }
            debug!(job = runner.name(), "Job loop stopped");
        });

        info!(job = %name, interval_secs = interval.as_secs(), "Job scheduled");
        self.jobs.push(JobHandle { name, task });
    }

    pub fn job_names(&self) -> Vec<&str> {
        self.jobs.iter().map(|j| j.name.as_str()).collect()
    }

    /// Stops every job loop. A run already in progress is allowed to finish.
    pub async fn shutdown(self) -> Result<()> {
        info!(jobs = self.jobs.len(), "Stopping scheduler");
        let _ = self.shutdown.send(true);
        for job in self.jobs {
            job.task.await?;
            debug!(job = %job.name, "Job stopped");
        }
        Ok(())
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingJob {
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Job for CountingJob {
        fn name(&self) -> &str {
            "counting"
        }

        async fn run(&self) -> Result<()> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(1)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(EngineError::Job {
                    job: "counting".into(),
                    reason: "boom".into(),
                });
            }
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn runs_on_each_tick_until_shutdown() {
        let job = Arc::new(CountingJob::default());
        let mut scheduler = Scheduler::new();
        let trigger = scheduler.spawn(job.clone(), Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(35)).await;
        scheduler.shutdown().await.unwrap();

        // Ticks at 0, 10, 20 and 30 seconds.
        assert_eq!(job.calls.load(Ordering::SeqCst), 4);
        assert_eq!(trigger.runs(), 4);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(job.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_job_keeps_its_schedule() {
        let job = Arc::new(CountingJob {
            fail: true,
            ..CountingJob::default()
        });
        let mut scheduler = Scheduler::new();
        let trigger = scheduler.spawn(job.clone(), Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(25)).await;
        scheduler.shutdown().await.unwrap();

        assert_eq!(trigger.failures(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn runs_of_one_job_never_overlap() {
        let job = Arc::new(CountingJob::default());
        let mut scheduler = Scheduler::new();
        let trigger = scheduler.spawn(job.clone(), Duration::from_secs(3600));

        let (a, b, c) = tokio::join!(trigger.run_now(), trigger.run_now(), trigger.run_now());
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(job.max_in_flight.load(Ordering::SeqCst), 1);

        scheduler.shutdown().await.unwrap();
    }
}
