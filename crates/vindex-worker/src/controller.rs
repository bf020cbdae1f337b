//! Job controller: the worker's top-level loop.
//!
//! Claims jobs, runs the pipeline and translates each outcome into queue
//! bookkeeping. On an empty queue the poll interval backs off
//! exponentially up to a cap. A shutdown signal stops claiming; the
//! in-flight job gets a bounded grace period and is restored to `pending`
//! if it cannot finish in time.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use vindex_db::JobSource;
use vindex_models::ClaimedJob;

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::pipeline::{run_pipeline, with_store_retry, PipelineContext};

/// Controller tuning, derived from the worker configuration.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub poll_interval: Duration,
    pub max_attempts: i32,
    pub backoff_multiplier: f64,
    pub max_backoff: Duration,
    pub shutdown_grace: Duration,
}

impl ControllerConfig {
    pub fn from_worker(config: &WorkerConfig) -> Self {
        Self {
            poll_interval: config.poll_interval,
            max_attempts: config.max_attempts,
            backoff_multiplier: config.backoff_multiplier,
            max_backoff: config.max_backoff,
            shutdown_grace: config.shutdown_grace,
        }
    }
}

pub struct JobController {
    source: Arc<dyn JobSource>,
    ctx: Arc<PipelineContext>,
    config: ControllerConfig,
    shutdown: watch::Sender<bool>,
    worker_id: String,
}

impl JobController {
    pub fn new(
        source: Arc<dyn JobSource>,
        ctx: Arc<PipelineContext>,
        config: ControllerConfig,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            source,
            ctx,
            config,
            shutdown,
            worker_id: format!("worker-{}", Uuid::new_v4()),
        }
    }

    /// Signal shutdown: stop claiming, drain the in-flight job.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Run the claim loop until shutdown.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(worker_id = %self.worker_id, "Worker started, polling for jobs");
        let mut shutdown_rx = self.shutdown.subscribe();
        let mut backoff = Backoff::new(&self.config);

        loop {
            if *shutdown_rx.borrow() {
                break;
            }
            match self.run_once().await {
                Ok(true) => backoff.reset(),
                Ok(false) => {
                    if sleep_interrupted(backoff.next_delay(), &mut shutdown_rx).await {
                        break;
                    }
                }
                Err(e) if e.is_retryable() => {
                    warn!("Claim failed, backing off: {e}");
                    if sleep_interrupted(backoff.next_delay(), &mut shutdown_rx).await {
                        break;
                    }
                }
                Err(e) => {
                    error!("Unrecoverable worker loop error: {e}");
                    return Err(e);
                }
            }
        }

        info!(worker_id = %self.worker_id, "Worker stopped claiming, shutdown complete");
        Ok(())
    }

    /// One loop iteration: claim a job and execute it.
    ///
    /// Returns `Ok(true)` when a job was processed, `Ok(false)` when the
    /// queue was empty.
    pub async fn run_once(&self) -> WorkerResult<bool> {
        let Some(job) = self.source.claim_next_job().await? else {
            return Ok(false);
        };
        info!(
            job_id = %job.job_id,
            video_id = %job.video_id,
            attempts = job.attempts,
            worker_id = %self.worker_id,
            milestone = "CLAIMED",
            "Claimed job"
        );
        self.execute_job(&job).await?;
        Ok(true)
    }

    /// Run the pipeline for one claimed job and record its outcome.
    async fn execute_job(&self, job: &ClaimedJob) -> WorkerResult<()> {
        let mut shutdown_rx = self.shutdown.subscribe();
        let grace = self.config.shutdown_grace;

        let pipeline = run_pipeline(&self.ctx, &job.job_id, &job.video_id);
        tokio::pin!(pipeline);

        let outcome = tokio::select! {
            result = &mut pipeline => Some(result),
            _ = shutdown_grace_elapsed(&mut shutdown_rx, grace) => None,
        };

        match outcome {
            Some(Ok(())) => {
                with_store_retry("complete_job", || {
                    self.source.complete_job(&job.job_id, &job.video_id)
                })
                .await?;
                info!(job_id = %job.job_id, video_id = %job.video_id, milestone = "READY", "Job complete");
            }
            Some(Err(e)) if e.is_retryable() && job.attempts < self.config.max_attempts => {
                let message = format!("attempt {} failed: {e}", job.attempts);
                warn!(
                    job_id = %job.job_id,
                    video_id = %job.video_id,
                    attempts = job.attempts,
                    max_attempts = self.config.max_attempts,
                    "Job failed, returning to queue: {e}"
                );
                with_store_retry("reset_job", || self.source.reset_job(&job.job_id, &message))
                    .await?;
            }
            Some(Err(e)) => {
                let message = format!("attempt {} failed permanently: {e}", job.attempts);
                error!(
                    job_id = %job.job_id,
                    video_id = %job.video_id,
                    attempts = job.attempts,
                    milestone = "FAILED",
                    "Job failed: {e}"
                );
                with_store_retry("fail_job", || self.source.fail_job(&job.job_id, &message))
                    .await?;
            }
            None => {
                // Shutdown grace expired mid-job. The stages are
                // idempotent, so restoring the row to pending loses no
                // work that was persisted.
                warn!(
                    job_id = %job.job_id,
                    video_id = %job.video_id,
                    "Shutdown grace expired, returning in-flight job to queue"
                );
                with_store_retry("reset_job", || {
                    self.source
                        .reset_job(&job.job_id, "worker shutdown before job completion")
                })
                .await?;
            }
        }
        Ok(())
    }
}

/// Resolves only after shutdown is signaled and the grace period passes.
async fn shutdown_grace_elapsed(rx: &mut watch::Receiver<bool>, grace: Duration) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            // Sender gone without a signal; never resolve.
            std::future::pending::<()>().await;
        }
    }
    tokio::time::sleep(grace).await;
}

/// Sleep, waking early on shutdown. Returns true when shutdown fired.
async fn sleep_interrupted(delay: Duration, rx: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        result = rx.changed() => result.is_err() || *rx.borrow(),
    }
}

/// Exponential idle backoff with a cap.
#[derive(Debug)]
struct Backoff {
    initial: Duration,
    current: Duration,
    multiplier: f64,
    max: Duration,
}

impl Backoff {
    fn new(config: &ControllerConfig) -> Self {
        Self {
            initial: config.poll_interval,
            current: config.poll_interval,
            multiplier: config.backoff_multiplier,
            max: config.max_backoff,
        }
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.mul_f64(self.multiplier).min(self.max);
        delay
    }

    fn reset(&mut self) {
        self.current = self.initial;
    }
}
