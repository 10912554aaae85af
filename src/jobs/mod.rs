use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::lock::LockProvider;
use crate::metrics::Metrics;

// ============================================================================
// Scheduled Jobs
// ============================================================================
//
// Both jobs (order advancement, outbox dispatch) run on independent fixed
// periods. Every invocation first acquires the job's named distributed lock;
// losing the acquisition is a normal skip under multi-instance deployment.
// The job body is a plain async fn, testable without a timer.
//
// ============================================================================

pub const PROCESS_NEW_ORDERS_LOCK: &str = "processNewOrders";
pub const PUBLISH_ORDER_EVENTS_LOCK: &str = "publishOrderEvents";

#[derive(Clone, Debug)]
pub struct JobConfig {
    pub name: &'static str,
    pub period: Duration,
    /// Upper bound on how long the lock lease outlives an acquisition; a
    /// safety bound against crashed holders, not a kill signal for the body.
    pub max_hold: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Skipped,
    Failed,
}

impl JobOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobOutcome::Completed => "completed",
            JobOutcome::Skipped => "skipped",
            JobOutcome::Failed => "failed",
        }
    }
}

/// Run one job invocation under the distributed lock.
pub async fn run_guarded<F, Fut>(config: &JobConfig, lock: &dyn LockProvider, body: F) -> JobOutcome
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    match lock.try_acquire(config.name, config.max_hold).await {
        Ok(Some(lease)) => {
            tracing::info!(job = config.name, "Running scheduled job");
            let outcome = match body().await {
                Ok(()) => JobOutcome::Completed,
                Err(e) => {
                    tracing::error!(job = config.name, error = %e, "Scheduled job failed");
                    JobOutcome::Failed
                }
            };
            if let Err(e) = lock.release(&lease).await {
                tracing::warn!(
                    job = config.name,
                    error = %e,
                    "Failed to release job lock; lease will expire on its own"
                );
            }
            outcome
        }
        Ok(None) => {
            // Another instance holds the lock; expected steady state
            tracing::debug!(job = config.name, "Job lock held elsewhere, skipping run");
            JobOutcome::Skipped
        }
        Err(e) => {
            tracing::error!(job = config.name, error = %e, "Failed to reach lock storage");
            JobOutcome::Failed
        }
    }
}

/// Spawn the periodic loop for one job.
pub fn spawn_periodic<F, Fut>(
    config: JobConfig,
    lock: Arc<dyn LockProvider>,
    metrics: Arc<Metrics>,
    body: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let outcome = run_guarded(&config, lock.as_ref(), || body()).await;
            metrics
                .job_runs
                .with_label_values(&[config.name, outcome.as_str()])
                .inc();
        }
    })
}
