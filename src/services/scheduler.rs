// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Recurring job scheduler.
//!
//! Runs its jobs one after another, then waits a full period before the next
//! run. A slow run delays the next one; runs never overlap and missed ticks
//! are not made up.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// A unit of periodic work. Jobs report their own failures.
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self);
}

pub struct Scheduler {
    period: Duration,
    jobs: Vec<Arc<dyn ScheduledJob>>,
}

impl Scheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            jobs: Vec::new(),
        }
    }

    /// Jobs run in the order they were added.
    pub fn add_job(mut self, job: Arc<dyn ScheduledJob>) -> Self {
        self.jobs.push(job);
        self
    }

    /// Spawn the scheduler loop. The first run happens one period from now.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let Scheduler { period, jobs } = self;

        tracing::info!(
            period_secs = period.as_secs(),
            jobs = jobs.len(),
            "Scheduler started"
        );

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = tokio::time::sleep(period) => {}
                }

                for job in &jobs {
                    tracing::debug!(job = job.name(), "Running scheduled job");
                    job.run().await;
                }
            }
            tracing::info!("Scheduler stopped");
        });

        SchedulerHandle { shutdown_tx, task }
    }
}

/// Handle to a running scheduler.
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop scheduling new runs and wait for an in-flight run to finish.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Scheduler task failed");
        }
    }
}
