// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Removes local activities past the retention window.

use crate::db::Store;
use crate::error::Result;
use crate::services::scheduler::ScheduledJob;
use crate::time_utils::now_unix;
use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use std::sync::Arc;

const SECS_PER_DAY: i64 = 24 * 60 * 60;
const MAX_CONCURRENT_DELETES: usize = 10;

pub struct OldActivityCleaner {
    store: Arc<dyn Store>,
    retain_days: i64,
}

impl OldActivityCleaner {
    pub fn new(store: Arc<dyn Store>, retain_days: i64) -> Self {
        Self { store, retain_days }
    }

    /// Delete activities that started `retain_days` or more before `now`.
    /// Returns the number deleted. Journey progress is left untouched.
    pub async fn clean_at(&self, now: i64) -> Result<usize> {
        let cutoff = now - self.retain_days * SECS_PER_DAY;
        let activities = self.store.list_activities_started_before(cutoff).await?;

        let results: Vec<(u64, Result<()>)> = stream::iter(activities)
            .map(|activity| async move {
                let result = async {
                    let mut tx = self.store.begin().await?;
                    tx.delete_activity(activity.id);
                    tx.commit().await
                }
                .await;
                (activity.id, result)
            })
            .buffer_unordered(MAX_CONCURRENT_DELETES)
            .collect()
            .await;

        let mut deleted = 0;
        for (activity_id, result) in results {
            match result {
                Ok(()) => deleted += 1,
                Err(e) => tracing::warn!(error = %e, activity_id, "Failed to delete old activity"),
            }
        }

        if deleted > 0 {
            tracing::info!(deleted, cutoff, "Deleted old activities");
        }
        Ok(deleted)
    }
}

#[async_trait]
impl ScheduledJob for OldActivityCleaner {
    fn name(&self) -> &'static str {
        "delete_old_activities"
    }

    async fn run(&self) {
        if let Err(e) = self.clean_at(now_unix()).await {
            tracing::error!(error = %e, "Failed to list old activities");
        }
    }
}
