// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webhook event intake: merges each notification into at most one pending
//! record per activity.

use crate::db::Store;
use crate::error::{AppError, Result};
use crate::models::pending::{coalesce, Aspect, CoalesceAction, PendingChangeEvent};
use std::sync::Arc;

/// Attempts per notification when the transaction loses a conflict.
const MAX_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct EventIntake {
    store: Arc<dyn Store>,
}

impl EventIntake {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Record a change notification, coalescing it with any pending record
    /// for the same activity. Returns the action applied.
    ///
    /// A transaction that fails against the database (for example because a
    /// concurrent drain touched the same record) is retried from scratch.
    pub async fn ingest(
        &self,
        activity_id: u64,
        owner_athlete_id: u64,
        aspect: Aspect,
        observed_at: i64,
    ) -> Result<CoalesceAction> {
        let mut attempt = 1;
        loop {
            match self
                .try_ingest(activity_id, owner_athlete_id, aspect, observed_at)
                .await
            {
                Err(AppError::Database(e)) if attempt < MAX_ATTEMPTS => {
                    tracing::warn!(
                        error = %e,
                        activity_id,
                        attempt,
                        "Retrying change notification"
                    );
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn try_ingest(
        &self,
        activity_id: u64,
        owner_athlete_id: u64,
        aspect: Aspect,
        observed_at: i64,
    ) -> Result<CoalesceAction> {
        let mut tx = self.store.begin().await?;

        let existing = tx.get_pending_event(activity_id).await?;
        let action = coalesce(existing.as_ref().map(|e| e.aspect), aspect);

        match (action, existing) {
            (CoalesceAction::Insert, _) => tx.put_pending_event(PendingChangeEvent {
                activity_id,
                owner_athlete_id,
                aspect,
                received_at: observed_at,
            }),
            (CoalesceAction::Remove, _) => tx.delete_pending_event(activity_id),
            (CoalesceAction::RewriteToDelete, Some(existing)) => {
                tx.put_pending_event(PendingChangeEvent {
                    aspect: Aspect::Delete,
                    ..existing
                })
            }
            (CoalesceAction::RewriteToDelete, None) | (CoalesceAction::Keep, _) => {}
        }

        tx.commit().await?;

        tracing::debug!(
            activity_id,
            athlete_id = owner_athlete_id,
            aspect = %aspect,
            action = ?action,
            "Change notification recorded"
        );

        Ok(action)
    }
}
