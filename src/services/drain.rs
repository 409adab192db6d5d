// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pending-event drain.
//!
//! Handles the reconciliation workflow for each due pending event:
//! 1. Remove the pending record
//! 2. Fetch the activity from Strava (create/update)
//! 3. Insert, update or delete the local activity
//! 4. Apply the change to the athlete's journey
//! 5. Commit, then optionally publish progress to Strava
//!
//! Steps 1-4 share one transaction; any failure leaves the pending record in
//! place for the next run.

use crate::db::{Store, StoreTx};
use crate::error::Result;
use crate::models::{Activity, Aspect, Journey, PendingChangeEvent};
use crate::services::projector::{ActivityChange, ProgressProjector};
use crate::services::publisher::DescriptionPublisher;
use crate::services::scheduler::ScheduledJob;
use crate::services::strava::ActivityProvider;
use crate::time_utils::now_unix;
use async_trait::async_trait;
use std::sync::Arc;

/// What processing a pending event did to the local activity mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Created,
    Updated,
    Deleted,
    /// The pending record was consumed without changing any activity.
    NotProcessed,
}

/// Summary of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Events whose pending record was consumed
    pub processed: usize,
    /// Events still inside the debounce window
    pub not_due: usize,
    /// Events that failed and remain pending
    pub failed: usize,
    /// The pass stopped early on a Strava rate limit
    pub rate_limited: bool,
}

pub struct PendingEventDrain {
    store: Arc<dyn Store>,
    provider: Arc<dyn ActivityProvider>,
    projector: ProgressProjector,
    publisher: DescriptionPublisher,
    supported_sport_types: Vec<String>,
    debounce_secs: i64,
}

impl PendingEventDrain {
    pub fn new(
        store: Arc<dyn Store>,
        provider: Arc<dyn ActivityProvider>,
        projector: ProgressProjector,
        publisher: DescriptionPublisher,
        supported_sport_types: Vec<String>,
        debounce_secs: i64,
    ) -> Self {
        Self {
            store,
            provider,
            projector,
            publisher,
            supported_sport_types,
            debounce_secs,
        }
    }

    /// Process every pending event that is due now.
    pub async fn drain_once(&self) -> Result<DrainReport> {
        self.drain_at(now_unix()).await
    }

    /// Process every pending event that is due at `now`.
    pub async fn drain_at(&self, now: i64) -> Result<DrainReport> {
        let events = self.store.list_pending_events().await?;
        let mut report = DrainReport::default();

        for event in events {
            if !event.is_due(now, self.debounce_secs) {
                report.not_due += 1;
                continue;
            }

            match self.process_one(&event).await {
                Ok(outcome) => {
                    report.processed += 1;
                    tracing::debug!(
                        activity_id = event.activity_id,
                        athlete_id = event.owner_athlete_id,
                        aspect = %event.aspect,
                        outcome = ?outcome,
                        "Pending event processed"
                    );
                }
                Err(e) if e.is_rate_limited() => {
                    tracing::warn!(
                        activity_id = event.activity_id,
                        "Rate limited, leaving remaining events for the next run"
                    );
                    report.rate_limited = true;
                    break;
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        error = %e,
                        activity_id = event.activity_id,
                        athlete_id = event.owner_athlete_id,
                        aspect = %event.aspect,
                        "Failed to process pending event"
                    );
                }
            }
        }

        if report.processed > 0 || report.failed > 0 || report.rate_limited {
            tracing::info!(
                processed = report.processed,
                not_due = report.not_due,
                failed = report.failed,
                rate_limited = report.rate_limited,
                "Drain finished"
            );
        }

        Ok(report)
    }

    /// Reconcile one pending event against Strava.
    ///
    /// The pending record is re-read inside the transaction, so a record that
    /// was coalesced away since it was listed is a no-op.
    pub async fn process_one(&self, event: &PendingChangeEvent) -> Result<ProcessOutcome> {
        let mut tx = self.store.begin().await?;

        let Some(event) = tx.get_pending_event(event.activity_id).await? else {
            return Ok(ProcessOutcome::NotProcessed);
        };
        tx.delete_pending_event(event.activity_id);

        if tx.get_athlete(event.owner_athlete_id).await?.is_none() {
            tracing::info!(
                activity_id = event.activity_id,
                athlete_id = event.owner_athlete_id,
                "Athlete not found, discarding event"
            );
            tx.commit().await?;
            return Ok(ProcessOutcome::NotProcessed);
        }

        let old = tx.get_activity(event.activity_id).await?;
        let (outcome, change) = self.classify(tx.as_mut(), &event, old).await?;

        let progressed = match &change {
            Some(change) => self.projector.project(tx.as_mut(), change).await?,
            None => None,
        };

        tx.commit().await?;

        if let (Some(ActivityChange::Created(activity)), Some(journey)) = (&change, &progressed) {
            self.publish(journey, activity).await;
        }

        Ok(outcome)
    }

    /// Decide and stage the activity mutation for `event`.
    async fn classify(
        &self,
        tx: &mut dyn StoreTx,
        event: &PendingChangeEvent,
        old: Option<Activity>,
    ) -> Result<(ProcessOutcome, Option<ActivityChange>)> {
        if event.aspect == Aspect::Delete {
            return Ok(match old {
                Some(old) => {
                    tx.delete_activity(old.id);
                    (ProcessOutcome::Deleted, Some(ActivityChange::Deleted(old)))
                }
                None => (ProcessOutcome::NotProcessed, None),
            });
        }

        let new = self
            .provider
            .fetch_activity(event.owner_athlete_id, event.activity_id)
            .await?;
        let allowed = self.supported_sport_types.contains(&new.sport_type);

        Ok(match (allowed, old, event.aspect) {
            (true, Some(old), Aspect::Update) => {
                tx.put_activity(new.clone());
                (
                    ProcessOutcome::Updated,
                    Some(ActivityChange::Updated { old, new }),
                )
            }
            (true, None, Aspect::Create) => {
                tx.put_activity(new.clone());
                (ProcessOutcome::Created, Some(ActivityChange::Created(new)))
            }
            (false, Some(old), Aspect::Update) => {
                tracing::info!(
                    activity_id = old.id,
                    sport_type = %new.sport_type,
                    "Activity no longer a supported sport, removing"
                );
                tx.delete_activity(old.id);
                (ProcessOutcome::Deleted, Some(ActivityChange::Deleted(old)))
            }
            _ => (ProcessOutcome::NotProcessed, None),
        })
    }

    async fn publish(&self, journey: &Journey, activity: &Activity) {
        if let Err(e) = self.publisher.publish(journey, activity).await {
            tracing::warn!(
                error = %e,
                athlete_id = journey.athlete_id,
                activity_id = activity.id,
                "Failed to publish journey progress"
            );
        }
    }
}

#[async_trait]
impl ScheduledJob for PendingEventDrain {
    fn name(&self) -> &'static str {
        "drain_pending_events"
    }

    async fn run(&self) {
        if let Err(e) = self.drain_once().await {
            tracing::error!(error = %e, "Failed to list pending events");
        }
    }
}
