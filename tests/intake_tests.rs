// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Event intake coalescing against the in-memory store.

use adventure_tracker::db::{MemoryStore, StagedWrite, Store, StoreTx};
use adventure_tracker::error::{AppError, Result};
use adventure_tracker::models::{
    Activity, Aspect, Athlete, AthleteSettings, CoalesceAction, Journey, PendingChangeEvent,
    StravaCredentials, Waypoint,
};
use adventure_tracker::services::EventIntake;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn intake() -> (EventIntake, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (EventIntake::new(store.clone()), store)
}

#[tokio::test]
async fn test_first_notification_is_stored() {
    let (intake, store) = intake();

    let action = intake.ingest(7, 42, Aspect::Update, 1000).await.unwrap();
    assert_eq!(action, CoalesceAction::Insert);

    assert_eq!(
        store.pending_event(7).await,
        Some(PendingChangeEvent {
            activity_id: 7,
            owner_athlete_id: 42,
            aspect: Aspect::Update,
            received_at: 1000,
        })
    );
}

#[tokio::test]
async fn test_create_then_delete_leaves_nothing() {
    let (intake, store) = intake();

    intake.ingest(7, 42, Aspect::Create, 1000).await.unwrap();
    let action = intake.ingest(7, 42, Aspect::Delete, 1010).await.unwrap();

    assert_eq!(action, CoalesceAction::Remove);
    assert!(store.pending_event(7).await.is_none());
}

#[tokio::test]
async fn test_update_then_delete_becomes_delete() {
    let (intake, store) = intake();

    intake.ingest(7, 42, Aspect::Update, 1000).await.unwrap();
    intake.ingest(7, 42, Aspect::Delete, 1050).await.unwrap();

    let pending = store.pending_event(7).await.unwrap();
    assert_eq!(pending.aspect, Aspect::Delete);
    assert_eq!(pending.received_at, 1000, "keeps first receipt time");
}

#[tokio::test]
async fn test_create_absorbs_later_updates() {
    let (intake, store) = intake();

    intake.ingest(7, 42, Aspect::Create, 1000).await.unwrap();
    for t in [1001, 1002, 1003] {
        let action = intake.ingest(7, 42, Aspect::Update, t).await.unwrap();
        assert_eq!(action, CoalesceAction::Keep);
    }

    let pending = store.pending_event(7).await.unwrap();
    assert_eq!(pending.aspect, Aspect::Create);
    assert_eq!(pending.received_at, 1000);
}

#[tokio::test]
async fn test_duplicate_delivery_is_idempotent() {
    let (intake, store) = intake();

    for aspect in [Aspect::Update, Aspect::Delete] {
        intake.ingest(9, 42, aspect, 2000).await.unwrap();
        let once = store.pending_event(9).await;
        intake.ingest(9, 42, aspect, 2000).await.unwrap();
        assert_eq!(store.pending_event(9).await, once);
    }
}

#[tokio::test]
async fn test_delete_after_cancelled_create_is_recorded() {
    let (intake, store) = intake();

    intake.ingest(7, 42, Aspect::Create, 1000).await.unwrap();
    intake.ingest(7, 42, Aspect::Delete, 1001).await.unwrap();
    intake.ingest(7, 42, Aspect::Delete, 1002).await.unwrap();

    // The second delete finds no record and is stored as given
    assert_eq!(store.pending_event(7).await.unwrap().aspect, Aspect::Delete);
}

#[tokio::test]
async fn test_activities_are_independent() {
    let (intake, store) = intake();

    intake.ingest(1, 42, Aspect::Create, 1000).await.unwrap();
    intake.ingest(2, 42, Aspect::Delete, 1000).await.unwrap();

    assert_eq!(store.pending_event(1).await.unwrap().aspect, Aspect::Create);
    assert_eq!(store.pending_event(2).await.unwrap().aspect, Aspect::Delete);
}

#[tokio::test]
async fn test_concurrent_deliveries_coalesce() {
    let (intake, store) = intake();
    let intake = Arc::new(intake);

    let mut handles = Vec::new();
    for i in 0..20 {
        let intake = intake.clone();
        handles.push(tokio::spawn(async move {
            intake.ingest(5, 42, Aspect::Update, 1000 + i).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(store.list_pending_events().await.unwrap().len(), 1);
}

/// Memory store whose first `conflicts` commits fail the way a Firestore
/// transaction does when a concurrent one wins.
struct ConflictingStore {
    inner: MemoryStore,
    conflicts: Arc<AtomicUsize>,
}

struct ConflictingTx {
    inner: Box<dyn StoreTx>,
    conflicts: Arc<AtomicUsize>,
}

#[async_trait]
impl Store for ConflictingStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        Ok(Box::new(ConflictingTx {
            inner: self.inner.begin().await?,
            conflicts: self.conflicts.clone(),
        }))
    }

    async fn list_pending_events(&self) -> Result<Vec<PendingChangeEvent>> {
        self.inner.list_pending_events().await
    }

    async fn list_activities_started_before(&self, cutoff: i64) -> Result<Vec<Activity>> {
        self.inner.list_activities_started_before(cutoff).await
    }

    async fn get_credentials(&self, athlete_id: u64) -> Result<Option<StravaCredentials>> {
        self.inner.get_credentials(athlete_id).await
    }

    async fn set_credentials(
        &self,
        athlete_id: u64,
        credentials: &StravaCredentials,
    ) -> Result<()> {
        self.inner.set_credentials(athlete_id, credentials).await
    }
}

#[async_trait]
impl StoreTx for ConflictingTx {
    async fn get_pending_event(&self, activity_id: u64) -> Result<Option<PendingChangeEvent>> {
        self.inner.get_pending_event(activity_id).await
    }

    async fn get_athlete(&self, athlete_id: u64) -> Result<Option<Athlete>> {
        self.inner.get_athlete(athlete_id).await
    }

    async fn get_settings(&self, athlete_id: u64) -> Result<Option<AthleteSettings>> {
        self.inner.get_settings(athlete_id).await
    }

    async fn get_activity(&self, activity_id: u64) -> Result<Option<Activity>> {
        self.inner.get_activity(activity_id).await
    }

    async fn get_active_journey(&self, athlete_id: u64) -> Result<Option<Journey>> {
        self.inner.get_active_journey(athlete_id).await
    }

    async fn get_waypoint(&self, waypoint_id: u64) -> Result<Option<Waypoint>> {
        self.inner.get_waypoint(waypoint_id).await
    }

    fn stage(&mut self, write: StagedWrite) {
        self.inner.stage(write);
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let this = *self;
        let lost = this
            .conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if lost {
            return Err(AppError::Database("Transaction aborted".to_string()));
        }
        this.inner.commit().await
    }
}

fn conflicting_intake(conflicts: usize) -> (EventIntake, MemoryStore) {
    let inner = MemoryStore::new();
    let store = Arc::new(ConflictingStore {
        inner: inner.clone(),
        conflicts: Arc::new(AtomicUsize::new(conflicts)),
    });
    (EventIntake::new(store), inner)
}

#[tokio::test]
async fn test_conflicting_commit_is_retried() {
    let (intake, store) = conflicting_intake(2);

    let action = intake.ingest(7, 42, Aspect::Create, 1000).await.unwrap();

    assert_eq!(action, CoalesceAction::Insert);
    assert_eq!(store.pending_event(7).await.unwrap().aspect, Aspect::Create);
}

#[tokio::test]
async fn test_persistent_conflict_gives_up() {
    let (intake, store) = conflicting_intake(3);

    let err = intake.ingest(7, 42, Aspect::Create, 1000).await.unwrap_err();

    assert!(matches!(err, AppError::Database(_)));
    assert!(store.pending_event(7).await.is_none());
}
