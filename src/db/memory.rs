// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory store.
//!
//! A transaction holds the store lock from `begin` until it is committed or
//! dropped, so transactions are fully serialized. Used for tests and for
//! running the service without Firestore.

use crate::db::store::{StagedWrite, Store, StoreTx};
use crate::error::Result;
use crate::models::{
    Activity, Athlete, AthleteSettings, Journey, PendingChangeEvent, StravaCredentials, Waypoint,
};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
struct MemoryState {
    pending_events: HashMap<u64, PendingChangeEvent>,
    athletes: HashMap<u64, Athlete>,
    settings: HashMap<u64, AthleteSettings>,
    activities: HashMap<u64, Activity>,
    /// Keyed by `Journey::doc_id`
    journeys: HashMap<String, Journey>,
    waypoints: HashMap<u64, Waypoint>,
}

impl MemoryState {
    fn apply(&mut self, write: StagedWrite, credentials: &DashMap<u64, StravaCredentials>) {
        match write {
            StagedWrite::PutPendingEvent(event) => {
                self.pending_events.insert(event.activity_id, event);
            }
            StagedWrite::DeletePendingEvent(id) => {
                self.pending_events.remove(&id);
            }
            StagedWrite::PutActivity(activity) => {
                self.activities.insert(activity.id, activity);
            }
            StagedWrite::DeleteActivity(id) => {
                self.activities.remove(&id);
            }
            StagedWrite::PutJourney(journey) => {
                self.journeys.insert(journey.doc_id(), journey);
            }
            StagedWrite::PutAthlete(athlete) => {
                self.athletes.insert(athlete.id, athlete);
            }
            StagedWrite::DeleteAthlete(id) => {
                self.athletes.remove(&id);
                self.settings.remove(&id);
                credentials.remove(&id);
            }
            StagedWrite::PutSettings(settings) => {
                self.settings.insert(settings.athlete_id, settings);
            }
            StagedWrite::PutWaypoint(waypoint) => {
                self.waypoints.insert(waypoint.id, waypoint);
            }
        }
    }
}

/// In-memory store with serializable transactions.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    credentials: Arc<DashMap<u64, StravaCredentials>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Inspection helpers (tests, admin tooling) ───────────────

    pub async fn pending_event(&self, activity_id: u64) -> Option<PendingChangeEvent> {
        self.state
            .lock()
            .await
            .pending_events
            .get(&activity_id)
            .cloned()
    }

    pub async fn activity(&self, activity_id: u64) -> Option<Activity> {
        self.state.lock().await.activities.get(&activity_id).cloned()
    }

    pub async fn journeys_for(&self, athlete_id: u64) -> Vec<Journey> {
        self.state
            .lock()
            .await
            .journeys
            .values()
            .filter(|j| j.athlete_id == athlete_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        let guard = self.state.clone().lock_owned().await;
        Ok(Box::new(MemoryTx {
            state: guard,
            credentials: self.credentials.clone(),
            writes: Vec::new(),
        }))
    }

    async fn list_pending_events(&self) -> Result<Vec<PendingChangeEvent>> {
        let state = self.state.lock().await;
        let mut events: Vec<PendingChangeEvent> = state.pending_events.values().cloned().collect();
        events.sort_by_key(|e| (e.received_at, e.activity_id));
        Ok(events)
    }

    async fn list_activities_started_before(&self, cutoff: i64) -> Result<Vec<Activity>> {
        let state = self.state.lock().await;
        let mut activities: Vec<Activity> = state
            .activities
            .values()
            .filter(|a| a.start_time <= cutoff)
            .cloned()
            .collect();
        activities.sort_by_key(|a| (a.start_time, a.id));
        Ok(activities)
    }

    async fn get_credentials(&self, athlete_id: u64) -> Result<Option<StravaCredentials>> {
        Ok(self.credentials.get(&athlete_id).map(|c| c.clone()))
    }

    async fn set_credentials(
        &self,
        athlete_id: u64,
        credentials: &StravaCredentials,
    ) -> Result<()> {
        self.credentials.insert(athlete_id, credentials.clone());
        Ok(())
    }
}

/// Transaction over the locked in-memory state.
struct MemoryTx {
    state: OwnedMutexGuard<MemoryState>,
    credentials: Arc<DashMap<u64, StravaCredentials>>,
    writes: Vec<StagedWrite>,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn get_pending_event(&self, activity_id: u64) -> Result<Option<PendingChangeEvent>> {
        Ok(self.state.pending_events.get(&activity_id).cloned())
    }

    async fn get_athlete(&self, athlete_id: u64) -> Result<Option<Athlete>> {
        Ok(self.state.athletes.get(&athlete_id).cloned())
    }

    async fn get_settings(&self, athlete_id: u64) -> Result<Option<AthleteSettings>> {
        Ok(self.state.settings.get(&athlete_id).cloned())
    }

    async fn get_activity(&self, activity_id: u64) -> Result<Option<Activity>> {
        Ok(self.state.activities.get(&activity_id).cloned())
    }

    async fn get_active_journey(&self, athlete_id: u64) -> Result<Option<Journey>> {
        Ok(self
            .state
            .journeys
            .values()
            .find(|j| j.athlete_id == athlete_id && !j.completed)
            .cloned())
    }

    async fn get_waypoint(&self, waypoint_id: u64) -> Result<Option<Waypoint>> {
        Ok(self.state.waypoints.get(&waypoint_id).cloned())
    }

    fn stage(&mut self, write: StagedWrite) {
        self.writes.push(write);
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTx {
            mut state,
            credentials,
            writes,
        } = *self;
        for write in writes {
            state.apply(write, &credentials);
        }
        Ok(())
    }
}
