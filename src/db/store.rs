// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Storage traits shared by the Firestore and in-memory backends.
//!
//! Every mutation goes through a [`StoreTx`]: reads observe committed state,
//! writes are staged on the transaction and become visible together on
//! [`StoreTx::commit`]. Dropping a transaction without committing discards
//! its staged writes.

use crate::error::Result;
use crate::models::{
    Activity, Athlete, AthleteSettings, Journey, PendingChangeEvent, StravaCredentials, Waypoint,
};
use async_trait::async_trait;

/// A write recorded on a transaction, applied on commit.
#[derive(Debug, Clone)]
pub enum StagedWrite {
    PutPendingEvent(PendingChangeEvent),
    DeletePendingEvent(u64),
    PutActivity(Activity),
    DeleteActivity(u64),
    PutJourney(Journey),
    PutAthlete(Athlete),
    /// Removes the athlete with their settings and credentials
    DeleteAthlete(u64),
    PutSettings(AthleteSettings),
    PutWaypoint(Waypoint),
}

/// Persistence backend.
#[async_trait]
pub trait Store: Send + Sync {
    /// Open a transaction.
    async fn begin(&self) -> Result<Box<dyn StoreTx>>;

    /// All pending events, oldest first (ties broken by activity ID).
    async fn list_pending_events(&self) -> Result<Vec<PendingChangeEvent>>;

    /// Activities that started at or before `cutoff` (unix seconds).
    async fn list_activities_started_before(&self, cutoff: i64) -> Result<Vec<Activity>>;

    /// Credentials are read and refreshed outside transactions, since token
    /// refresh happens while a drain transaction is open. They are removed
    /// transactionally by [`StagedWrite::DeleteAthlete`].
    async fn get_credentials(&self, athlete_id: u64) -> Result<Option<StravaCredentials>>;

    async fn set_credentials(&self, athlete_id: u64, credentials: &StravaCredentials)
        -> Result<()>;
}

/// An open transaction.
#[async_trait]
pub trait StoreTx: Send + Sync {
    async fn get_pending_event(&self, activity_id: u64) -> Result<Option<PendingChangeEvent>>;

    async fn get_athlete(&self, athlete_id: u64) -> Result<Option<Athlete>>;

    async fn get_settings(&self, athlete_id: u64) -> Result<Option<AthleteSettings>>;

    async fn get_activity(&self, activity_id: u64) -> Result<Option<Activity>>;

    /// The athlete's single non-completed journey, if any.
    async fn get_active_journey(&self, athlete_id: u64) -> Result<Option<Journey>>;

    async fn get_waypoint(&self, waypoint_id: u64) -> Result<Option<Waypoint>>;

    /// Record a write to be applied on commit.
    fn stage(&mut self, write: StagedWrite);

    /// Apply all staged writes atomically.
    async fn commit(self: Box<Self>) -> Result<()>;

    fn put_pending_event(&mut self, event: PendingChangeEvent) {
        self.stage(StagedWrite::PutPendingEvent(event));
    }

    fn delete_pending_event(&mut self, activity_id: u64) {
        self.stage(StagedWrite::DeletePendingEvent(activity_id));
    }

    fn put_activity(&mut self, activity: Activity) {
        self.stage(StagedWrite::PutActivity(activity));
    }

    fn delete_activity(&mut self, activity_id: u64) {
        self.stage(StagedWrite::DeleteActivity(activity_id));
    }

    fn put_journey(&mut self, journey: Journey) {
        self.stage(StagedWrite::PutJourney(journey));
    }

    fn put_athlete(&mut self, athlete: Athlete) {
        self.stage(StagedWrite::PutAthlete(athlete));
    }

    fn delete_athlete(&mut self, athlete_id: u64) {
        self.stage(StagedWrite::DeleteAthlete(athlete_id));
    }

    fn put_settings(&mut self, settings: AthleteSettings) {
        self.stage(StagedWrite::PutSettings(settings));
    }

    fn put_waypoint(&mut self, waypoint: Waypoint) {
        self.stage(StagedWrite::PutWaypoint(waypoint));
    }
}
