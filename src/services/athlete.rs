// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Athlete lifecycle events received from Strava.

use crate::db::Store;
use crate::error::Result;
use std::sync::Arc;

#[derive(Clone)]
pub struct AthleteService {
    store: Arc<dyn Store>,
}

impl AthleteService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Forget an athlete who revoked access: their profile, settings and
    /// credentials go in one transaction. Pending events for the athlete are
    /// discarded by the drain once the athlete is gone.
    ///
    /// Returns whether the athlete existed.
    pub async fn deauthorize(&self, athlete_id: u64) -> Result<bool> {
        let mut tx = self.store.begin().await?;

        if tx.get_athlete(athlete_id).await?.is_none() {
            tracing::info!(athlete_id, "Deauthorization for unknown athlete");
            return Ok(false);
        }

        tx.delete_athlete(athlete_id);
        tx.commit().await?;

        tracing::info!(athlete_id, "Athlete deauthorized and removed");
        Ok(true)
    }
}
