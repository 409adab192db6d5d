// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava activity model for storage.

use serde::{Deserialize, Serialize};

/// Stored activity record, the local mirror of an accepted Strava activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Strava activity ID (also used as document ID)
    pub id: u64,
    /// Strava athlete ID (owner)
    pub athlete_id: u64,
    /// Sport type (Run, Hike, Walk, etc.)
    pub sport_type: String,
    /// Distance in meters
    pub distance_meters: f64,
    /// Start time (unix seconds)
    pub start_time: i64,
    /// Moving time in seconds
    pub moving_time_secs: i64,
    /// Total elevation gain in meters
    pub elevation_gain_meters: f64,
    /// Free-text description as last seen on Strava
    #[serde(default)]
    pub description: String,
}

impl Activity {
    /// Unix time at which the athlete stopped moving.
    pub fn end_time(&self) -> i64 {
        self.start_time + self.moving_time_secs
    }
}
