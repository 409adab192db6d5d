// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Athlete rows consumed by the engine.

use serde::{Deserialize, Serialize};

/// Athlete profile (document ID = Strava athlete ID).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Athlete {
    pub id: u64,
    pub firstname: String,
    pub lastname: String,
}

/// Per-athlete preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AthleteSettings {
    pub athlete_id: u64,
    /// Append journey progress to newly created Strava activities
    #[serde(default)]
    pub auto_update_activity_description: bool,
}

/// Athlete's Strava OAuth credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StravaCredentials {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token expiry (unix seconds)
    pub expires_at: i64,
}
