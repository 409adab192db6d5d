// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Journey model: an athlete's virtual trip between two waypoints.

use serde::{Deserialize, Serialize};

/// A journey from one waypoint to another, advanced by recorded activities.
///
/// Keyed by `(athlete_id, start_waypoint_id, end_waypoint_id)`. At most one
/// journey per athlete has `completed == false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Journey {
    pub athlete_id: u64,
    pub start_waypoint_id: u64,
    pub end_waypoint_id: u64,
    /// Human-readable place the athlete has virtually reached
    pub current_location_name: String,
    /// Distance covered so far, in `[0, total_distance_meters]`
    pub current_distance_meters: f64,
    /// Length of the cached route
    pub total_distance_meters: f64,
    /// One-way latch, never reset once set
    pub completed: bool,
    /// When the journey was started (unix seconds)
    pub start_time: i64,
    /// When the completing activity ended (unix seconds)
    #[serde(default)]
    pub end_time: Option<i64>,
}

impl Journey {
    /// Document ID combining the composite key.
    pub fn doc_id(&self) -> String {
        format!(
            "{}-{}-{}",
            self.athlete_id, self.start_waypoint_id, self.end_waypoint_id
        )
    }

    /// Routes are cached once per waypoint pair; journeys running from the
    /// higher to the lower ID traverse them backwards.
    pub fn is_reversed(&self) -> bool {
        self.start_waypoint_id > self.end_waypoint_id
    }

    /// Fraction of the route covered, for logging.
    pub fn progress_ratio(&self) -> f64 {
        if self.total_distance_meters <= 0.0 {
            return 0.0;
        }
        self.current_distance_meters / self.total_distance_meters
    }
}

/// Canonical `min-max` cache key for a pair of waypoints.
pub fn route_key(a: u64, b: u64) -> String {
    format!("{}-{}", a.min(b), a.max(b))
}
