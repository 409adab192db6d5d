// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Waypoints and the cached routes between them.

use serde::{Deserialize, Serialize};

/// A named place usable as a journey endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub id: u64,
    pub lat: f64,
    pub lon: f64,
    pub name: String,
}

/// Route geometry between two waypoints, stored in the route cache under
/// the canonical `min-max` key. Always oriented from the lower waypoint ID
/// to the higher one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedRoute {
    /// Encoded polyline (precision 5)
    pub geometry: String,
    /// Route length in meters
    pub distance_meters: f64,
}
