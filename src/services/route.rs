// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cached route loading and position interpolation along a route.

use crate::db::{collections, FileCache};
use crate::error::{AppError, Result};
use crate::models::journey::route_key;
use crate::models::CachedRoute;
use geo::{Bearing, Destination, Distance, Haversine, LineString, Point};

/// Locate the point `distance_meters` along `line`.
///
/// The line is walked from its last vertex when `reverse` is set. Returns the
/// point and the traversal-order index of the last vertex passed. Distances
/// past the end of the line clamp to the final vertex.
///
/// # Panics
///
/// Panics if `line` has no vertices.
pub fn point_at_distance(
    line: &LineString<f64>,
    reverse: bool,
    distance_meters: f64,
) -> (Point<f64>, usize) {
    assert!(!line.0.is_empty(), "cannot interpolate along an empty route");

    let points: Vec<Point<f64>> = if reverse {
        line.points().rev().collect()
    } else {
        line.points().collect()
    };

    if distance_meters <= 0.0 || points.len() == 1 {
        return (points[0], 0);
    }

    let mut remaining = distance_meters;
    for (i, pair) in points.windows(2).enumerate() {
        let (from, to) = (pair[0], pair[1]);
        let segment = Haversine.distance(from, to);
        if remaining < segment {
            let bearing = Haversine.bearing(from, to);
            return (Haversine.destination(from, bearing, remaining), i);
        }
        remaining -= segment;
    }

    let last = points.len() - 1;
    (points[last], last)
}

/// A route can only be walked if it has a finite, positive length.
pub fn is_valid_route_distance(distance_meters: f64) -> bool {
    distance_meters.is_finite() && distance_meters > 0.0
}

/// Reads route geometries from the route cache.
#[derive(Debug, Clone)]
pub struct RouteService {
    cache: FileCache,
}

impl RouteService {
    pub fn new(cache: FileCache) -> Self {
        Self { cache }
    }

    /// Cached route metadata between two waypoints, in either direction.
    pub async fn cached_route(&self, waypoint_a: u64, waypoint_b: u64) -> Result<CachedRoute> {
        let key = route_key(waypoint_a, waypoint_b);
        let route: CachedRoute = self.cache.read(collections::ROUTES, &key).await?;
        if !is_valid_route_distance(route.distance_meters) {
            return Err(AppError::Cache(format!(
                "Route {} has invalid distance {}",
                key, route.distance_meters
            )));
        }
        Ok(route)
    }

    /// Decoded route geometry between two waypoints, oriented from the lower
    /// waypoint ID to the higher one.
    pub async fn route_line(&self, waypoint_a: u64, waypoint_b: u64) -> Result<LineString<f64>> {
        let route = self.cached_route(waypoint_a, waypoint_b).await?;
        let line = polyline::decode_polyline(&route.geometry, 5)
            .map_err(|e| AppError::Cache(format!("Failed to decode route polyline: {}", e)))?;

        if line.0.is_empty() {
            return Err(AppError::Cache(format!(
                "Route {} has no vertices",
                route_key(waypoint_a, waypoint_b)
            )));
        }
        Ok(line)
    }
}
