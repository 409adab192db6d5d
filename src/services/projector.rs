// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Journey progress projection.
//!
//! Applies the distance effect of one activity change to the athlete's
//! active journey and resolves where along the route the athlete now is.

use crate::db::StoreTx;
use crate::error::{AppError, Result};
use crate::models::{Activity, Journey};
use crate::services::geocoding::{
    preferred_location_name, Geocoder, LOCATION_LAYERS, LOCATION_MAX_RESULTS,
};
use crate::services::route::{is_valid_route_distance, point_at_distance, RouteService};
use std::sync::Arc;

/// A committed change to the local activity mirror.
#[derive(Debug, Clone)]
pub enum ActivityChange {
    Created(Activity),
    Updated { old: Activity, new: Activity },
    Deleted(Activity),
}

impl ActivityChange {
    /// The activity as it stands after the change.
    pub fn activity(&self) -> &Activity {
        match self {
            ActivityChange::Created(a) | ActivityChange::Deleted(a) => a,
            ActivityChange::Updated { new, .. } => new,
        }
    }

    pub fn athlete_id(&self) -> u64 {
        self.activity().athlete_id
    }

    /// Signed distance this change adds to a journey started at
    /// `journey_start`. Activities before the journey never count.
    pub fn distance_delta(&self, journey_start: i64) -> f64 {
        let counts = |a: &Activity| journey_start <= a.start_time;
        match self {
            ActivityChange::Created(a) if counts(a) => a.distance_meters,
            ActivityChange::Created(_) => 0.0,
            ActivityChange::Deleted(a) if journey_start < a.start_time => -a.distance_meters,
            ActivityChange::Deleted(_) => 0.0,
            ActivityChange::Updated { old, new } => {
                let removed = if counts(old) { old.distance_meters } else { 0.0 };
                let added = if counts(new) { new.distance_meters } else { 0.0 };
                added - removed
            }
        }
    }
}

/// Advances journeys in response to activity changes.
#[derive(Clone)]
pub struct ProgressProjector {
    routes: RouteService,
    geocoder: Arc<dyn Geocoder>,
}

impl ProgressProjector {
    pub fn new(routes: RouteService, geocoder: Arc<dyn Geocoder>) -> Self {
        Self { routes, geocoder }
    }

    /// Apply `change` to the athlete's active journey, staging the updated
    /// journey on `tx`. Returns the new journey state, or `None` when there
    /// is no active journey or its distance did not move.
    pub async fn project(
        &self,
        tx: &mut dyn StoreTx,
        change: &ActivityChange,
    ) -> Result<Option<Journey>> {
        let athlete_id = change.athlete_id();
        let activity = change.activity();

        let Some(mut journey) = tx.get_active_journey(athlete_id).await? else {
            tracing::debug!(athlete_id, "No active journey");
            return Ok(None);
        };

        if !is_valid_route_distance(journey.total_distance_meters) {
            return Err(AppError::BadRequest(format!(
                "Journey {} has invalid total distance {}",
                journey.doc_id(),
                journey.total_distance_meters
            )));
        }

        let delta = change.distance_delta(journey.start_time);
        let current = (journey.current_distance_meters + delta)
            .clamp(0.0, journey.total_distance_meters);

        if current == journey.current_distance_meters {
            tracing::debug!(
                athlete_id,
                activity_id = activity.id,
                "Journey distance unchanged"
            );
            return Ok(None);
        }

        journey.current_distance_meters = current;

        if current >= journey.total_distance_meters {
            let end = tx
                .get_waypoint(journey.end_waypoint_id)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("Waypoint {}", journey.end_waypoint_id))
                })?;

            journey.completed = true;
            journey.current_distance_meters = journey.total_distance_meters;
            journey.end_time = Some(activity.end_time());
            journey.current_location_name = end.name;

            tracing::info!(
                athlete_id,
                activity_id = activity.id,
                journey = %journey.doc_id(),
                "Journey completed"
            );
        } else if current == 0.0 {
            let start = tx
                .get_waypoint(journey.start_waypoint_id)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("Waypoint {}", journey.start_waypoint_id))
                })?;
            journey.current_location_name = start.name;
        } else {
            journey.current_location_name = self.locate(&journey).await?;

            tracing::info!(
                athlete_id,
                activity_id = activity.id,
                journey = %journey.doc_id(),
                distance = journey.current_distance_meters,
                progress = journey.progress_ratio(),
                location = %journey.current_location_name,
                "Journey progressed"
            );
        }

        tx.put_journey(journey.clone());
        Ok(Some(journey))
    }

    /// Name the place at the journey's current distance along its route.
    async fn locate(&self, journey: &Journey) -> Result<String> {
        let line = self
            .routes
            .route_line(journey.start_waypoint_id, journey.end_waypoint_id)
            .await?;
        let (point, _) = point_at_distance(
            &line,
            journey.is_reversed(),
            journey.current_distance_meters,
        );

        let features = self
            .geocoder
            .reverse_geocode(
                point.x(),
                point.y(),
                LOCATION_MAX_RESULTS,
                &LOCATION_LAYERS,
            )
            .await?;

        Ok(preferred_location_name(&features))
    }
}
