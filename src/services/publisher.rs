// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Publishes journey progress into the description of the Strava activity
//! that caused it.

use crate::db::{Store, StoreTx};
use crate::error::{AppError, Result};
use crate::models::{Activity, Journey, Waypoint};
use crate::services::strava::ActivityProvider;
use crate::time_utils::format_utc_datetime;
use std::sync::Arc;

#[derive(Clone)]
pub struct DescriptionPublisher {
    store: Arc<dyn Store>,
    provider: Arc<dyn ActivityProvider>,
}

impl DescriptionPublisher {
    pub fn new(store: Arc<dyn Store>, provider: Arc<dyn ActivityProvider>) -> Self {
        Self { store, provider }
    }

    /// Append a progress summary for `journey` to `activity`'s description,
    /// if the athlete opted in. Returns whether the description was updated.
    pub async fn publish(&self, journey: &Journey, activity: &Activity) -> Result<bool> {
        let athlete_id = journey.athlete_id;

        let (start, end) = {
            let tx = self.store.begin().await?;
            let settings = tx.get_settings(athlete_id).await?.ok_or_else(|| {
                AppError::NotFound(format!("Settings for athlete {}", athlete_id))
            })?;
            if !settings.auto_update_activity_description {
                tracing::debug!(athlete_id, "Description updates disabled");
                return Ok(false);
            }

            let start = load_waypoint(tx.as_ref(), journey.start_waypoint_id).await?;
            let end = load_waypoint(tx.as_ref(), journey.end_waypoint_id).await?;
            (start, end)
        };

        let message = build_message(journey, &start, &end);
        let description = append_message(&activity.description, &message);

        let updated = self
            .provider
            .update_activity_description(athlete_id, activity.id, &description)
            .await?;

        let mut tx = self.store.begin().await?;
        tx.put_activity(Activity {
            description: updated.description,
            ..activity.clone()
        });
        tx.commit().await?;

        tracing::info!(
            athlete_id,
            activity_id = activity.id,
            completed = journey.completed,
            "Activity description updated"
        );
        Ok(true)
    }
}

async fn load_waypoint(tx: &dyn StoreTx, id: u64) -> Result<Waypoint> {
    tx.get_waypoint(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Waypoint {}", id)))
}

fn km(meters: f64) -> String {
    format!("{:.2}", meters / 1000.0)
}

/// Progress or completion summary for a journey.
fn build_message(journey: &Journey, start: &Waypoint, end: &Waypoint) -> String {
    let started = format_utc_datetime(journey.start_time);

    if journey.completed {
        format!(
            "Journey completed!\nI have reached {} (started from {}, at {} (GMT)).\nTotal distance: {} km.",
            end.name,
            start.name,
            started,
            km(journey.total_distance_meters)
        )
    } else {
        format!(
            "Journey in progress!\nI am at {} (started from {}, at {} (GMT), going to {}).\nDistance traveled: {}/{} km.",
            journey.current_location_name,
            start.name,
            started,
            end.name,
            km(journey.current_distance_meters),
            km(journey.total_distance_meters)
        )
    }
}

/// Append message to existing description, separated by a blank line.
fn append_message(existing: &str, message: &str) -> String {
    if existing.is_empty() {
        message.to_string()
    } else {
        format!("{}\n\n{}", existing, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn waypoint(id: u64, name: &str) -> Waypoint {
        Waypoint {
            id,
            lat: 0.0,
            lon: 0.0,
            name: name.to_string(),
        }
    }

    fn journey(current: f64, completed: bool) -> Journey {
        Journey {
            athlete_id: 1,
            start_waypoint_id: 10,
            end_waypoint_id: 20,
            current_location_name: "Ruma".to_string(),
            current_distance_meters: current,
            total_distance_meters: 73_456.0,
            completed,
            // 2024-01-15 10:00:00 UTC
            start_time: 1_705_312_800,
            end_time: None,
        }
    }

    #[test]
    fn test_in_progress_message() {
        let message = build_message(
            &journey(12_340.0, false),
            &waypoint(10, "Novi Sad"),
            &waypoint(20, "Belgrade"),
        );
        assert_eq!(
            message,
            "Journey in progress!\nI am at Ruma (started from Novi Sad, at 2024-01-15 10:00:00 (GMT), going to Belgrade).\nDistance traveled: 12.34/73.46 km."
        );
    }

    #[test]
    fn test_completed_message() {
        let message = build_message(
            &journey(73_456.0, true),
            &waypoint(10, "Novi Sad"),
            &waypoint(20, "Belgrade"),
        );
        assert_eq!(
            message,
            "Journey completed!\nI have reached Belgrade (started from Novi Sad, at 2024-01-15 10:00:00 (GMT)).\nTotal distance: 73.46 km."
        );
    }

    #[test]
    fn test_append_to_empty_description() {
        assert_eq!(append_message("", "Journey!"), "Journey!");
    }

    #[test]
    fn test_append_to_existing_description() {
        assert_eq!(
            append_message("Windy.\nLegs tired.", "Journey!"),
            "Windy.\nLegs tired.\n\nJourney!"
        );
    }
}
