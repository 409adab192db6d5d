// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webhook routes for Strava events.

use crate::models::Aspect;
use crate::time_utils::now_unix;
use crate::AppState;
use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Webhook routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/webhook", get(verify).post(handle_event))
}

/// Strava webhook verification query params.
#[derive(Deserialize)]
struct VerifyParams {
    #[serde(rename = "hub.mode")]
    mode: String,
    #[serde(rename = "hub.challenge")]
    challenge: String,
    #[serde(rename = "hub.verify_token")]
    verify_token: String,
}

/// Verification response.
#[derive(Serialize, Default)]
struct VerifyResponse {
    #[serde(rename = "hub.challenge")]
    challenge: String,
}

/// Verify webhook subscription (GET).
async fn verify(
    State(state): State<Arc<AppState>>,
    Query(params): Query<VerifyParams>,
) -> impl IntoResponse {
    if params.mode == "subscribe" && params.verify_token == state.config.webhook_verify_token {
        tracing::info!("Webhook subscription verified");
        (
            StatusCode::OK,
            Json(VerifyResponse {
                challenge: params.challenge,
            }),
        )
    } else {
        tracing::warn!(
            mode = %params.mode,
            "Webhook verification failed: invalid token"
        );
        (StatusCode::FORBIDDEN, Json(VerifyResponse::default()))
    }
}

/// Strava webhook event payload.
#[derive(Deserialize, Debug)]
struct WebhookEvent {
    object_type: String, // "activity" or "athlete"
    object_id: u64,
    aspect_type: String, // "create", "update", "delete"
    owner_id: u64,
    /// For athlete events, contains {"authorized": "false"} on deauthorization
    #[serde(default)]
    updates: Option<HashMap<String, serde_json::Value>>,
}

/// Strava sends: object_type="athlete", aspect_type="update",
/// updates={"authorized": "false"}
fn is_deauthorization(event: &WebhookEvent) -> bool {
    event.object_type == "athlete"
        && event.aspect_type == "update"
        && event
            .updates
            .as_ref()
            .and_then(|u| u.get("authorized"))
            .is_some_and(|v| v == false || v == "false")
}

/// Handle incoming webhook events (POST).
async fn handle_event(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<serde_json::Value>,
) -> StatusCode {
    let received_at = now_unix();

    let event: WebhookEvent = match serde_json::from_value(payload) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!(error = %e, "Failed to parse webhook event");
            return StatusCode::OK; // Still return 200 to Strava to avoid retries
        }
    };

    if is_deauthorization(&event) {
        if let Err(e) = state.athletes.deauthorize(event.owner_id).await {
            tracing::error!(
                error = %e,
                athlete_id = event.owner_id,
                "Failed to remove deauthorized athlete"
            );
        }
        return StatusCode::OK;
    }

    if event.object_type != "activity" {
        tracing::debug!(
            object_type = %event.object_type,
            aspect_type = %event.aspect_type,
            "Ignoring non-activity event"
        );
        return StatusCode::OK;
    }

    let aspect: Aspect = match event.aspect_type.parse() {
        Ok(aspect) => aspect,
        Err(e) => {
            tracing::debug!(error = %e, activity_id = event.object_id, "Ignoring event");
            return StatusCode::OK;
        }
    };

    if let Err(e) = state
        .intake
        .ingest(event.object_id, event.owner_id, aspect, received_at)
        .await
    {
        tracing::error!(
            error = %e,
            activity_id = event.object_id,
            athlete_id = event.owner_id,
            "Failed to record webhook event"
        );
    }

    // Always return 200 OK quickly (Strava requirement)
    StatusCode::OK
}
