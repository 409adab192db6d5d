// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client for fetching and updating activities.
//!
//! Handles:
//! - Activity fetching
//! - Activity description updates
//! - Token refresh when expired
//! - Rate limit detection (the drain backs off until the next tick)

use crate::db::Store;
use crate::error::AppError;
use crate::models::{Activity, StravaCredentials};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;

const STRAVA_API_BASE_URL: &str = "https://www.strava.com/api/v3";
const STRAVA_TOKEN_URL: &str = "https://www.strava.com/oauth/token";

/// Remote source of truth for activities.
#[async_trait]
pub trait ActivityProvider: Send + Sync {
    /// Fetch the current state of an activity.
    async fn fetch_activity(&self, athlete_id: u64, activity_id: u64)
        -> Result<Activity, AppError>;

    /// Replace an activity's description, returning the updated activity.
    async fn update_activity_description(
        &self,
        athlete_id: u64,
        activity_id: u64,
        description: &str,
    ) -> Result<Activity, AppError>;
}

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    base_url: String,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl StravaClient {
    /// Create a new Strava client with OAuth credentials.
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: STRAVA_API_BASE_URL.to_string(),
            token_url: STRAVA_TOKEN_URL.to_string(),
            client_id,
            client_secret,
        }
    }

    /// Point the client at a different API host (local stubs).
    pub fn with_base_urls(mut self, base_url: &str, token_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self.token_url = token_url.to_string();
        self
    }

    /// Get a detailed activity by ID.
    pub async fn get_activity(
        &self,
        access_token: &str,
        activity_id: u64,
    ) -> Result<StravaActivity, AppError> {
        let url = format!("{}/activities/{}", self.base_url, activity_id);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::StravaApi(e.to_string()))?;

        check_response_json(response).await
    }

    /// Update an activity's description.
    pub async fn update_activity_description(
        &self,
        access_token: &str,
        activity_id: u64,
        description: &str,
    ) -> Result<StravaActivity, AppError> {
        let url = format!("{}/activities/{}", self.base_url, activity_id);

        let body = serde_json::json!({
            "description": description
        });

        let response = self
            .http
            .put(&url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::StravaApi(e.to_string()))?;

        check_response_json(response).await
    }

    /// Refresh an expired access token.
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenRefreshResponse, AppError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(format!("Token refresh request failed: {}", e)))?;

        check_response_json(response).await
    }
}

/// Map a non-success status to an error, otherwise parse the JSON body.
async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, AppError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();

        if status.as_u16() == 429 {
            tracing::warn!("Strava rate limit hit (429)");
            return Err(AppError::RateLimited);
        }

        if status.as_u16() == 401 {
            return Err(AppError::StravaApi(
                AppError::STRAVA_TOKEN_ERROR.to_string(),
            ));
        }

        return Err(AppError::StravaApi(format!("HTTP {}: {}", status, body)));
    }

    response
        .json()
        .await
        .map_err(|e| AppError::StravaApi(format!("JSON parse error: {}", e)))
}

/// Token refresh response from Strava.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

/// Detailed Strava activity response.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivity {
    pub id: u64,
    pub athlete: StravaAthleteRef,
    pub sport_type: String,
    /// RFC 3339 UTC start time
    pub start_date: String,
    pub distance: f64,
    pub moving_time: i64,
    #[serde(default)]
    pub total_elevation_gain: f64,
    pub description: Option<String>,
}

/// Owner reference embedded in activity responses.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaAthleteRef {
    pub id: u64,
}

impl TryFrom<StravaActivity> for Activity {
    type Error = AppError;

    fn try_from(a: StravaActivity) -> Result<Self, Self::Error> {
        let start_time = crate::time_utils::parse_rfc3339_unix(&a.start_date).ok_or_else(|| {
            AppError::StravaApi(format!(
                "Activity {} has invalid start_date {:?}",
                a.id, a.start_date
            ))
        })?;

        Ok(Activity {
            id: a.id,
            athlete_id: a.athlete.id,
            sport_type: a.sport_type,
            distance_meters: a.distance,
            start_time,
            moving_time_secs: a.moving_time,
            elevation_gain_meters: a.total_elevation_gain,
            description: a.description.unwrap_or_default(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// StravaService - High-level service with token management
// ─────────────────────────────────────────────────────────────────────────────

/// Margin before token expiration when we proactively refresh (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Cached access token with expiry information.
#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: i64,
}

/// Strava provider with access-token lifecycle management.
///
/// Access tokens are cached in memory per athlete. A per-athlete lock makes
/// sure only one task refreshes a given athlete's token at a time; refreshed
/// credentials are written back to the store.
#[derive(Clone)]
pub struct StravaService {
    client: StravaClient,
    store: Arc<dyn Store>,
    token_cache: Arc<DashMap<u64, CachedToken>>,
    refresh_locks: Arc<DashMap<u64, Arc<Mutex<()>>>>,
}

impl StravaService {
    pub fn new(client: StravaClient, store: Arc<dyn Store>) -> Self {
        Self {
            client,
            store,
            token_cache: Arc::new(DashMap::new()),
            refresh_locks: Arc::new(DashMap::new()),
        }
    }

    fn cached_token(&self, athlete_id: u64, now: i64) -> Option<String> {
        self.token_cache
            .get(&athlete_id)
            .filter(|cached| now + TOKEN_REFRESH_MARGIN_SECS < cached.expires_at)
            .map(|cached| cached.access_token.clone())
    }

    /// Get a valid (non-expiring) access token for the given athlete.
    pub async fn get_valid_access_token(&self, athlete_id: u64) -> Result<String, AppError> {
        let now = Utc::now().timestamp();

        if let Some(token) = self.cached_token(athlete_id, now) {
            return Ok(token);
        }

        let lock = self
            .refresh_locks
            .entry(athlete_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Another task may have refreshed while we were waiting
        if let Some(token) = self.cached_token(athlete_id, now) {
            return Ok(token);
        }

        let credentials = self
            .store
            .get_credentials(athlete_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Credentials for athlete {}", athlete_id)))?;

        if now + TOKEN_REFRESH_MARGIN_SECS < credentials.expires_at {
            self.token_cache.insert(
                athlete_id,
                CachedToken {
                    access_token: credentials.access_token.clone(),
                    expires_at: credentials.expires_at,
                },
            );
            return Ok(credentials.access_token);
        }

        tracing::info!(athlete_id, "Access token expired, refreshing");

        let refreshed = self.client.refresh_token(&credentials.refresh_token).await?;
        let updated = StravaCredentials {
            access_token: refreshed.access_token,
            refresh_token: refreshed.refresh_token,
            expires_at: refreshed.expires_at,
        };
        self.store.set_credentials(athlete_id, &updated).await?;

        self.token_cache.insert(
            athlete_id,
            CachedToken {
                access_token: updated.access_token.clone(),
                expires_at: updated.expires_at,
            },
        );

        tracing::info!(athlete_id, "Token refreshed and cached");
        Ok(updated.access_token)
    }

    /// Drop a cached token that Strava rejected.
    fn invalidate(&self, athlete_id: u64, err: &AppError) {
        if err.is_strava_token_error() {
            tracing::warn!(athlete_id, "Strava rejected access token, clearing cache");
            self.token_cache.remove(&athlete_id);
        }
    }
}

#[async_trait]
impl ActivityProvider for StravaService {
    async fn fetch_activity(
        &self,
        athlete_id: u64,
        activity_id: u64,
    ) -> Result<Activity, AppError> {
        let access_token = self.get_valid_access_token(athlete_id).await?;
        let activity = self
            .client
            .get_activity(&access_token, activity_id)
            .await
            .inspect_err(|e| self.invalidate(athlete_id, e))?;
        activity.try_into()
    }

    async fn update_activity_description(
        &self,
        athlete_id: u64,
        activity_id: u64,
        description: &str,
    ) -> Result<Activity, AppError> {
        let access_token = self.get_valid_access_token(athlete_id).await?;
        let activity = self
            .client
            .update_activity_description(&access_token, activity_id, description)
            .await
            .inspect_err(|e| self.invalidate(athlete_id, e))?;
        activity.try_into()
    }
}
