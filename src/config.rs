// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! A `.env` file is honoured for local development.

use std::env;

/// Shortest scheduler period accepted by `Config::validate`.
const MIN_SCHEDULER_INTERVAL_SECS: u64 = 60;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Strava OAuth client ID (public)
    pub strava_client_id: String,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Period of the reconciliation scheduler, in seconds
    pub scheduler_interval_secs: u64,
    /// Debounce window: pending events younger than this are left alone
    pub process_events_after_secs: u64,
    /// Local activities older than this are dropped by the cleaner job
    pub delete_old_activities_after_days: u64,
    /// Sport types that count towards journey progress
    pub supported_sport_types: Vec<String>,
    /// Directory holding cached route geometry
    pub route_cache_dir: String,

    // --- Secrets ---
    /// Strava OAuth client secret
    pub strava_client_secret: String,
    /// Webhook verification token
    pub webhook_verify_token: String,
    /// OpenRouteService API key (reverse geocoding)
    pub ors_api_key: String,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            strava_client_id: "test_client_id".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            scheduler_interval_secs: 60,
            process_events_after_secs: 120,
            delete_old_activities_after_days: 30,
            supported_sport_types: parse_sport_types("Run,TrailRun,Walk,Hike"),
            route_cache_dir: "data/routes".to_string(),
            strava_client_secret: "test_secret".to_string(),
            webhook_verify_token: "test_verify_token".to_string(),
            ors_api_key: "test_ors_key".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let config = Self {
            strava_client_id: env::var("STRAVA_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_ID"))?,
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            scheduler_interval_secs: parse_number("SCHEDULER_INTERVAL_SECS", 60)?,
            process_events_after_secs: parse_number("PROCESS_EVENTS_AFTER_SECS", 120)?,
            delete_old_activities_after_days: parse_number("DELETE_OLD_ACTIVITIES_AFTER_DAYS", 30)?,
            supported_sport_types: parse_sport_types(
                &env::var("SUPPORTED_SPORT_TYPES")
                    .unwrap_or_else(|_| "Run,TrailRun,Walk,Hike".to_string()),
            ),
            route_cache_dir: env::var("ROUTE_CACHE_DIR")
                .unwrap_or_else(|_| "data/routes".to_string()),

            strava_client_secret: env::var("STRAVA_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_SECRET"))?,
            webhook_verify_token: env::var("WEBHOOK_VERIFY_TOKEN")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("WEBHOOK_VERIFY_TOKEN"))?,
            ors_api_key: env::var("ORS_API_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("ORS_API_KEY"))?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check the relationships between the scheduling knobs.
    ///
    /// The debounce window must cover at least one scheduler period, otherwise
    /// bursts of notifications are acted on before they settle.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler_interval_secs < MIN_SCHEDULER_INTERVAL_SECS {
            return Err(ConfigError::Invalid(format!(
                "SCHEDULER_INTERVAL_SECS must be at least {}",
                MIN_SCHEDULER_INTERVAL_SECS
            )));
        }
        if self.process_events_after_secs < self.scheduler_interval_secs {
            return Err(ConfigError::Invalid(
                "PROCESS_EVENTS_AFTER_SECS must not be shorter than SCHEDULER_INTERVAL_SECS"
                    .to_string(),
            ));
        }
        if self.delete_old_activities_after_days < 1 {
            return Err(ConfigError::Invalid(
                "DELETE_OLD_ACTIVITIES_AFTER_DAYS must be at least 1".to_string(),
            ));
        }
        if self.supported_sport_types.is_empty() {
            return Err(ConfigError::Invalid(
                "SUPPORTED_SPORT_TYPES must name at least one sport".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_number(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("{} is not a number: {}", name, raw))),
        Err(_) => Ok(default),
    }
}

fn parse_sport_types(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
