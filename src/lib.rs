// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Adventure-Tracker: virtual journeys between waypoints, advanced by
//! Strava activities.
//!
//! This crate provides the webhook intake and the background reconciliation
//! engine that keeps journey progress consistent with the athlete's Strava
//! activities.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use services::{AthleteService, EventIntake};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub intake: EventIntake,
    pub athletes: AthleteService,
}
