// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod activity;
pub mod athlete;
pub mod journey;
pub mod pending;
pub mod waypoint;

pub use activity::Activity;
pub use athlete::{Athlete, AthleteSettings, StravaCredentials};
pub use journey::Journey;
pub use pending::{Aspect, CoalesceAction, PendingChangeEvent};
pub use waypoint::{CachedRoute, Waypoint};
