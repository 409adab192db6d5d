// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod athlete;
pub mod cleaner;
pub mod drain;
pub mod geocoding;
pub mod intake;
pub mod projector;
pub mod publisher;
pub mod route;
pub mod scheduler;
pub mod strava;

pub use athlete::AthleteService;
pub use cleaner::OldActivityCleaner;
pub use drain::{DrainReport, PendingEventDrain, ProcessOutcome};
pub use geocoding::{GeocodeFeature, Geocoder, OpenRouteService};
pub use intake::EventIntake;
pub use projector::{ActivityChange, ProgressProjector};
pub use publisher::DescriptionPublisher;
pub use route::{point_at_distance, RouteService};
pub use scheduler::{ScheduledJob, Scheduler, SchedulerHandle};
pub use strava::{ActivityProvider, StravaClient, StravaService};
