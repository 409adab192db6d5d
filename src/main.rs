// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Adventure-Tracker server
//!
//! Receives Strava webhook notifications and periodically reconciles them
//! into journey progress.

use adventure_tracker::{
    config::Config,
    db::{FileCache, FirestoreDb, Store},
    services::{
        AthleteService, DescriptionPublisher, EventIntake, OldActivityCleaner,
        OpenRouteService, PendingEventDrain, ProgressProjector, RouteService, Scheduler,
        StravaClient, StravaService,
    },
    AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Adventure-Tracker");

    let db = FirestoreDb::new(&config.gcp_project_id)
        .await
        .expect("Failed to connect to Firestore");
    let store: Arc<dyn Store> = Arc::new(db);

    let routes = RouteService::new(FileCache::new(&config.route_cache_dir));
    tracing::info!(path = %config.route_cache_dir, "Route cache configured");

    let strava = Arc::new(StravaService::new(
        StravaClient::new(
            config.strava_client_id.clone(),
            config.strava_client_secret.clone(),
        ),
        store.clone(),
    ));
    let geocoder = Arc::new(OpenRouteService::new(config.ors_api_key.clone()));

    let projector = ProgressProjector::new(routes, geocoder);
    let publisher = DescriptionPublisher::new(store.clone(), strava.clone());
    let drain = PendingEventDrain::new(
        store.clone(),
        strava,
        projector,
        publisher,
        config.supported_sport_types.clone(),
        config.process_events_after_secs as i64,
    );
    let cleaner =
        OldActivityCleaner::new(store.clone(), config.delete_old_activities_after_days as i64);

    let scheduler = Scheduler::new(Duration::from_secs(config.scheduler_interval_secs))
        .add_job(Arc::new(drain))
        .add_job(Arc::new(cleaner))
        .start();

    let state = Arc::new(AppState {
        config: config.clone(),
        intake: EventIntake::new(store.clone()),
        athletes: AthleteService::new(store),
    });

    let app = adventure_tracker::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped, waiting for scheduler");
    scheduler.stop().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("adventure_tracker=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
