// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use adventure_tracker::config::Config;
use adventure_tracker::db::{collections, FileCache, FirestoreDb, MemoryStore, Store};
use adventure_tracker::error::AppError;
use adventure_tracker::models::{
    Activity, Athlete, AthleteSettings, CachedRoute, Journey, PendingChangeEvent, Waypoint,
};
use adventure_tracker::routes::create_router;
use adventure_tracker::services::{
    ActivityProvider, AthleteService, DescriptionPublisher, EventIntake, GeocodeFeature,
    Geocoder, PendingEventDrain, ProgressProjector, RouteService,
};
use adventure_tracker::AppState;
use async_trait::async_trait;
use geo::{coord, LineString};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

// ─── Fakes ───────────────────────────────────────────────────────────

/// Scripted activity provider.
#[derive(Default)]
pub struct FakeProvider {
    activities: Mutex<HashMap<u64, Activity>>,
    rate_limited: Mutex<HashSet<u64>>,
    failing: Mutex<HashSet<u64>>,
    failing_updates: Mutex<HashSet<u64>>,
    fetches: Mutex<Vec<u64>>,
    descriptions: Mutex<Vec<(u64, String)>>,
    gated: Mutex<HashSet<u64>>,
    fetching: Notify,
    release: Notify,
}

#[allow(dead_code)]
impl FakeProvider {
    pub fn set_activity(&self, activity: Activity) {
        self.activities
            .lock()
            .unwrap()
            .insert(activity.id, activity);
    }

    pub fn rate_limit(&self, activity_id: u64) {
        self.rate_limited.lock().unwrap().insert(activity_id);
    }

    pub fn fail(&self, activity_id: u64) {
        self.failing.lock().unwrap().insert(activity_id);
    }

    pub fn fail_description_update(&self, activity_id: u64) {
        self.failing_updates.lock().unwrap().insert(activity_id);
    }

    /// Hold fetches of `activity_id` until [`FakeProvider::release`].
    pub fn gate(&self, activity_id: u64) {
        self.gated.lock().unwrap().insert(activity_id);
    }

    /// Wait until a gated fetch is in progress.
    pub async fn wait_until_fetching(&self) {
        self.fetching.notified().await;
    }

    pub fn release(&self) {
        self.gated.lock().unwrap().clear();
        self.release.notify_one();
    }

    pub fn clear_failures(&self) {
        self.rate_limited.lock().unwrap().clear();
        self.failing.lock().unwrap().clear();
    }

    /// Activity IDs fetched so far, in order.
    pub fn fetches(&self) -> Vec<u64> {
        self.fetches.lock().unwrap().clone()
    }

    /// Descriptions pushed so far, in order.
    pub fn descriptions(&self) -> Vec<(u64, String)> {
        self.descriptions.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActivityProvider for FakeProvider {
    async fn fetch_activity(
        &self,
        _athlete_id: u64,
        activity_id: u64,
    ) -> Result<Activity, AppError> {
        self.fetches.lock().unwrap().push(activity_id);

        let gated = self.gated.lock().unwrap().contains(&activity_id);
        if gated {
            self.fetching.notify_one();
            self.release.notified().await;
        }

        if self.rate_limited.lock().unwrap().contains(&activity_id) {
            return Err(AppError::RateLimited);
        }
        if self.failing.lock().unwrap().contains(&activity_id) {
            return Err(AppError::StravaApi("HTTP 500: boom".to_string()));
        }

        self.activities
            .lock()
            .unwrap()
            .get(&activity_id)
            .cloned()
            .ok_or_else(|| AppError::StravaApi("HTTP 404: Record Not Found".to_string()))
    }

    async fn update_activity_description(
        &self,
        _athlete_id: u64,
        activity_id: u64,
        description: &str,
    ) -> Result<Activity, AppError> {
        if self.failing_updates.lock().unwrap().contains(&activity_id) {
            return Err(AppError::StravaApi("HTTP 500: boom".to_string()));
        }

        self.descriptions
            .lock()
            .unwrap()
            .push((activity_id, description.to_string()));

        let mut activities = self.activities.lock().unwrap();
        let activity = activities
            .get_mut(&activity_id)
            .ok_or_else(|| AppError::StravaApi("HTTP 404: Record Not Found".to_string()))?;
        activity.description = description.to_string();
        Ok(activity.clone())
    }
}

/// Geocoder returning a fixed feature list.
#[derive(Default)]
pub struct FakeGeocoder {
    features: Mutex<Vec<GeocodeFeature>>,
    fail: Mutex<bool>,
    calls: Mutex<Vec<(f64, f64, u32, Vec<String>)>>,
}

#[allow(dead_code)]
impl FakeGeocoder {
    pub fn set_features(&self, features: &[(&str, &str)]) {
        *self.features.lock().unwrap() = features
            .iter()
            .map(|(layer, label)| GeocodeFeature {
                layer: layer.to_string(),
                label: label.to_string(),
            })
            .collect();
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    /// `(lon, lat, max_results, layers)` of every lookup.
    pub fn calls(&self) -> Vec<(f64, f64, u32, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Geocoder for FakeGeocoder {
    async fn reverse_geocode(
        &self,
        lon: f64,
        lat: f64,
        max_results: u32,
        layers: &[&str],
    ) -> Result<Vec<GeocodeFeature>, AppError> {
        self.calls.lock().unwrap().push((
            lon,
            lat,
            max_results,
            layers.iter().map(|l| l.to_string()).collect(),
        ));
        if *self.fail.lock().unwrap() {
            return Err(AppError::Geocoding("HTTP 503".to_string()));
        }
        Ok(self.features.lock().unwrap().clone())
    }
}

// ─── Fixtures ────────────────────────────────────────────────────────

pub const ATHLETE_ID: u64 = 42;
pub const START_WAYPOINT: u64 = 1;
pub const END_WAYPOINT: u64 = 2;
pub const JOURNEY_START: i64 = 1_700_000_000;

/// A supported activity for the test athlete starting `offset` seconds
/// after the journey started.
#[allow(dead_code)]
pub fn activity(id: u64, distance_meters: f64, offset: i64) -> Activity {
    Activity {
        id,
        athlete_id: ATHLETE_ID,
        sport_type: "Run".to_string(),
        distance_meters,
        start_time: JOURNEY_START + offset,
        moving_time_secs: 1800,
        elevation_gain_meters: 25.0,
        description: String::new(),
    }
}

#[allow(dead_code)]
pub fn journey(current: f64, total: f64) -> Journey {
    Journey {
        athlete_id: ATHLETE_ID,
        start_waypoint_id: START_WAYPOINT,
        end_waypoint_id: END_WAYPOINT,
        current_location_name: "Novi Sad".to_string(),
        current_distance_meters: current,
        total_distance_meters: total,
        completed: false,
        start_time: JOURNEY_START,
        end_time: None,
    }
}

/// Straight route along the equator, about 11.1 km long.
#[allow(dead_code)]
pub fn equator_route() -> LineString<f64> {
    LineString::new(vec![
        coord! { x: 0.0, y: 0.0 },
        coord! { x: 0.05, y: 0.0 },
        coord! { x: 0.1, y: 0.0 },
    ])
}

/// Write a cached route between two waypoints.
#[allow(dead_code)]
pub async fn write_route(cache: &FileCache, a: u64, b: u64, line: LineString<f64>, total: f64) {
    let geometry = polyline::encode_coordinates(line, 5).unwrap();
    cache
        .write(
            collections::ROUTES,
            &format!("{}-{}", a.min(b), a.max(b)),
            &CachedRoute {
                geometry,
                distance_meters: total,
            },
        )
        .await
        .unwrap();
}

/// Insert the test athlete, settings and both waypoints.
#[allow(dead_code)]
pub async fn seed_athlete_and_waypoints(store: &MemoryStore, auto_update: bool) {
    let mut tx = store.begin().await.unwrap();
    tx.put_athlete(Athlete {
        id: ATHLETE_ID,
        firstname: "Jelena".to_string(),
        lastname: "Petrović".to_string(),
    });
    tx.put_settings(AthleteSettings {
        athlete_id: ATHLETE_ID,
        auto_update_activity_description: auto_update,
    });
    tx.put_waypoint(Waypoint {
        id: START_WAYPOINT,
        lat: 0.0,
        lon: 0.0,
        name: "Novi Sad".to_string(),
    });
    tx.put_waypoint(Waypoint {
        id: END_WAYPOINT,
        lat: 0.0,
        lon: 0.1,
        name: "Belgrade".to_string(),
    });
    tx.commit().await.unwrap();
}

#[allow(dead_code)]
pub async fn put_journey(store: &MemoryStore, journey: Journey) {
    let mut tx = store.begin().await.unwrap();
    tx.put_journey(journey);
    tx.commit().await.unwrap();
}

#[allow(dead_code)]
pub async fn put_activity(store: &MemoryStore, activity: Activity) {
    let mut tx = store.begin().await.unwrap();
    tx.put_activity(activity);
    tx.commit().await.unwrap();
}

#[allow(dead_code)]
pub async fn put_pending(store: &MemoryStore, event: PendingChangeEvent) {
    let mut tx = store.begin().await.unwrap();
    tx.put_pending_event(event);
    tx.commit().await.unwrap();
}

/// The reconciliation engine wired against in-memory fakes.
#[allow(dead_code)]
pub struct TestEngine {
    pub store: Arc<MemoryStore>,
    pub provider: Arc<FakeProvider>,
    pub geocoder: Arc<FakeGeocoder>,
    pub cache: FileCache,
    pub routes: RouteService,
    pub projector: ProgressProjector,
    pub intake: EventIntake,
    pub drain: PendingEventDrain,
    /// Keeps the route cache directory alive
    _dir: tempfile::TempDir,
}

#[allow(dead_code)]
pub const DEBOUNCE_SECS: i64 = 120;

/// Build an engine with the default sport list and a 120 s debounce.
#[allow(dead_code)]
pub fn test_engine() -> TestEngine {
    let dir = tempfile::tempdir().unwrap();
    let cache = FileCache::new(dir.path());
    let store = Arc::new(MemoryStore::new());
    let provider = Arc::new(FakeProvider::default());
    let geocoder = Arc::new(FakeGeocoder::default());

    let routes = RouteService::new(cache.clone());
    let projector = ProgressProjector::new(routes.clone(), geocoder.clone());
    let publisher = DescriptionPublisher::new(store.clone(), provider.clone());
    let drain = PendingEventDrain::new(
        store.clone(),
        provider.clone(),
        projector.clone(),
        publisher,
        Config::default().supported_sport_types,
        DEBOUNCE_SECS,
    );

    TestEngine {
        intake: EventIntake::new(store.clone()),
        store,
        provider,
        geocoder,
        cache,
        routes,
        projector,
        drain,
        _dir: dir,
    }
}

/// Create a test app backed by an in-memory store.
/// Returns the router and the store.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = Arc::new(AppState {
        config: Config::default(),
        intake: EventIntake::new(store.clone()),
        athletes: AthleteService::new(store.clone()),
    });

    (create_router(state), store)
}
