// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Persistence: transactional store (Firestore or in-memory) and the
//! file-based route cache.

pub mod file_cache;
pub mod firestore;
pub mod memory;
pub mod store;

pub use file_cache::FileCache;
pub use firestore::FirestoreDb;
pub use memory::MemoryStore;
pub use store::{StagedWrite, Store, StoreTx};

/// Collection names as constants.
pub mod collections {
    pub const PENDING_EVENTS: &str = "pending_events";
    pub const ACTIVITIES: &str = "activities";
    pub const ATHLETES: &str = "athletes";
    /// Athlete preferences (keyed by athlete_id)
    pub const SETTINGS: &str = "settings";
    pub const CREDENTIALS: &str = "credentials";
    pub const JOURNEYS: &str = "journeys";
    pub const WAYPOINTS: &str = "waypoints";
    /// File cache collection holding route geometries
    pub const ROUTES: &str = "routes";
}
