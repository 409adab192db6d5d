// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore backend.
//!
//! Collections:
//! - `pending_events` (keyed by activity ID)
//! - `activities` (keyed by activity ID)
//! - `journeys` (keyed by `athlete-start-end`)
//! - `athletes`, `settings`, `credentials` (keyed by athlete ID)
//! - `waypoints` (keyed by waypoint ID)
//!
//! `begin` opens a Firestore transaction and every `StoreTx` read runs inside
//! it, so Firestore tracks the rows read and aborts one of two conflicting
//! transactions. Writes are staged and added to the transaction on commit.
//! A transaction dropped without committing is rolled back in the background.

use crate::db::collections;
use crate::db::store::{StagedWrite, Store, StoreTx};
use crate::error::{AppError, Result};
use crate::models::{
    Activity, Athlete, AthleteSettings, Journey, PendingChangeEvent, StravaCredentials, Waypoint,
};
use async_trait::async_trait;

/// Firestore database client.
///
/// The underlying client lives for the rest of the process; open
/// transactions borrow it.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<&'static firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(Box::leak(Box::new(client))),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(Box::leak(Box::new(client))),
        })
    }

    /// Create an offline client. Every operation returns a database error.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&'static firestore::FirestoreDb> {
        self.client
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }
}

/// Fetch a single document by ID.
async fn get_by_id<T>(
    client: &firestore::FirestoreDb,
    collection: &str,
    id: String,
) -> Result<Option<T>>
where
    T: serde::de::DeserializeOwned + Send,
{
    client
        .fluent()
        .select()
        .by_id_in(collection)
        .obj()
        .one(&id)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

#[async_trait]
impl Store for FirestoreDb {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        let client = self.get_client()?;
        let transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let reader = client.clone_with_consistency_selector(
            firestore::FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ),
        );

        Ok(Box::new(FirestoreTx {
            client,
            reader,
            transaction: Some(transaction),
            writes: Vec::new(),
        }))
    }

    async fn list_pending_events(&self) -> Result<Vec<PendingChangeEvent>> {
        let mut events: Vec<PendingChangeEvent> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::PENDING_EVENTS)
            .order_by([("received_at", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        events.sort_by_key(|e| (e.received_at, e.activity_id));
        Ok(events)
    }

    async fn list_activities_started_before(&self, cutoff: i64) -> Result<Vec<Activity>> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::ACTIVITIES)
            .filter(move |q| q.for_all([q.field("start_time").less_than_or_equal(cutoff)]))
            .order_by([("start_time", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn get_credentials(&self, athlete_id: u64) -> Result<Option<StravaCredentials>> {
        get_by_id(
            self.get_client()?,
            collections::CREDENTIALS,
            athlete_id.to_string(),
        )
        .await
    }

    async fn set_credentials(
        &self,
        athlete_id: u64,
        credentials: &StravaCredentials,
    ) -> Result<()> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::CREDENTIALS)
            .document_id(athlete_id.to_string())
            .object(credentials)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

/// An open Firestore transaction plus the writes staged on it.
struct FirestoreTx {
    client: &'static firestore::FirestoreDb,
    /// Client whose reads run inside `transaction`
    reader: firestore::FirestoreDb,
    /// `None` once committed
    transaction: Option<firestore::FirestoreTransaction<'static>>,
    writes: Vec<StagedWrite>,
}

impl Drop for FirestoreTx {
    fn drop(&mut self) {
        let Some(transaction) = self.transaction.take() else {
            return;
        };
        // Release the read locks now rather than at the server-side timeout
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = transaction.rollback().await {
                    tracing::warn!(error = %e, "Failed to roll back transaction");
                }
            });
        }
    }
}

fn put_in_transaction<T>(
    client: &firestore::FirestoreDb,
    transaction: &mut firestore::FirestoreTransaction<'_>,
    collection: &str,
    doc_id: String,
    obj: &T,
) -> firestore::FirestoreResult<()>
where
    T: serde::Serialize + for<'de> serde::Deserialize<'de> + Sync + Send,
{
    client
        .fluent()
        .update()
        .in_col(collection)
        .document_id(doc_id)
        .object(obj)
        .add_to_transaction(transaction)?;
    Ok(())
}

fn delete_in_transaction(
    client: &firestore::FirestoreDb,
    transaction: &mut firestore::FirestoreTransaction<'_>,
    collection: &str,
    doc_id: String,
) -> firestore::FirestoreResult<()> {
    client
        .fluent()
        .delete()
        .from(collection)
        .document_id(doc_id)
        .add_to_transaction(transaction)?;
    Ok(())
}

/// Add one staged write to a Firestore transaction.
fn add_write(
    client: &firestore::FirestoreDb,
    transaction: &mut firestore::FirestoreTransaction<'_>,
    write: &StagedWrite,
) -> firestore::FirestoreResult<()> {
    use collections::*;

    match write {
        StagedWrite::PutPendingEvent(event) => put_in_transaction(
            client,
            transaction,
            PENDING_EVENTS,
            event.activity_id.to_string(),
            event,
        ),
        StagedWrite::DeletePendingEvent(id) => {
            delete_in_transaction(client, transaction, PENDING_EVENTS, id.to_string())
        }
        StagedWrite::PutActivity(activity) => put_in_transaction(
            client,
            transaction,
            ACTIVITIES,
            activity.id.to_string(),
            activity,
        ),
        StagedWrite::DeleteActivity(id) => {
            delete_in_transaction(client, transaction, ACTIVITIES, id.to_string())
        }
        StagedWrite::PutJourney(journey) => {
            put_in_transaction(client, transaction, JOURNEYS, journey.doc_id(), journey)
        }
        StagedWrite::PutAthlete(athlete) => put_in_transaction(
            client,
            transaction,
            ATHLETES,
            athlete.id.to_string(),
            athlete,
        ),
        StagedWrite::DeleteAthlete(id) => {
            for collection in [ATHLETES, SETTINGS, CREDENTIALS] {
                delete_in_transaction(client, transaction, collection, id.to_string())?;
            }
            Ok(())
        }
        StagedWrite::PutSettings(settings) => put_in_transaction(
            client,
            transaction,
            SETTINGS,
            settings.athlete_id.to_string(),
            settings,
        ),
        StagedWrite::PutWaypoint(waypoint) => put_in_transaction(
            client,
            transaction,
            WAYPOINTS,
            waypoint.id.to_string(),
            waypoint,
        ),
    }
}

#[async_trait]
impl StoreTx for FirestoreTx {
    async fn get_pending_event(&self, activity_id: u64) -> Result<Option<PendingChangeEvent>> {
        get_by_id(
            &self.reader,
            collections::PENDING_EVENTS,
            activity_id.to_string(),
        )
        .await
    }

    async fn get_athlete(&self, athlete_id: u64) -> Result<Option<Athlete>> {
        get_by_id(&self.reader, collections::ATHLETES, athlete_id.to_string()).await
    }

    async fn get_settings(&self, athlete_id: u64) -> Result<Option<AthleteSettings>> {
        get_by_id(&self.reader, collections::SETTINGS, athlete_id.to_string()).await
    }

    async fn get_activity(&self, activity_id: u64) -> Result<Option<Activity>> {
        get_by_id(&self.reader, collections::ACTIVITIES, activity_id.to_string()).await
    }

    async fn get_active_journey(&self, athlete_id: u64) -> Result<Option<Journey>> {
        let journeys: Vec<Journey> = self
            .reader
            .fluent()
            .select()
            .from(collections::JOURNEYS)
            .filter(move |q| {
                q.for_all([
                    q.field("athlete_id").eq(athlete_id),
                    q.field("completed").eq(false),
                ])
            })
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(journeys.into_iter().next())
    }

    async fn get_waypoint(&self, waypoint_id: u64) -> Result<Option<Waypoint>> {
        get_by_id(&self.reader, collections::WAYPOINTS, waypoint_id.to_string()).await
    }

    fn stage(&mut self, write: StagedWrite) {
        self.writes.push(write);
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut this = self;
        let Some(mut transaction) = this.transaction.take() else {
            return Err(AppError::Database("Transaction already finished".to_string()));
        };

        for write in &this.writes {
            if let Err(e) = add_write(this.client, &mut transaction, write) {
                let _ = transaction.rollback().await;
                return Err(AppError::Database(format!(
                    "Failed to add write to transaction: {}",
                    e
                )));
            }
        }

        // Fails if a conflicting transaction committed first; the caller
        // retries against fresh state.
        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::debug!(writes = this.writes.len(), "Transaction committed");
        Ok(())
    }
}
