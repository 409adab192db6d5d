// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pending change events: the coalesced, not-yet-applied effect of one or
//! more Strava webhook notifications about a single activity.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a notification says happened to an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aspect {
    Create,
    Update,
    Delete,
}

impl Aspect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aspect::Create => "create",
            Aspect::Update => "update",
            Aspect::Delete => "delete",
        }
    }
}

impl fmt::Display for Aspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognised `aspect_type` value.
#[derive(Debug, thiserror::Error)]
#[error("unknown aspect type: {0}")]
pub struct UnknownAspect(pub String);

impl FromStr for Aspect {
    type Err = UnknownAspect;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Aspect::Create),
            "update" => Ok(Aspect::Update),
            "delete" => Ok(Aspect::Delete),
            other => Err(UnknownAspect(other.to_string())),
        }
    }
}

/// Stored pending event (document ID = activity ID).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChangeEvent {
    /// Strava activity ID
    pub activity_id: u64,
    /// Strava athlete ID (owner)
    pub owner_athlete_id: u64,
    /// Net effect still to be applied
    pub aspect: Aspect,
    /// When the first notification of this record was received (unix secs)
    pub received_at: i64,
}

impl PendingChangeEvent {
    /// True once the debounce window since `received_at` has fully elapsed.
    pub fn is_due(&self, now: i64, debounce_secs: i64) -> bool {
        now - self.received_at >= debounce_secs
    }
}

/// Outcome of merging an incoming notification into the pending store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoalesceAction {
    /// No record yet: store the notification as given.
    Insert,
    /// A pending create is cancelled by a delete; drop the record.
    Remove,
    /// A pending update is superseded by a delete.
    RewriteToDelete,
    /// The existing record already dominates the notification.
    Keep,
}

/// Decide how a notification with `incoming` aspect merges into `existing`.
///
/// `Delete` absorbs a pending `Create` and replaces a pending `Update`; a
/// later `Create` or `Update` never weakens whatever is already pending.
pub fn coalesce(existing: Option<Aspect>, incoming: Aspect) -> CoalesceAction {
    match (existing, incoming) {
        (None, _) => CoalesceAction::Insert,
        (Some(Aspect::Create), Aspect::Delete) => CoalesceAction::Remove,
        (Some(Aspect::Update), Aspect::Delete) => CoalesceAction::RewriteToDelete,
        (Some(Aspect::Delete), Aspect::Delete) => CoalesceAction::Keep,
        (Some(_), Aspect::Create | Aspect::Update) => CoalesceAction::Keep,
    }
}
