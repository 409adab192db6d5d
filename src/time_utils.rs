// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time handling.
//!
//! The engine stores instants as unix seconds; these helpers are the only
//! place that converts between that and `chrono`.

use chrono::{DateTime, Utc};

/// Current time as unix seconds.
pub fn now_unix() -> i64 {
    Utc::now().timestamp()
}

/// Parse an RFC3339 timestamp (as returned by Strava) into unix seconds.
pub fn parse_rfc3339_unix(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).timestamp())
}

/// Format unix seconds as `YYYY-MM-DD HH:MM:SS` in UTC.
pub fn format_utc_datetime(unix_secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(unix_secs, 0)
        .unwrap_or_default()
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}
