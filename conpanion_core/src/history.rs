//! Completed workout session history.
//!
//! Session records are write-once documents in `user_workout_sessions`,
//! saved when a live session is marked complete.

use crate::store::{
    collections, from_document, to_document, user_day_filters, Document, DocumentStore, Filter,
    QueryOp,
};
use crate::{Result, UserId, WorkoutSessionRecord};
use chrono::{Duration, NaiveDate, Utc};

fn decode(id: String, doc: Document) -> Result<WorkoutSessionRecord> {
    let mut record: WorkoutSessionRecord = from_document(doc)?;
    record.id = id;
    Ok(record)
}

/// Decode query hits, skipping records that no longer parse
fn decode_all(hits: Vec<(String, Document)>) -> Vec<WorkoutSessionRecord> {
    hits.into_iter()
        .filter_map(|(id, doc)| match decode(id.clone(), doc) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!("Skipping unreadable session record {}: {}", id, e);
                None
            }
        })
        .collect()
}

/// Persist a completed session and return its id
pub fn save_record(store: &dyn DocumentStore, record: &WorkoutSessionRecord) -> Result<String> {
    let id = store.create(collections::WORKOUT_SESSIONS, to_document(record)?)?;
    tracing::info!(
        "Saved session {} for {} ({} kcal)",
        id,
        record.user,
        record.calories_burned
    );
    Ok(id)
}

/// Sessions performed on `day`, oldest first
pub fn sessions_on(
    store: &dyn DocumentStore,
    user: &UserId,
    day: NaiveDate,
) -> Result<Vec<WorkoutSessionRecord>> {
    let hits = store.query(
        collections::WORKOUT_SESSIONS,
        &user_day_filters("User", user, "timestamp", day),
    )?;
    let mut records = decode_all(hits);
    records.sort_by_key(|r| r.timestamp);
    Ok(records)
}

/// Sessions from the last `days` days, newest first
pub fn recent_sessions(
    store: &dyn DocumentStore,
    user: &UserId,
    days: i64,
) -> Result<Vec<WorkoutSessionRecord>> {
    let cutoff = (Utc::now() - Duration::days(days)).timestamp();
    let hits = store.query(
        collections::WORKOUT_SESSIONS,
        &[
            Filter::eq("User", user.as_str()),
            Filter::new("timestamp", QueryOp::Ge, cutoff),
        ],
    )?;
    let mut records = decode_all(hits);
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    tracing::debug!(
        "Loaded {} sessions from the last {} days for {}",
        records.len(),
        days,
        user
    );
    Ok(records)
}

/// Total calories burned in sessions on `day`
pub fn calories_burned_on(store: &dyn DocumentStore, user: &UserId, day: NaiveDate) -> Result<i64> {
    Ok(sessions_on(store, user, day)?
        .iter()
        .map(|r| r.calories_burned)
        .sum())
}
