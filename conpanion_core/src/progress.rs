//! Body progress log: dated weigh-ins with an optional photo URL.

use crate::goals::GoalTracker;
use crate::store::{
    collections, from_document, to_document, user_day_filters, FieldUpdate, Filter, QueryOp,
    SharedStore,
};
use crate::{Error, ProgressEntry, Result, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

pub struct ProgressLog {
    store: SharedStore,
    user: Option<UserId>,
    goals: GoalTracker,
}

impl ProgressLog {
    pub fn new(store: SharedStore, user: Option<UserId>) -> Self {
        let goals = GoalTracker::new(store.clone(), user.clone());
        Self { store, user, goals }
    }

    fn require_user(&self, operation: &str) -> Result<&UserId> {
        self.user.as_ref().ok_or_else(|| {
            tracing::warn!("{} skipped: no authenticated user", operation);
            Error::Unauthenticated
        })
    }

    fn decode(id: String, doc: crate::store::Document) -> Result<ProgressEntry> {
        let mut entry: ProgressEntry = from_document(doc)?;
        entry.id = id;
        Ok(entry)
    }

    /// Store a weigh-in and make it the user's current weight
    pub fn record(
        &self,
        weight_kg: f64,
        picture_url: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<ProgressEntry> {
        let user = self.require_user("record progress")?;
        if !weight_kg.is_finite() || weight_kg <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "weight must be a positive number, got {}",
                weight_kg
            )));
        }

        let mut entry = ProgressEntry {
            id: String::new(),
            picture_url: picture_url.unwrap_or_default().to_string(),
            weight_kg,
            timestamp: at.timestamp(),
            user_id: user.clone(),
        };
        entry.id = self
            .store
            .create(collections::PROGRESS, to_document(&entry)?)?;
        tracing::info!("Recorded progress {} for {}: {} kg", entry.id, user, weight_kg);

        self.goals.update_weight(weight_kg)?;
        Ok(entry)
    }

    /// Entries recorded on `day`, oldest first
    pub fn entries_on(&self, day: NaiveDate) -> Result<Vec<ProgressEntry>> {
        let user = self.require_user("read progress")?;
        let mut entries = self
            .store
            .query(
                collections::PROGRESS,
                &user_day_filters("userId", user, "timestamp", day),
            )?
            .into_iter()
            .map(|(id, doc)| Self::decode(id, doc))
            .collect::<Result<Vec<_>>>()?;
        entries.sort_by_key(|e| e.timestamp);
        Ok(entries)
    }

    /// Latest entry strictly before `instant`
    pub fn most_recent_before(&self, instant: DateTime<Utc>) -> Result<Option<ProgressEntry>> {
        let user = self.require_user("read progress")?;
        let hits = self.store.query(
            collections::PROGRESS,
            &[
                Filter::eq("userId", user.as_str()),
                Filter::new("timestamp", QueryOp::Lt, instant.timestamp()),
            ],
        )?;

        let mut latest: Option<ProgressEntry> = None;
        for (id, doc) in hits {
            let entry = Self::decode(id, doc)?;
            if latest.as_ref().map_or(true, |l| entry.timestamp > l.timestamp) {
                latest = Some(entry);
            }
        }
        Ok(latest)
    }

    /// Correct the weight of an existing entry
    pub fn update_weight(&self, entry_id: &str, weight_kg: f64) -> Result<ProgressEntry> {
        let user = self.require_user("update progress")?;
        if !weight_kg.is_finite() || weight_kg <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "weight must be a positive number, got {}",
                weight_kg
            )));
        }

        let doc = self
            .store
            .get(collections::PROGRESS, entry_id)?
            .ok_or_else(|| Error::not_found(format!("progress entry {}", entry_id)))?;
        let mut entry = Self::decode(entry_id.to_string(), doc)?;
        if &entry.user_id != user {
            return Err(Error::not_found(format!("progress entry {}", entry_id)));
        }

        self.store.update(
            collections::PROGRESS,
            entry_id,
            &[("currentWeight".into(), FieldUpdate::Set(Value::from(weight_kg)))],
        )?;
        entry.weight_kg = weight_kg;
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{day_bounds, MemoryStore};
    use chrono::TimeZone;
    use std::sync::Arc;

    fn at(ts: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(ts, 0).unwrap()
    }

    fn log() -> (Arc<MemoryStore>, ProgressLog) {
        let store = Arc::new(MemoryStore::new());
        let log = ProgressLog::new(store.clone(), Some(UserId::new("u1")));
        (store, log)
    }

    #[test]
    fn test_record_updates_profile_weight() {
        let (_store, log) = log();
        let entry = log.record(82.5, Some("file:///pic.jpg"), Utc::now()).unwrap();
        assert!(!entry.id.is_empty());
        assert_eq!(entry.picture_url, "file:///pic.jpg");
        assert_eq!(log.goals.user_weight().unwrap(), Some(82.5));
    }

    #[test]
    fn test_entries_on_day_and_most_recent() {
        let (_store, log) = log();
        let day = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        let (start, end) = day_bounds(day);

        log.record(80.0, None, at(start - 100)).unwrap();
        log.record(79.5, None, at(start + 600)).unwrap();
        log.record(79.0, None, at(start + 60)).unwrap();
        log.record(78.0, None, at(end + 10)).unwrap();

        let entries = log.entries_on(day).unwrap();
        let weights: Vec<f64> = entries.iter().map(|e| e.weight_kg).collect();
        assert_eq!(weights, vec![79.0, 79.5]);

        let previous = log.most_recent_before(at(start)).unwrap().unwrap();
        assert_eq!(previous.weight_kg, 80.0);
        assert!(log.most_recent_before(at(start - 100)).unwrap().is_none());
    }

    #[test]
    fn test_update_weight_of_entry() {
        let (_store, log) = log();
        let entry = log.record(80.0, None, Utc::now()).unwrap();
        let updated = log.update_weight(&entry.id, 79.2).unwrap();
        assert_eq!(updated.weight_kg, 79.2);

        assert!(matches!(
            log.update_weight("missing", 70.0),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_other_users_entries_are_hidden() {
        let (store, log) = log();
        let entry = log.record(80.0, None, Utc::now()).unwrap();

        let other = ProgressLog::new(store, Some(UserId::new("u2")));
        assert!(matches!(
            other.update_weight(&entry.id, 60.0),
            Err(Error::NotFound(_))
        ));
        assert!(other.most_recent_before(Utc::now() + chrono::Duration::hours(1)).unwrap().is_none());
    }
}
