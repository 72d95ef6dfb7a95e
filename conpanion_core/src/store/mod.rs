//! Document store abstraction.
//!
//! All persistence goes through a small key-value document interface over
//! named collections: get, query by field, create, set, partial update with
//! numeric increments, and delete. Two backends are provided: an in-memory
//! store and a JSON-file store with file locking.

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use crate::{Error, Result};
use chrono::{Duration, Local, NaiveDate, TimeZone};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::sync::Arc;

/// A stored document: a JSON object
pub type Document = Map<String, Value>;

/// Shared handle used by the engines
pub type SharedStore = Arc<dyn DocumentStore>;

/// Collection names
pub mod collections {
    pub const USERS: &str = "users";
    pub const FOOD: &str = "food";
    pub const FOOD_INTAKE: &str = "foodIntake";
    pub const DAILY_MACROS: &str = "dailyMacros";
    pub const GOALS: &str = "goals";
    pub const PLANS: &str = "plans";
    pub const WORKOUT_SESSIONS: &str = "user_workout_sessions";
    pub const PROGRESS: &str = "progress";
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryOp {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A single `field op value` condition; query filters are ANDed
#[derive(Clone, Debug)]
pub struct Filter {
    pub field: String,
    pub op: QueryOp,
    pub value: Value,
}

impl Filter {
    pub fn new(field: &str, op: QueryOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self::new(field, QueryOp::Eq, value)
    }

    pub fn matches(&self, doc: &Document) -> bool {
        let Some(actual) = doc.get(&self.field) else {
            return false;
        };
        let Some(ordering) = compare_values(actual, &self.value) else {
            return false;
        };
        match self.op {
            QueryOp::Eq => ordering == Ordering::Equal,
            QueryOp::Lt => ordering == Ordering::Less,
            QueryOp::Le => ordering != Ordering::Greater,
            QueryOp::Gt => ordering == Ordering::Greater,
            QueryOp::Ge => ordering != Ordering::Less,
        }
    }
}

/// Numbers compare numerically, strings lexically; anything else only by equality
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ if a == b => Some(Ordering::Equal),
        _ => None,
    }
}

/// Partial update of one field
#[derive(Clone, Debug)]
pub enum FieldUpdate {
    Set(Value),
    /// Add a delta to a numeric field; a missing field counts as zero
    Increment(i64),
}

/// Apply partial updates to a document in place
pub fn apply_updates(doc: &mut Document, updates: &[(String, FieldUpdate)]) -> Result<()> {
    for (field, update) in updates {
        match update {
            FieldUpdate::Set(value) => {
                doc.insert(field.clone(), value.clone());
            }
            FieldUpdate::Increment(delta) => {
                let next = match doc.get(field) {
                    None | Some(Value::Null) => Value::from(*delta),
                    Some(Value::Number(n)) => {
                        if let Some(current) = n.as_i64() {
                            Value::from(current + delta)
                        } else {
                            let current = n.as_f64().unwrap_or_default();
                            Value::from(current + *delta as f64)
                        }
                    }
                    Some(other) => {
                        return Err(Error::InvalidInput(format!(
                            "cannot increment non-numeric field '{}' ({})",
                            field, other
                        )))
                    }
                };
                doc.insert(field.clone(), next);
            }
        }
    }
    Ok(())
}

/// Persistence collaborator; every call is a blocking unit that succeeds or
/// fails as a whole
pub trait DocumentStore: Send + Sync {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    fn query(&self, collection: &str, filters: &[Filter]) -> Result<Vec<(String, Document)>>;

    /// Insert a new document and return its generated id
    fn create(&self, collection: &str, data: Document) -> Result<String>;

    /// Insert or replace the document stored under `id`
    fn set(&self, collection: &str, id: &str, data: Document) -> Result<()>;

    /// Apply partial updates; fails with `NotFound` if the document is absent
    fn update(&self, collection: &str, id: &str, updates: &[(String, FieldUpdate)]) -> Result<()>;

    fn delete(&self, collection: &str, id: &str) -> Result<()>;
}

/// Convert a serializable value into a document
pub fn to_document<T: Serialize>(value: &T) -> Result<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::Other(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

/// Decode a document into a typed value
pub fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(doc))?)
}

/// Unix timestamps bounding a calendar day in local time: `[start, end)`
pub fn day_bounds(day: NaiveDate) -> (i64, i64) {
    let next = day + Duration::days(1);
    (local_midnight(day), local_midnight(next))
}

/// Unix timestamp of the local start of `day`
pub fn local_midnight(day: NaiveDate) -> i64 {
    let midnight = day.and_hms_opt(0, 0, 0).unwrap_or_default();
    match Local.from_local_datetime(&midnight).earliest() {
        Some(dt) => dt.timestamp(),
        // Midnight falls in a DST gap; the day starts an hour later
        None => Local
            .from_local_datetime(&(midnight + Duration::hours(1)))
            .earliest()
            .map(|dt| dt.timestamp())
            .unwrap_or_else(|| midnight.and_utc().timestamp()),
    }
}

/// Filters selecting a user's documents whose `date_field` falls on `day`
pub fn user_day_filters(
    user_field: &str,
    user: &crate::UserId,
    date_field: &str,
    day: NaiveDate,
) -> Vec<Filter> {
    let (start, end) = day_bounds(day);
    vec![
        Filter::eq(user_field, user.as_str()),
        Filter::new(date_field, QueryOp::Ge, start),
        Filter::new(date_field, QueryOp::Lt, end),
    ]
}
