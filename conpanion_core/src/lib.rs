#![forbid(unsafe_code)]

//! Core domain model and business logic for Conpanion.
//!
//! This crate provides:
//! - Domain types (user metrics, foods, macros, plans, session records)
//! - Energy and macro formulas
//! - Document store abstraction (in-memory and JSON-file backends)
//! - Nutrition engine (food diary, daily macro totals)
//! - Goals, profile metrics and the body progress log
//! - Workout plans, the live session state machine and its async driver
//! - Session history and CSV export

pub mod types;
pub mod error;
pub mod store;
pub mod metabolism;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod nutrition;
pub mod goals;
pub mod progress;
pub mod plans;
pub mod session;
pub mod driver;
pub mod history;
pub mod export;

// Re-export commonly used types
pub use error::{Error, ErrorKind, Result};
pub use types::*;
pub use config::Config;
pub use store::{DocumentStore, JsonFileStore, MemoryStore, SharedStore};
pub use nutrition::{DayIntake, IntakeItem, NutritionEngine};
pub use goals::{GoalTracker, MetricsUpdate};
pub use progress::ProgressLog;
pub use session::{LiveWorkoutSession, SessionSnapshot, SessionState, SetCompletion, SetInput};
pub use driver::WorkoutDriver;
pub use export::export_sessions_csv;
