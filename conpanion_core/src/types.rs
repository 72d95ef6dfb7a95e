//! Core domain types for the Conpanion system.
//!
//! This module defines the fundamental types used throughout the system:
//! - User identity and body metrics
//! - Foods, food selections and macro aggregates
//! - Fitness goals
//! - Workout plans, sets and completed session records
//! - Body progress entries
//!
//! Serialized field names follow the documents already stored by the mobile
//! app, so records written by either side stay readable by the other.

use crate::{Error, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

// ============================================================================
// Identity
// ============================================================================

/// Identifier of an authenticated user
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Body metrics
// ============================================================================

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
}

impl FromStr for Gender {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" => Ok(Gender::Male),
            "female" | "f" => Ok(Gender::Female),
            other => Err(Error::InvalidInput(format!("unknown gender '{}'", other))),
        }
    }
}

/// Self-reported activity level, stored with the app's display labels
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ActivityLevel {
    #[serde(rename = "No Exercise")]
    NoExercise,
    #[serde(rename = "Light Exercise")]
    Light,
    #[serde(rename = "Moderate Exercise")]
    Moderate,
    #[serde(rename = "Very Active")]
    VeryActive,
    /// Any label this version does not recognise
    #[serde(other)]
    Unknown,
}

impl FromStr for ActivityLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "none" | "no exercise" | "sedentary" => Ok(ActivityLevel::NoExercise),
            "light" | "light exercise" => Ok(ActivityLevel::Light),
            "moderate" | "moderate exercise" => Ok(ActivityLevel::Moderate),
            "very active" | "active" => Ok(ActivityLevel::VeryActive),
            other => Err(Error::InvalidInput(format!(
                "unknown activity level '{}'",
                other
            ))),
        }
    }
}

/// Complete set of metrics needed for a BMR calculation
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UserMetrics {
    pub age: u32,
    pub height_cm: u32,
    pub weight_kg: f64,
    pub gender: Gender,
    pub activity_level: ActivityLevel,
}

/// A `users/<uid>` document
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    #[serde(rename = "fullName", default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "heightCM", default)]
    pub height_cm: Option<u32>,
    #[serde(rename = "weightKG", default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(rename = "activityLevel", default)]
    pub activity_level: Option<ActivityLevel>,
}

impl UserProfile {
    /// Returns the metrics only when every field is present
    pub fn metrics(&self) -> Option<UserMetrics> {
        Some(UserMetrics {
            age: self.age?,
            height_cm: self.height_cm?,
            weight_kg: self.weight_kg?,
            gender: self.gender?,
            activity_level: self.activity_level?,
        })
    }
}

// ============================================================================
// Goals
// ============================================================================

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum FitnessGoal {
    #[serde(rename = "Maintain Weight")]
    Maintain,
    #[serde(rename = "Bulk / Build muscle")]
    Bulk,
    #[serde(rename = "Cut / Lose fat")]
    Cut,
    #[serde(other)]
    Unknown,
}

impl FromStr for FitnessGoal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "maintain" | "maintain weight" => Ok(FitnessGoal::Maintain),
            "bulk" | "bulk / build muscle" => Ok(FitnessGoal::Bulk),
            "cut" | "cut / lose fat" => Ok(FitnessGoal::Cut),
            other => Err(Error::InvalidInput(format!(
                "unknown fitness goal '{}'",
                other
            ))),
        }
    }
}

/// A `goals/<uid>` document
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Goals {
    #[serde(rename = "userId")]
    pub user_id: UserId,
    #[serde(rename = "fitnessGoal")]
    pub fitness_goal: FitnessGoal,
    #[serde(rename = "goalCalories", default)]
    pub goal_calories: Option<i64>,
}

// ============================================================================
// Food and macros
// ============================================================================

/// Catalog entry; nutrient values are per 100 g
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Food {
    #[serde(skip)]
    pub id: String,
    pub name: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

/// Integer calorie/macro totals
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Macros {
    pub calories: i64,
    pub protein: i64,
    pub carbs: i64,
    pub fat: i64,
}

impl Macros {
    pub const ZERO: Macros = Macros {
        calories: 0,
        protein: 0,
        carbs: 0,
        fat: 0,
    };

    pub fn negated(self) -> Self {
        Macros::ZERO - self
    }
}

impl Add for Macros {
    type Output = Macros;

    fn add(self, rhs: Macros) -> Macros {
        Macros {
            calories: self.calories + rhs.calories,
            protein: self.protein + rhs.protein,
            carbs: self.carbs + rhs.carbs,
            fat: self.fat + rhs.fat,
        }
    }
}

impl Sub for Macros {
    type Output = Macros;

    fn sub(self, rhs: Macros) -> Macros {
        Macros {
            calories: self.calories - rhs.calories,
            protein: self.protein - rhs.protein,
            carbs: self.carbs - rhs.carbs,
            fat: self.fat - rhs.fat,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    #[serde(rename = "Other food")]
    Other,
}

impl MealType {
    pub const ALL: [MealType; 4] = [
        MealType::Breakfast,
        MealType::Lunch,
        MealType::Dinner,
        MealType::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MealType::Breakfast => "Breakfast",
            MealType::Lunch => "Lunch",
            MealType::Dinner => "Dinner",
            MealType::Other => "Other food",
        }
    }
}

impl FromStr for MealType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "breakfast" => Ok(MealType::Breakfast),
            "lunch" => Ok(MealType::Lunch),
            "dinner" => Ok(MealType::Dinner),
            "other" | "other food" | "snack" => Ok(MealType::Other),
            other => Err(Error::InvalidInput(format!("unknown meal type '{}'", other))),
        }
    }
}

/// One food added to a day's intake
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FoodSelection {
    #[serde(rename = "selectionId")]
    pub selection_id: String,
    #[serde(rename = "foodId")]
    pub food_id: String,
    pub weight: f64,
    #[serde(rename = "mealType")]
    pub meal_type: MealType,
    /// Contribution added to the daily totals; absent on entries written by
    /// older app versions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub macros: Option<Macros>,
}

/// A `foodIntake` document: one per user per day
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FoodIntake {
    #[serde(rename = "userId")]
    pub user_id: UserId,
    pub date: i64,
    #[serde(default)]
    pub food: Vec<FoodSelection>,
}

/// A `dailyMacros` document: one per user per day
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DailyMacros {
    #[serde(rename = "userId")]
    pub user_id: UserId,
    pub date: i64,
    #[serde(flatten)]
    pub totals: Macros,
}

// ============================================================================
// Workout plans and sessions
// ============================================================================

/// A set as stored: reps and weight are text fields
#[derive(Clone, Debug, Serialize, Deserialize)]
struct StoredSet {
    #[serde(rename = "SetNumber")]
    number: u32,
    #[serde(rename = "Reps")]
    reps: String,
    #[serde(rename = "Weight")]
    weight: String,
}

/// A set of an exercise, either a plan target or a performed set
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "StoredSet", into = "StoredSet")]
pub struct WorkoutSet {
    pub number: u32,
    pub reps: u32,
    pub weight_kg: f64,
}

impl TryFrom<StoredSet> for WorkoutSet {
    type Error = Error;

    fn try_from(stored: StoredSet) -> Result<Self> {
        // Sets created without a target are stored as blank text
        let reps = if stored.reps.trim().is_empty() {
            0
        } else {
            parse_reps(&stored.reps)?
        };
        let weight_kg = if stored.weight.trim().is_empty() {
            0.0
        } else {
            parse_weight_kg(&stored.weight)?
        };
        Ok(WorkoutSet {
            number: stored.number,
            reps,
            weight_kg,
        })
    }
}

impl From<WorkoutSet> for StoredSet {
    fn from(set: WorkoutSet) -> Self {
        StoredSet {
            number: set.number,
            reps: set.reps.to_string(),
            weight: set.weight_kg.to_string(),
        }
    }
}

/// Parse a repetition count entered as text
pub fn parse_reps(text: &str) -> Result<u32> {
    text.trim()
        .parse::<u32>()
        .map_err(|_| Error::InvalidInput(format!("reps must be a whole number, got '{}'", text)))
}

/// Parse a weight in kilograms entered as text
pub fn parse_weight_kg(text: &str) -> Result<f64> {
    let value = text
        .trim()
        .parse::<f64>()
        .map_err(|_| Error::InvalidInput(format!("weight must be numeric, got '{}'", text)))?;
    if !value.is_finite() || value < 0.0 {
        return Err(Error::InvalidInput(format!(
            "weight must be a non-negative number, got '{}'",
            text
        )));
    }
    Ok(value)
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PlanExercise {
    #[serde(rename = "ExerciseName")]
    pub name: String,
    #[serde(rename = "Sets", default)]
    pub sets: Vec<WorkoutSet>,
}

/// A named, user-owned ordered list of exercises
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    #[serde(skip)]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "User")]
    pub user: UserId,
    #[serde(rename = "Exercises", default)]
    pub exercises: Vec<PlanExercise>,
}

impl Plan {
    pub fn total_sets(&self) -> usize {
        self.exercises.iter().map(|e| e.sets.len()).sum()
    }
}

/// Sets performed for one exercise during a session
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExerciseLog {
    #[serde(rename = "ExerciseName")]
    pub exercise_name: String,
    #[serde(rename = "Sets", default)]
    pub sets: Vec<WorkoutSet>,
}

/// A `user_workout_sessions` document, written once when a session completes
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorkoutSessionRecord {
    #[serde(skip)]
    pub id: String,
    #[serde(rename = "Plan")]
    pub plan_name: String,
    #[serde(rename = "User")]
    pub user: UserId,
    #[serde(rename = "Exercises", default)]
    pub exercises: Vec<ExerciseLog>,
    /// Active seconds: elapsed session time minus rest consumed
    #[serde(rename = "SessionTime")]
    pub session_seconds: u64,
    #[serde(rename = "CaloriesBurned")]
    pub calories_burned: i64,
    pub timestamp: i64,
}

impl WorkoutSessionRecord {
    pub fn performed_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.timestamp, 0)
            .single()
            .unwrap_or_default()
    }

    pub fn total_sets(&self) -> usize {
        self.exercises.iter().map(|e| e.sets.len()).sum()
    }
}

// ============================================================================
// Body progress
// ============================================================================

/// A `progress` document: weigh-in with an optional photo URL
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProgressEntry {
    #[serde(skip)]
    pub id: String,
    #[serde(rename = "pictureURL", default)]
    pub picture_url: String,
    #[serde(rename = "currentWeight")]
    pub weight_kg: f64,
    pub timestamp: i64,
    #[serde(rename = "userId")]
    pub user_id: UserId,
}
