//! User profile metrics and calorie goals.
//!
//! Goal calories are derived data: every change to a metric or to the
//! fitness goal recomputes and stores them in `goals/<uid>`.

use crate::metabolism::{goal_calories, maintenance_calories};
use crate::store::{collections, from_document, to_document, FieldUpdate, SharedStore};
use crate::{ActivityLevel, Error, FitnessGoal, Gender, Goals, Result, UserId, UserProfile};
use serde_json::Value;

/// Body metrics entered on the profile screen
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MetricsUpdate {
    pub age: u32,
    pub height_cm: u32,
    pub gender: Gender,
    pub activity_level: ActivityLevel,
}

impl MetricsUpdate {
    /// Validate raw text fields
    pub fn parse(age: &str, height_cm: &str, gender: &str, activity_level: &str) -> Result<Self> {
        let age = parse_positive(age, "age")?;
        let height_cm = parse_positive(height_cm, "height")?;
        Ok(Self {
            age,
            height_cm,
            gender: gender.parse()?,
            activity_level: activity_level.parse()?,
        })
    }
}

fn parse_positive(text: &str, field: &str) -> Result<u32> {
    match text.trim().parse::<u32>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(Error::InvalidInput(format!(
            "{} must be a positive whole number, got '{}'",
            field, text
        ))),
    }
}

pub struct GoalTracker {
    store: SharedStore,
    user: Option<UserId>,
}

impl GoalTracker {
    pub fn new(store: SharedStore, user: Option<UserId>) -> Self {
        Self { store, user }
    }

    fn require_user(&self, operation: &str) -> Result<&UserId> {
        self.user.as_ref().ok_or_else(|| {
            tracing::warn!("{} skipped: no authenticated user", operation);
            Error::Unauthenticated
        })
    }

    fn load_profile(&self, user: &UserId) -> Result<Option<UserProfile>> {
        match self.store.get(collections::USERS, user.as_str())? {
            Some(doc) => Ok(Some(from_document(doc)?)),
            None => Ok(None),
        }
    }

    /// Apply field updates to `users/<uid>`, creating an empty profile first
    /// if the user has none
    fn patch_profile(&self, user: &UserId, updates: &[(String, FieldUpdate)]) -> Result<()> {
        match self.store.update(collections::USERS, user.as_str(), updates) {
            Err(Error::NotFound(_)) => {
                self.store.set(
                    collections::USERS,
                    user.as_str(),
                    to_document(&UserProfile::default())?,
                )?;
                self.store.update(collections::USERS, user.as_str(), updates)
            }
            other => other,
        }
    }

    fn computed_goal_calories(&self, user: &UserId, goal: FitnessGoal) -> Result<Option<i64>> {
        let maintenance = self
            .load_profile(user)?
            .and_then(|p| p.metrics())
            .map(|m| maintenance_calories(&m));
        Ok(maintenance.map(|m| goal_calories(goal, m)))
    }

    fn load_or_create_goals(&self, user: &UserId) -> Result<Goals> {
        if let Some(doc) = self.store.get(collections::GOALS, user.as_str())? {
            return from_document(doc);
        }

        let goals = Goals {
            user_id: user.clone(),
            fitness_goal: FitnessGoal::Bulk,
            goal_calories: self.computed_goal_calories(user, FitnessGoal::Bulk)?,
        };
        self.store
            .set(collections::GOALS, user.as_str(), to_document(&goals)?)?;
        tracing::info!("Created default goals for {}", user);
        Ok(goals)
    }

    pub fn profile(&self) -> Result<Option<UserProfile>> {
        let user = self.require_user("read profile")?;
        self.load_profile(user)
    }

    pub fn user_weight(&self) -> Result<Option<f64>> {
        Ok(self.profile()?.and_then(|p| p.weight_kg))
    }

    /// Store age, height, gender and activity level, then refresh goals
    pub fn update_metrics(&self, metrics: MetricsUpdate) -> Result<Goals> {
        let user = self.require_user("update metrics")?;
        self.patch_profile(
            user,
            &[
                ("age".into(), FieldUpdate::Set(Value::from(metrics.age))),
                (
                    "heightCM".into(),
                    FieldUpdate::Set(Value::from(metrics.height_cm)),
                ),
                (
                    "gender".into(),
                    FieldUpdate::Set(serde_json::to_value(metrics.gender)?),
                ),
                (
                    "activityLevel".into(),
                    FieldUpdate::Set(serde_json::to_value(metrics.activity_level)?),
                ),
            ],
        )?;
        tracing::info!("Updated metrics for {}", user);
        self.recompute_goal_calories()?;
        self.goals()
    }

    pub fn update_weight(&self, weight_kg: f64) -> Result<Goals> {
        let user = self.require_user("update weight")?;
        if !weight_kg.is_finite() || weight_kg <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "weight must be a positive number, got {}",
                weight_kg
            )));
        }
        self.patch_profile(
            user,
            &[("weightKG".into(), FieldUpdate::Set(Value::from(weight_kg)))],
        )?;
        tracing::info!("Updated weight for {} to {} kg", user, weight_kg);
        self.recompute_goal_calories()?;
        self.goals()
    }

    /// `None` until every metric is known
    pub fn maintenance_calories(&self) -> Result<Option<i64>> {
        Ok(self
            .profile()?
            .and_then(|p| p.metrics())
            .map(|m| maintenance_calories(&m)))
    }

    /// The user's goals, created as a bulk goal on first access
    pub fn goals(&self) -> Result<Goals> {
        let user = self.require_user("read goals")?;
        self.load_or_create_goals(user)
    }

    pub fn set_fitness_goal(&self, goal: FitnessGoal) -> Result<Goals> {
        let user = self.require_user("set fitness goal")?;
        self.load_or_create_goals(user)?;
        self.store.update(
            collections::GOALS,
            user.as_str(),
            &[(
                "fitnessGoal".into(),
                FieldUpdate::Set(serde_json::to_value(goal)?),
            )],
        )?;
        tracing::info!("Fitness goal for {} set to {:?}", user, goal);
        self.recompute_goal_calories()?;
        self.goals()
    }

    /// Recompute and store goal calories from the current profile
    ///
    /// Returns `None` and leaves the stored value alone when metrics are
    /// incomplete.
    pub fn recompute_goal_calories(&self) -> Result<Option<i64>> {
        let user = self.require_user("recompute goal calories")?;
        let goals = self.load_or_create_goals(user)?;

        let Some(calories) = self.computed_goal_calories(user, goals.fitness_goal)? else {
            tracing::debug!("Metrics incomplete for {}; goal calories unchanged", user);
            return Ok(None);
        };

        self.store.update(
            collections::GOALS,
            user.as_str(),
            &[("goalCalories".into(), FieldUpdate::Set(Value::from(calories)))],
        )?;
        tracing::debug!("Goal calories for {} now {}", user, calories);
        Ok(Some(calories))
    }
}
