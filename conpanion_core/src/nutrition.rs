//! Nutrition engine: food diary and running daily macro totals.
//!
//! Each user has at most one `foodIntake` and one `dailyMacros` document per
//! local calendar day. Adding a food appends a selection to the intake list
//! and increments the day's totals by the selection's macros; removing or
//! editing applies the matching negative or delta increment.
//!
//! Mutations for the same (user, day) are serialized inside this process.
//! Two processes sharing one file store can still race between the
//! existence check and the create.

use crate::catalog;
use crate::history;
use crate::metabolism::compute_macros;
use crate::store::{
    collections, day_bounds, from_document, to_document, user_day_filters, FieldUpdate,
    SharedStore,
};
use crate::{
    DailyMacros, Error, Food, FoodIntake, FoodSelection, Macros, MealType, Result, UserId,
};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// One food line in a day's diary
#[derive(Clone, Debug, PartialEq)]
pub struct IntakeItem {
    pub selection_id: String,
    pub food_id: String,
    pub food_name: String,
    pub weight: f64,
    pub macros: Macros,
}

/// A day's selections grouped by meal, in breakfast/lunch/dinner/other order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DayIntake {
    pub meals: Vec<(MealType, Vec<IntakeItem>)>,
}

impl DayIntake {
    pub fn items(&self, meal: MealType) -> &[IntakeItem] {
        self.meals
            .iter()
            .find(|(m, _)| *m == meal)
            .map(|(_, items)| items.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.meals.iter().all(|(_, items)| items.is_empty())
    }

    /// Sum of the listed items
    pub fn total(&self) -> Macros {
        self.meals
            .iter()
            .flat_map(|(_, items)| items.iter())
            .fold(Macros::ZERO, |acc, item| acc + item.macros)
    }
}

/// Per-(user, day) lock table
#[derive(Default)]
struct DayLocks {
    locks: Mutex<HashMap<(UserId, NaiveDate), Arc<Mutex<()>>>>,
}

impl DayLocks {
    fn get(&self, user: &UserId, day: NaiveDate) -> Result<Arc<Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| Error::State("day lock table poisoned".into()))?;
        Ok(locks.entry((user.clone(), day)).or_default().clone())
    }
}

pub struct NutritionEngine {
    store: SharedStore,
    user: Option<UserId>,
    day_locks: DayLocks,
}

impl NutritionEngine {
    pub fn new(store: SharedStore, user: Option<UserId>) -> Self {
        Self {
            store,
            user,
            day_locks: DayLocks::default(),
        }
    }

    pub fn user(&self) -> Option<&UserId> {
        self.user.as_ref()
    }

    fn require_user(&self, operation: &str) -> Result<&UserId> {
        match &self.user {
            Some(user) => Ok(user),
            None => {
                tracing::warn!("{} skipped: no authenticated user", operation);
                Err(Error::Unauthenticated)
            }
        }
    }

    /// Run `f` while holding the lock for (user, day)
    fn with_day_lock<T>(
        &self,
        user: &UserId,
        day: NaiveDate,
        f: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let lock = self.day_locks.get(user, day)?;
        let _guard = lock
            .lock()
            .map_err(|_| Error::State(format!("lock for {} on {} poisoned", user, day)))?;
        f()
    }

    fn find_intake(&self, user: &UserId, day: NaiveDate) -> Result<Option<(String, FoodIntake)>> {
        let hits = self.store.query(
            collections::FOOD_INTAKE,
            &user_day_filters("userId", user, "date", day),
        )?;
        if hits.len() > 1 {
            tracing::warn!(
                "{} food intake documents for {} on {}; using the first",
                hits.len(),
                user,
                day
            );
        }
        match hits.into_iter().next() {
            Some((id, doc)) => Ok(Some((id, from_document(doc)?))),
            None => Ok(None),
        }
    }

    fn find_daily(&self, user: &UserId, day: NaiveDate) -> Result<Option<(String, DailyMacros)>> {
        let hits = self.store.query(
            collections::DAILY_MACROS,
            &user_day_filters("userId", user, "date", day),
        )?;
        match hits.into_iter().next() {
            Some((id, doc)) => Ok(Some((id, from_document(doc)?))),
            None => Ok(None),
        }
    }

    fn ensure_intake(&self, user: &UserId, day: NaiveDate) -> Result<(String, FoodIntake)> {
        if let Some(found) = self.find_intake(user, day)? {
            return Ok(found);
        }
        let intake = FoodIntake {
            user_id: user.clone(),
            date: day_bounds(day).0,
            food: Vec::new(),
        };
        let id = self
            .store
            .create(collections::FOOD_INTAKE, to_document(&intake)?)?;
        tracing::debug!("Created food intake {} for {} on {}", id, user, day);
        Ok((id, intake))
    }

    fn ensure_daily(&self, user: &UserId, day: NaiveDate) -> Result<String> {
        if let Some((id, _)) = self.find_daily(user, day)? {
            return Ok(id);
        }
        let daily = DailyMacros {
            user_id: user.clone(),
            date: day_bounds(day).0,
            totals: Macros::ZERO,
        };
        let id = self
            .store
            .create(collections::DAILY_MACROS, to_document(&daily)?)?;
        tracing::debug!("Created daily macros {} for {} on {}", id, user, day);
        Ok(id)
    }

    fn increment_totals(&self, daily_id: &str, delta: Macros) -> Result<()> {
        self.store.update(
            collections::DAILY_MACROS,
            daily_id,
            &[
                ("calories".into(), FieldUpdate::Increment(delta.calories)),
                ("protein".into(), FieldUpdate::Increment(delta.protein)),
                ("carbs".into(), FieldUpdate::Increment(delta.carbs)),
                ("fat".into(), FieldUpdate::Increment(delta.fat)),
            ],
        )
    }

    fn write_selections(&self, intake_id: &str, food: &[FoodSelection]) -> Result<()> {
        self.store.update(
            collections::FOOD_INTAKE,
            intake_id,
            &[("food".into(), FieldUpdate::Set(serde_json::to_value(food)?))],
        )
    }

    /// Contribution of a selection, recomputed from the catalog for entries
    /// that predate stored contributions
    fn contribution(&self, selection: &FoodSelection) -> Result<Macros> {
        match selection.macros {
            Some(macros) => Ok(macros),
            None => {
                let food = self.get_food(&selection.food_id)?;
                Ok(compute_macros(&food, selection.weight))
            }
        }
    }

    /// Log `weight_grams` of `food` for `meal_type` on `day`
    pub fn add_food_selection(
        &self,
        day: NaiveDate,
        food: &Food,
        weight_grams: f64,
        meal_type: MealType,
    ) -> Result<FoodSelection> {
        let user = self.require_user("add food selection")?;
        validate_weight(weight_grams)?;
        if food.id.is_empty() {
            return Err(Error::InvalidInput(format!(
                "food '{}' has no catalog id",
                food.name
            )));
        }

        let macros = compute_macros(food, weight_grams);
        let selection = FoodSelection {
            selection_id: Uuid::new_v4().to_string(),
            food_id: food.id.clone(),
            weight: weight_grams,
            meal_type,
            macros: Some(macros),
        };

        self.with_day_lock(user, day, || {
            let (intake_id, mut intake) = self.ensure_intake(user, day)?;
            let daily_id = self.ensure_daily(user, day)?;

            intake.food.push(selection.clone());
            self.write_selections(&intake_id, &intake.food)?;
            self.increment_totals(&daily_id, macros)
        })?;

        tracing::info!(
            "Added {} g of {} to {} on {} (+{} kcal)",
            weight_grams,
            food.name,
            meal_type.label(),
            day,
            macros.calories
        );
        Ok(selection)
    }

    /// Remove a selection and subtract its contribution from the day's totals
    ///
    /// Fails with `NotFound` when the day has no intake or totals document or
    /// the selection is not in the list; nothing is modified in that case.
    pub fn remove_food_selection(&self, day: NaiveDate, selection_id: &str) -> Result<Macros> {
        let user = self.require_user("remove food selection")?;

        let removed = self.with_day_lock(user, day, || {
            let (intake_id, mut intake) = self
                .find_intake(user, day)?
                .ok_or_else(|| Error::not_found(format!("food intake for {} on {}", user, day)))?;
            let index = intake
                .food
                .iter()
                .position(|s| s.selection_id == selection_id)
                .ok_or_else(|| Error::not_found(format!("food selection {}", selection_id)))?;
            let (daily_id, _) = self
                .find_daily(user, day)?
                .ok_or_else(|| Error::not_found(format!("daily macros for {} on {}", user, day)))?;

            let contribution = self.contribution(&intake.food[index])?;
            intake.food.remove(index);
            self.write_selections(&intake_id, &intake.food)?;
            self.increment_totals(&daily_id, contribution.negated())?;
            Ok(contribution)
        })?;

        tracing::info!(
            "Removed selection {} on {} (-{} kcal)",
            selection_id,
            day,
            removed.calories
        );
        Ok(removed)
    }

    /// Change the weight and meal of an existing selection
    pub fn update_food_selection(
        &self,
        day: NaiveDate,
        selection_id: &str,
        weight_grams: f64,
        meal_type: MealType,
    ) -> Result<FoodSelection> {
        let user = self.require_user("update food selection")?;
        validate_weight(weight_grams)?;

        self.with_day_lock(user, day, || {
            let (intake_id, mut intake) = self
                .find_intake(user, day)?
                .ok_or_else(|| Error::not_found(format!("food intake for {} on {}", user, day)))?;
            let selection = intake
                .food
                .iter_mut()
                .find(|s| s.selection_id == selection_id)
                .ok_or_else(|| Error::not_found(format!("food selection {}", selection_id)))?;
            let (daily_id, _) = self
                .find_daily(user, day)?
                .ok_or_else(|| Error::not_found(format!("daily macros for {} on {}", user, day)))?;

            let food = self.get_food(&selection.food_id)?;
            let old = match selection.macros {
                Some(macros) => macros,
                None => compute_macros(&food, selection.weight),
            };
            let new = compute_macros(&food, weight_grams);

            selection.weight = weight_grams;
            selection.meal_type = meal_type;
            selection.macros = Some(new);
            let updated = selection.clone();

            self.write_selections(&intake_id, &intake.food)?;
            self.increment_totals(&daily_id, new - old)?;

            tracing::info!(
                "Updated selection {} on {} to {} g ({:+} kcal)",
                selection_id,
                day,
                weight_grams,
                new.calories - old.calories
            );
            Ok(updated)
        })
    }

    /// The day's running totals; zero when nothing has been logged
    pub fn daily_macros(&self, day: NaiveDate) -> Result<Macros> {
        let user = self.require_user("read daily macros")?;
        Ok(self
            .find_daily(user, day)?
            .map(|(_, daily)| daily.totals)
            .unwrap_or(Macros::ZERO))
    }

    /// The day's diary with food names resolved from the catalog
    pub fn day_intake(&self, day: NaiveDate) -> Result<DayIntake> {
        let user = self.require_user("read food intake")?;
        let mut meals: Vec<(MealType, Vec<IntakeItem>)> =
            MealType::ALL.iter().map(|m| (*m, Vec::new())).collect();

        let Some((_, intake)) = self.find_intake(user, day)? else {
            return Ok(DayIntake { meals });
        };

        for selection in intake.food {
            let food = match self.get_food(&selection.food_id) {
                Ok(food) => food,
                Err(Error::NotFound(_)) => {
                    tracing::warn!(
                        "Skipping selection {}: food {} is not in the catalog",
                        selection.selection_id,
                        selection.food_id
                    );
                    continue;
                }
                Err(e) => return Err(e),
            };
            let macros = selection
                .macros
                .unwrap_or_else(|| compute_macros(&food, selection.weight));
            let item = IntakeItem {
                selection_id: selection.selection_id,
                food_id: selection.food_id,
                food_name: food.name,
                weight: selection.weight,
                macros,
            };
            if let Some((_, items)) = meals.iter_mut().find(|(m, _)| *m == selection.meal_type) {
                items.push(item);
            }
        }

        Ok(DayIntake { meals })
    }

    /// Calories burned in workouts recorded on `day`
    pub fn calories_burned_on(&self, day: NaiveDate) -> Result<i64> {
        let user = self.require_user("read calories burned")?;
        history::calories_burned_on(self.store.as_ref(), user, day)
    }

    pub fn list_foods(&self) -> Result<Vec<Food>> {
        catalog::load_foods(self.store.as_ref())
    }

    pub fn get_food(&self, id: &str) -> Result<Food> {
        let doc = self
            .store
            .get(collections::FOOD, id)?
            .ok_or_else(|| Error::not_found(format!("food {}", id)))?;
        let mut food: Food = from_document(doc)?;
        food.id = id.to_string();
        Ok(food)
    }

    /// Case-insensitive exact name match
    pub fn find_food_by_name(&self, name: &str) -> Result<Food> {
        let wanted = name.trim().to_lowercase();
        self.list_foods()?
            .into_iter()
            .find(|f| f.name.to_lowercase() == wanted)
            .ok_or_else(|| Error::not_found(format!("food '{}'", name.trim())))
    }
}

fn validate_weight(weight_grams: f64) -> Result<()> {
    if !weight_grams.is_finite() || weight_grams <= 0.0 {
        return Err(Error::InvalidInput(format!(
            "weight must be a positive number of grams, got {}",
            weight_grams
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DocumentStore, MemoryStore};
    use crate::WorkoutSessionRecord;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 14).unwrap()
    }

    fn setup() -> (Arc<MemoryStore>, NutritionEngine, Food) {
        let store = Arc::new(MemoryStore::new());
        let food = Food {
            id: String::new(),
            name: "Test Oats".into(),
            calories: 200.0,
            protein: 10.0,
            carbs: 30.0,
            fat: 5.0,
        };
        let id = store
            .create(collections::FOOD, to_document(&food).unwrap())
            .unwrap();
        let food = Food { id, ..food };
        let engine = NutritionEngine::new(store.clone(), Some(UserId::new("u1")));
        (store, engine, food)
    }

    #[test]
    fn test_add_creates_day_documents_and_increments() {
        let (store, engine, food) = setup();

        let selection = engine
            .add_food_selection(day(), &food, 150.0, MealType::Lunch)
            .unwrap();
        assert_eq!(
            selection.macros,
            Some(Macros {
                calories: 300,
                protein: 15,
                carbs: 45,
                fat: 8,
            })
        );
        assert_eq!(store.len(collections::FOOD_INTAKE), 1);
        assert_eq!(store.len(collections::DAILY_MACROS), 1);

        engine
            .add_food_selection(day(), &food, 100.0, MealType::Dinner)
            .unwrap();
        assert_eq!(store.len(collections::FOOD_INTAKE), 1);
        assert_eq!(engine.daily_macros(day()).unwrap().calories, 500);
    }

    #[test]
    fn test_add_then_remove_restores_totals() {
        let (_store, engine, food) = setup();
        engine
            .add_food_selection(day(), &food, 33.0, MealType::Breakfast)
            .unwrap();
        let before = engine.daily_macros(day()).unwrap();

        for weight in [1.0, 55.5, 150.0, 999.0] {
            let selection = engine
                .add_food_selection(day(), &food, weight, MealType::Other)
                .unwrap();
            let removed = engine
                .remove_food_selection(day(), &selection.selection_id)
                .unwrap();
            assert_eq!(Some(removed), selection.macros);
            assert_eq!(engine.daily_macros(day()).unwrap(), before);
        }
    }

    #[test]
    fn test_remove_without_day_record_is_not_found() {
        let (_store, engine, _food) = setup();
        let result = engine.remove_food_selection(day(), "missing");
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_remove_unknown_selection_changes_nothing() {
        let (_store, engine, food) = setup();
        engine
            .add_food_selection(day(), &food, 100.0, MealType::Lunch)
            .unwrap();

        let result = engine.remove_food_selection(day(), "not-a-selection");
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(engine.daily_macros(day()).unwrap().calories, 200);
        assert_eq!(engine.day_intake(day()).unwrap().items(MealType::Lunch).len(), 1);
    }

    #[test]
    fn test_update_applies_delta() {
        let (_store, engine, food) = setup();
        let selection = engine
            .add_food_selection(day(), &food, 100.0, MealType::Lunch)
            .unwrap();

        let updated = engine
            .update_food_selection(day(), &selection.selection_id, 250.0, MealType::Dinner)
            .unwrap();
        assert_eq!(updated.meal_type, MealType::Dinner);
        assert_eq!(engine.daily_macros(day()).unwrap().calories, 500);

        let intake = engine.day_intake(day()).unwrap();
        assert!(intake.items(MealType::Lunch).is_empty());
        assert_eq!(intake.items(MealType::Dinner)[0].weight, 250.0);
    }

    #[test]
    fn test_legacy_selection_recomputed_from_catalog() {
        let (store, engine, food) = setup();
        let selection = engine
            .add_food_selection(day(), &food, 150.0, MealType::Lunch)
            .unwrap();

        // Strip the stored contribution the way older documents look
        let (intake_id, mut intake) = engine.find_intake(&UserId::new("u1"), day()).unwrap().unwrap();
        intake.food[0].macros = None;
        store
            .update(
                collections::FOOD_INTAKE,
                &intake_id,
                &[("food".into(), FieldUpdate::Set(serde_json::to_value(&intake.food).unwrap()))],
            )
            .unwrap();

        let removed = engine
            .remove_food_selection(day(), &selection.selection_id)
            .unwrap();
        assert_eq!(removed.calories, 300);
        assert_eq!(engine.daily_macros(day()).unwrap(), Macros::ZERO);
    }

    #[test]
    fn test_invalid_weight_rejected() {
        let (store, engine, food) = setup();
        for weight in [0.0, -10.0, f64::NAN] {
            let result = engine.add_food_selection(day(), &food, weight, MealType::Lunch);
            assert!(matches!(result, Err(Error::InvalidInput(_))));
        }
        assert_eq!(store.len(collections::FOOD_INTAKE), 0);
    }

    #[test]
    fn test_unauthenticated_does_not_mutate() {
        let (store, _engine, food) = setup();
        let engine = NutritionEngine::new(store.clone(), None);

        let result = engine.add_food_selection(day(), &food, 100.0, MealType::Lunch);
        assert!(matches!(result, Err(Error::Unauthenticated)));
        assert!(matches!(engine.daily_macros(day()), Err(Error::Unauthenticated)));
        assert_eq!(store.len(collections::FOOD_INTAKE), 0);
        assert_eq!(store.len(collections::DAILY_MACROS), 0);
    }

    #[test]
    fn test_missing_day_reads_as_zero_and_empty() {
        let (_store, engine, _food) = setup();
        assert_eq!(engine.daily_macros(day()).unwrap(), Macros::ZERO);
        let intake = engine.day_intake(day()).unwrap();
        assert!(intake.is_empty());
        assert_eq!(intake.meals.len(), 4);
    }

    #[test]
    fn test_day_intake_skips_unknown_food() {
        let (store, engine, food) = setup();
        engine
            .add_food_selection(day(), &food, 100.0, MealType::Breakfast)
            .unwrap();
        engine
            .add_food_selection(day(), &food, 50.0, MealType::Breakfast)
            .unwrap();
        store.delete(collections::FOOD, &food.id).unwrap();

        let intake = engine.day_intake(day()).unwrap();
        assert!(intake.is_empty());
    }

    #[test]
    fn test_other_days_are_separate() {
        let (_store, engine, food) = setup();
        let next = day().succ_opt().unwrap();
        engine
            .add_food_selection(day(), &food, 100.0, MealType::Lunch)
            .unwrap();
        engine
            .add_food_selection(next, &food, 50.0, MealType::Lunch)
            .unwrap();

        assert_eq!(engine.daily_macros(day()).unwrap().calories, 200);
        assert_eq!(engine.daily_macros(next).unwrap().calories, 100);
    }

    #[test]
    fn test_concurrent_adds_on_same_day() {
        crate::logging::init_test();
        let (store, engine, food) = setup();
        let engine = Arc::new(engine);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = engine.clone();
                let food = food.clone();
                std::thread::spawn(move || {
                    for _ in 0..5 {
                        engine
                            .add_food_selection(day(), &food, 100.0, MealType::Other)
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(collections::FOOD_INTAKE), 1);
        assert_eq!(store.len(collections::DAILY_MACROS), 1);
        assert_eq!(engine.daily_macros(day()).unwrap().calories, 40 * 200);
        assert_eq!(engine.day_intake(day()).unwrap().items(MealType::Other).len(), 40);
    }

    #[test]
    fn test_find_food_by_name() {
        let (_store, engine, food) = setup();
        assert_eq!(engine.find_food_by_name("test oats").unwrap().id, food.id);
        assert!(matches!(
            engine.find_food_by_name("kale"),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(engine.get_food("nope"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_calories_burned_on_sums_sessions() {
        let (store, engine, _food) = setup();
        let (start, _) = day_bounds(day());
        for (calories, offset) in [(240, 3600), (100, 7200)] {
            let record = WorkoutSessionRecord {
                id: String::new(),
                plan_name: "Push".into(),
                user: UserId::new("u1"),
                exercises: vec![],
                session_seconds: 1200,
                calories_burned: calories,
                timestamp: start + offset,
            };
            store
                .create(collections::WORKOUT_SESSIONS, to_document(&record).unwrap())
                .unwrap();
        }
        assert_eq!(engine.calories_burned_on(day()).unwrap(), 340);
    }
}
