//! Default food catalog.
//!
//! The food collection is normally maintained outside this crate; this module
//! provides a built-in set of common foods used to seed an empty store.

use crate::store::{collections, from_document, to_document, DocumentStore, Filter};
use crate::{Error, Food, Result};
use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Cached default catalog, built once
static DEFAULT_FOODS: Lazy<Vec<Food>> = Lazy::new(build_default_foods);

/// Get a reference to the cached default food list
pub fn default_foods() -> &'static [Food] {
    &DEFAULT_FOODS
}

fn food(name: &str, calories: f64, protein: f64, carbs: f64, fat: f64) -> Food {
    Food {
        id: String::new(),
        name: name.into(),
        calories,
        protein,
        carbs,
        fat,
    }
}

// Values per 100 g
fn build_default_foods() -> Vec<Food> {
    vec![
        food("Chicken Breast", 165.0, 31.0, 0.0, 3.6),
        food("White Rice (cooked)", 130.0, 2.7, 28.0, 0.3),
        food("Rolled Oats", 389.0, 16.9, 66.3, 6.9),
        food("Whole Egg", 143.0, 12.6, 0.7, 9.5),
        food("Banana", 89.0, 1.1, 22.8, 0.3),
        food("Greek Yogurt", 97.0, 9.0, 3.9, 5.0),
        food("Salmon", 208.0, 20.0, 0.0, 13.0),
        food("Broccoli", 34.0, 2.8, 6.6, 0.4),
        food("Whole Milk", 61.0, 3.2, 4.8, 3.3),
        food("Peanut Butter", 588.0, 25.0, 20.0, 50.0),
        food("Sweet Potato", 86.0, 1.6, 20.1, 0.1),
        food("Wholemeal Bread", 247.0, 13.0, 41.0, 3.4),
    ]
}

/// Validate a list of foods
///
/// Returns a list of validation errors (empty if valid).
pub fn validate_foods(foods: &[Food]) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for food in foods {
        if food.name.trim().is_empty() {
            errors.push("Food with empty name".to_string());
            continue;
        }

        if !seen.insert(food.name.to_lowercase()) {
            errors.push(format!("Duplicate food name '{}'", food.name));
        }

        for (field, value) in [
            ("calories", food.calories),
            ("protein", food.protein),
            ("carbs", food.carbs),
            ("fat", food.fat),
        ] {
            if !value.is_finite() || value < 0.0 {
                errors.push(format!(
                    "Food '{}': {} must be a non-negative number, got {}",
                    food.name, field, value
                ));
            }
        }

        if food.protein + food.carbs + food.fat > 100.0 {
            errors.push(format!(
                "Food '{}': macros exceed 100 g per 100 g",
                food.name
            ));
        }
    }

    errors
}

/// Load every food in the store's catalog
pub fn load_foods(store: &dyn DocumentStore) -> Result<Vec<Food>> {
    let mut foods = Vec::new();
    for (id, doc) in store.query(collections::FOOD, &[])? {
        match from_document::<Food>(doc) {
            Ok(mut food) => {
                food.id = id;
                foods.push(food);
            }
            Err(e) => tracing::warn!("Skipping malformed food {}: {}", id, e),
        }
    }
    foods.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(foods)
}

/// Insert the default foods whose names are not already in the catalog
///
/// Returns the number of foods inserted.
pub fn seed_food_catalog(store: &dyn DocumentStore) -> Result<usize> {
    let errors = validate_foods(default_foods());
    if !errors.is_empty() {
        return Err(Error::CatalogValidation(errors.join("; ")));
    }

    let mut inserted = 0;
    for food in default_foods() {
        let existing = store.query(collections::FOOD, &[Filter::eq("name", food.name.as_str())])?;
        if existing.is_empty() {
            store.create(collections::FOOD, to_document(food)?)?;
            inserted += 1;
        }
    }

    tracing::info!("Seeded {} foods into the catalog", inserted);
    Ok(inserted)
}
