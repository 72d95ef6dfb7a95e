//! Energy and macro formulas.
//!
//! - BMR: Harris-Benedict with gender-specific coefficients
//! - Maintenance calories: BMR scaled by an activity multiplier
//! - Goal calories: maintenance adjusted for bulking or cutting
//! - Food macros: per-100 g values scaled by weight
//! - Workout burn: MET x body weight x hours

use crate::{ActivityLevel, FitnessGoal, Food, Gender, Macros, UserMetrics};

/// Daily surplus added when bulking (kcal)
pub const BULK_SURPLUS_KCAL: i64 = 400;

/// Fraction of maintenance eaten when cutting
pub const CUT_FACTOR: f64 = 0.85;

/// MET value used for a general gym session
pub const GYM_SESSION_MET: f64 = 6.0;

/// Basal metabolic rate in kcal/day
pub fn compute_bmr(weight_kg: f64, height_cm: f64, age: f64, gender: Gender) -> f64 {
    match gender {
        Gender::Male => 88.362 + 13.397 * weight_kg + 4.799 * height_cm - 5.677 * age,
        Gender::Female => 447.593 + 9.247 * weight_kg + 3.098 * height_cm - 4.330 * age,
    }
}

pub fn activity_multiplier(level: ActivityLevel) -> f64 {
    match level {
        ActivityLevel::NoExercise => 1.2,
        ActivityLevel::Light => 1.375,
        ActivityLevel::Moderate => 1.55,
        ActivityLevel::VeryActive => 1.725,
        ActivityLevel::Unknown => 1.2,
    }
}

/// Calories needed to hold weight, truncated to whole kcal
pub fn maintenance_calories(metrics: &UserMetrics) -> i64 {
    let bmr = compute_bmr(
        metrics.weight_kg,
        f64::from(metrics.height_cm),
        f64::from(metrics.age),
        metrics.gender,
    );
    (bmr * activity_multiplier(metrics.activity_level)) as i64
}

pub fn goal_calories(goal: FitnessGoal, maintenance: i64) -> i64 {
    match goal {
        FitnessGoal::Bulk => maintenance + BULK_SURPLUS_KCAL,
        FitnessGoal::Cut => (maintenance as f64 * CUT_FACTOR).floor() as i64,
        FitnessGoal::Maintain | FitnessGoal::Unknown => maintenance,
    }
}

/// Macros for `weight_grams` of a food; each value rounds on its own
pub fn compute_macros(food: &Food, weight_grams: f64) -> Macros {
    let scale = weight_grams / 100.0;
    Macros {
        calories: (food.calories * scale).round() as i64,
        protein: (food.protein * scale).round() as i64,
        carbs: (food.carbs * scale).round() as i64,
        fat: (food.fat * scale).round() as i64,
    }
}

/// Calories burned after `elapsed_seconds` of training
pub fn calories_burned(met: f64, weight_kg: f64, elapsed_seconds: u64) -> i64 {
    let hours = elapsed_seconds as f64 / 3600.0;
    (met * weight_kg * hours).round() as i64
}
