//! Workout plan repository over the `plans` collection.

use crate::store::{collections, from_document, to_document, DocumentStore, Filter};
use crate::{Error, Plan, PlanExercise, Result, UserId, WorkoutSet};

fn decode(id: String, doc: crate::store::Document) -> Result<Plan> {
    let mut plan: Plan = from_document(doc)?;
    plan.id = id;
    Ok(plan)
}

/// Store a new plan and return its id
pub fn create_plan(
    store: &dyn DocumentStore,
    user: &UserId,
    name: &str,
    exercises: Vec<PlanExercise>,
) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("plan name cannot be empty".into()));
    }
    if let Some(blank) = exercises.iter().find(|e| e.name.trim().is_empty()) {
        return Err(Error::InvalidInput(format!(
            "exercise with {} sets has no name",
            blank.sets.len()
        )));
    }

    let plan = Plan {
        id: String::new(),
        name: name.to_string(),
        user: user.clone(),
        exercises,
    };
    let id = store.create(collections::PLANS, to_document(&plan)?)?;
    tracing::info!("Created plan '{}' ({}) for {}", plan.name, id, user);
    Ok(id)
}

/// The user's plans sorted by name
pub fn list_plans(store: &dyn DocumentStore, user: &UserId) -> Result<Vec<Plan>> {
    let mut plans = Vec::new();
    for (id, doc) in store.query(collections::PLANS, &[Filter::eq("User", user.as_str())])? {
        match decode(id.clone(), doc) {
            Ok(plan) => plans.push(plan),
            Err(e) => tracing::warn!("Skipping unreadable plan {}: {}", id, e),
        }
    }
    plans.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(plans)
}

pub fn get_plan(store: &dyn DocumentStore, id: &str) -> Result<Plan> {
    let doc = store
        .get(collections::PLANS, id)?
        .ok_or_else(|| Error::not_found(format!("plan {}", id)))?;
    decode(id.to_string(), doc)
}

/// Replace a stored plan with `plan`
pub fn update_plan(store: &dyn DocumentStore, plan: &Plan) -> Result<()> {
    if store.get(collections::PLANS, &plan.id)?.is_none() {
        return Err(Error::not_found(format!("plan {}", plan.id)));
    }
    store.set(collections::PLANS, &plan.id, to_document(plan)?)?;
    tracing::debug!("Updated plan {}", plan.id);
    Ok(())
}

pub fn delete_plan(store: &dyn DocumentStore, id: &str) -> Result<()> {
    store.delete(collections::PLANS, id)?;
    tracing::info!("Deleted plan {}", id);
    Ok(())
}

/// Write the latest performed reps and weight into the plan's matching set
pub fn update_plan_set(
    store: &dyn DocumentStore,
    plan_id: &str,
    exercise_name: &str,
    set: &WorkoutSet,
) -> Result<()> {
    let mut plan = get_plan(store, plan_id)?;
    let exercise = plan
        .exercises
        .iter_mut()
        .find(|e| e.name == exercise_name)
        .ok_or_else(|| {
            Error::not_found(format!("exercise '{}' in plan {}", exercise_name, plan_id))
        })?;
    let target = exercise
        .sets
        .iter_mut()
        .find(|s| s.number == set.number)
        .ok_or_else(|| {
            Error::not_found(format!("set {} of '{}'", set.number, exercise_name))
        })?;

    target.reps = set.reps;
    target.weight_kg = set.weight_kg;
    update_plan(store, &plan)
}
