//! Live workout session state machine.
//!
//! The session walks a plan's exercises and sets in order:
//!
//! ```text
//! AwaitingConfiguration --confirm--> ActiveSet --complete_set--> ActiveRest
//!                                        ^                           |
//!                                        +---- countdown / skip -----+
//! ActiveSet | ActiveRest --mark_complete--> Completed
//! any non-terminal state --quit--> Abandoned
//! ```
//!
//! Time is driven from outside through `tick_elapsed` and `tick_rest`, one
//! call per second; see `driver` for the tokio tasks that do so.

use crate::metabolism::{calories_burned, GYM_SESSION_MET};
use crate::types::{parse_reps, parse_weight_kg};
use crate::{Error, ExerciseLog, Plan, Result, WorkoutSessionRecord, WorkoutSet};
use chrono::Utc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    AwaitingConfiguration,
    ActiveSet,
    ActiveRest,
    Completed,
    Abandoned,
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::ActiveSet | SessionState::ActiveRest)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Abandoned)
    }
}

/// Position of the next set to perform
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cursor {
    pub exercise: usize,
    pub set: usize,
}

/// Reps and weight entered for a set
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SetInput {
    pub reps: u32,
    pub weight_kg: f64,
}

impl SetInput {
    pub fn parse(reps: &str, weight_kg: &str) -> Result<Self> {
        Ok(Self {
            reps: parse_reps(reps)?,
            weight_kg: parse_weight_kg(weight_kg)?,
        })
    }
}

/// A set recorded by `complete_set`
#[derive(Clone, Debug, PartialEq)]
pub struct SetCompletion {
    pub exercise_name: String,
    pub set: WorkoutSet,
}

/// Read-only view published to observers
#[derive(Clone, Debug, PartialEq)]
pub struct SessionSnapshot {
    pub plan_name: String,
    pub state: SessionState,
    pub exercise_name: Option<String>,
    pub target: Option<WorkoutSet>,
    pub rest_remaining: u32,
    pub rest_initial: u32,
    pub elapsed_seconds: u64,
    pub calories_burned: i64,
    pub completed_sets: usize,
    pub total_sets: usize,
}

pub struct LiveWorkoutSession {
    plan: Plan,
    user_weight_kg: f64,
    met: f64,
    state: SessionState,
    default_rest: u32,
    cursor: Option<Cursor>,
    logs: Vec<ExerciseLog>,
    last_completion: Option<SetCompletion>,
    rest_remaining: u32,
    rest_initial: u32,
    rest_consumed: u64,
    elapsed: u64,
    calories: i64,
}

impl LiveWorkoutSession {
    pub fn start(plan: Plan, user_weight_kg: f64) -> Self {
        tracing::info!(
            "Starting session for plan '{}' ({} sets)",
            plan.name,
            plan.total_sets()
        );
        Self {
            plan,
            user_weight_kg,
            met: GYM_SESSION_MET,
            state: SessionState::AwaitingConfiguration,
            default_rest: 0,
            cursor: None,
            logs: Vec::new(),
            last_completion: None,
            rest_remaining: 0,
            rest_initial: 0,
            rest_consumed: 0,
            elapsed: 0,
            calories: 0,
        }
    }

    /// Override the MET value used for the calorie estimate
    pub fn with_met(mut self, met: f64) -> Self {
        self.met = met;
        self
    }

    /// First position at or after `from` whose exercise has sets
    fn seek(&self, from: Cursor) -> Option<Cursor> {
        let mut cursor = from;
        while let Some(exercise) = self.plan.exercises.get(cursor.exercise) {
            if cursor.set < exercise.sets.len() {
                return Some(cursor);
            }
            cursor = Cursor {
                exercise: cursor.exercise + 1,
                set: 0,
            };
        }
        None
    }

    /// Choose the default rest and begin the first set
    ///
    /// Returns `false` without changing state when the plan has no sets.
    pub fn confirm(&mut self, default_rest_seconds: u32) -> Result<bool> {
        if self.state != SessionState::AwaitingConfiguration {
            return Err(Error::InvalidState(format!(
                "cannot confirm a session in {:?}",
                self.state
            )));
        }
        if default_rest_seconds == 0 {
            return Err(Error::InvalidInput(
                "default rest must be at least one second".into(),
            ));
        }

        let Some(first) = self.seek(Cursor {
            exercise: 0,
            set: 0,
        }) else {
            tracing::warn!("Plan '{}' has no sets; session not started", self.plan.name);
            return Ok(false);
        };

        self.default_rest = default_rest_seconds;
        self.cursor = Some(first);
        self.state = SessionState::ActiveSet;
        tracing::info!(
            "Session confirmed with {} s default rest",
            default_rest_seconds
        );
        Ok(true)
    }

    fn exercise_log(&mut self, name: &str) -> &mut ExerciseLog {
        let index = match self.logs.iter().position(|l| l.exercise_name == name) {
            Some(index) => index,
            None => {
                self.logs.push(ExerciseLog {
                    exercise_name: name.to_string(),
                    sets: Vec::new(),
                });
                self.logs.len() - 1
            }
        };
        &mut self.logs[index]
    }

    /// Record the set under the cursor and advance it
    fn record_current(&mut self, input: SetInput) -> Result<SetCompletion> {
        let Some(cursor) = self.cursor else {
            return Err(Error::InvalidState("every set has been completed".into()));
        };
        let exercise = self
            .plan
            .exercises
            .get(cursor.exercise)
            .ok_or_else(|| Error::InvalidState("exercise index out of bounds".into()))?;
        let target = exercise
            .sets
            .get(cursor.set)
            .ok_or_else(|| Error::InvalidState("set index out of bounds".into()))?;

        let completion = SetCompletion {
            exercise_name: exercise.name.clone(),
            set: WorkoutSet {
                number: target.number,
                reps: input.reps,
                weight_kg: input.weight_kg,
            },
        };

        self.exercise_log(&completion.exercise_name)
            .sets
            .push(completion.set.clone());
        self.cursor = self.seek(Cursor {
            exercise: cursor.exercise,
            set: cursor.set + 1,
        });
        self.last_completion = Some(completion.clone());

        tracing::debug!(
            "Completed {} set {}: {} x {} kg",
            completion.exercise_name,
            completion.set.number,
            completion.set.reps,
            completion.set.weight_kg
        );
        Ok(completion)
    }

    /// Record the current set and start the rest countdown
    pub fn complete_set(&mut self, input: SetInput) -> Result<SetCompletion> {
        if self.state != SessionState::ActiveSet {
            return Err(Error::InvalidState(format!(
                "cannot complete a set in {:?}",
                self.state
            )));
        }

        let completion = self.record_current(input)?;
        self.rest_initial = self.default_rest;
        self.rest_remaining = self.default_rest;
        self.state = SessionState::ActiveRest;
        Ok(completion)
    }

    /// One second of session time
    pub fn tick_elapsed(&mut self) {
        if !self.state.is_active() {
            return;
        }
        self.elapsed += 1;
        self.calories = calories_burned(self.met, self.user_weight_kg, self.elapsed);
    }

    /// One second of rest countdown; returns the state after the tick
    pub fn tick_rest(&mut self) -> SessionState {
        if self.state != SessionState::ActiveRest {
            return self.state;
        }
        if self.rest_remaining > 0 {
            self.rest_remaining -= 1;
            self.rest_consumed += 1;
        }
        if self.rest_remaining == 0 {
            self.state = SessionState::ActiveSet;
            tracing::debug!("Rest finished");
        }
        self.state
    }

    fn require_rest(&self, operation: &str) -> Result<()> {
        if self.state != SessionState::ActiveRest {
            return Err(Error::InvalidState(format!(
                "cannot {} in {:?}",
                operation, self.state
            )));
        }
        Ok(())
    }

    /// End the rest now; the skipped remainder does not count as rest
    pub fn skip_rest(&mut self) -> Result<()> {
        self.require_rest("skip rest")?;
        tracing::debug!("Skipped {} s of rest", self.rest_remaining);
        self.rest_remaining = 0;
        self.state = SessionState::ActiveSet;
        Ok(())
    }

    pub fn increase_rest_time(&mut self, seconds: u32) -> Result<()> {
        self.require_rest("adjust rest")?;
        self.rest_remaining = self.rest_remaining.saturating_add(seconds);
        Ok(())
    }

    /// Requests larger than the remaining rest are ignored; reaching zero
    /// ends the rest like the countdown does
    pub fn decrease_rest_time(&mut self, seconds: u32) -> Result<()> {
        self.require_rest("adjust rest")?;
        if self.rest_remaining >= seconds {
            self.rest_remaining -= seconds;
        }
        if self.rest_remaining == 0 {
            self.state = SessionState::ActiveSet;
            tracing::debug!("Rest finished");
        }
        Ok(())
    }

    /// Whether the cursor sits on the final set of the plan
    fn on_final_set(&self) -> bool {
        match self.cursor {
            Some(cursor) => self
                .seek(Cursor {
                    exercise: cursor.exercise,
                    set: cursor.set + 1,
                })
                .is_none(),
            None => false,
        }
    }

    /// Finish the session and build its record
    ///
    /// A pending final set is recorded first, using `input` or else the
    /// plan's target reps and weight.
    pub fn mark_complete(&mut self, input: Option<SetInput>) -> Result<WorkoutSessionRecord> {
        if !self.state.is_active() {
            return Err(Error::InvalidState(format!(
                "cannot complete a session in {:?}",
                self.state
            )));
        }

        if self.on_final_set() {
            let input = match (input, self.current_target()) {
                (Some(input), _) => input,
                (None, Some(target)) => SetInput {
                    reps: target.reps,
                    weight_kg: target.weight_kg,
                },
                (None, None) => {
                    return Err(Error::InvalidState("final set has no target".into()))
                }
            };
            self.record_current(input)?;
        }

        self.state = SessionState::Completed;
        self.rest_remaining = 0;

        let record = WorkoutSessionRecord {
            id: String::new(),
            plan_name: self.plan.name.clone(),
            user: self.plan.user.clone(),
            exercises: self.logs.clone(),
            session_seconds: self.elapsed.saturating_sub(self.rest_consumed),
            calories_burned: calories_burned(self.met, self.user_weight_kg, self.elapsed),
            timestamp: Utc::now().timestamp(),
        };
        tracing::info!(
            "Session for '{}' completed: {} sets, {} s active, {} kcal",
            record.plan_name,
            record.total_sets(),
            record.session_seconds,
            record.calories_burned
        );
        Ok(record)
    }

    /// Abandon the session without a record
    pub fn quit(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        tracing::info!("Session for '{}' abandoned", self.plan.name);
        self.state = SessionState::Abandoned;
        self.rest_remaining = 0;
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn cursor(&self) -> Option<Cursor> {
        self.cursor
    }

    pub fn current_exercise_name(&self) -> Option<&str> {
        let cursor = self.cursor?;
        self.plan
            .exercises
            .get(cursor.exercise)
            .map(|e| e.name.as_str())
    }

    /// Planned reps and weight of the set under the cursor
    pub fn current_target(&self) -> Option<&WorkoutSet> {
        let cursor = self.cursor?;
        self.plan.exercises.get(cursor.exercise)?.sets.get(cursor.set)
    }

    /// True once every set of the plan has been recorded
    pub fn is_completable(&self) -> bool {
        self.state.is_active() && self.cursor.is_none()
    }

    pub fn remaining_sets(&self) -> usize {
        self.plan.total_sets() - self.completed_sets()
    }

    pub fn rest_remaining(&self) -> u32 {
        self.rest_remaining
    }

    pub fn rest_initial(&self) -> u32 {
        self.rest_initial
    }

    pub fn rest_consumed(&self) -> u64 {
        self.rest_consumed
    }

    pub fn default_rest(&self) -> u32 {
        self.default_rest
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed
    }

    pub fn calories_burned(&self) -> i64 {
        self.calories
    }

    pub fn completed_sets(&self) -> usize {
        self.logs.iter().map(|l| l.sets.len()).sum()
    }

    pub fn exercise_logs(&self) -> &[ExerciseLog] {
        &self.logs
    }

    pub fn last_completion(&self) -> Option<&SetCompletion> {
        self.last_completion.as_ref()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            plan_name: self.plan.name.clone(),
            state: self.state,
            exercise_name: self.current_exercise_name().map(str::to_string),
            target: self.current_target().cloned(),
            rest_remaining: self.rest_remaining,
            rest_initial: self.rest_initial,
            elapsed_seconds: self.elapsed,
            calories_burned: self.calories,
            completed_sets: self.completed_sets(),
            total_sets: self.plan.total_sets(),
        }
    }
}
