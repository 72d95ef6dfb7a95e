//! Async owner of a live workout session.
//!
//! `WorkoutDriver` runs two one-second tokio tasks against the shared
//! session: an elapsed-time ticker for the whole session and a rest
//! countdown started after every completed set. Both are aborted on
//! completion, quit, and drop. Every change is published as a
//! `SessionSnapshot` on a `watch` channel.

use crate::history;
use crate::plans;
use crate::session::{LiveWorkoutSession, SessionSnapshot, SessionState, SetCompletion, SetInput};
use crate::store::SharedStore;
use crate::{Plan, Result, WorkoutSessionRecord};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

const TICK: Duration = Duration::from_secs(1);

type Shared = Arc<Mutex<LiveWorkoutSession>>;
type Publisher = Arc<watch::Sender<SessionSnapshot>>;

pub struct WorkoutDriver {
    store: SharedStore,
    plan_id: String,
    session: Shared,
    snapshots: Publisher,
    elapsed_task: Option<JoinHandle<()>>,
    rest_task: Option<JoinHandle<()>>,
    /// Finished record whose save has not succeeded yet
    pending_record: Option<WorkoutSessionRecord>,
}

impl WorkoutDriver {
    /// Start and confirm a session for `plan`
    ///
    /// Must be called from within a tokio runtime. A plan without sets
    /// leaves the session in `AwaitingConfiguration` with no ticker running.
    pub fn start(
        store: SharedStore,
        plan: Plan,
        default_rest_seconds: u32,
        user_weight_kg: f64,
    ) -> Result<Self> {
        Self::start_session(
            store,
            LiveWorkoutSession::start(plan, user_weight_kg),
            default_rest_seconds,
        )
    }

    /// Confirm an already constructed session and take ownership of it
    pub fn start_session(
        store: SharedStore,
        mut session: LiveWorkoutSession,
        default_rest_seconds: u32,
    ) -> Result<Self> {
        let confirmed = session.confirm(default_rest_seconds)?;
        let plan_id = session.plan().id.clone();
        let (sender, _) = watch::channel(session.snapshot());

        let mut driver = Self {
            store,
            plan_id,
            session: Arc::new(Mutex::new(session)),
            snapshots: Arc::new(sender),
            elapsed_task: None,
            rest_task: None,
            pending_record: None,
        };
        if confirmed {
            driver.elapsed_task = Some(spawn_elapsed(
                driver.session.clone(),
                driver.snapshots.clone(),
            ));
        }
        Ok(driver)
    }

    /// Stream of snapshots, updated on every tick and command
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.subscribe()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.session.lock().await.snapshot()
    }

    /// Read the session under its lock
    pub async fn inspect<R>(&self, f: impl FnOnce(&LiveWorkoutSession) -> R) -> R {
        let session = self.session.lock().await;
        f(&session)
    }

    /// Apply a command to the session and publish the result
    async fn command<R>(&self, f: impl FnOnce(&mut LiveWorkoutSession) -> Result<R>) -> Result<R> {
        let mut session = self.session.lock().await;
        let result = f(&mut session);
        self.snapshots.send_replace(session.snapshot());
        result
    }

    /// Write a performed set back into the plan; failures are only logged
    fn push_plan_set(&self, completion: &SetCompletion) {
        if let Err(e) = plans::update_plan_set(
            self.store.as_ref(),
            &self.plan_id,
            &completion.exercise_name,
            &completion.set,
        ) {
            tracing::warn!(
                "Unable to update plan {} with {} set {}: {}",
                self.plan_id,
                completion.exercise_name,
                completion.set.number,
                e
            );
        }
    }

    fn stop_rest_ticker(&mut self) {
        if let Some(task) = self.rest_task.take() {
            task.abort();
        }
    }

    fn stop_tickers(&mut self) {
        self.stop_rest_ticker();
        if let Some(task) = self.elapsed_task.take() {
            task.abort();
        }
    }

    pub async fn complete_set(&mut self, input: SetInput) -> Result<SetCompletion> {
        let completion = self.command(|s| s.complete_set(input)).await?;
        self.push_plan_set(&completion);

        self.stop_rest_ticker();
        self.rest_task = Some(spawn_rest(self.session.clone(), self.snapshots.clone()));
        Ok(completion)
    }

    pub async fn skip_rest(&mut self) -> Result<()> {
        self.command(|s| s.skip_rest()).await?;
        self.stop_rest_ticker();
        Ok(())
    }

    pub async fn increase_rest_time(&self, seconds: u32) -> Result<()> {
        self.command(|s| s.increase_rest_time(seconds)).await
    }

    pub async fn decrease_rest_time(&mut self, seconds: u32) -> Result<()> {
        let state = self
            .command(|s| {
                s.decrease_rest_time(seconds)?;
                Ok(s.state())
            })
            .await?;
        if state != SessionState::ActiveRest {
            self.stop_rest_ticker();
        }
        Ok(())
    }

    /// Finish the session, stop both tickers and save the record
    ///
    /// When the save fails the record is kept, and calling this again
    /// retries the save; `input` is ignored on a retry.
    pub async fn mark_complete(&mut self, input: Option<SetInput>) -> Result<WorkoutSessionRecord> {
        let mut record = match self.pending_record.take() {
            Some(record) => record,
            None => self.finish(input).await?,
        };
        match history::save_record(self.store.as_ref(), &record) {
            Ok(id) => {
                record.id = id;
                Ok(record)
            }
            Err(e) => {
                tracing::warn!("Unable to save session for '{}': {}", record.plan_name, e);
                self.pending_record = Some(record);
                Err(e)
            }
        }
    }

    /// Complete the session and stop both tickers
    async fn finish(&mut self, input: Option<SetInput>) -> Result<WorkoutSessionRecord> {
        let (record, forced) = self
            .command(|s| {
                let before = s.completed_sets();
                let record = s.mark_complete(input)?;
                let forced = if s.completed_sets() > before {
                    s.last_completion().cloned()
                } else {
                    None
                };
                Ok((record, forced))
            })
            .await?;
        self.stop_tickers();

        if let Some(completion) = forced {
            self.push_plan_set(&completion);
        }
        Ok(record)
    }

    /// Abandon the session; nothing is saved
    pub async fn quit(&mut self) {
        {
            let mut session = self.session.lock().await;
            session.quit();
            self.snapshots.send_replace(session.snapshot());
        }
        self.pending_record = None;
        self.stop_tickers();
    }

    /// Whether a finished record is waiting for a successful save
    pub fn has_unsaved_record(&self) -> bool {
        self.pending_record.is_some()
    }

    pub async fn state(&self) -> SessionState {
        self.session.lock().await.state()
    }
}

impl Drop for WorkoutDriver {
    fn drop(&mut self) {
        self.stop_tickers();
    }
}

fn ticker() -> tokio::time::Interval {
    let mut interval = interval_at(Instant::now() + TICK, TICK);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

fn spawn_elapsed(session: Shared, snapshots: Publisher) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = ticker();
        loop {
            interval.tick().await;
            let mut session = session.lock().await;
            if !session.state().is_active() {
                break;
            }
            session.tick_elapsed();
            snapshots.send_replace(session.snapshot());
        }
    })
}

fn spawn_rest(session: Shared, snapshots: Publisher) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = ticker();
        loop {
            interval.tick().await;
            let mut session = session.lock().await;
            if session.state() != SessionState::ActiveRest {
                break;
            }
            let state = session.tick_rest();
            snapshots.send_replace(session.snapshot());
            if state != SessionState::ActiveRest {
                break;
            }
        }
    })
}
