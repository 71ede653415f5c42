use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::clock::{elapsed_ms, Clock};
use crate::config::Settings;
use crate::error::TimerError;
use crate::error_log;
use crate::keybinds::KeyBindConfig;
use crate::runs;
use crate::split::{self, Run, Split};
use crate::storage::{Store, StoreExt, StorageKey};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TimerStatus {
    #[default]
    Initial,
    Running,
    Paused,
    Stopped,
}

/// Everything the timer can be asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Initialize,
    Start,
    Tick,
    PauseResume,
    Split,
    Undo,
    Reset,
    Stop,
    /// A physical key code such as `"Enter"` or `"KeyS"`
    KeyPress(String),
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Initialize => "initialize",
            Action::Start => "start",
            Action::Tick => "tick",
            Action::PauseResume => "pauseResume",
            Action::Split => "split",
            Action::Undo => "undo",
            Action::Reset => "reset",
            Action::Stop => "stop",
            Action::KeyPress(_) => "keyPress",
        }
    }

    /// Build an action from its name, as received from scripted input.
    /// `code` is only used by `keyPress`, where it is required.
    pub fn from_name(name: &str, code: Option<&str>) -> Result<Self, TimerError> {
        let action = match name {
            "initialize" => Action::Initialize,
            "start" => Action::Start,
            "tick" => Action::Tick,
            "pauseResume" => Action::PauseResume,
            "split" => Action::Split,
            "undo" => Action::Undo,
            "reset" => Action::Reset,
            "stop" => Action::Stop,
            "keyPress" => match code {
                Some(code) if !code.is_empty() => Action::KeyPress(code.to_string()),
                _ => return Err(TimerError::MissingRequiredValue("keyPress code".into())),
            },
            other => return Err(TimerError::UnrecognizedAction(other.to_string())),
        };
        Ok(action)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TimerState {
    pub status: TimerStatus,
    /// Name of the run the split list was taken from
    pub run_name: String,
    pub splits: Vec<Split>,
    /// Index of the next split awaiting a time, in `[0, splits.len()]`
    pub current_split: usize,
    pub current_time_ms: u64,
    /// Start of the current running interval. Only meaningful while running.
    pub timestamp_ref_ms: u64,
    /// Time banked from earlier run/pause intervals
    pub recorded_time_ms: u64,
}

impl TimerState {
    pub fn with_splits(splits: Vec<Split>) -> Self {
        Self {
            splits,
            ..Self::default()
        }
    }

    /// Elapsed run time at `now_ms`, without waiting for the next tick
    pub fn live_time_ms(&self, now_ms: u64) -> u64 {
        if self.status == TimerStatus::Running {
            self.recorded_time_ms + elapsed_ms(self.timestamp_ref_ms, now_ms)
        } else {
            self.current_time_ms
        }
    }

    pub fn all_splits_recorded(&self) -> bool {
        self.current_split >= self.splits.len()
    }

    /// Rebuild the state from the store. The split list and run name fall back
    /// to the selected run, every other field to its zero value. Unreadable
    /// session values count as missing.
    pub fn rehydrate(store: &dyn Store) -> Self {
        let (splits, run_name) = match session_value::<Vec<Split>>(store, StorageKey::Splits) {
            Some(splits) => (
                splits,
                session_value(store, StorageKey::RunName).unwrap_or_default(),
            ),
            None => selected_run(store)
                .map(|run| (split::cleared(&run.splits), run.name))
                .unwrap_or_default(),
        };

        let mut current_split: usize =
            session_value(store, StorageKey::CurrentSplit).unwrap_or(0);
        if current_split > splits.len() {
            tracing::warn!(
                current_split,
                splits = splits.len(),
                "stored split index out of range, clamping"
            );
            current_split = splits.len();
        }

        Self {
            status: session_value(store, StorageKey::Status).unwrap_or_default(),
            current_split,
            current_time_ms: session_value(store, StorageKey::CurrentTime).unwrap_or(0),
            timestamp_ref_ms: session_value(store, StorageKey::TimestampRef).unwrap_or(0),
            recorded_time_ms: session_value(store, StorageKey::RecordedTimes).unwrap_or(0),
            run_name,
            splits,
        }
    }

    /// Fresh state for the selected run, or for the current split list when
    /// no run is selected
    fn reset_from(&self, store: &dyn Store) -> Self {
        match selected_run(store) {
            Some(run) => Self {
                splits: split::cleared(&run.splits),
                run_name: run.name,
                ..Self::default()
            },
            None => Self {
                splits: split::cleared(&self.splits),
                run_name: self.run_name.clone(),
                ..Self::default()
            },
        }
    }
}

fn session_value<T: DeserializeOwned>(store: &dyn Store, key: StorageKey) -> Option<T> {
    match store.get::<T>(key) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(key = key.id(), error = %e, "unreadable session value, using default");
            None
        }
    }
}

fn selected_run(store: &dyn Store) -> Option<Run> {
    match runs::selected_run(store) {
        Ok(selected) => selected.map(|(_, run)| run),
        Err(e) => {
            tracing::warn!(error = %e, "unreadable run definitions");
            None
        }
    }
}

/// Inputs a transition may read besides the current state
pub struct Env<'a> {
    /// Single clock reading used for the whole transition
    pub now_ms: u64,
    pub key_binds: &'a KeyBindConfig,
    pub store: &'a dyn Store,
}

/// Result of a transition, computed before anything is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: TimerState,
    /// Set by reset: drop every session-scoped value from the store
    pub clear_session: bool,
}

impl Transition {
    fn to(state: TimerState) -> Self {
        Self {
            state,
            clear_session: false,
        }
    }
}

/// Compute the state that follows `state` under `action`. Never writes to the store.
pub fn transition(state: &TimerState, action: &Action, env: &Env) -> Result<Transition, TimerError> {
    let now = env.now_ms;

    let next = match action {
        Action::Initialize => TimerState::rehydrate(env.store),
        Action::Start => TimerState {
            status: TimerStatus::Running,
            timestamp_ref_ms: now,
            ..state.clone()
        },
        Action::Tick => {
            if state.status != TimerStatus::Running {
                state.clone()
            } else {
                TimerState {
                    current_time_ms: state.live_time_ms(now),
                    ..state.clone()
                }
            }
        }
        Action::PauseResume => match state.status {
            TimerStatus::Running => {
                let recorded = state.live_time_ms(now);
                TimerState {
                    status: TimerStatus::Paused,
                    recorded_time_ms: recorded,
                    current_time_ms: recorded,
                    ..state.clone()
                }
            }
            TimerStatus::Paused => TimerState {
                status: TimerStatus::Running,
                timestamp_ref_ms: now,
                ..state.clone()
            },
            _ => state.clone(),
        },
        Action::Split => {
            let current_time_ms = state.live_time_ms(now);
            if state.all_splits_recorded() {
                TimerState {
                    status: TimerStatus::Stopped,
                    current_time_ms,
                    ..state.clone()
                }
            } else {
                ensure_order_exists(&state.splits, state.current_split)?;
                TimerState {
                    splits: split::with_time(
                        &state.splits,
                        state.current_split,
                        Some(current_time_ms),
                    ),
                    current_split: state.current_split + 1,
                    current_time_ms,
                    ..state.clone()
                }
            }
        }
        Action::Undo => {
            if state.current_split == 0 {
                state.clone()
            } else {
                let order = state.current_split - 1;
                ensure_order_exists(&state.splits, order)?;
                TimerState {
                    splits: split::with_time(&state.splits, order, None),
                    current_split: order,
                    ..state.clone()
                }
            }
        }
        Action::Reset => {
            return Ok(Transition {
                state: state.reset_from(env.store),
                clear_session: true,
            })
        }
        Action::Stop => TimerState {
            status: TimerStatus::Stopped,
            current_time_ms: state.live_time_ms(now),
            ..state.clone()
        },
        Action::KeyPress(code) => {
            return match env.key_binds.resolve(code, state.status) {
                Some(inner) => transition(state, &inner, env),
                None => Ok(Transition::to(state.clone())),
            };
        }
    };

    Ok(Transition::to(next))
}

fn ensure_order_exists(splits: &[Split], order: usize) -> Result<(), TimerError> {
    if splits.iter().any(|s| s.order == order) {
        Ok(())
    } else {
        Err(TimerError::InvalidOperation(format!(
            "no split with order {order}"
        )))
    }
}

fn entry<T: Serialize + ?Sized>(key: StorageKey, value: &T) -> Result<(StorageKey, String), TimerError> {
    Ok((key, serde_json::to_string(value)?))
}

/// Write every field that differs between `old` and `new` in a single batch.
/// Returns the number of fields written.
pub fn persist_changes(
    store: &mut dyn Store,
    old: &TimerState,
    new: &TimerState,
) -> Result<usize, TimerError> {
    let mut changes = Vec::new();

    if old.current_split != new.current_split {
        changes.push(entry(StorageKey::CurrentSplit, &new.current_split)?);
    }
    if old.current_time_ms != new.current_time_ms {
        changes.push(entry(StorageKey::CurrentTime, &new.current_time_ms)?);
    }
    // the run name travels with its split list
    if old.splits != new.splits || old.run_name != new.run_name {
        changes.push(entry(StorageKey::Splits, &new.splits)?);
        changes.push(entry(StorageKey::RunName, &new.run_name)?);
    }
    if old.recorded_time_ms != new.recorded_time_ms {
        changes.push(entry(StorageKey::RecordedTimes, &new.recorded_time_ms)?);
    }
    if old.status != new.status {
        changes.push(entry(StorageKey::Status, &new.status)?);
    }
    if old.timestamp_ref_ms != new.timestamp_ref_ms {
        changes.push(entry(StorageKey::TimestampRef, &new.timestamp_ref_ms)?);
    }

    let writes = changes.len();
    if writes > 0 {
        store.set_many(changes)?;
    }
    Ok(writes)
}

/// The timer together with its store and clock. All state changes go through `dispatch`.
pub struct SplitTimer<S: Store, C: Clock> {
    store: S,
    clock: C,
    key_binds: KeyBindConfig,
    state: TimerState,
}

impl<S: Store, C: Clock> SplitTimer<S, C> {
    /// Timer in its zero state; call [`SplitTimer::initialize`] to load stored progress
    pub fn new(store: S, clock: C) -> Self {
        let key_binds = Settings::load(&store).key_binds;
        Self {
            store,
            clock,
            key_binds,
            state: TimerState::default(),
        }
    }

    /// Build a timer and rehydrate it from the store
    pub fn initialize(store: S, clock: C) -> Result<Self, TimerError> {
        let mut timer = Self::new(store, clock);
        timer.dispatch(Action::Initialize)?;
        Ok(timer)
    }

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn key_binds(&self) -> &KeyBindConfig {
        &self.key_binds
    }

    /// Elapsed time right now, including the part of the interval not yet ticked
    pub fn live_time_ms(&self) -> u64 {
        self.state.live_time_ms(self.clock.now_ms())
    }

    /// Apply one action. On failure the error is appended to the error log and
    /// returned; the in-memory state is left as it was.
    pub fn dispatch(&mut self, action: Action) -> Result<&TimerState, TimerError> {
        match self.apply(&action) {
            Ok(()) => Ok(&self.state),
            Err(e) => {
                self.report(&action, &e);
                Err(e)
            }
        }
    }

    /// Dispatch an action given by name, e.g. `"pauseResume"` or `"keyPress"` + code
    pub fn dispatch_named(
        &mut self,
        name: &str,
        code: Option<&str>,
    ) -> Result<&TimerState, TimerError> {
        match Action::from_name(name, code) {
            Ok(action) => self.dispatch(action),
            Err(e) => {
                tracing::error!(action = name, error = %e, "dispatch rejected");
                error_log::record(&mut self.store, &e);
                Err(e)
            }
        }
    }

    fn apply(&mut self, action: &Action) -> Result<(), TimerError> {
        let env = Env {
            now_ms: self.clock.now_ms(),
            key_binds: &self.key_binds,
            store: &self.store,
        };
        let Transition {
            state: next,
            clear_session,
        } = transition(&self.state, action, &env)?;

        if clear_session {
            self.store.clear_session()?;
        } else {
            persist_changes(&mut self.store, &self.state, &next)?;
        }

        tracing::debug!(
            action = action.name(),
            status = %next.status,
            current_split = next.current_split,
            current_time_ms = next.current_time_ms,
            "transition"
        );
        if next.status != self.state.status {
            tracing::info!(from = %self.state.status, to = %next.status, "timer status changed");
        }

        self.state = next;
        Ok(())
    }

    fn report(&mut self, action: &Action, err: &TimerError) {
        tracing::error!(action = action.name(), error = %err, "dispatch failed");
        error_log::record(&mut self.store, err);
    }
}
