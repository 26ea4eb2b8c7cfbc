//! Per-session serialization and the session registry.
//!
//! A [`SessionHandle`] owns one session behind a lock that callers acquire
//! with a timeout. Readers never wait on that lock: every completed operation
//! publishes a snapshot they can read instead.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::{debug, info};

use crate::config::Config;
use crate::engine::Engine;
use crate::error::{DrillError, Result};
use crate::session::SessionState;

/// The last review accepted for a session.
#[derive(Debug, Clone)]
struct LastSubmission {
    text: String,
    iteration: u32,
    at: DateTime<Utc>,
}

#[derive(Debug)]
struct Slot {
    state: SessionState,
    last_submission: Option<LastSubmission>,
}

/// Timing knobs for session handles.
#[derive(Debug, Clone, Copy)]
pub struct HandleSettings {
    /// How long an operation waits for the session lock.
    pub lock_timeout: Duration,
    /// Window within which an identical resubmission is ignored.
    pub duplicate_window: Duration,
}

impl Default for HandleSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for HandleSettings {
    fn from(config: &Config) -> Self {
        Self {
            lock_timeout: Duration::from_secs(config.lock_timeout_secs),
            duplicate_window: Duration::from_secs(config.duplicate_window_secs),
        }
    }
}

/// One session, serialized behind a lock.
pub struct SessionHandle {
    id: String,
    engine: Arc<Engine>,
    settings: HandleSettings,
    slot: Mutex<Slot>,
    published: RwLock<SessionState>,
}

impl SessionHandle {
    /// Wraps `state` for use with `engine`.
    #[must_use]
    pub fn new(engine: Arc<Engine>, state: SessionState, settings: HandleSettings) -> Self {
        Self {
            id: state.id.clone(),
            engine,
            settings,
            published: RwLock::new(state.clone()),
            slot: Mutex::new(Slot {
                state,
                last_submission: None,
            }),
        }
    }

    /// Identifier the handle was created with.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the state as of the last completed operation.
    pub async fn snapshot(&self) -> SessionState {
        self.published.read().await.clone()
    }

    /// Runs the generation loop.
    ///
    /// # Errors
    ///
    /// Returns `DrillError::SessionBusy` if the lock is not acquired in time,
    /// `DrillError::InvalidPhase` once code exists, and the terminal
    /// generation errors (which are also recorded on the session).
    pub async fn generate(&self) -> Result<SessionState> {
        let mut slot = self.lock().await?;
        let result = self.engine.generate(slot.state.clone()).await;
        self.apply(&mut slot, result).await
    }

    /// Submits a review for `iteration` (or the current iteration when `None`).
    ///
    /// An identical text for the same iteration within the duplicate window is
    /// acknowledged without doing anything.
    ///
    /// # Errors
    ///
    /// Returns `DrillError::SessionBusy`, `DrillError::StaleSubmission` for an
    /// iteration that is no longer current, `DrillError::InvalidPhase` outside
    /// the review loop, and `DrillError::ReviewSubmissionError` for short text.
    pub async fn submit_review(&self, text: &str, iteration: Option<u32>) -> Result<SessionState> {
        let mut slot = self.lock().await?;
        let now = Utc::now();

        if let Some(last) = &slot.last_submission {
            let same_iteration =
                iteration.unwrap_or(slot.state.current_iteration) == last.iteration;
            let elapsed = (now - last.at).to_std().unwrap_or(Duration::ZERO);
            if same_iteration && last.text == text && elapsed <= self.settings.duplicate_window {
                info!(session_id = %self.id, iteration = last.iteration, "Duplicate submission ignored");
                return Ok(slot.state.clone());
            }
        }

        let current = slot.state.current_iteration;
        if let Some(submitted) = iteration {
            if submitted != current {
                return Err(DrillError::StaleSubmission { submitted, current });
            }
        }

        let result = self.engine.review(slot.state.clone(), text).await;
        let state = self.apply(&mut slot, result).await?;
        slot.last_submission = Some(LastSubmission {
            text: text.to_string(),
            iteration: current,
            at: now,
        });
        Ok(state)
    }

    /// Starts the session over with the same id and parameters.
    ///
    /// # Errors
    ///
    /// Returns `DrillError::SessionBusy` if the lock is not acquired in time.
    pub async fn reset(&self) -> Result<SessionState> {
        let mut slot = self.lock().await?;
        slot.state.reset();
        slot.last_submission = None;
        info!(session_id = %self.id, "Session reset");
        self.publish(&slot.state).await;
        Ok(slot.state.clone())
    }

    async fn lock(&self) -> Result<MutexGuard<'_, Slot>> {
        tokio::time::timeout(self.settings.lock_timeout, self.slot.lock())
            .await
            .map_err(|_| {
                DrillError::session_busy(self.id.clone(), self.settings.lock_timeout.as_secs())
            })
    }

    /// Stores a successful result, or records a terminal failure on the current state.
    async fn apply(&self, slot: &mut Slot, result: Result<SessionState>) -> Result<SessionState> {
        match result {
            Ok(state) => {
                slot.state = state;
                self.publish(&slot.state).await;
                Ok(slot.state.clone())
            }
            Err(e) => {
                if e.is_terminal() {
                    slot.state.error = Some(e.to_string());
                    slot.state.touch();
                    self.publish(&slot.state).await;
                }
                debug!(session_id = %self.id, error = %e, "Operation did not apply");
                Err(e)
            }
        }
    }

    async fn publish(&self, state: &SessionState) {
        *self.published.write().await = state.clone();
    }
}

/// All live sessions, by id.
pub struct SessionRegistry {
    engine: Arc<Engine>,
    settings: HandleSettings,
    sessions: RwLock<HashMap<String, Arc<SessionHandle>>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(engine: Arc<Engine>, settings: HandleSettings) -> Self {
        Self {
            engine,
            settings,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a new session and returns its handle.
    pub async fn insert(&self, state: SessionState) -> Arc<SessionHandle> {
        let handle = Arc::new(SessionHandle::new(
            Arc::clone(&self.engine),
            state,
            self.settings,
        ));
        self.sessions
            .write()
            .await
            .insert(handle.id().to_string(), Arc::clone(&handle));
        info!(session_id = %handle.id(), "Session registered");
        handle
    }

    /// Looks up a session.
    ///
    /// # Errors
    ///
    /// Returns `DrillError::SessionNotFound` for an unknown id.
    pub async fn get(&self, id: &str) -> Result<Arc<SessionHandle>> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| DrillError::session_not_found(id))
    }

    /// Number of registered sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Returns `true` if no session is registered.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
