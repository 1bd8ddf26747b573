//! Submission guard: one print submission per session.
//!
//! DESIGN
//! ======
//! Each session gets a [`SubmissionGuard`] whose state moves
//! `Idle -> Submitting -> Submitted`, or back to `Idle` when the external
//! submission fails. `Locked` is entered from initialization when the record
//! store already marks the session, and `Corrupted` when the link carried no
//! usable routing context. `Submitted`, `Locked`, and `Corrupted` are
//! terminal and engage the host's [`TerminalNavigation`].
//!
//! CONCURRENCY
//! ===========
//! The state lives behind a synchronous mutex that is never held across an
//! await. `check_and_submit` flips `Idle -> Submitting` under that lock, so a
//! concurrent call sees `Submitting` and is rejected without reaching the
//! collaborator. Requests that share a process share guards through
//! [`GuardRegistry`], which builds each guard once without holding its map
//! lock across store I/O. Across processes, the store is re-read right before
//! the external call; two brand-new sessions racing in separate processes
//! can still both submit.
//!
//! A started submission must be driven to completion. The HTTP route runs it
//! on its own task so a dropped connection cannot abandon it mid-flight.

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use super::fulfillment::{DesignPayload, SubmitCollaborator, SubmitError, SubmitReceipt};
use super::identity::SessionContext;
use super::navigation::{TerminalNavigation, TerminalView};
use super::store::{RecordStore, StoreError};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardState {
    Idle,
    Submitting,
    Submitted,
    Locked,
    Corrupted,
}

impl GuardState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Submitted | Self::Locked | Self::Corrupted)
    }

    #[must_use]
    pub fn may_submit(self) -> bool {
        self == Self::Idle
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The design was handed to fulfillment by this call.
    Submitted(SubmitReceipt),
    /// The session was already submitted; nothing was sent.
    AlreadySubmitted,
}

#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    #[error("a submission is already in flight")]
    InFlight,
    #[error("submission failed: {0}")]
    SubmitFailed(#[from] SubmitError),
    #[error("session has no valid routing context")]
    CorruptedContext,
    #[error("session mismatch: guard is for {expected}, got {got}")]
    SessionMismatch { expected: String, got: String },
    #[error("session {session_id} belongs to machine {expected:?}, link names {got:?}")]
    MachineMismatch { session_id: String, expected: Option<String>, got: Option<String> },
    #[error("record store error: {0}")]
    Store(#[from] StoreError),
    #[error("submitted, but the record was not written: {source}")]
    RecordNotPersisted { receipt: SubmitReceipt, source: StoreError },
}

impl super::ErrorCode for GuardError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InFlight => "E_SUBMIT_IN_FLIGHT",
            Self::SubmitFailed(_) => "E_SUBMIT_FAILED",
            Self::CorruptedContext => "E_CORRUPTED_CONTEXT",
            Self::SessionMismatch { .. } => "E_SESSION_MISMATCH",
            Self::MachineMismatch { .. } => "E_MACHINE_MISMATCH",
            Self::Store(_) => "E_RECORD_STORE",
            Self::RecordNotPersisted { .. } => "E_RECORD_NOT_PERSISTED",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::InFlight | Self::SubmitFailed(_) | Self::Store(_))
    }
}

// =============================================================================
// GUARD
// =============================================================================

pub struct SubmissionGuard {
    context: SessionContext,
    state: Mutex<GuardState>,
    store: Arc<dyn RecordStore>,
    submitter: Arc<dyn SubmitCollaborator>,
    navigation: Arc<dyn TerminalNavigation>,
}

impl std::fmt::Debug for SubmissionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionGuard")
            .field("context", &self.context)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl SubmissionGuard {
    /// Build the guard for `context`. Runs before any editor state exists.
    ///
    /// A session the store already marks starts `Locked`; otherwise a link
    /// without valid context starts `Corrupted`; otherwise `Idle`.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::Store`] if the record lookup fails.
    pub async fn initialize(
        context: SessionContext,
        store: Arc<dyn RecordStore>,
        submitter: Arc<dyn SubmitCollaborator>,
        navigation: Arc<dyn TerminalNavigation>,
    ) -> Result<Self, GuardError> {
        let already = !context.minted && store.has(&context.session_id).await?;
        let state = if already {
            GuardState::Locked
        } else if context.has_valid_context {
            GuardState::Idle
        } else {
            GuardState::Corrupted
        };

        let guard = Self { context, state: Mutex::new(state), store, submitter, navigation };
        match state {
            GuardState::Locked => {
                info!(session_id = %guard.context.session_id, "session already submitted; locked");
                guard.navigation.engage(&guard.context.session_id, TerminalView::Submitted);
            }
            GuardState::Corrupted => {
                guard.navigation.engage(&guard.context.session_id, TerminalView::CorruptedLink);
            }
            _ => {}
        }
        Ok(guard)
    }

    #[must_use]
    pub fn state(&self) -> GuardState {
        *self.lock_state()
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.context.session_id
    }

    #[must_use]
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Re-read the record store for an idle guard, locking it if another
    /// process has since submitted the session.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::Store`] if the record lookup fails.
    pub async fn refresh(&self) -> Result<GuardState, GuardError> {
        if self.state() != GuardState::Idle {
            return Ok(self.state());
        }
        if self.store.has(&self.context.session_id).await? {
            let mut state = self.lock_state();
            if *state == GuardState::Idle {
                *state = GuardState::Locked;
                drop(state);
                self.navigation.engage(&self.context.session_id, TerminalView::Submitted);
            }
        }
        Ok(self.state())
    }

    /// Submit `payload` for `session_id` at most once.
    ///
    /// # Errors
    ///
    /// - [`GuardError::InFlight`] while another call is submitting.
    /// - [`GuardError::CorruptedContext`] for links without routing context.
    /// - [`GuardError::SessionMismatch`] if `session_id` isn't this guard's.
    /// - [`GuardError::SubmitFailed`] when fulfillment rejects; the guard is idle again.
    /// - [`GuardError::Store`] if the pre-submit record lookup fails; the guard is idle again.
    /// - [`GuardError::RecordNotPersisted`] when fulfillment accepted the design
    ///   but the record write failed; the guard is still `Submitted`.
    pub async fn check_and_submit(&self, session_id: &str, payload: &DesignPayload) -> Result<SubmitOutcome, GuardError> {
        if session_id != self.context.session_id {
            return Err(GuardError::SessionMismatch {
                expected: self.context.session_id.clone(),
                got: session_id.to_string(),
            });
        }

        {
            let mut state = self.lock_state();
            match *state {
                GuardState::Idle => *state = GuardState::Submitting,
                GuardState::Submitting => return Err(GuardError::InFlight),
                GuardState::Submitted | GuardState::Locked => return Ok(SubmitOutcome::AlreadySubmitted),
                GuardState::Corrupted => return Err(GuardError::CorruptedContext),
            }
        }

        match self.store.has(session_id).await {
            Ok(true) => {
                self.set_state(GuardState::Locked);
                info!(%session_id, "record appeared before submit; locked");
                self.navigation.engage(session_id, TerminalView::Submitted);
                return Ok(SubmitOutcome::AlreadySubmitted);
            }
            Ok(false) => {}
            Err(e) => {
                self.set_state(GuardState::Idle);
                return Err(e.into());
            }
        }

        let receipt = match self.submitter.submit(payload).await {
            Ok(receipt) => receipt,
            Err(e) => {
                self.set_state(GuardState::Idle);
                warn!(%session_id, error = %e, "submission failed; guard idle");
                return Err(e.into());
            }
        };

        let recorded = self.store.mark_submitted(session_id).await;
        self.set_state(GuardState::Submitted);
        self.navigation.engage(session_id, TerminalView::Submitted);
        info!(%session_id, works_id = %receipt.works_id, "session submitted");

        match recorded {
            Ok(()) => Ok(SubmitOutcome::Submitted(receipt)),
            Err(source) => {
                warn!(%session_id, error = %source, "submitted but record write failed");
                Err(GuardError::RecordNotPersisted { receipt, source })
            }
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, GuardState> {
        lock(&self.state)
    }

    fn set_state(&self, next: GuardState) {
        *self.lock_state() = next;
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

type GuardCell = Arc<OnceCell<Arc<SubmissionGuard>>>;

/// Process-wide map of guards keyed by session id.
///
/// Valid sessions live in `guards`; each entry is a cell filled once by the
/// first request for that id. Guards for corrupted links that named a
/// well-formed session id are kept apart in `corrupted` so a submit against
/// them can be answered as corrupted instead of unknown, and so they never
/// shadow a valid session with the same id.
pub struct GuardRegistry {
    guards: Mutex<HashMap<String, GuardCell>>,
    corrupted: Mutex<HashMap<String, Arc<SubmissionGuard>>>,
    store: Arc<dyn RecordStore>,
    submitter: Arc<dyn SubmitCollaborator>,
    navigation: Arc<dyn TerminalNavigation>,
}

impl GuardRegistry {
    #[must_use]
    pub fn new(
        store: Arc<dyn RecordStore>,
        submitter: Arc<dyn SubmitCollaborator>,
        navigation: Arc<dyn TerminalNavigation>,
    ) -> Self {
        Self {
            guards: Mutex::new(HashMap::new()),
            corrupted: Mutex::new(HashMap::new()),
            store,
            submitter,
            navigation,
        }
    }

    /// Return the shared guard for `context`, initializing it on first use.
    ///
    /// Existing guards are refreshed against the store. A failed
    /// initialization leaves nothing behind, so the next request retries it.
    ///
    /// # Errors
    ///
    /// - [`GuardError::Store`] if the record lookup fails.
    /// - [`GuardError::MachineMismatch`] if the session is already bound to a
    ///   different machine.
    pub async fn get_or_init(&self, context: SessionContext) -> Result<Arc<SubmissionGuard>, GuardError> {
        if !context.has_valid_context {
            let track = !context.minted;
            let guard = Arc::new(self.build(context).await?);
            if track && guard.state() == GuardState::Corrupted {
                lock(&self.corrupted).insert(guard.session_id().to_string(), guard.clone());
            }
            return Ok(guard);
        }

        let session_id = context.session_id.clone();
        let machine_id = context.machine_id.clone();
        let cell = lock(&self.guards).entry(session_id.clone()).or_default().clone();

        if let Some(existing) = cell.get() {
            let existing = existing.clone();
            check_machine(&existing, machine_id)?;
            existing.refresh().await?;
            return Ok(existing);
        }

        let guard = cell
            .get_or_try_init(|| async move { self.build(context).await.map(Arc::new) })
            .await?
            .clone();
        check_machine(&guard, machine_id)?;
        lock(&self.corrupted).remove(&session_id);
        Ok(guard)
    }

    /// The guard for `session_id`, if any. A valid session's guard wins over
    /// a corrupted one with the same id.
    #[must_use]
    pub fn get(&self, session_id: &str) -> Option<Arc<SubmissionGuard>> {
        let valid = lock(&self.guards).get(session_id).and_then(|cell| cell.get().cloned());
        valid.or_else(|| lock(&self.corrupted).get(session_id).cloned())
    }

    async fn build(&self, context: SessionContext) -> Result<SubmissionGuard, GuardError> {
        SubmissionGuard::initialize(context, self.store.clone(), self.submitter.clone(), self.navigation.clone()).await
    }
}

fn check_machine(guard: &SubmissionGuard, machine_id: Option<String>) -> Result<(), GuardError> {
    let expected = &guard.context().machine_id;
    if *expected == machine_id {
        return Ok(());
    }
    let err = GuardError::MachineMismatch {
        session_id: guard.session_id().to_string(),
        expected: expected.clone(),
        got: machine_id,
    };
    warn!(session_id = %guard.session_id(), error = %err, "link reuses a session on another machine");
    Err(err)
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
