use super::*;
use crate::services::ErrorCode;
use crate::services::store::{JsonFileStore, MemoryStore};
use canvas::camera::Point;
use canvas::transform::{Rect, Transform};
use tokio::sync::Notify;

// =============================================================================
// MOCKS
// =============================================================================

/// Collaborator that counts calls and can be told to fail.
#[derive(Default)]
struct CountingSubmitter {
    calls: std::sync::Mutex<usize>,
    fail: std::sync::Mutex<bool>,
}

impl CountingSubmitter {
    fn failing() -> Self {
        Self { calls: std::sync::Mutex::new(0), fail: std::sync::Mutex::new(true) }
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    fn set_fail(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }
}

#[async_trait::async_trait]
impl SubmitCollaborator for CountingSubmitter {
    async fn submit(&self, _payload: &DesignPayload) -> Result<SubmitReceipt, SubmitError> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            *calls
        };
        if *self.fail.lock().unwrap() {
            return Err(SubmitError::Status { step: "Works.save", status: 503, body: "busy".into() });
        }
        Ok(SubmitReceipt { works_id: format!("w-{n}"), ..Default::default() })
    }
}

/// Collaborator that parks inside `submit` until released.
#[derive(Default)]
struct GatedSubmitter {
    entered: Notify,
    release: Notify,
    calls: std::sync::Mutex<usize>,
}

#[async_trait::async_trait]
impl SubmitCollaborator for GatedSubmitter {
    async fn submit(&self, _payload: &DesignPayload) -> Result<SubmitReceipt, SubmitError> {
        *self.calls.lock().unwrap() += 1;
        self.entered.notify_one();
        self.release.notified().await;
        Ok(SubmitReceipt {
            works_id: "w-gated".into(),
            order_id: Some("o-1".into()),
            order_confirmed: true,
            queue_length: None,
        })
    }
}

#[derive(Default)]
struct RecordingNavigation {
    engaged: std::sync::Mutex<Vec<(String, TerminalView)>>,
}

impl RecordingNavigation {
    fn engaged(&self) -> Vec<(String, TerminalView)> {
        self.engaged.lock().unwrap().clone()
    }
}

impl TerminalNavigation for RecordingNavigation {
    fn engage(&self, session_id: &str, view: TerminalView) {
        self.engaged.lock().unwrap().push((session_id.to_string(), view));
    }
}

/// Store whose writes always fail.
struct ReadOnlyStore;

#[async_trait::async_trait]
impl RecordStore for ReadOnlyStore {
    async fn has(&self, _session_id: &str) -> Result<bool, StoreError> {
        Ok(false)
    }

    async fn mark_submitted(&self, _session_id: &str) -> Result<(), StoreError> {
        Err(StoreError::Io(std::io::Error::other("read-only filesystem")))
    }
}

/// Store whose reads always fail.
struct UnreachableStore;

#[async_trait::async_trait]
impl RecordStore for UnreachableStore {
    async fn has(&self, _session_id: &str) -> Result<bool, StoreError> {
        Err(StoreError::Io(std::io::Error::other("connection refused")))
    }

    async fn mark_submitted(&self, _session_id: &str) -> Result<(), StoreError> {
        Err(StoreError::Io(std::io::Error::other("connection refused")))
    }
}

/// Store whose lookups for one session park until released.
struct GatedStore {
    session_id: &'static str,
    entered: Notify,
    release: Notify,
}

impl GatedStore {
    fn new(session_id: &'static str) -> Self {
        Self { session_id, entered: Notify::new(), release: Notify::new() }
    }
}

#[async_trait::async_trait]
impl RecordStore for GatedStore {
    async fn has(&self, session_id: &str) -> Result<bool, StoreError> {
        if session_id == self.session_id {
            self.entered.notify_one();
            self.release.notified().await;
        }
        Ok(false)
    }

    async fn mark_submitted(&self, _session_id: &str) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Store whose first lookup fails.
#[derive(Default)]
struct FlakyStore {
    lookups: std::sync::Mutex<usize>,
}

#[async_trait::async_trait]
impl RecordStore for FlakyStore {
    async fn has(&self, _session_id: &str) -> Result<bool, StoreError> {
        let mut lookups = self.lookups.lock().unwrap();
        *lookups += 1;
        if *lookups == 1 {
            return Err(StoreError::Io(std::io::Error::other("connection reset")));
        }
        Ok(false)
    }

    async fn mark_submitted(&self, _session_id: &str) -> Result<(), StoreError> {
        Ok(())
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn ctx(session_id: &str) -> SessionContext {
    SessionContext::valid(session_id, "11025496", Some("4159".into()))
}

fn corrupted_ctx(session_id: &str) -> SessionContext {
    SessionContext {
        session_id: session_id.into(),
        has_valid_context: false,
        machine_id: None,
        goods_id: None,
        minted: false,
    }
}

fn payload() -> DesignPayload {
    let area = Rect::new(0.0, 0.0, 400.0, 600.0);
    let transform = Transform::new(Point::new(200.0, 300.0), 100.0, 100.0);
    DesignPayload::from_transform(&transform, area, "https://img.example/1.jpeg", "11025496", "4159")
}

async fn guard_with(
    context: SessionContext,
    store: Arc<dyn RecordStore>,
    submitter: Arc<dyn SubmitCollaborator>,
    navigation: Arc<RecordingNavigation>,
) -> SubmissionGuard {
    SubmissionGuard::initialize(context, store, submitter, navigation).await.unwrap()
}

// =============================================================================
// INITIALIZE
// =============================================================================

#[tokio::test]
async fn fresh_session_starts_idle() {
    let nav = Arc::new(RecordingNavigation::default());
    let guard = guard_with(ctx("s-1"), Arc::new(MemoryStore::new()), Arc::new(CountingSubmitter::default()), nav.clone()).await;

    assert_eq!(guard.state(), GuardState::Idle);
    assert!(guard.state().may_submit());
    assert_eq!(guard.session_id(), "s-1");
    assert!(nav.engaged().is_empty());
}

#[tokio::test]
async fn recorded_session_starts_locked_and_engages_confirmation() {
    let store = Arc::new(MemoryStore::new());
    store.mark_submitted("s-1").await.unwrap();
    let nav = Arc::new(RecordingNavigation::default());

    let guard = guard_with(ctx("s-1"), store, Arc::new(CountingSubmitter::default()), nav.clone()).await;

    assert_eq!(guard.state(), GuardState::Locked);
    assert!(!guard.state().may_submit());
    assert_eq!(nav.engaged(), vec![("s-1".to_string(), TerminalView::Submitted)]);
}

#[tokio::test]
async fn invalid_context_starts_corrupted() {
    let nav = Arc::new(RecordingNavigation::default());
    let guard = guard_with(corrupted_ctx("s-1"), Arc::new(MemoryStore::new()), Arc::new(CountingSubmitter::default()), nav.clone()).await;

    assert_eq!(guard.state(), GuardState::Corrupted);
    assert!(guard.state().is_terminal());
    assert_eq!(nav.engaged(), vec![("s-1".to_string(), TerminalView::CorruptedLink)]);
}

#[tokio::test]
async fn recorded_session_wins_over_missing_context() {
    let store = Arc::new(MemoryStore::new());
    store.mark_submitted("s-1").await.unwrap();
    let guard = guard_with(corrupted_ctx("s-1"), store, Arc::new(CountingSubmitter::default()), Arc::default()).await;

    assert_eq!(guard.state(), GuardState::Locked);
}

#[tokio::test]
async fn initialize_surfaces_store_errors() {
    let result = SubmissionGuard::initialize(
        ctx("s-1"),
        Arc::new(UnreachableStore),
        Arc::new(CountingSubmitter::default()),
        Arc::new(RecordingNavigation::default()),
    )
    .await;
    assert!(matches!(result, Err(GuardError::Store(_))));
}

// =============================================================================
// CHECK AND SUBMIT
// =============================================================================

#[tokio::test]
async fn success_records_and_locks() {
    let store = Arc::new(MemoryStore::new());
    let submitter = Arc::new(CountingSubmitter::default());
    let nav = Arc::new(RecordingNavigation::default());
    let guard = guard_with(ctx("s-1"), store.clone(), submitter.clone(), nav.clone()).await;

    let outcome = guard.check_and_submit("s-1", &payload()).await.unwrap();

    assert_eq!(outcome, SubmitOutcome::Submitted(SubmitReceipt { works_id: "w-1".into(), ..Default::default() }));
    assert_eq!(guard.state(), GuardState::Submitted);
    assert!(store.has("s-1").await.unwrap());
    assert_eq!(submitter.calls(), 1);
    assert_eq!(nav.engaged(), vec![("s-1".to_string(), TerminalView::Submitted)]);
}

#[tokio::test]
async fn second_submit_is_idempotent() {
    let submitter = Arc::new(CountingSubmitter::default());
    let guard = guard_with(ctx("s-1"), Arc::new(MemoryStore::new()), submitter.clone(), Arc::default()).await;

    guard.check_and_submit("s-1", &payload()).await.unwrap();
    let again = guard.check_and_submit("s-1", &payload()).await.unwrap();

    assert_eq!(again, SubmitOutcome::AlreadySubmitted);
    assert_eq!(submitter.calls(), 1);
    assert_eq!(guard.state(), GuardState::Submitted);
}

#[tokio::test]
async fn locked_session_never_calls_out() {
    let store = Arc::new(MemoryStore::new());
    store.mark_submitted("s-1").await.unwrap();
    let submitter = Arc::new(CountingSubmitter::default());
    let guard = guard_with(ctx("s-1"), store, submitter.clone(), Arc::default()).await;

    assert_eq!(guard.check_and_submit("s-1", &payload()).await.unwrap(), SubmitOutcome::AlreadySubmitted);
    assert_eq!(submitter.calls(), 0);
}

#[tokio::test]
async fn failure_returns_to_idle_without_record_then_retry_succeeds() {
    let store = Arc::new(MemoryStore::new());
    let submitter = Arc::new(CountingSubmitter::failing());
    let nav = Arc::new(RecordingNavigation::default());
    let guard = guard_with(ctx("s-1"), store.clone(), submitter.clone(), nav.clone()).await;

    let err = guard.check_and_submit("s-1", &payload()).await.unwrap_err();
    assert!(matches!(err, GuardError::SubmitFailed(_)));
    assert!(err.retryable());
    assert_eq!(guard.state(), GuardState::Idle);
    assert!(!store.has("s-1").await.unwrap());
    assert!(nav.engaged().is_empty());

    submitter.set_fail(false);
    let outcome = guard.check_and_submit("s-1", &payload()).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Submitted(_)));
    assert_eq!(submitter.calls(), 2);
}

#[tokio::test]
async fn corrupted_session_rejects_submit() {
    let submitter = Arc::new(CountingSubmitter::default());
    let guard = guard_with(corrupted_ctx("s-1"), Arc::new(MemoryStore::new()), submitter.clone(), Arc::default()).await;

    let err = guard.check_and_submit("s-1", &payload()).await.unwrap_err();
    assert!(matches!(err, GuardError::CorruptedContext));
    assert_eq!(err.error_code(), "E_CORRUPTED_CONTEXT");
    assert_eq!(submitter.calls(), 0);
    assert_eq!(guard.state(), GuardState::Corrupted);
}

#[tokio::test]
async fn mismatched_session_is_rejected() {
    let submitter = Arc::new(CountingSubmitter::default());
    let guard = guard_with(ctx("s-1"), Arc::new(MemoryStore::new()), submitter.clone(), Arc::default()).await;

    let err = guard.check_and_submit("s-2", &payload()).await.unwrap_err();
    assert!(matches!(err, GuardError::SessionMismatch { .. }));
    assert_eq!(submitter.calls(), 0);
    assert_eq!(guard.state(), GuardState::Idle);
}

#[tokio::test]
async fn record_appearing_after_init_locks_without_calling_out() {
    let store = Arc::new(MemoryStore::new());
    let submitter = Arc::new(CountingSubmitter::default());
    let nav = Arc::new(RecordingNavigation::default());
    let guard = guard_with(ctx("s-1"), store.clone(), submitter.clone(), nav.clone()).await;

    // Another tab in another process finished first.
    store.mark_submitted("s-1").await.unwrap();

    assert_eq!(guard.check_and_submit("s-1", &payload()).await.unwrap(), SubmitOutcome::AlreadySubmitted);
    assert_eq!(submitter.calls(), 0);
    assert_eq!(guard.state(), GuardState::Locked);
    assert_eq!(nav.engaged(), vec![("s-1".to_string(), TerminalView::Submitted)]);
}

#[tokio::test]
async fn record_write_failure_still_locks() {
    let submitter = Arc::new(CountingSubmitter::default());
    let nav = Arc::new(RecordingNavigation::default());
    let guard = guard_with(ctx("s-1"), Arc::new(ReadOnlyStore), submitter.clone(), nav.clone()).await;

    let err = guard.check_and_submit("s-1", &payload()).await.unwrap_err();
    let GuardError::RecordNotPersisted { receipt, .. } = &err else {
        panic!("expected RecordNotPersisted, got {err:?}");
    };
    assert_eq!(receipt.works_id, "w-1");
    assert_eq!(guard.state(), GuardState::Submitted);
    assert_eq!(nav.engaged().len(), 1);

    assert_eq!(guard.check_and_submit("s-1", &payload()).await.unwrap(), SubmitOutcome::AlreadySubmitted);
    assert_eq!(submitter.calls(), 1);
}

#[tokio::test]
async fn store_read_failure_before_submit_returns_to_idle() {
    let guard = SubmissionGuard {
        context: ctx("s-1"),
        state: std::sync::Mutex::new(GuardState::Idle),
        store: Arc::new(UnreachableStore),
        submitter: Arc::new(CountingSubmitter::default()),
        navigation: Arc::new(RecordingNavigation::default()),
    };

    let err = guard.check_and_submit("s-1", &payload()).await.unwrap_err();
    assert!(matches!(err, GuardError::Store(_)));
    assert_eq!(guard.state(), GuardState::Idle);
}

// =============================================================================
// CONCURRENCY + RELOAD
// =============================================================================

#[tokio::test]
async fn concurrent_submit_is_rejected_in_flight() {
    let submitter = Arc::new(GatedSubmitter::default());
    let guard = Arc::new(guard_with(ctx("s-1"), Arc::new(MemoryStore::new()), submitter.clone(), Arc::default()).await);

    let first = {
        let guard = guard.clone();
        tokio::spawn(async move { guard.check_and_submit("s-1", &payload()).await })
    };
    submitter.entered.notified().await;
    assert_eq!(guard.state(), GuardState::Submitting);

    let second = guard.check_and_submit("s-1", &payload()).await;
    assert!(matches!(second, Err(GuardError::InFlight)));

    submitter.release.notify_one();
    let outcome = first.await.unwrap().unwrap();
    assert!(matches!(outcome, SubmitOutcome::Submitted(ref r) if r.works_id == "w-gated"));
    assert_eq!(*submitter.calls.lock().unwrap(), 1);
    assert_eq!(guard.state(), GuardState::Submitted);
}

#[tokio::test]
async fn lock_survives_reload_from_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.json");

    let first = guard_with(ctx("s-1"), Arc::new(JsonFileStore::new(&path)), Arc::new(CountingSubmitter::default()), Arc::default()).await;
    first.check_and_submit("s-1", &payload()).await.unwrap();
    drop(first);

    let submitter = Arc::new(CountingSubmitter::default());
    let nav = Arc::new(RecordingNavigation::default());
    let reloaded = guard_with(ctx("s-1"), Arc::new(JsonFileStore::new(&path)), submitter.clone(), nav.clone()).await;

    assert_eq!(reloaded.state(), GuardState::Locked);
    assert_eq!(nav.engaged(), vec![("s-1".to_string(), TerminalView::Submitted)]);
    assert_eq!(reloaded.check_and_submit("s-1", &payload()).await.unwrap(), SubmitOutcome::AlreadySubmitted);
    assert_eq!(submitter.calls(), 0);
}

// =============================================================================
// REGISTRY
// =============================================================================

fn registry(store: Arc<dyn RecordStore>, submitter: Arc<dyn SubmitCollaborator>) -> GuardRegistry {
    GuardRegistry::new(store, submitter, Arc::new(RecordingNavigation::default()))
}

#[tokio::test]
async fn registry_shares_one_guard_per_session() {
    let reg = registry(Arc::new(MemoryStore::new()), Arc::new(CountingSubmitter::default()));

    let a = reg.get_or_init(ctx("s-1")).await.unwrap();
    let b = reg.get_or_init(ctx("s-1")).await.unwrap();
    let c = reg.get_or_init(ctx("s-2")).await.unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(&a, &c));
    assert!(reg.get("s-1").is_some());
}

#[tokio::test]
async fn registry_refreshes_idle_guard_from_store() {
    let store = Arc::new(MemoryStore::new());
    let reg = registry(store.clone(), Arc::new(CountingSubmitter::default()));

    let guard = reg.get_or_init(ctx("s-1")).await.unwrap();
    assert_eq!(guard.state(), GuardState::Idle);

    store.mark_submitted("s-1").await.unwrap();
    let again = reg.get_or_init(ctx("s-1")).await.unwrap();
    assert_eq!(again.state(), GuardState::Locked);
}

#[tokio::test]
async fn corrupted_guard_is_found_but_never_shadows_valid() {
    let reg = registry(Arc::new(MemoryStore::new()), Arc::new(CountingSubmitter::default()));

    let guard = reg.get_or_init(corrupted_ctx("s-1")).await.unwrap();
    assert_eq!(guard.state(), GuardState::Corrupted);
    assert_eq!(reg.get("s-1").unwrap().state(), GuardState::Corrupted);

    let valid = reg.get_or_init(ctx("s-1")).await.unwrap();
    assert_eq!(valid.state(), GuardState::Idle);
    assert!(Arc::ptr_eq(&reg.get("s-1").unwrap(), &valid));

    reg.get_or_init(corrupted_ctx("s-1")).await.unwrap();
    assert!(Arc::ptr_eq(&reg.get("s-1").unwrap(), &valid));
}

#[tokio::test]
async fn minted_corrupted_ids_are_not_kept() {
    let reg = registry(Arc::new(MemoryStore::new()), Arc::new(CountingSubmitter::default()));
    let mut context = corrupted_ctx("minted-1");
    context.minted = true;

    reg.get_or_init(context).await.unwrap();
    assert!(reg.get("minted-1").is_none());
}

#[tokio::test]
async fn slow_init_does_not_block_other_sessions() {
    let store = Arc::new(GatedStore::new("s-slow"));
    let reg = Arc::new(registry(store.clone(), Arc::new(CountingSubmitter::default())));

    let slow = tokio::spawn({
        let reg = reg.clone();
        async move { reg.get_or_init(ctx("s-slow")).await }
    });
    store.entered.notified().await;

    let other = tokio::time::timeout(std::time::Duration::from_secs(5), reg.get_or_init(ctx("s-fast")))
        .await
        .expect("other session blocked behind a slow init")
        .unwrap();
    assert_eq!(other.state(), GuardState::Idle);
    assert!(reg.get("s-slow").is_none());

    store.release.notify_one();
    assert_eq!(slow.await.unwrap().unwrap().state(), GuardState::Idle);
    assert!(reg.get("s-slow").is_some());
}

#[tokio::test]
async fn failed_init_is_retried_on_next_request() {
    let reg = registry(Arc::new(FlakyStore::default()), Arc::new(CountingSubmitter::default()));

    assert!(matches!(reg.get_or_init(ctx("s-1")).await, Err(GuardError::Store(_))));
    assert!(reg.get("s-1").is_none());

    let guard = reg.get_or_init(ctx("s-1")).await.unwrap();
    assert_eq!(guard.state(), GuardState::Idle);
}

#[tokio::test]
async fn same_session_on_another_machine_is_rejected() {
    let reg = registry(Arc::new(MemoryStore::new()), Arc::new(CountingSubmitter::default()));
    let first = reg.get_or_init(ctx("s-1")).await.unwrap();

    let other = SessionContext::valid("s-1", "99999999", Some("4159".into()));
    let err = reg.get_or_init(other).await.unwrap_err();
    assert_eq!(err.error_code(), "E_MACHINE_MISMATCH");
    assert!(!err.retryable());
    match err {
        GuardError::MachineMismatch { session_id, expected, got } => {
            assert_eq!(session_id, "s-1");
            assert_eq!(expected.as_deref(), Some("11025496"));
            assert_eq!(got.as_deref(), Some("99999999"));
        }
        other => panic!("expected MachineMismatch, got {other:?}"),
    }

    assert!(Arc::ptr_eq(&reg.get("s-1").unwrap(), &first));
    assert_eq!(first.context().machine_id.as_deref(), Some("11025496"));
}

#[tokio::test]
async fn double_click_through_registry_calls_out_once() {
    let submitter = Arc::new(GatedSubmitter::default());
    let reg = registry(Arc::new(MemoryStore::new()), submitter.clone());

    let tab_a = reg.get_or_init(ctx("s-1")).await.unwrap();
    let tab_b = reg.get_or_init(ctx("s-1")).await.unwrap();

    let first = tokio::spawn(async move { tab_a.check_and_submit("s-1", &payload()).await });
    submitter.entered.notified().await;

    assert!(matches!(tab_b.check_and_submit("s-1", &payload()).await, Err(GuardError::InFlight)));
    submitter.release.notify_one();
    assert!(first.await.unwrap().is_ok());
    assert_eq!(tab_b.check_and_submit("s-1", &payload()).await.unwrap(), SubmitOutcome::AlreadySubmitted);
    assert_eq!(*submitter.calls.lock().unwrap(), 1);
}

#[test]
fn terminal_and_submit_flags() {
    assert!(GuardState::Idle.may_submit());
    for state in [GuardState::Submitting, GuardState::Submitted, GuardState::Locked, GuardState::Corrupted] {
        assert!(!state.may_submit());
    }
    assert!(!GuardState::Idle.is_terminal());
    assert!(!GuardState::Submitting.is_terminal());
}
