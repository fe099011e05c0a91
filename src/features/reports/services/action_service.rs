use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use uuid::Uuid;

use crate::core::error::AppError;
use crate::features::device::{ActionKind, LocalActionStore};
use crate::features::reports::services::{ReportRepository, SharedBoard};
use crate::shared::constants::{CONFIRMED_MESSAGE, FLAGGED_MESSAGE, RESOLVED_MESSAGE};

/// Result of a confirm / resolve / flag request
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Confirmed {
        confirmations: i32,
        expires_at: DateTime<Utc>,
    },
    Resolved,
    Flagged,
    /// This device already did it; nothing was sent
    AlreadyRecorded,
    /// Another action on the same report is still running; nothing was sent
    InFlight,
}

impl ActionOutcome {
    /// Success toast, if the action went through
    pub fn message(&self) -> Option<&'static str> {
        match self {
            ActionOutcome::Confirmed { .. } => Some(CONFIRMED_MESSAGE),
            ActionOutcome::Resolved => Some(RESOLVED_MESSAGE),
            ActionOutcome::Flagged => Some(FLAGGED_MESSAGE),
            ActionOutcome::AlreadyRecorded | ActionOutcome::InFlight => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("report {0} is no longer on the board")]
    Unavailable(Uuid),

    #[error("{kind} failed: {source}")]
    Store {
        kind: ActionKind,
        #[source]
        source: AppError,
    },
}

impl ActionError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ActionError::Unavailable(_) => "This savesie is no longer active.",
            ActionError::Store { kind, .. } => match kind {
                ActionKind::Confirm => "Could not confirm. Try again.",
                ActionKind::Resolve => "Could not mark as resolved. Try again.",
                ActionKind::Flag => "Could not flag this report. Try again.",
            },
        }
    }
}

/// Slot held while an action on a report is running; releases on every exit path
struct InFlightGuard<'a> {
    pending: &'a Mutex<HashMap<Uuid, ActionKind>>,
    report_id: Uuid,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.report_id);
    }
}

/// Confirm, resolve and flag, guarded per device and per report.
///
/// At most one action per report runs at a time, so a report can never be
/// confirming and resolving at once.
pub struct ReportActions {
    repository: Arc<dyn ReportRepository>,
    local_actions: Arc<dyn LocalActionStore>,
    board: SharedBoard,
    pending: Mutex<HashMap<Uuid, ActionKind>>,
}

impl ReportActions {
    pub fn new(
        repository: Arc<dyn ReportRepository>,
        local_actions: Arc<dyn LocalActionStore>,
        board: SharedBoard,
    ) -> Self {
        Self {
            repository,
            local_actions,
            board,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Action currently running for `report_id`, if any
    pub fn pending(&self, report_id: Uuid) -> Option<ActionKind> {
        self.lock_pending().get(&report_id).copied()
    }

    pub fn already_done(&self, kind: ActionKind, report_id: Uuid) -> bool {
        self.local_actions.has(kind, report_id)
    }

    pub async fn confirm(&self, report_id: Uuid) -> Result<ActionOutcome, ActionError> {
        let Some(_guard) = self.begin(ActionKind::Confirm, report_id) else {
            return Ok(self.skipped(ActionKind::Confirm, report_id));
        };

        // Expired or resolved reports must not be revived by the bonus
        let (confirmations, expires_at) = {
            let board = self.board.read().await;
            let report = board
                .get(report_id)
                .filter(|report| report.is_active(Utc::now()))
                .ok_or(ActionError::Unavailable(report_id))?;
            report.next_confirmation()
        };

        self.repository
            .update_confirm(report_id, confirmations, expires_at)
            .await
            .map_err(|source| ActionError::Store {
                kind: ActionKind::Confirm,
                source,
            })?;

        self.board
            .write()
            .await
            .apply_confirmation(report_id, confirmations, expires_at);
        self.remember(ActionKind::Confirm, report_id);

        Ok(ActionOutcome::Confirmed {
            confirmations,
            expires_at,
        })
    }

    pub async fn resolve(&self, report_id: Uuid) -> Result<ActionOutcome, ActionError> {
        let Some(_guard) = self.begin(ActionKind::Resolve, report_id) else {
            return Ok(self.skipped(ActionKind::Resolve, report_id));
        };

        self.repository
            .update_resolved(report_id)
            .await
            .map_err(|source| ActionError::Store {
                kind: ActionKind::Resolve,
                source,
            })?;

        self.board.write().await.mark_resolved(report_id);
        self.remember(ActionKind::Resolve, report_id);

        Ok(ActionOutcome::Resolved)
    }

    /// Moderation signal only; the report stays active
    pub async fn flag(&self, report_id: Uuid) -> Result<ActionOutcome, ActionError> {
        let Some(_guard) = self.begin(ActionKind::Flag, report_id) else {
            return Ok(self.skipped(ActionKind::Flag, report_id));
        };

        self.repository
            .insert_flag(report_id)
            .await
            .map_err(|source| ActionError::Store {
                kind: ActionKind::Flag,
                source,
            })?;

        self.remember(ActionKind::Flag, report_id);

        Ok(ActionOutcome::Flagged)
    }

    /// Claim the report for `kind`, or `None` when the action must be skipped.
    fn begin(&self, kind: ActionKind, report_id: Uuid) -> Option<InFlightGuard<'_>> {
        if self.local_actions.has(kind, report_id) {
            return None;
        }

        let mut pending = self.lock_pending();
        if pending.contains_key(&report_id) {
            return None;
        }
        pending.insert(report_id, kind);

        tracing::debug!("Starting {} for report {}", kind, report_id);
        Some(InFlightGuard {
            pending: &self.pending,
            report_id,
        })
    }

    fn skipped(&self, kind: ActionKind, report_id: Uuid) -> ActionOutcome {
        if self.local_actions.has(kind, report_id) {
            tracing::debug!("Skipping {} for report {}: already recorded", kind, report_id);
            ActionOutcome::AlreadyRecorded
        } else {
            tracing::debug!("Skipping {} for report {}: action in flight", kind, report_id);
            ActionOutcome::InFlight
        }
    }

    fn remember(&self, kind: ActionKind, report_id: Uuid) {
        // The store already accepted the change; a local write failure only
        // loosens the duplicate guard for this device
        if let Err(e) = self.local_actions.mark(kind, report_id) {
            tracing::warn!("Could not record {} for report {}: {}", kind, report_id, e);
        }
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashMap<Uuid, ActionKind>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::device::JsonFileActionStore;
    use crate::features::reports::models::{ObjectCategory, Report};
    use crate::features::reports::services::ReportBoard;
    use crate::shared::test_helpers::{sample_report, InMemoryRepository, MemoryActionStore};
    use chrono::Duration;
    use tokio_test::assert_ok;

    async fn setup(
        store: Arc<dyn LocalActionStore>,
    ) -> (InMemoryRepository, SharedBoard, ReportActions, Uuid) {
        setup_with(sample_report(ObjectCategory::Cone), store).await
    }

    async fn setup_with(
        report: Report,
        store: Arc<dyn LocalActionStore>,
    ) -> (InMemoryRepository, SharedBoard, ReportActions, Uuid) {
        let id = report.id;
        let repository = InMemoryRepository::with_reports(vec![report.clone()]);
        let board = ReportBoard::shared();
        board.write().await.replace(vec![report]);
        let actions = ReportActions::new(Arc::new(repository.clone()), store, board.clone());
        (repository, board, actions, id)
    }

    #[tokio::test]
    async fn test_confirm_increments_and_extends_by_two_hours() {
        let (repository, board, actions, id) = setup(Arc::new(MemoryActionStore::default())).await;
        let before = repository.row(id).unwrap();

        let outcome = assert_ok!(actions.confirm(id).await);
        assert_eq!(
            outcome,
            ActionOutcome::Confirmed {
                confirmations: 1,
                expires_at: before.expires_at + Duration::hours(2),
            }
        );

        let stored = repository.row(id).unwrap();
        assert_eq!(stored.confirmations, 1);
        assert_eq!(stored.expires_at - before.expires_at, Duration::hours(2));

        let mirrored = board.read().await.get(id).cloned().unwrap();
        assert_eq!(mirrored.confirmations, 1);
        assert_eq!(mirrored.expires_at, stored.expires_at);
    }

    #[tokio::test]
    async fn test_second_confirm_from_same_device_issues_no_store_call() {
        let (repository, _board, actions, id) =
            setup(Arc::new(MemoryActionStore::default())).await;

        assert_ok!(actions.confirm(id).await);
        let calls = repository.calls();

        let outcome = assert_ok!(actions.confirm(id).await);
        assert_eq!(outcome, ActionOutcome::AlreadyRecorded);
        assert_eq!(repository.calls(), calls);
        assert_eq!(repository.row(id).unwrap().confirmations, 1);
    }

    #[tokio::test]
    async fn test_confirm_guard_survives_reloading_local_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("actions.json");

        let (repository, board, actions, id) =
            setup(Arc::new(JsonFileActionStore::open(&path))).await;
        assert_ok!(actions.confirm(id).await);
        drop(actions);

        let calls = repository.calls();
        let reloaded = ReportActions::new(
            Arc::new(repository.clone()),
            Arc::new(JsonFileActionStore::open(&path)),
            board,
        );
        let outcome = assert_ok!(reloaded.confirm(id).await);
        assert_eq!(outcome, ActionOutcome::AlreadyRecorded);
        assert_eq!(repository.calls(), calls);
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent_and_removes_report() {
        let (repository, board, actions, id) = setup(Arc::new(MemoryActionStore::default())).await;

        let outcome = assert_ok!(actions.resolve(id).await);
        assert_eq!(outcome, ActionOutcome::Resolved);
        assert_eq!(outcome.message(), Some(RESOLVED_MESSAGE));
        assert!(repository.row(id).unwrap().resolved);
        assert!(board.read().await.active(Utc::now()).is_empty());

        let calls = repository.calls();
        assert_eq!(
            assert_ok!(actions.resolve(id).await),
            ActionOutcome::AlreadyRecorded
        );
        assert_eq!(repository.calls(), calls);
    }

    #[tokio::test]
    async fn test_flag_keeps_report_active() {
        let (repository, board, actions, id) = setup(Arc::new(MemoryActionStore::default())).await;

        assert_eq!(assert_ok!(actions.flag(id).await), ActionOutcome::Flagged);
        assert_eq!(
            assert_ok!(actions.flag(id).await),
            ActionOutcome::AlreadyRecorded
        );
        assert_eq!(repository.flags_for(id), 1);
        assert_eq!(board.read().await.active(Utc::now()).len(), 1);
    }

    #[tokio::test]
    async fn test_store_failure_releases_guard_and_records_nothing() {
        let (repository, _board, actions, id) =
            setup(Arc::new(MemoryActionStore::default())).await;
        repository.reject_writes();

        let err = actions.confirm(id).await.unwrap_err();
        assert_eq!(err.user_message(), "Could not confirm. Try again.");
        assert_eq!(actions.pending(id), None);
        assert!(!actions.already_done(ActionKind::Confirm, id));
        assert_eq!(repository.row(id).unwrap().confirmations, 0);
    }

    #[tokio::test]
    async fn test_action_is_skipped_while_another_is_in_flight() {
        let (repository, _board, actions, id) =
            setup(Arc::new(MemoryActionStore::default())).await;

        let guard = actions.begin(ActionKind::Resolve, id).unwrap();
        assert_eq!(actions.pending(id), Some(ActionKind::Resolve));

        let calls = repository.calls();
        assert_eq!(
            assert_ok!(actions.confirm(id).await),
            ActionOutcome::InFlight
        );
        assert_eq!(repository.calls(), calls);

        drop(guard);
        assert_eq!(actions.pending(id), None);
    }

    #[tokio::test]
    async fn test_confirm_on_unknown_report_is_unavailable() {
        let (_repository, _board, actions, _id) =
            setup(Arc::new(MemoryActionStore::default())).await;
        let missing = Uuid::new_v4();

        let err = actions.confirm(missing).await.unwrap_err();
        assert!(matches!(err, ActionError::Unavailable(id) if id == missing));
        assert_eq!(actions.pending(missing), None);
    }

    #[tokio::test]
    async fn test_confirm_on_expired_report_is_unavailable() {
        let mut report = sample_report(ObjectCategory::Chair);
        report.expires_at = Utc::now() - Duration::minutes(30);
        let (repository, board, actions, id) =
            setup_with(report, Arc::new(MemoryActionStore::default())).await;

        let err = actions.confirm(id).await.unwrap_err();
        assert!(matches!(err, ActionError::Unavailable(missing) if missing == id));
        assert_eq!(repository.calls(), 0);
        assert!(!board.read().await.get(id).unwrap().is_active(Utc::now()));
        assert!(!actions.already_done(ActionKind::Confirm, id));
    }

    #[tokio::test]
    async fn test_confirm_after_resolve_is_unavailable() {
        let (repository, _board, actions, id) =
            setup(Arc::new(MemoryActionStore::default())).await;

        assert_ok!(actions.resolve(id).await);
        let calls = repository.calls();

        let err = actions.confirm(id).await.unwrap_err();
        assert!(matches!(err, ActionError::Unavailable(_)));
        assert_eq!(repository.calls(), calls);
        assert_eq!(repository.row(id).unwrap().confirmations, 0);
    }
}
