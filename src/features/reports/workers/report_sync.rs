use std::sync::Arc;
use tokio::sync::{watch, Notify};

use crate::core::error::Result;
use crate::features::reports::services::{ChangeFeed, ReportRepository, SharedBoard};

/// Keeps the board in step with the store.
///
/// Every change notification triggers a full refetch of the active set; the
/// notification itself carries nothing to merge.
pub struct ReportSyncWorker {
    repository: Arc<dyn ReportRepository>,
    feed: Arc<dyn ChangeFeed>,
    board: SharedBoard,
    refreshed: watch::Sender<u64>,
}

impl ReportSyncWorker {
    pub fn new(
        repository: Arc<dyn ReportRepository>,
        feed: Arc<dyn ChangeFeed>,
        board: SharedBoard,
    ) -> Self {
        let (refreshed, _) = watch::channel(0);
        Self {
            repository,
            feed,
            board,
            refreshed,
        }
    }

    /// Receiver bumped after each successful refresh; presentation re-renders on it
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.refreshed.subscribe()
    }

    /// Refetch the active set into the board.
    ///
    /// On failure the board keeps its previous contents.
    pub async fn refresh(&self) -> Result<usize> {
        let reports = self.repository.list_active().await?;
        let count = reports.len();
        self.board.write().await.replace(reports);
        self.refreshed.send_modify(|revision| *revision += 1);

        tracing::debug!("Board refreshed with {} active reports", count);
        Ok(count)
    }

    /// Load the board, then refetch on every change until the feed stops.
    pub async fn run(&self) -> Result<()> {
        tracing::info!("Starting report sync worker");

        let notify = Arc::new(Notify::new());
        let signal = Arc::clone(&notify);
        let mut subscription = self
            .feed
            .on_change(Arc::new(move |event| {
                tracing::debug!("Report change received: {:?}", event);
                signal.notify_one();
            }))
            .await?;

        if let Err(e) = self.refresh().await {
            tracing::error!("Initial report fetch failed: {}", e);
        }

        loop {
            tokio::select! {
                _ = notify.notified() => {
                    if let Err(e) = self.refresh().await {
                        tracing::error!("Report refresh failed: {}", e);
                    }
                }
                _ = subscription.closed() => break,
            }
        }

        tracing::warn!("Report change feed ended");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::device::ActionKind;
    use crate::features::reports::models::ObjectCategory;
    use crate::features::reports::services::{ActionOutcome, ReportActions, ReportBoard};
    use crate::features::reports::services::{ChangeHandler, ChangeSubscription};
    use crate::shared::test_helpers::{sample_report, InMemoryRepository, MemoryActionStore};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::time::Duration;
    use tokio_test::assert_ok;

    async fn wait_for_revision(receiver: &mut watch::Receiver<u64>, at_least: u64) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while *receiver.borrow_and_update() < at_least {
                receiver.changed().await.unwrap();
            }
        })
        .await
        .expect("board was not refreshed in time");
    }

    async fn wait_for_confirmations(board: &SharedBoard, id: uuid::Uuid, expected: i32) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let seen = board.read().await.get(id).map(|r| r.confirmations);
                if seen == Some(expected) {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("board never caught up with the store");
    }

    /// Feed whose delivery task stops right after subscribing
    struct EndingFeed;

    #[async_trait]
    impl ChangeFeed for EndingFeed {
        async fn on_change(&self, _handler: ChangeHandler) -> Result<ChangeSubscription> {
            Ok(ChangeSubscription::new(tokio::spawn(async {})))
        }
    }

    #[tokio::test]
    async fn test_run_returns_when_feed_ends() {
        let repository = InMemoryRepository::with_reports(vec![sample_report(
            ObjectCategory::Cone,
        )]);
        let board = ReportBoard::shared();
        let worker = ReportSyncWorker::new(
            Arc::new(repository),
            Arc::new(EndingFeed),
            board.clone(),
        );

        let finished = tokio::time::timeout(Duration::from_secs(5), worker.run())
            .await
            .expect("sync worker kept waiting on a closed feed");
        assert_ok!(finished);
        assert_eq!(board.read().await.active(Utc::now()).len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_loads_board() {
        let repository = InMemoryRepository::with_reports(vec![sample_report(
            ObjectCategory::Chair,
        )]);
        let board = ReportBoard::shared();
        let worker = ReportSyncWorker::new(
            Arc::new(repository.clone()),
            Arc::new(repository),
            board.clone(),
        );

        assert_eq!(assert_ok!(worker.refresh().await), 1);
        assert!(board.read().await.is_loaded());
        assert_eq!(*worker.subscribe().borrow(), 1);
    }

    #[tokio::test]
    async fn test_change_notification_triggers_refetch() {
        let repository = InMemoryRepository::new();
        let board = ReportBoard::shared();
        let worker = Arc::new(ReportSyncWorker::new(
            Arc::new(repository.clone()),
            Arc::new(repository.clone()),
            board.clone(),
        ));
        let mut revisions = worker.subscribe();

        let running = Arc::clone(&worker);
        let handle = tokio::spawn(async move { running.run().await });
        wait_for_revision(&mut revisions, 1).await;
        assert!(board.read().await.active(Utc::now()).is_empty());

        let new_report = crate::features::reports::models::NewReport {
            lat: 39.95,
            lng: -75.16,
            photo_url: "http://localhost:9000/photos/x.jpg".to_string(),
            city: None,
            object_type: ObjectCategory::Cone,
        };
        assert_ok!(repository.insert(&new_report).await);

        wait_for_revision(&mut revisions, 2).await;
        assert_eq!(board.read().await.active(Utc::now()).len(), 1);

        handle.abort();
    }

    #[tokio::test]
    async fn test_two_devices_confirm_cumulatively() {
        let report = sample_report(ObjectCategory::Cone);
        let id = report.id;
        let backend = InMemoryRepository::with_reports(vec![report]);

        let device = || {
            let board = ReportBoard::shared();
            let worker = Arc::new(ReportSyncWorker::new(
                Arc::new(backend.clone()),
                Arc::new(backend.clone()),
                board.clone(),
            ));
            let actions = ReportActions::new(
                Arc::new(backend.clone()),
                Arc::new(MemoryActionStore::default()),
                board.clone(),
            );
            (board, worker, actions)
        };

        let (board_a, worker_a, actions_a) = device();
        let (board_b, worker_b, actions_b) = device();
        let mut revisions_b = worker_b.subscribe();

        let running_a = Arc::clone(&worker_a);
        let task_a = tokio::spawn(async move { running_a.run().await });
        let running_b = Arc::clone(&worker_b);
        let task_b = tokio::spawn(async move { running_b.run().await });
        wait_for_revision(&mut revisions_b, 1).await;
        let mut revisions_a = worker_a.subscribe();
        wait_for_revision(&mut revisions_a, 1).await;

        let outcome = assert_ok!(actions_a.confirm(id).await);
        assert!(matches!(
            outcome,
            ActionOutcome::Confirmed {
                confirmations: 1,
                ..
            }
        ));

        // B hears about A's write and refetches before confirming
        wait_for_confirmations(&board_b, id, 1).await;

        let outcome = assert_ok!(actions_b.confirm(id).await);
        assert!(matches!(
            outcome,
            ActionOutcome::Confirmed {
                confirmations: 2,
                ..
            }
        ));
        assert_eq!(backend.row(id).unwrap().confirmations, 2);

        // A's cached value is replaced by the store's cumulative count
        wait_for_confirmations(&board_a, id, 2).await;
        assert!(actions_a.already_done(ActionKind::Confirm, id));
        assert!(!actions_a.already_done(ActionKind::Resolve, id));

        task_a.abort();
        task_b.abort();
    }
}
