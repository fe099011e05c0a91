use async_trait::async_trait;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::core::error::{AppError, Result};
use crate::shared::constants::REPORTS_CHANGE_CHANNEL;

/// Delay before listening again after the notification connection fails
const RELISTEN_BACKOFF_SECS: u64 = 5;

/// What happened to the `reports` collection.
///
/// Carries no row: observers are expected to refetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    Insert,
    Update,
    Delete,
    /// Notifications may have been missed (e.g. the connection dropped)
    Resync,
}

impl ChangeEvent {
    pub fn from_payload(payload: &str) -> Self {
        match payload.trim().to_ascii_uppercase().as_str() {
            "INSERT" => ChangeEvent::Insert,
            "UPDATE" => ChangeEvent::Update,
            "DELETE" => ChangeEvent::Delete,
            _ => ChangeEvent::Resync,
        }
    }
}

pub type ChangeHandler = Arc<dyn Fn(ChangeEvent) + Send + Sync>;

/// Handle for a live change subscription; dropping it stops delivery
pub struct ChangeSubscription {
    task: JoinHandle<()>,
    closed: bool,
}

impl ChangeSubscription {
    pub fn new(task: JoinHandle<()>) -> Self {
        Self {
            task,
            closed: false,
        }
    }

    /// Resolves once the feed has stopped delivering for good
    pub async fn closed(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = (&mut self.task).await {
            if e.is_panic() {
                tracing::error!("Change feed task panicked");
            }
        }
        self.closed = true;
    }

    pub fn unsubscribe(self) {
        self.task.abort();
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for ChangeSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Push channel announcing that the report collection changed
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn on_change(&self, handler: ChangeHandler) -> Result<ChangeSubscription>;
}

/// `ChangeFeed` over Postgres LISTEN/NOTIFY on [`REPORTS_CHANGE_CHANNEL`]
pub struct PgChangeFeed {
    pool: PgPool,
}

impl PgChangeFeed {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChangeFeed for PgChangeFeed {
    async fn on_change(&self, handler: ChangeHandler) -> Result<ChangeSubscription> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(REPORTS_CHANGE_CHANNEL).await?;

        tracing::info!("Listening for report changes on '{}'", REPORTS_CHANGE_CHANNEL);

        let channel = REPORTS_CHANGE_CHANNEL;
        let task = tokio::spawn(async move {
            loop {
                match listener.try_recv().await {
                    Ok(Some(notification)) => {
                        let event = ChangeEvent::from_payload(notification.payload());
                        tracing::debug!("Report change on '{}': {:?}", channel, event);
                        handler(event);
                    }
                    Ok(None) => {
                        // Connection lost; the next try_recv reconnects and re-listens
                        tracing::warn!("Change feed connection lost, resyncing");
                        handler(ChangeEvent::Resync);
                    }
                    Err(e) => {
                        tracing::error!(
                            "Change feed error on '{}': {}",
                            channel,
                            AppError::Database(e)
                        );
                        tokio::time::sleep(Duration::from_secs(RELISTEN_BACKOFF_SECS)).await;
                    }
                }
            }
        });

        Ok(ChangeSubscription::new(task))
    }
}
