use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::features::reports::models::{NewReport, Report, ReportRow};
use crate::shared::constants::BASE_TTL_HOURS;

/// Remote store for reports and flags.
///
/// Failures are returned as-is; nothing here retries. Callers turn them into a
/// user-facing message and let the user decide whether to try again.
#[async_trait]
pub trait ReportRepository: Send + Sync {
    /// Reports whose expiry is still ahead and that are not resolved
    async fn list_active(&self) -> Result<Vec<Report>>;

    async fn insert(&self, report: &NewReport) -> Result<Report>;

    async fn update_resolved(&self, id: Uuid) -> Result<()>;

    async fn update_confirm(
        &self,
        id: Uuid,
        confirmations: i32,
        expires_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn insert_flag(&self, report_id: Uuid) -> Result<()>;
}

const REPORT_COLUMNS: &str = "id, lat, lng, photo_url, city, object_type, created_at, \
                              expires_at, confirmations, resolved";

/// `ReportRepository` backed by the hosted Postgres database
pub struct PgReportRepository {
    pool: PgPool,
}

impl PgReportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReportRepository for PgReportRepository {
    async fn list_active(&self) -> Result<Vec<Report>> {
        // `resolved IS NULL` keeps rows written before the column existed
        let query = format!(
            "SELECT {REPORT_COLUMNS} FROM reports \
             WHERE expires_at > $1 AND (resolved = false OR resolved IS NULL) \
             ORDER BY created_at DESC"
        );

        let rows = sqlx::query_as::<_, ReportRow>(&query)
            .bind(Utc::now())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(e).logged())?;

        tracing::debug!("Fetched {} active reports", rows.len());
        Ok(rows.into_iter().map(Report::from).collect())
    }

    async fn insert(&self, report: &NewReport) -> Result<Report> {
        report.validate()?;

        let query = format!(
            "INSERT INTO reports (lat, lng, photo_url, city, object_type, expires_at) \
             VALUES ($1, $2, $3, $4, $5, now() + make_interval(hours => $6)) \
             RETURNING {REPORT_COLUMNS}"
        );

        let row = sqlx::query_as::<_, ReportRow>(&query)
            .bind(report.lat)
            .bind(report.lng)
            .bind(&report.photo_url)
            .bind(&report.city)
            .bind(report.object_type.as_str())
            .bind(BASE_TTL_HOURS as i32)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::Database(e).logged())?;

        tracing::info!(
            "Created report {} ({}) at {:.5},{:.5}",
            row.id,
            report.object_type,
            report.lat,
            report.lng
        );

        Ok(row.into())
    }

    async fn update_resolved(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("UPDATE reports SET resolved = true WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(e).logged())?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Report {} not found", id)));
        }

        tracing::info!("Resolved report {}", id);
        Ok(())
    }

    async fn update_confirm(
        &self,
        id: Uuid,
        confirmations: i32,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let result =
            sqlx::query("UPDATE reports SET confirmations = $2, expires_at = $3 WHERE id = $1")
                .bind(id)
                .bind(confirmations)
                .bind(expires_at)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::Database(e).logged())?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Report {} not found", id)));
        }

        tracing::info!(
            "Confirmed report {} (confirmations={}, expires_at={})",
            id,
            confirmations,
            expires_at
        );
        Ok(())
    }

    async fn insert_flag(&self, report_id: Uuid) -> Result<()> {
        sqlx::query("INSERT INTO flags (report_id) VALUES ($1)")
            .bind(report_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(e).logged())?;

        tracing::info!("Flagged report {}", report_id);
        Ok(())
    }
}
