use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::ObjectCategory;
use crate::shared::constants::{BASE_TTL_HOURS, CONFIRM_BONUS_HOURS};

/// WGS84 position in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// A single observation of a savesie at a location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub lat: f64,
    pub lng: f64,
    pub photo_url: String,
    pub city: Option<String>,
    /// `None` for rows written before categories existed or with an unknown value
    pub object_type: Option<ObjectCategory>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub confirmations: i32,
    pub resolved: bool,
}

impl Report {
    /// A report is active until it expires (exclusive) or is resolved.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at && !self.resolved
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            lat: self.lat,
            lng: self.lng,
        }
    }

    /// Count and expiry this report would carry after one more confirmation.
    pub fn next_confirmation(&self) -> (i32, DateTime<Utc>) {
        (
            self.confirmations.saturating_add(1),
            self.expires_at + confirm_bonus(),
        )
    }
}

pub fn base_ttl() -> Duration {
    Duration::hours(BASE_TTL_HOURS)
}

pub fn confirm_bonus() -> Duration {
    Duration::hours(CONFIRM_BONUS_HOURS)
}

/// Row shape as read from the `reports` table
#[derive(Debug, Clone, FromRow)]
pub(crate) struct ReportRow {
    pub id: Uuid,
    pub lat: f64,
    pub lng: f64,
    pub photo_url: String,
    pub city: Option<String>,
    pub object_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub confirmations: i32,
    pub resolved: Option<bool>,
}

impl From<ReportRow> for Report {
    fn from(row: ReportRow) -> Self {
        let object_type = row.object_type.as_deref().and_then(|raw| {
            raw.parse()
                .map_err(|e| tracing::debug!("Report {}: {}", row.id, e))
                .ok()
        });

        Report {
            id: row.id,
            lat: row.lat,
            lng: row.lng,
            photo_url: row.photo_url,
            city: row.city,
            object_type,
            created_at: row.created_at,
            expires_at: row.expires_at,
            confirmations: row.confirmations.max(0),
            resolved: row.resolved.unwrap_or(false),
        }
    }
}

/// Data for inserting a new report; the store assigns id and timestamps
#[derive(Debug, Clone, PartialEq, Serialize, Validate)]
pub struct NewReport {
    #[validate(range(min = -90.0, max = 90.0, message = "Latitude must be within [-90, 90]"))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0, message = "Longitude must be within [-180, 180]"))]
    pub lng: f64,
    #[validate(url(message = "Photo URL must be a valid URL"))]
    pub photo_url: String,
    pub city: Option<String>,
    pub object_type: ObjectCategory,
}
