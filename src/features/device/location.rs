use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

use crate::core::config::DeviceConfig;
use crate::features::reports::models::Coordinates;

/// How a location fix should be obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixOptions {
    pub timeout: Duration,
    /// A cached fix no older than this is acceptable
    pub maximum_age: Duration,
    pub high_accuracy: bool,
}

impl FixOptions {
    pub fn from_config(config: &DeviceConfig) -> Self {
        Self {
            timeout: config.location_timeout,
            maximum_age: config.location_max_age,
            high_accuracy: config.location_high_accuracy,
        }
    }
}

impl Default for FixOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            maximum_age: Duration::from_secs(60),
            high_accuracy: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationFix {
    pub coordinates: Coordinates,
    pub taken_at: DateTime<Utc>,
}

impl LocationFix {
    pub fn now(coordinates: Coordinates) -> Self {
        Self {
            coordinates,
            taken_at: Utc::now(),
        }
    }

    /// Whether the fix is recent enough for `maximum_age`
    pub fn is_fresh(&self, maximum_age: Duration, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(maximum_age) {
            Ok(max_age) => now - self.taken_at <= max_age,
            Err(_) => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("location capability unsupported")]
    Unsupported,

    #[error("location permission denied")]
    PermissionDenied,

    #[error("position unavailable")]
    Unavailable,

    #[error("location request timed out")]
    Timeout,
}

impl LocationError {
    pub fn user_message(&self) -> &'static str {
        match self {
            LocationError::Unsupported => "Location is not supported on this device.",
            LocationError::PermissionDenied => {
                "Location permission denied. Enable location to report a savesie."
            }
            LocationError::Unavailable => {
                "Location unavailable. Check your connection and try again."
            }
            LocationError::Timeout => "Location request timed out. Try again.",
        }
    }
}

/// Device geolocation capability
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_fix(&self, options: &FixOptions) -> Result<LocationFix, LocationError>;
}

/// Ask `provider` for a fix, bounded by `options.timeout` and `options.maximum_age`.
pub async fn request_fix(
    provider: &dyn LocationProvider,
    options: &FixOptions,
) -> Result<Coordinates, LocationError> {
    let fix = tokio::time::timeout(options.timeout, provider.current_fix(options))
        .await
        .map_err(|_| LocationError::Timeout)??;

    if !fix.is_fresh(options.maximum_age, Utc::now()) {
        tracing::debug!("Rejecting stale location fix from {}", fix.taken_at);
        return Err(LocationError::Unavailable);
    }

    Ok(fix.coordinates)
}

/// Location supplied by the user instead of a positioning sensor
pub struct ManualLocationProvider {
    coordinates: Option<Coordinates>,
}

impl ManualLocationProvider {
    pub fn new(coordinates: Option<Coordinates>) -> Self {
        Self { coordinates }
    }
}

#[async_trait]
impl LocationProvider for ManualLocationProvider {
    async fn current_fix(&self, _options: &FixOptions) -> Result<LocationFix, LocationError> {
        self.coordinates
            .map(LocationFix::now)
            .ok_or(LocationError::Unsupported)
    }
}
