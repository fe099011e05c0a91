use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::features::reports::models::Coordinates;

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub geocoding: GeocodingConfig,
    pub device: DeviceConfig,
    pub image: ImageConfig,
    pub map: MapConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

/// S3-compatible object storage holding report photos
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// S3 endpoint URL
    pub endpoint: String,
    /// Endpoint used when building public photo URLs (defaults to endpoint)
    pub public_endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    /// Bucket name for report photos
    pub bucket: String,
    /// AWS region (for S3 compatibility)
    pub region: String,
}

#[derive(Debug, Clone)]
pub struct GeocodingConfig {
    pub base_url: String,
    pub user_agent: String,
}

/// Device-side capabilities: local action memory and location fixes
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub local_actions_path: PathBuf,
    pub location_timeout: Duration,
    /// Oldest cached fix still accepted
    pub location_max_age: Duration,
    pub location_high_accuracy: bool,
}

#[derive(Debug, Clone)]
pub struct ImageConfig {
    pub max_width: u32,
    pub jpeg_quality: u8,
}

#[derive(Debug, Clone)]
pub struct MapConfig {
    pub center: Coordinates,
    pub zoom: u8,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if exists, ignore if not found (optional for production)
        if let Err(e) = dotenvy::dotenv() {
            if !e.to_string().contains("not found") {
                eprintln!("Warning: Error loading .env file: {}", e);
            }
        }

        Ok(Config {
            database: DatabaseConfig::from_env()?,
            storage: StorageConfig::from_env()?,
            geocoding: GeocodingConfig::from_env()?,
            device: DeviceConfig::from_env()?,
            image: ImageConfig::from_env()?,
            map: MapConfig::from_env()?,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, String> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| format!("{} must be a valid value", name)),
        Err(_) => Ok(default),
    }
}

impl DatabaseConfig {
    // Conservative pool defaults; a client only needs a handful of connections
    const DEFAULT_MAX_CONNECTIONS: u32 = 5;
    const DEFAULT_MIN_CONNECTIONS: u32 = 1;
    const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;
    const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600; // 10 minutes
    const DEFAULT_MAX_LIFETIME_SECS: u64 = 1800; // 30 minutes

    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set".to_string())?;

        Ok(Self {
            url,
            max_connections: parse_var("DB_MAX_CONNECTIONS", Self::DEFAULT_MAX_CONNECTIONS)?,
            min_connections: parse_var("DB_MIN_CONNECTIONS", Self::DEFAULT_MIN_CONNECTIONS)?,
            acquire_timeout_secs: parse_var(
                "DB_ACQUIRE_TIMEOUT_SECS",
                Self::DEFAULT_ACQUIRE_TIMEOUT_SECS,
            )?,
            idle_timeout_secs: parse_var("DB_IDLE_TIMEOUT_SECS", Self::DEFAULT_IDLE_TIMEOUT_SECS)?,
            max_lifetime_secs: parse_var("DB_MAX_LIFETIME_SECS", Self::DEFAULT_MAX_LIFETIME_SECS)?,
        })
    }
}

impl StorageConfig {
    pub fn from_env() -> Result<Self, String> {
        let endpoint =
            env::var("STORAGE_ENDPOINT").unwrap_or_else(|_| "http://localhost:9000".to_string());

        // Public endpoint defaults to the main endpoint if not specified
        let public_endpoint =
            env::var("STORAGE_PUBLIC_ENDPOINT").unwrap_or_else(|_| endpoint.clone());

        let access_key =
            env::var("STORAGE_ACCESS_KEY").unwrap_or_else(|_| "minioadmin".to_string());
        let secret_key =
            env::var("STORAGE_SECRET_KEY").unwrap_or_else(|_| "minioadmin".to_string());
        let bucket = env::var("STORAGE_BUCKET").unwrap_or_else(|_| "photos".to_string());
        let region = env::var("STORAGE_REGION").unwrap_or_else(|_| "us-east-1".to_string());

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            public_endpoint: public_endpoint.trim_end_matches('/').to_string(),
            access_key,
            secret_key,
            bucket,
            region,
        })
    }
}

impl GeocodingConfig {
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            base_url: env::var("GEOCODING_BASE_URL")
                .unwrap_or_else(|_| "https://nominatim.openstreetmap.org".to_string()),
            user_agent: env::var("GEOCODING_USER_AGENT")
                .unwrap_or_else(|_| "NoSavesies/0.1 (parking-spot-reports)".to_string()),
        })
    }
}

impl DeviceConfig {
    const DEFAULT_LOCAL_ACTIONS_PATH: &'static str = ".nosavesies/actions.json";
    const DEFAULT_LOCATION_TIMEOUT_SECS: u64 = 15;
    const DEFAULT_LOCATION_MAX_AGE_SECS: u64 = 60;

    pub fn from_env() -> Result<Self, String> {
        let local_actions_path = env::var("LOCAL_ACTIONS_PATH")
            .unwrap_or_else(|_| Self::DEFAULT_LOCAL_ACTIONS_PATH.to_string());

        let timeout_secs =
            parse_var("LOCATION_TIMEOUT_SECS", Self::DEFAULT_LOCATION_TIMEOUT_SECS)?;
        let max_age_secs =
            parse_var("LOCATION_MAX_AGE_SECS", Self::DEFAULT_LOCATION_MAX_AGE_SECS)?;

        Ok(Self {
            local_actions_path: PathBuf::from(local_actions_path),
            location_timeout: Duration::from_secs(timeout_secs),
            location_max_age: Duration::from_secs(max_age_secs),
            location_high_accuracy: parse_var("LOCATION_HIGH_ACCURACY", true)?,
        })
    }
}

impl ImageConfig {
    const DEFAULT_MAX_WIDTH: u32 = 800;
    const DEFAULT_JPEG_QUALITY: u8 = 80;

    pub fn from_env() -> Result<Self, String> {
        let max_width = parse_var("IMAGE_MAX_WIDTH", Self::DEFAULT_MAX_WIDTH)?;
        if max_width == 0 {
            return Err("IMAGE_MAX_WIDTH must be greater than zero".to_string());
        }

        let jpeg_quality = parse_var("IMAGE_JPEG_QUALITY", Self::DEFAULT_JPEG_QUALITY)?;
        if !(1..=100).contains(&jpeg_quality) {
            return Err("IMAGE_JPEG_QUALITY must be between 1 and 100".to_string());
        }

        Ok(Self {
            max_width,
            jpeg_quality,
        })
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_width: Self::DEFAULT_MAX_WIDTH,
            jpeg_quality: Self::DEFAULT_JPEG_QUALITY,
        }
    }
}

impl MapConfig {
    // Philadelphia
    const DEFAULT_CENTER_LAT: f64 = 39.9526;
    const DEFAULT_CENTER_LNG: f64 = -75.1652;
    const DEFAULT_ZOOM: u8 = 13;

    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            center: Coordinates {
                lat: parse_var("MAP_CENTER_LAT", Self::DEFAULT_CENTER_LAT)?,
                lng: parse_var("MAP_CENTER_LNG", Self::DEFAULT_CENTER_LNG)?,
            },
            zoom: parse_var("MAP_ZOOM", Self::DEFAULT_ZOOM)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_falls_back_to_default() {
        let value: u32 = parse_var("NOSAVESIES_TEST_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        env::set_var("NOSAVESIES_TEST_BAD_NUMBER", "twelve");
        let err = parse_var::<u64>("NOSAVESIES_TEST_BAD_NUMBER", 1).unwrap_err();
        assert!(err.contains("NOSAVESIES_TEST_BAD_NUMBER"));
    }

    #[test]
    fn test_image_config_default_matches_upload_bounds() {
        let config = ImageConfig::default();
        assert_eq!(config.max_width, 800);
        assert_eq!(config.jpeg_quality, 80);
    }
}
