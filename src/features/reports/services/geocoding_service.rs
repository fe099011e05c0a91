use async_trait::async_trait;
use serde::Deserialize;

use crate::core::config::GeocodingConfig;
use crate::core::error::{AppError, Result};
use crate::features::reports::models::Coordinates;
use crate::shared::constants::ADDRESS_UNAVAILABLE;

/// Nominatim reverse lookup response structure
#[derive(Debug, Deserialize)]
pub struct NominatimReverseResponse {
    pub display_name: Option<String>,
    pub address: Option<NominatimAddress>,
    /// Present instead of a result when nothing is found at the point
    pub error: Option<String>,
}

/// Nominatim address components
#[derive(Debug, Deserialize)]
pub struct NominatimAddress {
    pub house_number: Option<String>,
    pub road: Option<String>,
    pub city: Option<String>,
    pub town: Option<String>,
    pub village: Option<String>,
}

impl NominatimAddress {
    /// Get city, falling back to town or village
    pub fn get_city(&self) -> Option<String> {
        self.city
            .clone()
            .or_else(|| self.town.clone())
            .or_else(|| self.village.clone())
    }
}

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    /// Best-effort human-readable address for a point, `None` when unknown
    async fn reverse(&self, at: Coordinates) -> Result<Option<String>>;
}

/// Resolve an address for display; never fails.
pub async fn address_or_unavailable(geocoder: &dyn ReverseGeocoder, at: Coordinates) -> String {
    match geocoder.reverse(at).await {
        Ok(Some(address)) => address,
        Ok(None) => ADDRESS_UNAVAILABLE.to_string(),
        Err(e) => {
            tracing::warn!("Reverse geocoding failed for {:?}: {}", at, e);
            ADDRESS_UNAVAILABLE.to_string()
        }
    }
}

/// Reverse geocoding through Nominatim
pub struct GeocodingService {
    client: reqwest::Client,
    base_url: String,
}

impl GeocodingService {
    pub fn new(config: &GeocodingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn reverse_url(&self, at: Coordinates) -> String {
        let params = [
            ("lat", at.lat.to_string()),
            ("lon", at.lng.to_string()),
            ("format", "json".to_string()),
            ("addressdetails", "1".to_string()),
        ];

        let query_string = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        format!("{}/reverse?{}", self.base_url, query_string)
    }

    /// Execute HTTP request to Nominatim and parse response
    async fn execute_request(&self, url: &str) -> Result<Option<NominatimReverseResponse>> {
        let response = self.client.get(url).send().await.map_err(|e| {
            tracing::error!("Nominatim request failed: {:?}", e);
            AppError::ExternalServiceError(format!("Nominatim request failed: {}", e))
        })?;

        if !response.status().is_success() {
            tracing::warn!("Nominatim returned status: {}", response.status());
            return Ok(None);
        }

        let result: NominatimReverseResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse Nominatim response: {:?}", e);
            AppError::ExternalServiceError(format!("Failed to parse Nominatim response: {}", e))
        })?;

        Ok(Some(result))
    }
}

#[async_trait]
impl ReverseGeocoder for GeocodingService {
    async fn reverse(&self, at: Coordinates) -> Result<Option<String>> {
        let url = self.reverse_url(at);
        tracing::debug!("Reverse geocoding {:.5},{:.5} -> {}", at.lat, at.lng, url);

        Ok(self
            .execute_request(&url)
            .await?
            .and_then(format_address))
    }
}

/// Prefer the full display name, fall back to "<number> <road>, <city>".
fn format_address(response: NominatimReverseResponse) -> Option<String> {
    if let Some(error) = response.error {
        tracing::debug!("Nominatim found nothing: {}", error);
        return None;
    }

    if let Some(name) = response.display_name.filter(|n| !n.trim().is_empty()) {
        return Some(name);
    }

    let address = response.address?;
    let street = match (&address.house_number, &address.road) {
        (Some(number), Some(road)) => Some(format!("{} {}", number, road)),
        (None, Some(road)) => Some(road.clone()),
        _ => None,
    };

    let parts: Vec<String> = street.into_iter().chain(address.get_city()).collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}
