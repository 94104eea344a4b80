use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

const DEFAULT_BASE_URL: &str = "http://ip-api.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GeolocationError {
    #[error("location access was denied by the geolocation service")]
    PermissionDenied,
    #[error("location information is unavailable")]
    PositionUnavailable,
    #[error("timed out waiting for a location fix")]
    Timeout,
    #[error("geolocation is disabled in this configuration")]
    Unsupported,
}

#[derive(Debug, Clone, Copy)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Approximate coordinate lookup through an IP geolocation endpoint.
#[derive(Clone)]
pub struct IpLocator {
    client: Client,
    base_url: String,
    enabled: bool,
}

impl IpLocator {
    pub fn new(enabled: bool) -> Self {
        Self::with_config(DEFAULT_BASE_URL.to_string(), enabled)
    }

    pub fn with_config(base_url: String, enabled: bool) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url,
            enabled,
        }
    }

    /// Custom base URL constructor, used to point at a mock server in tests.
    pub fn with_base_url(base_url: String) -> Self {
        Self::with_config(base_url, true)
    }

    #[instrument(skip(self))]
    pub async fn current_coordinates(&self) -> Result<Coordinates, GeolocationError> {
        if !self.enabled {
            return Err(GeolocationError::Unsupported);
        }

        debug!("Requesting coordinates from IP geolocation service");
        let response = self
            .client
            .get(format!("{}/json", self.base_url))
            .query(&[("fields", "status,lat,lon,city,country")])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GeolocationError::Timeout
                } else {
                    GeolocationError::PositionUnavailable
                }
            })?;

        let status = response.status();
        if status.as_u16() == 403 {
            return Err(GeolocationError::PermissionDenied);
        }
        if !status.is_success() {
            warn!("Geolocation service returned status {}", status);
            return Err(GeolocationError::PositionUnavailable);
        }

        let body: IpLookupDto = response
            .json()
            .await
            .map_err(|_| GeolocationError::PositionUnavailable)?;

        if body.status != "success" {
            warn!("Geolocation lookup did not succeed: {}", body.status);
            return Err(GeolocationError::PositionUnavailable);
        }

        debug!("Resolved coordinates ({}, {})", body.lat, body.lon);
        Ok(Coordinates {
            latitude: body.lat,
            longitude: body.lon,
        })
    }
}

#[derive(Debug, Deserialize)]
struct IpLookupDto {
    status: String,
    #[serde(default)]
    lat: f64,
    #[serde(default)]
    lon: f64,
}
