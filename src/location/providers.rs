//! Geolocation providers: IP lookup, fixed position, and "unsupported".

use super::types::{GeoFix, GeolocationError, LocationSource, PositionOptions};
use crate::geo::Coordinate;
use async_trait::async_trait;
use serde::Deserialize;

const USER_AGENT: &str = concat!("PawMap/", env!("CARGO_PKG_VERSION"));

/// Source of the current position.
#[async_trait]
pub trait GeolocationProvider: Send + Sync {
    async fn current_position(&self, options: &PositionOptions) -> Result<GeoFix, GeolocationError>;

    /// Provenance reported alongside a successful fix.
    fn source(&self) -> LocationSource;
}

// ─── IP-based geolocation ───────────────────────────────────────

#[derive(Deserialize)]
struct IpApiResult {
    latitude: Option<f64>,
    longitude: Option<f64>,
    #[serde(default)]
    error: bool,
    reason: Option<String>,
}

/// Approximate position from the public IP address via ipapi.co.
pub struct IpGeolocator {
    url: String,
}

impl IpGeolocator {
    pub fn new() -> Self {
        Self::with_url("https://ipapi.co/json/")
    }

    /// Point at a different endpoint (for testing).
    pub fn with_url(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Default for IpGeolocator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GeolocationProvider for IpGeolocator {
    async fn current_position(&self, options: &PositionOptions) -> Result<GeoFix, GeolocationError> {
        let url = self.url.clone();
        let timeout = options.timeout;
        tokio::task::spawn_blocking(move || ip_geolocate(&url, timeout))
            .await
            .map_err(|e| GeolocationError::Failed(e.to_string()))?
    }

    fn source(&self) -> LocationSource {
        LocationSource::IpApi
    }
}

fn ip_geolocate(url: &str, timeout: std::time::Duration) -> Result<GeoFix, GeolocationError> {
    let response = ureq::get(url)
        .set("User-Agent", USER_AGENT)
        .timeout(timeout)
        .call()
        .map_err(|e| GeolocationError::Failed(e.to_string()))?;

    let body: IpApiResult = response
        .into_json()
        .map_err(|e| GeolocationError::Failed(format!("invalid response: {}", e)))?;

    parse_ip_result(body)
}

fn parse_ip_result(r: IpApiResult) -> Result<GeoFix, GeolocationError> {
    if r.error {
        return Err(GeolocationError::Failed(
            r.reason.unwrap_or_else(|| "lookup rejected".into()),
        ));
    }
    let lat = r.latitude.ok_or_else(|| GeolocationError::Failed("no latitude".into()))?;
    let lng = r.longitude.ok_or_else(|| GeolocationError::Failed("no longitude".into()))?;
    let coordinate = Coordinate::new(lat, lng).map_err(|e| GeolocationError::Failed(e.to_string()))?;

    // IP lookups carry no accuracy radius.
    Ok(GeoFix { coordinate, accuracy_m: None })
}

// ─── Fixed position ─────────────────────────────────────────────

/// Always reports the same position (manual `--lat/--lng`).
pub struct FixedPosition {
    coordinate: Coordinate,
}

impl FixedPosition {
    pub fn new(coordinate: Coordinate) -> Self {
        Self { coordinate }
    }
}

#[async_trait]
impl GeolocationProvider for FixedPosition {
    async fn current_position(&self, _options: &PositionOptions) -> Result<GeoFix, GeolocationError> {
        Ok(GeoFix {
            coordinate: self.coordinate,
            accuracy_m: Some(0.0),
        })
    }

    fn source(&self) -> LocationSource {
        LocationSource::Manual
    }
}

// ─── No capability ──────────────────────────────────────────────

/// A platform without any location capability (offline mode).
pub struct NoGeolocation;

#[async_trait]
impl GeolocationProvider for NoGeolocation {
    async fn current_position(&self, _options: &PositionOptions) -> Result<GeoFix, GeolocationError> {
        Err(GeolocationError::Unsupported)
    }

    fn source(&self) -> LocationSource {
        LocationSource::Fallback
    }
}
