//! Google Places Web Service client (legacy JSON endpoints).
//!
//! Responses are normalized into [`RawPlaceHit`] / [`RawPlaceDetail`] on receipt;
//! hits without an id or with out-of-range coordinates are dropped here.

use super::provider::PlacesProvider;
use super::types::{DetailFetchError, PlaceCategory, RawPlaceDetail, RawPlaceHit, SearchError};
use crate::geo::Coordinate;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api/place";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ─── Wire format ────────────────────────────────────────────────

#[derive(Deserialize)]
struct NearbyResponse {
    status: String,
    #[serde(default)]
    results: Vec<NearbyResult>,
    error_message: Option<String>,
}

#[derive(Deserialize)]
struct NearbyResult {
    place_id: Option<String>,
    name: Option<String>,
    geometry: Option<Geometry>,
    rating: Option<f64>,
}

#[derive(Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Deserialize)]
struct DetailResponse {
    status: String,
    result: Option<DetailResult>,
    error_message: Option<String>,
}

#[derive(Deserialize)]
struct DetailResult {
    name: Option<String>,
    formatted_address: Option<String>,
    formatted_phone_number: Option<String>,
    website: Option<String>,
    rating: Option<f64>,
    opening_hours: Option<OpeningHours>,
}

#[derive(Deserialize)]
struct OpeningHours {
    open_now: Option<bool>,
}

// ─── Client ─────────────────────────────────────────────────────

#[derive(Clone)]
pub struct GooglePlacesClient {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
}

impl GooglePlacesClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("PawMap/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn nearby_blocking(
        &self,
        origin: Coordinate,
        radius_m: u32,
        category: PlaceCategory,
    ) -> Result<Vec<RawPlaceHit>, SearchError> {
        if self.api_key.is_empty() {
            return Err(SearchError::MissingApiKey);
        }
        let url = format!("{}/nearbysearch/json", self.base_url);
        let response = self
            .agent
            .get(&url)
            .query("location", &format!("{},{}", origin.lat(), origin.lng()))
            .query("radius", &radius_m.to_string())
            .query("type", category.search_type())
            .query("key", &self.api_key)
            .call()
            .map_err(|e| SearchError::Network(e.to_string()))?;

        let body: NearbyResponse = response
            .into_json()
            .map_err(|e| SearchError::InvalidResponse(e.to_string()))?;

        parse_nearby(body)
    }

    fn detail_blocking(&self, id: &str, fields: &str) -> Result<RawPlaceDetail, DetailFetchError> {
        if self.api_key.is_empty() {
            return Err(DetailFetchError::MissingApiKey);
        }
        let url = format!("{}/details/json", self.base_url);
        let response = self
            .agent
            .get(&url)
            .query("place_id", id)
            .query("fields", fields)
            .query("key", &self.api_key)
            .call()
            .map_err(|e| DetailFetchError::Network(e.to_string()))?;

        let body: DetailResponse = response
            .into_json()
            .map_err(|e| DetailFetchError::InvalidResponse(e.to_string()))?;

        parse_detail(id, body)
    }
}

#[async_trait]
impl PlacesProvider for GooglePlacesClient {
    async fn nearby_search(
        &self,
        origin: Coordinate,
        radius_m: u32,
        category: PlaceCategory,
    ) -> Result<Vec<RawPlaceHit>, SearchError> {
        let client = self.clone();
        tokio::task::spawn_blocking(move || client.nearby_blocking(origin, radius_m, category))
            .await
            .map_err(|e| SearchError::Network(e.to_string()))?
    }

    async fn place_detail(&self, id: &str, fields: &[&str]) -> Result<RawPlaceDetail, DetailFetchError> {
        let client = self.clone();
        let id = id.to_string();
        let fields = fields.join(",");
        tokio::task::spawn_blocking(move || client.detail_blocking(&id, &fields))
            .await
            .map_err(|e| DetailFetchError::Network(e.to_string()))?
    }
}

// ─── Normalization ──────────────────────────────────────────────

fn parse_nearby(body: NearbyResponse) -> Result<Vec<RawPlaceHit>, SearchError> {
    match body.status.as_str() {
        "OK" | "ZERO_RESULTS" => {}
        _ => {
            return Err(SearchError::Provider {
                message: body.error_message.unwrap_or_default(),
                status: body.status,
            })
        }
    }

    Ok(body.results.into_iter().filter_map(normalize_hit).collect())
}

fn normalize_hit(r: NearbyResult) -> Option<RawPlaceHit> {
    let id = r.place_id.filter(|id| !id.is_empty())?;
    let geometry = r.geometry?;
    let location = match Coordinate::new(geometry.location.lat, geometry.location.lng) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(place_id = %id, error = %e, "dropping place with invalid location");
            return None;
        }
    };
    Some(RawPlaceHit {
        name: r.name.unwrap_or_else(|| "Unnamed place".into()),
        id,
        location,
        rating: r.rating,
    })
}

fn parse_detail(id: &str, body: DetailResponse) -> Result<RawPlaceDetail, DetailFetchError> {
    match body.status.as_str() {
        "OK" => {}
        "NOT_FOUND" | "ZERO_RESULTS" => return Err(DetailFetchError::NotFound(id.to_string())),
        _ => {
            return Err(DetailFetchError::Provider {
                message: body.error_message.unwrap_or_default(),
                status: body.status,
            })
        }
    }

    let r = body
        .result
        .ok_or_else(|| DetailFetchError::InvalidResponse("status OK without result".into()))?;

    Ok(RawPlaceDetail {
        name: r.name,
        address: r.formatted_address,
        phone: r.formatted_phone_number,
        website: r.website,
        rating: r.rating,
        open_now: r.opening_hours.and_then(|h| h.open_now),
    })
}
