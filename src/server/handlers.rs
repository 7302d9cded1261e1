use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::geo::Coordinate;
use crate::pets::{CommandOutcome, PetCommand, PetError, PetRecord};
use crate::places::PlaceDetail;
use crate::session::NearbyReport;
use crate::store::{NearestPlaceRecord, SavedPlaceRecord, StorageError};

use super::state::AppState;

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
    code: u16,
}

pub struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.1,
            code: self.0.as_u16(),
        };
        (self.0, Json(body)).into_response()
    }
}

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    ApiError(status, msg.into())
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        tracing::error!(error = %e, "storage write failed");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }
}

impl From<PetError> for ApiError {
    fn from(e: PetError) -> Self {
        let status = match e {
            PetError::PetNotFound(_) | PetError::MedicationNotFound { .. } => StatusCode::NOT_FOUND,
            PetError::EmptyName(_) => StatusCode::BAD_REQUEST,
            PetError::IdsExhausted(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PetError::Storage(ref inner) => {
                tracing::error!(error = %inner, "storage write failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        api_error(status, e.to_string())
    }
}

fn coordinate_param(lat: Option<f64>, lng: Option<f64>) -> Result<Option<Coordinate>, ApiError> {
    match (lat, lng) {
        (Some(lat), Some(lng)) => Coordinate::new(lat, lng)
            .map(Some)
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string())),
        (None, None) => Ok(None),
        _ => Err(api_error(StatusCode::BAD_REQUEST, "Provide both 'lat' and 'lng' or neither")),
    }
}

// ─── GET /api/nearby ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct NearbyQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius: Option<u32>,
}

/// Every client shares the session's search generation, so the server is
/// meant for a single user. A request that is overtaken by a newer one from any
/// client answers 409.
pub async fn nearby(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NearbyQuery>,
) -> Result<Json<NearbyReport>, ApiError> {
    let start = Instant::now();
    let origin = coordinate_param(params.lat, params.lng)?;
    if let Some(radius) = params.radius {
        if radius == 0 || radius > 50_000 {
            return Err(api_error(StatusCode::BAD_REQUEST, "radius must be within 1..=50000 metres"));
        }
    }

    let report = state
        .session
        .nearby(origin, params.radius)
        .await
        .ok_or_else(|| api_error(StatusCode::CONFLICT, "Search superseded by a newer request"))?;

    tracing::info!(
        origin = %report.origin,
        places = report.places.len(),
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "GET /api/nearby"
    );

    Ok(Json(report))
}

// ─── Saved / nearest collections ─────────────────────────────────

#[derive(Serialize)]
pub struct Added {
    added: bool,
}

#[derive(Serialize)]
pub struct Removed {
    removed: bool,
}

pub async fn list_saved(State(state): State<Arc<AppState>>) -> Json<Vec<SavedPlaceRecord>> {
    Json(state.session.saved())
}

pub async fn save_place(
    State(state): State<Arc<AppState>>,
    Json(place): Json<PlaceDetail>,
) -> Result<(StatusCode, Json<Added>), ApiError> {
    let added = state.session.save_place(&place)?;
    let status = if added { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(Added { added })))
}

pub async fn unsave_place(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Removed>, ApiError> {
    let removed = state.session.unsave(&id)?;
    Ok(Json(Removed { removed }))
}

pub async fn list_nearest(State(state): State<Arc<AppState>>) -> Json<Vec<NearestPlaceRecord>> {
    Json(state.session.nearest())
}

pub async fn add_nearest(
    State(state): State<Arc<AppState>>,
    Json(place): Json<PlaceDetail>,
) -> Result<(StatusCode, Json<Added>), ApiError> {
    if !place.distance_km.is_finite() || place.distance_km < 0.0 {
        return Err(api_error(StatusCode::BAD_REQUEST, "distance_km must be a non-negative number"));
    }
    let added = state.session.add_to_nearest(&place)?;
    let status = if added { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(Added { added })))
}

pub async fn remove_nearest(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Removed>, ApiError> {
    let removed = state.session.remove_nearest(&id)?;
    Ok(Json(Removed { removed }))
}

// ─── GET /api/directions ─────────────────────────────────────────

#[derive(Deserialize)]
pub struct DirectionsQuery {
    pub id: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Serialize)]
pub struct DirectionsResponse {
    url: String,
}

pub async fn directions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DirectionsQuery>,
) -> Result<Json<DirectionsResponse>, ApiError> {
    let destination = match (&params.id, coordinate_param(params.lat, params.lng)?) {
        (_, Some(c)) => c,
        (Some(id), None) => {
            state
                .session
                .stored_place(id)
                .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("No stored place with id '{}'", id)))?
                .location
        }
        (None, None) => {
            return Err(api_error(StatusCode::BAD_REQUEST, "Provide 'id' or 'lat'+'lng' parameters"));
        }
    };

    let url = state.session.directions_to(&destination).await;
    Ok(Json(DirectionsResponse { url }))
}

// ─── Pets ────────────────────────────────────────────────────────

pub async fn list_pets(State(state): State<Arc<AppState>>) -> Json<Vec<PetRecord>> {
    Json(state.session.pets())
}

pub async fn pet_command(
    State(state): State<Arc<AppState>>,
    Json(command): Json<PetCommand>,
) -> Result<Json<CommandOutcome>, ApiError> {
    Ok(Json(state.session.apply_pet_command(command)?))
}
