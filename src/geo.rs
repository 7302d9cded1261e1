//! Coordinates and great-circle distance.
//!
//! Every coordinate coming from an external provider is turned into a
//! [`Coordinate`] at the boundary, so downstream code never sees raw shapes.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use thiserror::Error;

const DEG: f64 = PI / 180.0;

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Used when the current position cannot be determined (New York City).
pub const DEFAULT_LOCATION: Coordinate = Coordinate {
    lat: 40.7128,
    lng: -74.0060,
};

/// A point on Earth in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    lat: f64,
    lng: f64,
}

#[derive(Deserialize)]
struct RawCoordinate {
    #[serde(alias = "latitude")]
    lat: f64,
    #[serde(alias = "longitude", alias = "lon")]
    lng: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = InvalidCoordinate;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Coordinate::new(raw.lat, raw.lng)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("invalid coordinate ({lat}, {lng}): lat must be within -90..90 and lng within -180..180")]
pub struct InvalidCoordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Result<Self, InvalidCoordinate> {
        if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng) {
            Ok(Self { lat, lng })
        } else {
            Err(InvalidCoordinate { lat, lng })
        }
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }

    /// Distance to `other` in kilometres.
    pub fn distance_km(&self, other: &Coordinate) -> f64 {
        distance_km(self, other)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_coords(self.lat, self.lng))
    }
}

/// Haversine distance between two coordinates, in kilometres.
pub fn distance_km(a: &Coordinate, b: &Coordinate) -> f64 {
    let d_lat = (b.lat - a.lat) * DEG;
    let d_lng = (b.lng - a.lng) * DEG;
    let h = (d_lat / 2.0).sin().powi(2)
        + (a.lat * DEG).cos() * (b.lat * DEG).cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// "40.7128°N, 74.0060°W"
pub fn format_coords(lat: f64, lng: f64) -> String {
    let ns = if lat >= 0.0 { 'N' } else { 'S' };
    let ew = if lng >= 0.0 { 'E' } else { 'W' };
    format!("{:.4}\u{00B0}{}, {:.4}\u{00B0}{}", lat.abs(), ns, lng.abs(), ew)
}

const DIRECTIONS_BASE: &str = "https://www.google.com/maps/dir/?api=1";

/// Navigation link to `destination`, starting from `origin` when it is known.
pub fn directions_url(destination: &Coordinate, origin: Option<&Coordinate>) -> String {
    match origin {
        Some(from) => format!(
            "{}&origin={},{}&destination={},{}",
            DIRECTIONS_BASE, from.lat, from.lng, destination.lat, destination.lng
        ),
        None => format!(
            "{}&destination={},{}",
            DIRECTIONS_BASE, destination.lat, destination.lng
        ),
    }
}
