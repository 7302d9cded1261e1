//! Core types for the geolocation subsystem.

use crate::geo::Coordinate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// How the current position was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationSource {
    IpApi,
    Manual,
    Fallback,
}

impl fmt::Display for LocationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IpApi => write!(f, "IP"),
            Self::Manual => write!(f, "Manual"),
            Self::Fallback => write!(f, "Default"),
        }
    }
}

/// Options for a single position request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub timeout: Duration,
    /// Oldest acceptable cached fix; zero means always fetch fresh.
    pub maximum_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5000),
            maximum_age: Duration::ZERO,
        }
    }
}

/// A position fix from a provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoFix {
    pub coordinate: Coordinate,
    /// Accuracy radius in metres, when the provider reports one.
    pub accuracy_m: Option<f64>,
}

/// The outcome of [`super::LocationResolver::resolve`]: always a usable position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResolvedPosition {
    pub coordinate: Coordinate,
    pub accuracy_m: Option<f64>,
    pub source: LocationSource,
}

#[derive(Debug, Error)]
pub enum GeolocationError {
    #[error("geolocation is not supported on this platform")]
    Unsupported,

    #[error("geolocation failed: {0}")]
    Failed(String),
}
