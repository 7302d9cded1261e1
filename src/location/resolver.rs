//! Location resolver: wraps a provider with a timeout and the default fallback.
//!
//! Flow: recent fix (within `maximum_age`) → provider (bounded by the request
//! timeout) → default coordinate.

use super::providers::GeolocationProvider;
use super::types::{GeoFix, GeolocationError, LocationSource, PositionOptions, ResolvedPosition};
use crate::geo::{Coordinate, DEFAULT_LOCATION};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::time::Instant;

/// Resolves the current position; failure is never fatal.
pub struct LocationResolver {
    provider: Arc<dyn GeolocationProvider>,
    options: PositionOptions,
    fallback: Coordinate,
    last_fix: Mutex<Option<(Instant, GeoFix)>>,
}

impl LocationResolver {
    pub fn new(provider: Arc<dyn GeolocationProvider>) -> Self {
        Self {
            provider,
            options: PositionOptions::default(),
            fallback: DEFAULT_LOCATION,
            last_fix: Mutex::new(None),
        }
    }

    pub fn with_fallback(mut self, fallback: Coordinate) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_options(mut self, options: PositionOptions) -> Self {
        self.options = options;
        self
    }

    /// The current position: a fix younger than `maximum_age` if one is held,
    /// otherwise a fresh provider request bounded by the configured timeout.
    pub async fn current_location(&self) -> Result<GeoFix, GeolocationError> {
        if let Some(fix) = self.recent_fix() {
            tracing::debug!(coordinate = %fix.coordinate, "reusing recent position fix");
            return Ok(fix);
        }

        let fix = match tokio::time::timeout(self.options.timeout, self.provider.current_position(&self.options)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(GeolocationError::Failed(format!(
                    "timed out after {}ms",
                    self.options.timeout.as_millis()
                )));
            }
        };

        *self.last_fix.lock().unwrap_or_else(PoisonError::into_inner) = Some((Instant::now(), fix));
        Ok(fix)
    }

    fn recent_fix(&self) -> Option<GeoFix> {
        if self.options.maximum_age.is_zero() {
            return None;
        }
        let last = *self.last_fix.lock().unwrap_or_else(PoisonError::into_inner);
        last.filter(|(at, _)| at.elapsed() <= self.options.maximum_age)
            .map(|(_, fix)| fix)
    }

    /// Current position, or the fallback coordinate if it cannot be determined.
    pub async fn resolve(&self) -> ResolvedPosition {
        match self.current_location().await {
            Ok(fix) => ResolvedPosition {
                coordinate: fix.coordinate,
                accuracy_m: fix.accuracy_m,
                source: self.provider.source(),
            },
            Err(e) => {
                tracing::warn!(error = %e, fallback = %self.fallback, "using default location");
                ResolvedPosition {
                    coordinate: self.fallback,
                    accuracy_m: None,
                    source: LocationSource::Fallback,
                }
            }
        }
    }
}
