//! Runtime configuration from environment variables.
//!
//! `.env` is honoured via `dotenvy`. Parsing is done against a lookup function
//! so it can be exercised without touching the process environment.

use crate::geo::{Coordinate, DEFAULT_LOCATION};
use crate::places::google::DEFAULT_BASE_URL;
use crate::places::{DetailFailurePolicy, DEFAULT_RADIUS_M};
use crate::store::FileStorage;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Google Maps Platform key; live searches fail without it.
    pub places_api_key: Option<String>,
    pub places_base_url: String,
    pub data_dir: PathBuf,
    pub search_radius_m: u32,
    pub detail_retries: u32,
    pub detail_failure_policy: DetailFailurePolicy,
    pub default_location: Coordinate,
    /// How long a position fix may be reused; zero asks for a fresh one every time.
    pub location_max_age: Duration,
    pub bind_addr: SocketAddr,
    pub log_level: String,
}

impl Config {
    /// Load `.env` (if present) and read the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        fn parse<T: std::str::FromStr>(var: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
        where
            T::Err: std::fmt::Display,
        {
            match raw {
                Some(v) => v.parse::<T>().map_err(|e| ConfigError::InvalidEnvVar {
                    var: var.to_string(),
                    reason: e.to_string(),
                }),
                None => Ok(default),
            }
        }

        let search_radius_m = parse("PAWMAP_SEARCH_RADIUS_M", get("PAWMAP_SEARCH_RADIUS_M"), DEFAULT_RADIUS_M)?;
        if search_radius_m == 0 || search_radius_m > 50_000 {
            return Err(ConfigError::InvalidEnvVar {
                var: "PAWMAP_SEARCH_RADIUS_M".into(),
                reason: "must be within 1..=50000".into(),
            });
        }

        let keep_unenriched = parse("PAWMAP_KEEP_UNENRICHED", get("PAWMAP_KEEP_UNENRICHED"), false)?;

        let lat = parse("PAWMAP_DEFAULT_LAT", get("PAWMAP_DEFAULT_LAT"), DEFAULT_LOCATION.lat())?;
        let lng = parse("PAWMAP_DEFAULT_LNG", get("PAWMAP_DEFAULT_LNG"), DEFAULT_LOCATION.lng())?;
        let default_location = Coordinate::new(lat, lng).map_err(|e| ConfigError::InvalidEnvVar {
            var: "PAWMAP_DEFAULT_LAT/PAWMAP_DEFAULT_LNG".into(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            places_api_key: get("GOOGLE_MAPS_API_KEY"),
            places_base_url: get("PAWMAP_PLACES_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            data_dir: get("PAWMAP_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(FileStorage::default_dir),
            search_radius_m,
            detail_retries: parse("PAWMAP_DETAIL_RETRIES", get("PAWMAP_DETAIL_RETRIES"), 0)?,
            detail_failure_policy: if keep_unenriched {
                DetailFailurePolicy::KeepCandidate
            } else {
                DetailFailurePolicy::Drop
            },
            default_location,
            location_max_age: Duration::from_secs(parse(
                "PAWMAP_LOCATION_MAX_AGE_S",
                get("PAWMAP_LOCATION_MAX_AGE_S"),
                0,
            )?),
            bind_addr: parse(
                "PAWMAP_BIND_ADDR",
                get("PAWMAP_BIND_ADDR"),
                SocketAddr::from(([127, 0, 0, 1], 8080)),
            )?,
            log_level: get("PAWMAP_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }
}
