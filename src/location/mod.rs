//! Geolocation subsystem for PawMap.
//!
//! Provides the current position from a pluggable provider (IP lookup or a
//! manual fix) and falls back to a default coordinate when that fails.

pub mod providers;
pub mod resolver;
pub mod types;

pub use providers::{FixedPosition, GeolocationProvider, IpGeolocator, NoGeolocation};
pub use resolver::LocationResolver;
pub use types::{GeoFix, GeolocationError, LocationSource, PositionOptions, ResolvedPosition};
