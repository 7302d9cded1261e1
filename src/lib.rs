//! PawMap: find nearby vets and pet stores, keep favorite places, and track
//! pet medications.
//!
//! The search pipeline runs geolocation → two concurrent category searches →
//! distance ranking → detail enrichment, and the results feed the local
//! saved/nearest collections.

pub mod config;
pub mod geo;
pub mod location;
pub mod pets;
pub mod places;
pub mod server;
pub mod session;
pub mod store;

use std::sync::Arc;

use config::Config;
use location::{GeolocationProvider, LocationResolver, PositionOptions};
use places::{GooglePlacesClient, PlaceDetailEnricher, PlaceSearchAggregator, PlacesProvider};
use session::PawMapSession;
use store::{FileStorage, KeyValueStorage, LocalPlaceStore};

/// Install the global tracing subscriber. `RUST_LOG` wins over `default_level`.
pub fn init_tracing(default_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // A second init (e.g. from tests) is harmless; ignore it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Assemble a session from configuration with the production collaborators.
pub fn build_session(config: &Config, geolocation: Arc<dyn GeolocationProvider>) -> PawMapSession {
    let storage: Arc<dyn KeyValueStorage> = Arc::new(FileStorage::open(&config.data_dir));
    let provider: Arc<dyn PlacesProvider> = Arc::new(GooglePlacesClient::with_base_url(
        config.places_api_key.clone().unwrap_or_default(),
        config.places_base_url.clone(),
    ));

    PawMapSession::new(
        LocationResolver::new(geolocation)
            .with_fallback(config.default_location)
            .with_options(PositionOptions {
                maximum_age: config.location_max_age,
                ..PositionOptions::default()
            }),
        PlaceSearchAggregator::new(provider.clone()),
        PlaceDetailEnricher::new(provider)
            .with_retries(config.detail_retries)
            .with_policy(config.detail_failure_policy),
        LocalPlaceStore::open(storage.clone()),
        pets::PetBook::open(storage),
    )
    .with_radius(config.search_radius_m)
}
