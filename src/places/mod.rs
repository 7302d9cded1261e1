//! Nearby vet and pet store search.
//!
//! Provider seam, Google Places client, the two-category aggregator and the
//! detail enricher.

pub mod enrich;
pub mod google;
pub mod provider;
pub mod search;
pub mod types;

pub use enrich::{DetailFailurePolicy, PlaceDetailEnricher};
pub use google::GooglePlacesClient;
pub use provider::PlacesProvider;
pub use search::{PlaceSearchAggregator, SearchResults, DEFAULT_RADIUS_M};
pub use types::{
    DetailFetchError, PlaceCandidate, PlaceCategory, PlaceDetail, RawPlaceDetail, RawPlaceHit, SearchError,
};
