//! The external places collaborator.

use super::types::{DetailFetchError, PlaceCategory, RawPlaceDetail, RawPlaceHit, SearchError};
use crate::geo::Coordinate;
use async_trait::async_trait;

/// Category search and per-place detail lookup.
#[async_trait]
pub trait PlacesProvider: Send + Sync {
    async fn nearby_search(
        &self,
        origin: Coordinate,
        radius_m: u32,
        category: PlaceCategory,
    ) -> Result<Vec<RawPlaceHit>, SearchError>;

    /// `Err(DetailFetchError::NotFound)` when the id is unknown.
    async fn place_detail(&self, id: &str, fields: &[&str]) -> Result<RawPlaceDetail, DetailFetchError>;
}
