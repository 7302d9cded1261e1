//! A PawMap session: the resolver, search pipeline and local stores for one user.

use crate::geo::{directions_url, Coordinate};
use crate::location::{LocationResolver, LocationSource};
use crate::pets::{CommandOutcome, PetBook, PetCommand, PetError, PetRecord};
use crate::places::{PlaceDetail, PlaceDetailEnricher, PlaceSearchAggregator, PlaceCategory};
use crate::store::{Collection, LocalPlaceStore, NearestPlaceRecord, SavedPlaceRecord, StorageError};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Enriched results of one nearby search.
#[derive(Debug, Clone, Serialize)]
pub struct NearbyReport {
    pub origin: Coordinate,
    pub source: LocationSource,
    pub generation: u64,
    pub radius_m: u32,
    /// Sorted ascending by distance.
    pub places: Vec<PlaceDetail>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_categories: Vec<PlaceCategory>,
}

pub struct PawMapSession {
    resolver: LocationResolver,
    search: PlaceSearchAggregator,
    enricher: PlaceDetailEnricher,
    places: Mutex<LocalPlaceStore>,
    pets: Mutex<PetBook>,
    radius_m: u32,
}

impl PawMapSession {
    pub fn new(
        resolver: LocationResolver,
        search: PlaceSearchAggregator,
        enricher: PlaceDetailEnricher,
        places: LocalPlaceStore,
        pets: PetBook,
    ) -> Self {
        Self {
            resolver,
            search,
            enricher,
            places: Mutex::new(places),
            pets: Mutex::new(pets),
            radius_m: crate::places::DEFAULT_RADIUS_M,
        }
    }

    pub fn with_radius(mut self, radius_m: u32) -> Self {
        self.radius_m = radius_m;
        self
    }

    /// Search around `origin`, or around the current position when `None`.
    ///
    /// Returns `None` if another search started before this one finished;
    /// its results are stale and must not be shown.
    pub async fn nearby(&self, origin: Option<Coordinate>, radius_m: Option<u32>) -> Option<NearbyReport> {
        let generation = self.search.begin();
        let (origin, source) = match origin {
            Some(c) => (c, LocationSource::Manual),
            None => {
                let pos = self.resolver.resolve().await;
                (pos.coordinate, pos.source)
            }
        };
        if !self.search.is_current(generation) {
            tracing::debug!(generation, "discarding search superseded while locating");
            return None;
        }
        let radius_m = radius_m.unwrap_or(self.radius_m);

        let results = self.search.search_nearby(generation, origin, radius_m).await;
        if !self.search.is_current(generation) {
            tracing::debug!(generation, "discarding superseded search");
            return None;
        }

        let places = self.enricher.enrich_all(&results.candidates).await;
        if !self.search.is_current(generation) {
            tracing::debug!(generation, "discarding superseded search");
            return None;
        }

        Some(NearbyReport {
            origin,
            source,
            generation,
            radius_m,
            places,
            failed_categories: results.failed,
        })
    }

    pub fn save_place(&self, place: &PlaceDetail) -> Result<bool, StorageError> {
        self.place_store().save(SavedPlaceRecord::from(place))
    }

    pub fn add_to_nearest(&self, place: &PlaceDetail) -> Result<bool, StorageError> {
        self.place_store().add_nearest(NearestPlaceRecord::from(place))
    }

    pub fn remove(&self, collection: Collection, id: &str) -> Result<bool, StorageError> {
        self.place_store().remove(collection, id)
    }

    pub fn unsave(&self, id: &str) -> Result<bool, StorageError> {
        self.remove(Collection::Saved, id)
    }

    pub fn remove_nearest(&self, id: &str) -> Result<bool, StorageError> {
        self.remove(Collection::Nearest, id)
    }

    pub fn saved(&self) -> Vec<SavedPlaceRecord> {
        self.place_store().saved().to_vec()
    }

    pub fn nearest(&self) -> Vec<NearestPlaceRecord> {
        self.place_store().nearest().to_vec()
    }

    pub fn is_saved(&self, id: &str) -> bool {
        self.place_store().is_saved(id)
    }

    /// A stored place by id, from either collection.
    pub fn stored_place(&self, id: &str) -> Option<SavedPlaceRecord> {
        self.place_store().find(id).cloned()
    }

    /// Navigation link to `destination`. The current position is fetched
    /// fresh; if it is unavailable the link carries only the destination.
    pub async fn directions_to(&self, destination: &Coordinate) -> String {
        match self.resolver.current_location().await {
            Ok(fix) => directions_url(destination, Some(&fix.coordinate)),
            Err(e) => {
                tracing::info!(error = %e, "current position unavailable; destination-only directions");
                directions_url(destination, None)
            }
        }
    }

    pub fn apply_pet_command(&self, command: PetCommand) -> Result<CommandOutcome, PetError> {
        self.pet_book().apply(command)
    }

    pub fn pets(&self) -> Vec<PetRecord> {
        self.pet_book().pets().to_vec()
    }

    fn place_store(&self) -> MutexGuard<'_, LocalPlaceStore> {
        self.places.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pet_book(&self) -> MutexGuard<'_, PetBook> {
        self.pets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::geo::DEFAULT_LOCATION;
    use crate::pets::PetInput;
    use crate::store::{KeyValueStorage, SAVED_KEY};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_nearby_pipeline() {
        let session = session();
        let report = session.nearby(None, None).await.unwrap();

        assert_eq!(report.origin, here());
        assert_eq!(report.source, LocationSource::Manual);
        assert_eq!(report.radius_m, 5000);
        // v3 has no detail record and is dropped
        let names: Vec<&str> = report.places.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Downtown Vet", "Pet Supplies Plus", "Uptown Animal Hospital"]);
        assert!(report.places.windows(2).all(|w| w[0].distance_km <= w[1].distance_km));
    }

    #[tokio::test]
    async fn test_nearby_falls_back_to_default_location() {
        let session = offline_session();
        let report = session.nearby(None, None).await.unwrap();
        assert_eq!(report.origin, DEFAULT_LOCATION);
        assert_eq!(report.source, LocationSource::Fallback);
    }

    #[tokio::test]
    async fn test_superseded_search_is_discarded() {
        let mut places = fake_places();
        places.vet_delay = Some(std::time::Duration::from_millis(200));
        let (session, _) = session_with(Arc::new(crate::location::FixedPosition::new(here())), places);
        let session = Arc::new(session);

        let slow = {
            let session = session.clone();
            tokio::spawn(async move { session.nearby(None, None).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let fresh = session.nearby(None, None).await;

        assert!(fresh.is_some());
        assert!(slow.await.unwrap().is_none());
    }

    struct SlowFix(std::time::Duration);

    #[async_trait::async_trait]
    impl crate::location::GeolocationProvider for SlowFix {
        async fn current_position(
            &self,
            _options: &crate::location::PositionOptions,
        ) -> Result<crate::location::GeoFix, crate::location::GeolocationError> {
            tokio::time::sleep(self.0).await;
            Ok(crate::location::GeoFix { coordinate: here(), accuracy_m: None })
        }

        fn source(&self) -> LocationSource {
            LocationSource::IpApi
        }
    }

    #[tokio::test]
    async fn test_later_request_wins_over_slow_geolocation() {
        let mut places = fake_places();
        places.vet_delay = Some(std::time::Duration::from_millis(200));
        let (session, _) = session_with(Arc::new(SlowFix(std::time::Duration::from_millis(100))), places);
        let session = Arc::new(session);

        let older = {
            let session = session.clone();
            tokio::spawn(async move { session.nearby(None, None).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let newer = session.nearby(Some(here()), None).await;

        assert!(newer.is_some());
        assert!(older.await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_and_nearest_from_report() {
        let (session, storage) = session_with(Arc::new(crate::location::FixedPosition::new(here())), fake_places());
        let report = session.nearby(None, None).await.unwrap();

        for place in report.places.iter().rev() {
            session.add_to_nearest(place).unwrap();
        }
        assert!(session.save_place(&report.places[1]).unwrap());
        assert!(!session.save_place(&report.places[1]).unwrap());

        assert!(session.is_saved("s1"));
        let nearest: Vec<String> = session.nearest().into_iter().map(|r| r.place.id).collect();
        assert_eq!(nearest, vec!["v1", "s1", "v2"]);
        assert!(storage.get(SAVED_KEY).unwrap().contains("Pet Supplies Plus"));

        assert!(session.remove(Collection::Saved, "s1").unwrap());
        assert!(!session.remove(Collection::Saved, "s1").unwrap());
        assert!(session.saved().is_empty());
        assert_eq!(session.stored_place("v2").unwrap().name, "Uptown Animal Hospital");
    }

    #[tokio::test]
    async fn test_directions() {
        let dest = Coordinate::new(40.75, -73.99).unwrap();
        let url = session().directions_to(&dest).await;
        assert!(url.contains("origin=40,-75"));

        let url = offline_session().directions_to(&dest).await;
        assert!(!url.contains("origin="));
        assert!(url.ends_with("destination=40.75,-73.99"));
    }

    #[tokio::test]
    async fn test_pet_commands_through_session() {
        let session = session();
        session
            .apply_pet_command(PetCommand::AddPet {
                pet: PetInput {
                    name: "Luna".into(),
                    species: "cat".into(),
                    breed: None,
                    age_years: None,
                    weight_kg: None,
                    gender: None,
                    medical_history: None,
                },
            })
            .unwrap();
        assert_eq!(session.pets()[0].name, "Luna");
    }
}
