//! Nearby search across both place categories.
//!
//! Both category queries run concurrently and are joined before anything is
//! returned. A failing category contributes nothing; the other still counts.

use super::provider::PlacesProvider;
use super::types::{PlaceCandidate, PlaceCategory, SearchError};
use crate::geo::Coordinate;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub const DEFAULT_RADIUS_M: u32 = 5000;

/// Candidates from one search, tagged with the search's generation.
#[derive(Debug, Clone)]
pub struct SearchResults {
    pub generation: u64,
    /// Sorted ascending by distance; ties keep provider order.
    pub candidates: Vec<PlaceCandidate>,
    /// Categories whose query failed.
    pub failed: Vec<PlaceCategory>,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

pub struct PlaceSearchAggregator {
    provider: Arc<dyn PlacesProvider>,
    generation: AtomicU64,
}

impl PlaceSearchAggregator {
    pub fn new(provider: Arc<dyn PlacesProvider>) -> Self {
        Self {
            provider,
            generation: AtomicU64::new(0),
        }
    }

    /// Start a new search and supersede every earlier one. Call it when the
    /// request arrives, before awaiting anything.
    pub fn begin(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// True while no newer search has been started.
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    pub async fn search_nearby(&self, generation: u64, origin: Coordinate, radius_m: u32) -> SearchResults {
        let (vets, shops) = tokio::join!(
            self.search_category(origin, radius_m, PlaceCategory::Vet),
            self.search_category(origin, radius_m, PlaceCategory::PetShop),
        );

        let mut candidates = Vec::new();
        let mut failed = Vec::new();
        for (category, outcome) in [(PlaceCategory::Vet, vets), (PlaceCategory::PetShop, shops)] {
            match outcome {
                Ok(mut found) => candidates.append(&mut found),
                Err(e) => {
                    tracing::warn!(
                        category = category.search_type(),
                        error = %e,
                        "category search failed; continuing without it"
                    );
                    failed.push(category);
                }
            }
        }

        // Vec::sort_by is stable.
        candidates.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));

        tracing::info!(
            generation,
            origin = %origin,
            radius_m,
            found = candidates.len(),
            "nearby search complete"
        );

        SearchResults {
            generation,
            candidates,
            failed,
        }
    }

    async fn search_category(
        &self,
        origin: Coordinate,
        radius_m: u32,
        category: PlaceCategory,
    ) -> Result<Vec<PlaceCandidate>, SearchError> {
        let hits = self.provider.nearby_search(origin, radius_m, category).await?;
        tracing::debug!(category = category.search_type(), hits = hits.len(), "category search returned");
        Ok(hits
            .into_iter()
            .map(|hit| PlaceCandidate::from_hit(hit, category, &origin))
            .collect())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! A scripted in-memory places provider shared by the crate's tests.

    use super::*;
    use crate::places::types::{DetailFetchError, RawPlaceDetail, RawPlaceHit};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    pub struct FakePlaces {
        pub vets: Option<Vec<RawPlaceHit>>,
        pub shops: Option<Vec<RawPlaceHit>>,
        pub details: HashMap<String, RawPlaceDetail>,
        /// Ids whose detail lookup fails this many times before succeeding.
        pub flaky: Mutex<HashMap<String, usize>>,
        pub vet_delay: Option<Duration>,
        pub detail_calls: AtomicUsize,
    }

    pub fn hit(id: &str, lat: f64, lng: f64) -> RawPlaceHit {
        RawPlaceHit {
            id: id.into(),
            name: format!("Place {}", id),
            location: Coordinate::new(lat, lng).unwrap(),
            rating: None,
        }
    }

    #[async_trait]
    impl PlacesProvider for FakePlaces {
        async fn nearby_search(
            &self,
            _origin: Coordinate,
            _radius_m: u32,
            category: PlaceCategory,
        ) -> Result<Vec<RawPlaceHit>, SearchError> {
            let hits = match category {
                PlaceCategory::Vet => {
                    if let Some(delay) = self.vet_delay {
                        tokio::time::sleep(delay).await;
                    }
                    &self.vets
                }
                PlaceCategory::PetShop => &self.shops,
            };
            hits.clone().ok_or_else(|| SearchError::Provider {
                status: "UNKNOWN_ERROR".into(),
                message: "scripted failure".into(),
            })
        }

        async fn place_detail(&self, id: &str, _fields: &[&str]) -> Result<RawPlaceDetail, DetailFetchError> {
            self.detail_calls.fetch_add(1, Ordering::SeqCst);
            {
                let mut flaky = self.flaky.lock().unwrap();
                if let Some(remaining) = flaky.get_mut(id) {
                    if *remaining > 0 {
                        *remaining -= 1;
                        return Err(DetailFetchError::Network("connection reset".into()));
                    }
                }
            }
            self.details
                .get(id)
                .cloned()
                .ok_or_else(|| DetailFetchError::NotFound(id.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{hit, FakePlaces};
    use super::*;

    fn origin() -> Coordinate {
        Coordinate::new(40.0, -75.0).unwrap()
    }

    #[tokio::test]
    async fn test_merges_and_sorts_both_categories() {
        let fake = FakePlaces {
            vets: Some(vec![hit("v-far", 40.03, -75.0), hit("v-near", 40.001, -75.0)]),
            shops: Some(vec![hit("s-mid", 40.01, -75.0)]),
            ..Default::default()
        };
        let agg = PlaceSearchAggregator::new(Arc::new(fake));
        let results = agg.search_nearby(agg.begin(), origin(), DEFAULT_RADIUS_M).await;

        let ids: Vec<&str> = results.candidates.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["v-near", "s-mid", "v-far"]);
        assert!(results
            .candidates
            .windows(2)
            .all(|w| w[0].distance_km <= w[1].distance_km));
        assert_eq!(results.candidates[1].category, PlaceCategory::PetShop);
        assert!(results.failed.is_empty());
    }

    #[tokio::test]
    async fn test_ties_keep_provider_order() {
        let fake = FakePlaces {
            vets: Some(vec![hit("v1", 40.01, -75.0)]),
            shops: Some(vec![hit("s1", 40.01, -75.0)]),
            ..Default::default()
        };
        let agg = PlaceSearchAggregator::new(Arc::new(fake));
        let results = agg.search_nearby(agg.begin(), origin(), DEFAULT_RADIUS_M).await;
        let ids: Vec<&str> = results.candidates.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["v1", "s1"]);
    }

    #[tokio::test]
    async fn test_zero_hits_is_empty_not_error() {
        let fake = FakePlaces {
            vets: Some(vec![]),
            shops: Some(vec![]),
            ..Default::default()
        };
        let agg = PlaceSearchAggregator::new(Arc::new(fake));
        let results = agg.search_nearby(agg.begin(), origin(), DEFAULT_RADIUS_M).await;
        assert!(results.is_empty());
        assert!(results.failed.is_empty());
    }

    #[tokio::test]
    async fn test_failed_category_keeps_other() {
        let fake = FakePlaces {
            vets: None,
            shops: Some(vec![hit("s1", 40.02, -75.0)]),
            ..Default::default()
        };
        let agg = PlaceSearchAggregator::new(Arc::new(fake));
        let results = agg.search_nearby(agg.begin(), origin(), DEFAULT_RADIUS_M).await;
        assert_eq!(results.candidates.len(), 1);
        assert_eq!(results.failed, vec![PlaceCategory::Vet]);
    }

    #[tokio::test]
    async fn test_waits_for_slow_category() {
        let fake = FakePlaces {
            vets: Some(vec![hit("v1", 40.001, -75.0)]),
            shops: Some(vec![hit("s1", 40.02, -75.0)]),
            vet_delay: Some(std::time::Duration::from_millis(50)),
            ..Default::default()
        };
        let agg = PlaceSearchAggregator::new(Arc::new(fake));
        let results = agg.search_nearby(agg.begin(), origin(), DEFAULT_RADIUS_M).await;
        assert_eq!(results.candidates.len(), 2);
        assert_eq!(results.candidates[0].id, "v1");
    }

    #[tokio::test]
    async fn test_generation_advances() {
        let fake = FakePlaces {
            vets: Some(vec![]),
            shops: Some(vec![]),
            ..Default::default()
        };
        let agg = PlaceSearchAggregator::new(Arc::new(fake));
        let first = agg.search_nearby(agg.begin(), origin(), DEFAULT_RADIUS_M).await;
        assert!(agg.is_current(first.generation));
        let second = agg.search_nearby(agg.begin(), origin(), DEFAULT_RADIUS_M).await;
        assert!(second.generation > first.generation);
        assert!(!agg.is_current(first.generation));
        assert!(agg.is_current(second.generation));
    }

    #[tokio::test]
    async fn test_begin_supersedes_before_results_arrive() {
        let fake = FakePlaces {
            vets: Some(vec![]),
            shops: Some(vec![]),
            ..Default::default()
        };
        let agg = PlaceSearchAggregator::new(Arc::new(fake));
        let older = agg.begin();
        let newer = agg.begin();
        let results = agg.search_nearby(older, origin(), DEFAULT_RADIUS_M).await;
        assert_eq!(results.generation, older);
        assert!(!agg.is_current(older));
        assert!(agg.is_current(newer));
    }
}