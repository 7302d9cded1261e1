//! Per-candidate detail enrichment.

use super::provider::PlacesProvider;
use super::types::{DetailFetchError, PlaceCandidate, PlaceDetail, DETAIL_FIELDS};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Detail lookups in flight at once.
pub const DETAIL_CONCURRENCY: usize = 8;

/// What to do with a candidate whose detail lookup failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailFailurePolicy {
    /// Leave the candidate out of the enriched results.
    #[default]
    Drop,
    /// Keep the candidate with empty detail fields.
    KeepCandidate,
}

pub struct PlaceDetailEnricher {
    provider: Arc<dyn PlacesProvider>,
    retries: u32,
    policy: DetailFailurePolicy,
}

impl PlaceDetailEnricher {
    pub fn new(provider: Arc<dyn PlacesProvider>) -> Self {
        Self {
            provider,
            retries: 0,
            policy: DetailFailurePolicy::Drop,
        }
    }

    /// Extra attempts after a failed lookup. Not-found is never retried.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_policy(mut self, policy: DetailFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub async fn enrich(&self, candidate: &PlaceCandidate) -> Result<PlaceDetail, DetailFetchError> {
        let mut attempt = 0;
        loop {
            match self.provider.place_detail(&candidate.id, DETAIL_FIELDS).await {
                Ok(raw) => return Ok(PlaceDetail::from_parts(candidate, raw)),
                Err(e @ DetailFetchError::NotFound(_)) => return Err(e),
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    tracing::debug!(place_id = %candidate.id, attempt, error = %e, "retrying place detail");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Enrich candidates concurrently, at most [`DETAIL_CONCURRENCY`] at a time.
    /// Results come back in the order of `candidates`, after all lookups have
    /// settled.
    pub async fn enrich_all(&self, candidates: &[PlaceCandidate]) -> Vec<PlaceDetail> {
        let lookups: Vec<_> = candidates.iter().map(|c| self.enrich(c)).collect();
        let outcomes: Vec<_> = stream::iter(lookups)
            .buffered(DETAIL_CONCURRENCY)
            .collect()
            .await;

        let mut details = Vec::with_capacity(candidates.len());
        for (candidate, outcome) in candidates.iter().zip(outcomes) {
            match outcome {
                Ok(detail) => details.push(detail),
                Err(e) => {
                    tracing::warn!(place_id = %candidate.id, error = %e, policy = ?self.policy, "place detail unavailable");
                    if self.policy == DetailFailurePolicy::KeepCandidate {
                        details.push(PlaceDetail::bare(candidate));
                    }
                }
            }
        }
        details
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;
    use crate::places::search::testing::FakePlaces;
    use crate::places::types::{PlaceCategory, RawPlaceDetail};
    use std::collections::HashMap;
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;

    fn candidate(id: &str, distance_km: f64) -> PlaceCandidate {
        PlaceCandidate {
            id: id.into(),
            name: format!("Candidate {}", id),
            category: PlaceCategory::Vet,
            location: Coordinate::new(40.0, -75.0).unwrap(),
            distance_km,
            rating: None,
        }
    }

    fn detail(name: &str) -> RawPlaceDetail {
        RawPlaceDetail {
            name: Some(name.into()),
            address: Some("1 Main St".into()),
            ..Default::default()
        }
    }

    fn provider() -> FakePlaces {
        let mut details = HashMap::new();
        details.insert("a".to_string(), detail("Alpha"));
        details.insert("c".to_string(), detail("Gamma"));
        FakePlaces { details, ..Default::default() }
    }

    #[tokio::test]
    async fn test_enrich_copies_distance() {
        let enricher = PlaceDetailEnricher::new(Arc::new(provider()));
        let d = enricher.enrich(&candidate("a", 2.5)).await.unwrap();
        assert_eq!(d.name, "Alpha");
        assert_eq!(d.distance_km, 2.5);
        assert_eq!(d.address.as_deref(), Some("1 Main St"));
    }

    #[tokio::test]
    async fn test_enrich_all_drops_failures_and_keeps_order() {
        let enricher = PlaceDetailEnricher::new(Arc::new(provider()));
        let out = enricher
            .enrich_all(&[candidate("a", 1.0), candidate("b", 2.0), candidate("c", 3.0)])
            .await;
        let names: Vec<&str> = out.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Gamma"]);
    }

    #[tokio::test]
    async fn test_keep_candidate_policy() {
        let enricher = PlaceDetailEnricher::new(Arc::new(provider()))
            .with_policy(DetailFailurePolicy::KeepCandidate);
        let out = enricher
            .enrich_all(&[candidate("a", 1.0), candidate("b", 2.0)])
            .await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].name, "Candidate b");
        assert!(out[1].address.is_none());
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let mut fake = provider();
        fake.flaky = Mutex::new(HashMap::from([("a".to_string(), 2)]));
        let fake = Arc::new(fake);

        let no_retry = PlaceDetailEnricher::new(fake.clone());
        assert!(no_retry.enrich(&candidate("a", 1.0)).await.is_err());

        // One failure left on the counter; a single retry absorbs it.
        let with_retry = PlaceDetailEnricher::new(fake.clone()).with_retries(1);
        assert_eq!(with_retry.enrich(&candidate("a", 1.0)).await.unwrap().name, "Alpha");
        assert_eq!(fake.detail_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let fake = Arc::new(provider());
        let enricher = PlaceDetailEnricher::new(fake.clone()).with_retries(3);
        assert!(matches!(
            enricher.enrich(&candidate("missing", 1.0)).await,
            Err(DetailFetchError::NotFound(_))
        ));
        assert_eq!(fake.detail_calls.load(Ordering::SeqCst), 1);
    }
}
