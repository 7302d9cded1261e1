//! Core types for nearby-place search.

use crate::geo::Coordinate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The two kinds of place PawMap looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaceCategory {
    #[serde(rename = "vet")]
    Vet,
    #[serde(rename = "petshop")]
    PetShop,
}

impl PlaceCategory {
    /// Place type string understood by the search provider.
    pub fn search_type(&self) -> &'static str {
        match self {
            Self::Vet => "veterinary_care",
            Self::PetShop => "pet_store",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Vet => "Veterinary",
            Self::PetShop => "Pet Shop",
        }
    }
}

impl fmt::Display for PlaceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Fields requested from the provider when fetching place details.
pub const DETAIL_FIELDS: &[&str] = &[
    "name",
    "formatted_address",
    "formatted_phone_number",
    "website",
    "rating",
    "opening_hours",
];

/// A search hit as returned by the provider, already normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPlaceHit {
    pub id: String,
    pub name: String,
    pub location: Coordinate,
    pub rating: Option<f64>,
}

/// Extended attributes for one place, as returned by the provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPlaceDetail {
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub rating: Option<f64>,
    pub open_now: Option<bool>,
}

/// A search hit tagged with its category and distance from the search origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceCandidate {
    pub id: String,
    pub name: String,
    pub category: PlaceCategory,
    pub location: Coordinate,
    pub distance_km: f64,
    /// Rating carried on the search hit, used when the detail lookup has none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
}

impl PlaceCandidate {
    pub fn from_hit(hit: RawPlaceHit, category: PlaceCategory, origin: &Coordinate) -> Self {
        Self {
            distance_km: origin.distance_km(&hit.location),
            id: hit.id,
            name: hit.name,
            category,
            location: hit.location,
            rating: hit.rating,
        }
    }
}

/// A candidate enriched with contact, rating and opening-hours data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceDetail {
    pub id: String,
    pub name: String,
    pub category: PlaceCategory,
    pub location: Coordinate,
    pub distance_km: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_now: Option<bool>,
}

impl PlaceDetail {
    /// Merge provider detail into a candidate. Distance and category always
    /// come from the candidate; the provider does not know them.
    pub fn from_parts(candidate: &PlaceCandidate, detail: RawPlaceDetail) -> Self {
        Self {
            id: candidate.id.clone(),
            name: detail.name.unwrap_or_else(|| candidate.name.clone()),
            category: candidate.category,
            location: candidate.location,
            distance_km: candidate.distance_km,
            address: detail.address,
            phone: detail.phone,
            website: detail.website,
            rating: detail.rating.or(candidate.rating).filter(|r| (0.0..=5.0).contains(r)),
            open_now: detail.open_now,
        }
    }

    /// A detail record carrying only what the candidate knows.
    pub fn bare(candidate: &PlaceCandidate) -> Self {
        Self::from_parts(candidate, RawPlaceDetail::default())
    }

    pub fn display_line(&self) -> String {
        let mut line = format!("[{}] {} — {:.1} km", self.category.label(), self.name, self.distance_km);
        if let Some(ref address) = self.address {
            line.push_str(&format!("\n    {}", address));
        }
        if let Some(ref phone) = self.phone {
            line.push_str(&format!("\n    tel {}", phone));
        }
        if let Some(rating) = self.rating {
            line.push_str(&format!("\n    rating {}/5", rating));
        }
        if let Some(open) = self.open_now {
            line.push_str(if open { "\n    open now" } else { "\n    closed" });
        }
        line
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("places provider returned {status}: {message}")]
    Provider { status: String, message: String },

    #[error("invalid places response: {0}")]
    InvalidResponse(String),

    #[error("places API key is not configured")]
    MissingApiKey,
}

#[derive(Debug, Error)]
pub enum DetailFetchError {
    #[error("place {0} not found")]
    NotFound(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("places provider returned {status}: {message}")]
    Provider { status: String, message: String },

    #[error("invalid place detail response: {0}")]
    InvalidResponse(String),

    #[error("places API key is not configured")]
    MissingApiKey,
}
