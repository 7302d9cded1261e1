//! Saved and nearest place collections.
//!
//! Both collections are read once when the store is opened and written back
//! whole after every mutation. Ids are unique within a collection; the first
//! record written for an id wins.

use super::storage::{KeyValueStorage, StorageError};
use crate::geo::Coordinate;
use crate::places::{PlaceCategory, PlaceDetail};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub const SAVED_KEY: &str = "pawmapSavedLocations";
pub const NEAREST_KEY: &str = "pawmapNearestLocations";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Saved,
    Nearest,
}

impl Collection {
    pub fn storage_key(&self) -> &'static str {
        match self {
            Self::Saved => SAVED_KEY,
            Self::Nearest => NEAREST_KEY,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Saved => write!(f, "saved"),
            Self::Nearest => write!(f, "nearest"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedPlaceRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(rename = "type")]
    pub category: PlaceCategory,
    pub location: Coordinate,
}

impl From<&PlaceDetail> for SavedPlaceRecord {
    fn from(d: &PlaceDetail) -> Self {
        Self {
            id: d.id.clone(),
            name: d.name.clone(),
            address: d.address.clone(),
            phone: d.phone.clone(),
            category: d.category,
            location: d.location,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestPlaceRecord {
    #[serde(flatten)]
    pub place: SavedPlaceRecord,
    #[serde(rename = "distance")]
    pub distance_km: f64,
}

impl From<&PlaceDetail> for NearestPlaceRecord {
    fn from(d: &PlaceDetail) -> Self {
        Self {
            place: SavedPlaceRecord::from(d),
            distance_km: d.distance_km,
        }
    }
}

trait Keyed {
    fn id(&self) -> &str;
}

impl Keyed for SavedPlaceRecord {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Keyed for NearestPlaceRecord {
    fn id(&self) -> &str {
        &self.place.id
    }
}

/// Read a collection. A missing key or content that is not a JSON array is an
/// empty collection; individual records that fail to parse are skipped.
pub fn load_collection<T: DeserializeOwned>(storage: &dyn KeyValueStorage, key: &str) -> Vec<T> {
    let Some(raw) = storage.get(key) else {
        return Vec::new();
    };
    let entries: Vec<serde_json::Value> = match serde_json::from_str(&raw) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(key, error = %e, "stored collection is unreadable; treating as empty");
            return Vec::new();
        }
    };
    entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value(entry) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(key, index, error = %e, "skipping unreadable stored record");
                None
            }
        })
        .collect()
}

fn persist<T: Serialize>(storage: &dyn KeyValueStorage, key: &str, records: &[T]) -> Result<(), StorageError> {
    let json = serde_json::to_string(records).map_err(|source| StorageError::Encode {
        key: key.to_string(),
        source,
    })?;
    storage.set(key, &json)
}

/// Owner of the saved and nearest collections.
pub struct LocalPlaceStore {
    storage: Arc<dyn KeyValueStorage>,
    saved: Vec<SavedPlaceRecord>,
    nearest: Vec<NearestPlaceRecord>,
}

impl LocalPlaceStore {
    /// Load both collections from `storage`.
    pub fn open(storage: Arc<dyn KeyValueStorage>) -> Self {
        let saved: Vec<SavedPlaceRecord> = dedup_by_id(load_collection(storage.as_ref(), SAVED_KEY));
        let mut nearest: Vec<NearestPlaceRecord> = dedup_by_id(load_collection(storage.as_ref(), NEAREST_KEY));
        sort_by_distance(&mut nearest);
        tracing::debug!(saved = saved.len(), nearest = nearest.len(), "place store opened");
        Self { storage, saved, nearest }
    }

    pub fn saved(&self) -> &[SavedPlaceRecord] {
        &self.saved
    }

    pub fn nearest(&self) -> &[NearestPlaceRecord] {
        &self.nearest
    }

    pub fn is_saved(&self, id: &str) -> bool {
        self.saved.iter().any(|r| r.id == id)
    }

    pub fn contains(&self, collection: Collection, id: &str) -> bool {
        match collection {
            Collection::Saved => self.is_saved(id),
            Collection::Nearest => self.nearest.iter().any(|r| r.place.id == id),
        }
    }

    /// Look a place up by id in either collection, saved first.
    pub fn find(&self, id: &str) -> Option<&SavedPlaceRecord> {
        self.saved
            .iter()
            .find(|r| r.id == id)
            .or_else(|| self.nearest.iter().map(|r| &r.place).find(|r| r.id == id))
    }

    /// Append to the saved collection. Returns `false` if the id was already saved.
    pub fn save(&mut self, record: SavedPlaceRecord) -> Result<bool, StorageError> {
        if self.is_saved(&record.id) {
            return Ok(false);
        }
        tracing::info!(place_id = %record.id, name = %record.name, "saved place");
        self.saved.push(record);
        persist(self.storage.as_ref(), SAVED_KEY, &self.saved)?;
        Ok(true)
    }

    /// Insert into the nearest collection, keeping it sorted by distance.
    /// Returns `false` if the id was already present.
    pub fn add_nearest(&mut self, record: NearestPlaceRecord) -> Result<bool, StorageError> {
        if self.contains(Collection::Nearest, &record.place.id) {
            return Ok(false);
        }
        tracing::info!(place_id = %record.place.id, distance_km = record.distance_km, "added to nearest");
        self.nearest.push(record);
        sort_by_distance(&mut self.nearest);
        persist(self.storage.as_ref(), NEAREST_KEY, &self.nearest)?;
        Ok(true)
    }

    /// Remove a record by id. Returns `false` (and changes nothing) if absent.
    pub fn remove(&mut self, collection: Collection, id: &str) -> Result<bool, StorageError> {
        let removed = match collection {
            Collection::Saved => remove_by_id(&mut self.saved, id),
            Collection::Nearest => remove_by_id(&mut self.nearest, id),
        };
        if !removed {
            return Ok(false);
        }
        tracing::info!(place_id = %id, collection = %collection, "removed place");
        match collection {
            Collection::Saved => persist(self.storage.as_ref(), SAVED_KEY, &self.saved)?,
            Collection::Nearest => persist(self.storage.as_ref(), NEAREST_KEY, &self.nearest)?,
        }
        Ok(true)
    }
}

fn remove_by_id<T: Keyed>(records: &mut Vec<T>, id: &str) -> bool {
    let before = records.len();
    records.retain(|r| r.id() != id);
    records.len() != before
}

fn dedup_by_id<T: Keyed>(records: Vec<T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(records.len());
    for r in records {
        if !out.iter().any(|seen| seen.id() == r.id()) {
            out.push(r);
        }
    }
    out
}

fn sort_by_distance(records: &mut [NearestPlaceRecord]) {
    records.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
}
