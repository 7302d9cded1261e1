//! Pet profiles and medication schedules.
//!
//! All changes go through [`PetCommand`]s that address pets and medications by
//! stable numeric ids. The whole book is written back after every command.

use crate::store::{load_collection, KeyValueStorage, StorageError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

pub const PETS_KEY: &str = "pawmapPets";
/// Next unallocated ids, kept apart from the pet list so deleted ids stay retired.
pub const PET_IDS_KEY: &str = "pawmapPetIds";

pub type PetId = u64;
pub type MedicationId = u64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationRecord {
    pub id: MedicationId,
    pub name: String,
    pub dosage: String,
    /// Doses per day.
    pub frequency: u32,
    #[serde(default)]
    pub duration_days: Option<u32>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl MedicationRecord {
    /// Last day of the course, when both start and duration are known.
    pub fn end_date(&self) -> Option<NaiveDate> {
        let start = self.start_date?;
        let days = self.duration_days?;
        start.checked_add_days(chrono::Days::new(u64::from(days.saturating_sub(1))))
    }

    pub fn summary(&self) -> String {
        let mut s = format!("{} — {} {}x daily", self.name, self.dosage, self.frequency);
        if let Some(days) = self.duration_days {
            s.push_str(&format!(" for {} days", days));
        }
        if let Some(start) = self.start_date {
            s.push_str(&format!(", starting {}", start));
        }
        s
    }
}

/// Medication fields supplied by the user; the id is assigned by the book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationInput {
    pub name: String,
    pub dosage: String,
    pub frequency: u32,
    #[serde(default)]
    pub duration_days: Option<u32>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl MedicationInput {
    fn into_record(self, id: MedicationId) -> MedicationRecord {
        MedicationRecord {
            id,
            name: self.name,
            dosage: self.dosage,
            frequency: self.frequency,
            duration_days: self.duration_days,
            start_date: self.start_date,
            notes: self.notes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PetRecord {
    pub id: PetId,
    pub name: String,
    pub species: String,
    #[serde(default)]
    pub breed: Option<String>,
    #[serde(default)]
    pub age_years: Option<f32>,
    #[serde(default)]
    pub weight_kg: Option<f32>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub medical_history: Option<String>,
    #[serde(default)]
    pub medications: Vec<MedicationRecord>,
}

/// Pet fields supplied by the user; the id is assigned by the book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PetInput {
    pub name: String,
    pub species: String,
    #[serde(default)]
    pub breed: Option<String>,
    #[serde(default)]
    pub age_years: Option<f32>,
    #[serde(default)]
    pub weight_kg: Option<f32>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub medical_history: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum PetCommand {
    AddPet {
        pet: PetInput,
    },
    RemovePet {
        pet_id: PetId,
    },
    AddMedication {
        pet_id: PetId,
        medication: MedicationInput,
    },
    EditMedication {
        pet_id: PetId,
        medication_id: MedicationId,
        medication: MedicationInput,
    },
    DeleteMedication {
        pet_id: PetId,
        medication_id: MedicationId,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommandOutcome {
    PetAdded { pet_id: PetId },
    PetRemoved { pet_id: PetId },
    MedicationAdded { pet_id: PetId, medication_id: MedicationId },
    MedicationUpdated { pet_id: PetId, medication_id: MedicationId },
    MedicationDeleted { pet_id: PetId, medication_id: MedicationId },
}

#[derive(Debug, Error)]
pub enum PetError {
    #[error("no pet with id {0}")]
    PetNotFound(PetId),

    #[error("pet {pet_id} has no medication with id {medication_id}")]
    MedicationNotFound { pet_id: PetId, medication_id: MedicationId },

    #[error("{0} name must not be empty")]
    EmptyName(&'static str),

    #[error("no {0} ids left to allocate")]
    IdsExhausted(&'static str),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct IdCounters {
    next_pet: PetId,
    next_medication: MedicationId,
}

impl Default for IdCounters {
    fn default() -> Self {
        Self { next_pet: 1, next_medication: 1 }
    }
}

fn allocate(next: &mut u64, what: &'static str) -> Result<u64, PetError> {
    let id = *next;
    *next = id.checked_add(1).ok_or(PetError::IdsExhausted(what))?;
    Ok(id)
}

pub struct PetBook {
    storage: Arc<dyn KeyValueStorage>,
    pets: Vec<PetRecord>,
    ids: IdCounters,
}

impl PetBook {
    pub fn open(storage: Arc<dyn KeyValueStorage>) -> Self {
        let pets: Vec<PetRecord> = load_collection(storage.as_ref(), PETS_KEY);
        let stored: IdCounters = storage
            .get(PET_IDS_KEY)
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();

        // Never hand out an id at or below one already on file.
        let max_pet = pets.iter().map(|p| p.id).max().unwrap_or(0);
        let max_medication = pets
            .iter()
            .flat_map(|p| p.medications.iter().map(|m| m.id))
            .max()
            .unwrap_or(0);
        let ids = IdCounters {
            next_pet: stored.next_pet.max(max_pet.saturating_add(1)),
            next_medication: stored.next_medication.max(max_medication.saturating_add(1)),
        };

        Self { storage, pets, ids }
    }

    pub fn pets(&self) -> &[PetRecord] {
        &self.pets
    }

    pub fn pet(&self, pet_id: PetId) -> Option<&PetRecord> {
        self.pets.iter().find(|p| p.id == pet_id)
    }

    /// Number of medications on file for a pet.
    pub fn medication_count(&self, pet_id: PetId) -> usize {
        self.pet(pet_id).map_or(0, |p| p.medications.len())
    }

    pub fn apply(&mut self, command: PetCommand) -> Result<CommandOutcome, PetError> {
        let outcome = match command {
            PetCommand::AddPet { pet } => {
                require_name("pet", &pet.name)?;
                let pet_id = allocate(&mut self.ids.next_pet, "pet")?;
                self.pets.push(PetRecord {
                    id: pet_id,
                    name: pet.name.trim().to_string(),
                    species: pet.species,
                    breed: pet.breed,
                    age_years: pet.age_years,
                    weight_kg: pet.weight_kg,
                    gender: pet.gender,
                    medical_history: pet.medical_history,
                    medications: Vec::new(),
                });
                CommandOutcome::PetAdded { pet_id }
            }
            PetCommand::RemovePet { pet_id } => {
                let before = self.pets.len();
                self.pets.retain(|p| p.id != pet_id);
                if self.pets.len() == before {
                    return Err(PetError::PetNotFound(pet_id));
                }
                CommandOutcome::PetRemoved { pet_id }
            }
            PetCommand::AddMedication { pet_id, medication } => {
                require_name("medication", &medication.name)?;
                if self.pet(pet_id).is_none() {
                    return Err(PetError::PetNotFound(pet_id));
                }
                let medication_id = allocate(&mut self.ids.next_medication, "medication")?;
                let pet = self.pet_mut(pet_id)?;
                pet.medications.push(medication.into_record(medication_id));
                CommandOutcome::MedicationAdded { pet_id, medication_id }
            }
            PetCommand::EditMedication {
                pet_id,
                medication_id,
                medication,
            } => {
                require_name("medication", &medication.name)?;
                let pet = self.pet_mut(pet_id)?;
                let slot = pet
                    .medications
                    .iter_mut()
                    .find(|m| m.id == medication_id)
                    .ok_or(PetError::MedicationNotFound { pet_id, medication_id })?;
                *slot = medication.into_record(medication_id);
                CommandOutcome::MedicationUpdated { pet_id, medication_id }
            }
            PetCommand::DeleteMedication { pet_id, medication_id } => {
                let pet = self.pet_mut(pet_id)?;
                let before = pet.medications.len();
                pet.medications.retain(|m| m.id != medication_id);
                if pet.medications.len() == before {
                    return Err(PetError::MedicationNotFound { pet_id, medication_id });
                }
                CommandOutcome::MedicationDeleted { pet_id, medication_id }
            }
        };

        self.persist()?;
        tracing::info!(?outcome, "pet command applied");
        Ok(outcome)
    }

    fn pet_mut(&mut self, pet_id: PetId) -> Result<&mut PetRecord, PetError> {
        self.pets
            .iter_mut()
            .find(|p| p.id == pet_id)
            .ok_or(PetError::PetNotFound(pet_id))
    }

    fn persist(&self) -> Result<(), StorageError> {
        self.write(PETS_KEY, &self.pets)?;
        self.write(PET_IDS_KEY, &self.ids)
    }

    fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let json = serde_json::to_string(value).map_err(|source| StorageError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.storage.set(key, &json)
    }
}

fn require_name(what: &'static str, name: &str) -> Result<(), PetError> {
    if name.trim().is_empty() {
        Err(PetError::EmptyName(what))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStorage;

    fn max() -> PetInput {
        PetInput {
            name: "Max".into(),
            species: "dog".into(),
            breed: Some("Beagle".into()),
            age_years: Some(4.0),
            weight_kg: Some(11.5),
            gender: Some("male".into()),
            medical_history: None,
        }
    }

    fn heartworm() -> MedicationInput {
        MedicationInput {
            name: "Heartworm Prevention".into(),
            dosage: "1 chew".into(),
            frequency: 1,
            duration_days: Some(30),
            start_date: NaiveDate::from_ymd_opt(2024, 2, 1),
            notes: None,
        }
    }

    fn book() -> (PetBook, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        (PetBook::open(storage.clone()), storage)
    }

    #[test]
    fn test_add_pet_and_medication() {
        let (mut book, _) = book();
        let CommandOutcome::PetAdded { pet_id } = book.apply(PetCommand::AddPet { pet: max() }).unwrap() else {
            panic!("expected PetAdded");
        };
        let outcome = book
            .apply(PetCommand::AddMedication { pet_id, medication: heartworm() })
            .unwrap();
        assert_eq!(outcome, CommandOutcome::MedicationAdded { pet_id, medication_id: 1 });
        assert_eq!(book.medication_count(pet_id), 1);
    }

    #[test]
    fn test_ids_are_stable_after_delete() {
        let (mut book, _) = book();
        book.apply(PetCommand::AddPet { pet: max() }).unwrap();
        for _ in 0..3 {
            book.apply(PetCommand::AddMedication { pet_id: 1, medication: heartworm() }).unwrap();
        }
        book.apply(PetCommand::DeleteMedication { pet_id: 1, medication_id: 2 }).unwrap();

        let mut edited = heartworm();
        edited.dosage = "2 chews".into();
        book.apply(PetCommand::EditMedication { pet_id: 1, medication_id: 3, medication: edited })
            .unwrap();

        let meds = &book.pet(1).unwrap().medications;
        let ids: Vec<u64> = meds.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(meds[1].dosage, "2 chews");
        assert_eq!(meds[0].dosage, "1 chew");
    }

    #[test]
    fn test_unknown_ids() {
        let (mut book, _) = book();
        assert!(matches!(
            book.apply(PetCommand::RemovePet { pet_id: 9 }),
            Err(PetError::PetNotFound(9))
        ));
        book.apply(PetCommand::AddPet { pet: max() }).unwrap();
        assert!(matches!(
            book.apply(PetCommand::DeleteMedication { pet_id: 1, medication_id: 5 }),
            Err(PetError::MedicationNotFound { pet_id: 1, medication_id: 5 })
        ));
    }

    #[test]
    fn test_empty_name_rejected() {
        let (mut book, storage) = book();
        let mut nameless = max();
        nameless.name = "  ".into();
        assert!(matches!(
            book.apply(PetCommand::AddPet { pet: nameless }),
            Err(PetError::EmptyName("pet"))
        ));
        assert!(storage.get(PETS_KEY).is_none());
    }

    #[test]
    fn test_persisted_and_reloaded() {
        let (mut book, storage) = book();
        book.apply(PetCommand::AddPet { pet: max() }).unwrap();
        book.apply(PetCommand::AddMedication { pet_id: 1, medication: heartworm() }).unwrap();

        let reopened = PetBook::open(storage);
        assert_eq!(reopened.pets().len(), 1);
        assert_eq!(reopened.pets()[0].medications[0].name, "Heartworm Prevention");
    }

    #[test]
    fn test_corrupt_storage_is_empty() {
        let storage = Arc::new(MemoryStorage::with_entry(PETS_KEY, "[{broken"));
        assert!(PetBook::open(storage).pets().is_empty());
    }

    #[test]
    fn test_pet_ids_never_reused_while_max_remains() {
        let (mut book, _) = book();
        book.apply(PetCommand::AddPet { pet: max() }).unwrap();
        book.apply(PetCommand::AddPet { pet: max() }).unwrap();
        book.apply(PetCommand::RemovePet { pet_id: 1 }).unwrap();
        let outcome = book.apply(PetCommand::AddPet { pet: max() }).unwrap();
        assert_eq!(outcome, CommandOutcome::PetAdded { pet_id: 3 });
    }

    #[test]
    fn test_deleted_max_id_not_reused() {
        let (mut book, storage) = book();
        book.apply(PetCommand::AddPet { pet: max() }).unwrap();
        book.apply(PetCommand::AddPet { pet: max() }).unwrap();
        book.apply(PetCommand::RemovePet { pet_id: 2 }).unwrap();
        let outcome = book.apply(PetCommand::AddPet { pet: max() }).unwrap();
        assert_eq!(outcome, CommandOutcome::PetAdded { pet_id: 3 });

        book.apply(PetCommand::AddMedication { pet_id: 1, medication: heartworm() }).unwrap();
        book.apply(PetCommand::DeleteMedication { pet_id: 1, medication_id: 1 }).unwrap();

        let mut reopened = PetBook::open(storage);
        let outcome = reopened
            .apply(PetCommand::AddMedication { pet_id: 1, medication: heartworm() })
            .unwrap();
        assert_eq!(outcome, CommandOutcome::MedicationAdded { pet_id: 1, medication_id: 2 });
        let outcome = reopened.apply(PetCommand::AddPet { pet: max() }).unwrap();
        assert_eq!(outcome, CommandOutcome::PetAdded { pet_id: 4 });
    }

    #[test]
    fn test_id_space_exhaustion_is_an_error() {
        let raw = format!(
            r#"[{{"id":{},"name":"Max","species":"dog","medications":[]}}]"#,
            u64::MAX
        );
        let storage = Arc::new(MemoryStorage::with_entry(PETS_KEY, &raw));
        let mut book = PetBook::open(storage);
        assert_eq!(book.pets().len(), 1);
        assert!(matches!(
            book.apply(PetCommand::AddPet { pet: max() }),
            Err(PetError::IdsExhausted("pet"))
        ));
        assert_eq!(book.pets().len(), 1);
    }

    #[test]
    fn test_write_failure_reported_but_kept_in_memory() {
        let mut book = PetBook::open(Arc::new(crate::store::storage::testing::ReadOnlyStorage));
        assert!(matches!(
            book.apply(PetCommand::AddPet { pet: max() }),
            Err(PetError::Storage(_))
        ));
        assert_eq!(book.pets().len(), 1);
    }

    #[test]
    fn test_medication_end_date_and_summary() {
        let med = heartworm().into_record(1);
        assert_eq!(med.end_date(), NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(
            med.summary(),
            "Heartworm Prevention — 1 chew 1x daily for 30 days, starting 2024-02-01"
        );
    }

    #[test]
    fn test_command_json_shape() {
        let cmd: PetCommand = serde_json::from_str(
            r#"{"command":"delete_medication","pet_id":1,"medication_id":2}"#,
        )
        .unwrap();
        assert_eq!(cmd, PetCommand::DeleteMedication { pet_id: 1, medication_id: 2 });
    }
}
