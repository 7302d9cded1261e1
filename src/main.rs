use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use pawmap::config::Config;
use pawmap::geo::Coordinate;
use pawmap::location::{FixedPosition, GeolocationProvider, IpGeolocator, NoGeolocation};
use pawmap::pets::{CommandOutcome, MedicationInput, PetCommand, PetInput};
use pawmap::session::{NearbyReport, PawMapSession};
use pawmap::store::Collection;

/// PawMap: nearby vets and pet stores, saved places and pet medications
///
/// Examples:
///   pawmap nearby
///   pawmap nearby --lat 40.7128 --lng -74.0060 --radius 3000
///   pawmap nearby --save ChIJxyz --nearest ChIJxyz
///   pawmap saved
///   pawmap directions ChIJxyz
///   pawmap pet add --name Max --species dog
///   pawmap med add --pet 1 --name "Heartworm Prevention" --dosage "1 chew" --frequency 1
///   pawmap serve --port 8080
#[derive(Parser)]
#[command(name = "pawmap", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Clone, Copy)]
struct PositionArgs {
    /// Latitude (-90 to 90). Skips geolocation.
    #[arg(long, allow_hyphen_values = true, requires = "lng")]
    lat: Option<f64>,

    /// Longitude (-180 to 180). Skips geolocation.
    #[arg(long, allow_hyphen_values = true, requires = "lat")]
    lng: Option<f64>,

    /// Do not look up the current position over the network.
    #[arg(long)]
    offline: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Find vets and pet stores around you.
    Nearby {
        #[command(flatten)]
        position: PositionArgs,

        /// Search radius in metres (1 to 50000).
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=50_000))]
        radius: Option<u32>,

        /// Save a place from the results (repeatable).
        #[arg(long = "save", value_name = "PLACE_ID")]
        save: Vec<String>,

        /// Add a place from the results to your nearest list (repeatable).
        #[arg(long = "nearest", value_name = "PLACE_ID")]
        nearest: Vec<String>,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// List saved places.
    Saved {
        #[arg(long)]
        json: bool,
    },
    /// List your nearest places.
    Nearest {
        #[arg(long)]
        json: bool,
    },
    /// Remove a saved place.
    Unsave { id: String },
    /// Remove a place from your nearest list.
    Unnearest { id: String },
    /// Print a navigation link to a stored place.
    Directions {
        id: String,

        #[command(flatten)]
        position: PositionArgs,
    },
    /// Manage pets.
    #[command(subcommand)]
    Pet(PetCmd),
    /// Manage a pet's medications.
    #[command(subcommand)]
    Med(MedCmd),
    /// Serve the JSON API.
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,

        #[arg(long)]
        offline: bool,
    },
}

#[derive(Subcommand)]
enum PetCmd {
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        species: String,
        #[arg(long)]
        breed: Option<String>,
        #[arg(long)]
        age: Option<f32>,
        #[arg(long)]
        weight: Option<f32>,
        #[arg(long)]
        gender: Option<String>,
        #[arg(long)]
        history: Option<String>,
    },
    List {
        #[arg(long)]
        json: bool,
    },
    Remove { id: u64 },
}

#[derive(Args)]
struct MedFields {
    #[arg(long)]
    name: String,
    #[arg(long)]
    dosage: String,
    /// Doses per day.
    #[arg(long, default_value_t = 1)]
    frequency: u32,
    /// Course length in days.
    #[arg(long)]
    days: Option<u32>,
    /// First dose (YYYY-MM-DD).
    #[arg(long, value_parser = parse_date)]
    start: Option<NaiveDate>,
    #[arg(long)]
    notes: Option<String>,
}

impl From<MedFields> for MedicationInput {
    fn from(f: MedFields) -> Self {
        MedicationInput {
            name: f.name,
            dosage: f.dosage,
            frequency: f.frequency,
            duration_days: f.days,
            start_date: f.start,
            notes: f.notes,
        }
    }
}

#[derive(Subcommand)]
enum MedCmd {
    Add {
        #[arg(long)]
        pet: u64,
        #[command(flatten)]
        fields: MedFields,
    },
    Edit {
        #[arg(long)]
        pet: u64,
        #[arg(long)]
        id: u64,
        #[command(flatten)]
        fields: MedFields,
    },
    Delete {
        #[arg(long)]
        pet: u64,
        #[arg(long)]
        id: u64,
    },
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("Invalid date '{}': {}", s, e))
}

fn geolocation_for(position: PositionArgs) -> anyhow::Result<Arc<dyn GeolocationProvider>> {
    if let (Some(lat), Some(lng)) = (position.lat, position.lng) {
        let here = Coordinate::new(lat, lng).context("Invalid coordinates. Lat: -90..90, Lng: -180..180")?;
        return Ok(Arc::new(FixedPosition::new(here)));
    }
    if position.offline {
        return Ok(Arc::new(NoGeolocation));
    }
    Ok(Arc::new(IpGeolocator::new()))
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;
    pawmap::init_tracing(&config.log_level);

    let no_position = PositionArgs { lat: None, lng: None, offline: true };

    match cli.command {
        Command::Nearby { position, radius, save, nearest, json } => {
            if config.places_api_key.is_none() {
                bail!("GOOGLE_MAPS_API_KEY is not set; nearby search needs a Google Maps Platform key");
            }
            let session = pawmap::build_session(&config, geolocation_for(position)?);
            let Some(report) = session.nearby(None, radius).await else {
                bail!("search was superseded");
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report, &session);
            }
            apply_selections(&session, &report, &save, &nearest)?;
        }
        Command::Saved { json } => {
            let session = pawmap::build_session(&config, geolocation_for(no_position)?);
            let saved = session.saved();
            if json {
                println!("{}", serde_json::to_string_pretty(&saved)?);
            } else if saved.is_empty() {
                eprintln!("  No saved places yet.");
            } else {
                for r in &saved {
                    println!("  [{}] {} ({})", r.category.label(), r.name, r.id);
                    if let Some(ref phone) = r.phone {
                        println!("      tel {}", phone);
                    }
                    println!("      {}", r.address.as_deref().unwrap_or("(no address)"));
                }
            }
        }
        Command::Nearest { json } => {
            let session = pawmap::build_session(&config, geolocation_for(no_position)?);
            let nearest = session.nearest();
            if json {
                println!("{}", serde_json::to_string_pretty(&nearest)?);
            } else if nearest.is_empty() {
                eprintln!("  Your nearest list is empty.");
            } else {
                for r in &nearest {
                    println!(
                        "  {:>5.1} km  [{}] {} ({})",
                        r.distance_km,
                        r.place.category.label(),
                        r.place.name,
                        r.place.id
                    );
                }
            }
        }
        Command::Unsave { id } => {
            let session = pawmap::build_session(&config, geolocation_for(no_position)?);
            report_removal(session.unsave(&id)?, Collection::Saved, &id);
        }
        Command::Unnearest { id } => {
            let session = pawmap::build_session(&config, geolocation_for(no_position)?);
            report_removal(session.remove_nearest(&id)?, Collection::Nearest, &id);
        }
        Command::Directions { id, position } => {
            let session = pawmap::build_session(&config, geolocation_for(position)?);
            let place = session
                .stored_place(&id)
                .with_context(|| format!("No saved or nearest place with id '{}'", id))?;
            println!("{}", session.directions_to(&place.location).await);
        }
        Command::Pet(cmd) => {
            let session = pawmap::build_session(&config, geolocation_for(no_position)?);
            match cmd {
                PetCmd::Add { name, species, breed, age, weight, gender, history } => {
                    let outcome = session.apply_pet_command(PetCommand::AddPet {
                        pet: PetInput {
                            name,
                            species,
                            breed,
                            age_years: age,
                            weight_kg: weight,
                            gender,
                            medical_history: history,
                        },
                    })?;
                    print_outcome(&outcome);
                }
                PetCmd::List { json } => {
                    let pets = session.pets();
                    if json {
                        println!("{}", serde_json::to_string_pretty(&pets)?);
                    } else if pets.is_empty() {
                        eprintln!("  No pets yet. Add one with `pawmap pet add`.");
                    } else {
                        for pet in &pets {
                            println!(
                                "  #{} {} ({}), {} medication(s)",
                                pet.id,
                                pet.name,
                                pet.species,
                                pet.medications.len()
                            );
                            for med in &pet.medications {
                                println!("      #{} {}", med.id, med.summary());
                            }
                        }
                    }
                }
                PetCmd::Remove { id } => {
                    print_outcome(&session.apply_pet_command(PetCommand::RemovePet { pet_id: id })?);
                }
            }
        }
        Command::Med(cmd) => {
            let session = pawmap::build_session(&config, geolocation_for(no_position)?);
            let command = match cmd {
                MedCmd::Add { pet, fields } => PetCommand::AddMedication {
                    pet_id: pet,
                    medication: fields.into(),
                },
                MedCmd::Edit { pet, id, fields } => PetCommand::EditMedication {
                    pet_id: pet,
                    medication_id: id,
                    medication: fields.into(),
                },
                MedCmd::Delete { pet, id } => PetCommand::DeleteMedication {
                    pet_id: pet,
                    medication_id: id,
                },
            };
            print_outcome(&session.apply_pet_command(command)?);
        }
        Command::Serve { host, port, offline } => {
            let mut addr = config.bind_addr;
            if let Some(host) = host {
                addr.set_ip(host.parse().with_context(|| format!("Invalid host '{}'", host))?);
            }
            if let Some(port) = port {
                addr.set_port(port);
            }
            if config.places_api_key.is_none() {
                tracing::warn!("GOOGLE_MAPS_API_KEY is not set; /api/nearby will return no places");
            }
            let position = PositionArgs { lat: None, lng: None, offline };
            let session = pawmap::build_session(&config, geolocation_for(position)?);
            pawmap::server::start(addr, session)
                .await
                .with_context(|| format!("Cannot serve on {}", addr))?;
        }
    }

    Ok(())
}

fn print_report(report: &NearbyReport, session: &PawMapSession) {
    eprintln!(
        "  \u{1F4CD} {} ({}), radius {} m",
        report.origin, report.source, report.radius_m
    );
    for category in &report.failed_categories {
        eprintln!("  \u{26A0}\u{FE0F}  {} search failed; results may be incomplete", category.label());
    }
    if report.places.is_empty() {
        eprintln!("  No nearby places found.");
        return;
    }
    for place in &report.places {
        let marker = if session.is_saved(&place.id) { "\u{2605}" } else { " " };
        println!("{} {}", marker, place.display_line());
        println!("    id {}", place.id);
    }
}

fn apply_selections(
    session: &PawMapSession,
    report: &NearbyReport,
    save: &[String],
    nearest: &[String],
) -> anyhow::Result<()> {
    for (ids, collection) in [(save, Collection::Saved), (nearest, Collection::Nearest)] {
        for id in ids {
            let Some(place) = report.places.iter().find(|p| &p.id == id) else {
                eprintln!("  '{}' is not in these results; nothing added to {}", id, collection);
                continue;
            };
            let added = match collection {
                Collection::Saved => session.save_place(place)?,
                Collection::Nearest => session.add_to_nearest(place)?,
            };
            if added {
                eprintln!("  Added {} to {}", place.name, collection);
            } else {
                eprintln!("  {} is already in {}", place.name, collection);
            }
        }
    }
    Ok(())
}

fn report_removal(removed: bool, collection: Collection, id: &str) {
    if removed {
        eprintln!("  Removed {} from {}", id, collection);
    } else {
        eprintln!("  {} was not in {}", id, collection);
    }
}

fn print_outcome(outcome: &CommandOutcome) {
    match outcome {
        CommandOutcome::PetAdded { pet_id } => eprintln!("  Added pet #{}", pet_id),
        CommandOutcome::PetRemoved { pet_id } => eprintln!("  Removed pet #{}", pet_id),
        CommandOutcome::MedicationAdded { pet_id, medication_id } => {
            eprintln!("  Added medication #{} for pet #{}", medication_id, pet_id)
        }
        CommandOutcome::MedicationUpdated { pet_id, medication_id } => {
            eprintln!("  Updated medication #{} for pet #{}", medication_id, pet_id)
        }
        CommandOutcome::MedicationDeleted { pet_id, medication_id } => {
            eprintln!("  Deleted medication #{} for pet #{}", medication_id, pet_id)
        }
    }
}
