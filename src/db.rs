use crate::classifier::{determine_category, parse_date};
use crate::error::{HerdError, HerdResult};
use crate::schema::RecordValidator;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_INACTIVE: &str = "inactive";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Animal as stored in the register
///
/// `category` is a snapshot: it was computed (or supplied by the client) on
/// `category_as_of` and goes stale as the animal ages. See `refresh_categories`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Animal {
    pub id: i64,
    pub tag_number: String,
    pub species: String,
    pub sex: String,
    pub date_of_birth: Option<NaiveDate>,
    pub castrated: bool,
    pub category: String,
    pub category_as_of: Option<NaiveDate>,
    pub owner_name: String,
    pub location: Option<String>,
    /// active, inactive
    pub status: String,
    /// registration, birth, purchase, import
    pub origin: String,
    pub notes: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Animal {
    pub fn is_active(&self) -> bool {
        self.status == STATUS_ACTIVE
    }

    /// Category as it would be computed on `reference_date`
    pub fn category_on(&self, reference_date: NaiveDate) -> String {
        determine_category(
            &self.species,
            &self.sex,
            self.date_of_birth,
            self.castrated,
            reference_date,
        )
    }
}

/// Input for registering an animal
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewAnimal {
    pub tag_number: String,
    pub species: String,
    pub sex: String,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub castrated: bool,
    /// Category computed by the client. Stored as given when present.
    #[serde(default)]
    pub category: Option<String>,
    pub owner_name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Optional filters for `list_animals`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnimalFilter {
    /// Case-insensitive category label
    pub category: Option<String>,
    pub species: Option<String>,
    pub status: Option<String>,
}

/// Entry in the per-animal event log
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Event {
    pub event_id: String,
    pub animal_id: i64,
    pub event_type: String,
    pub event_date: NaiveDate,
    /// Row id of the birth, purchase, sale or exit that caused this event
    pub related_id: Option<i64>,
    pub notes: Option<String>,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(
        event_type: &str,
        animal_id: i64,
        event_date: NaiveDate,
        notes: &str,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            animal_id,
            event_type: event_type.to_string(),
            event_date,
            related_id: None,
            notes: Some(notes.to_string()),
            actor: actor.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn related_to(mut self, related_id: i64) -> Self {
        self.related_id = Some(related_id);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MovementType {
    In,
    Out,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::In => "IN",
            MovementType::Out => "OUT",
        }
    }

    fn parse(raw: &str) -> Option<MovementType> {
        match raw {
            "IN" => Some(MovementType::In),
            "OUT" => Some(MovementType::Out),
            _ => None,
        }
    }
}

/// Entry in the IN/OUT movement log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    pub id: i64,
    pub animal_id: i64,
    pub movement_type: MovementType,
    pub source: String,
    pub destination: String,
    pub movement_date: NaiveDate,
    pub notes: Option<String>,
}

/// Active head count per species and category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HerdSummaryRow {
    pub species: String,
    pub category: String,
    pub count: i64,
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS animals (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tag_number TEXT UNIQUE NOT NULL,
            species TEXT NOT NULL,
            sex TEXT NOT NULL,
            date_of_birth TEXT,
            castrated INTEGER NOT NULL DEFAULT 0,
            category TEXT NOT NULL DEFAULT '',
            category_as_of TEXT,
            owner_name TEXT NOT NULL,
            location TEXT,
            status TEXT NOT NULL DEFAULT 'active',
            origin TEXT NOT NULL DEFAULT 'registration',
            notes TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            animal_id INTEGER NOT NULL REFERENCES animals(id),
            event_type TEXT NOT NULL,
            event_date TEXT NOT NULL,
            related_id INTEGER,
            notes TEXT,
            actor TEXT NOT NULL,
            timestamp TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS movements (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            animal_id INTEGER NOT NULL REFERENCES animals(id),
            movement_type TEXT NOT NULL,
            source TEXT NOT NULL,
            destination TEXT NOT NULL,
            movement_date TEXT NOT NULL,
            notes TEXT
        );

        CREATE TABLE IF NOT EXISTS births (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            calf_id INTEGER NOT NULL REFERENCES animals(id),
            dam_id INTEGER NOT NULL REFERENCES animals(id),
            sire_id INTEGER REFERENCES animals(id),
            birth_date TEXT NOT NULL,
            notes TEXT
        );

        CREATE TABLE IF NOT EXISTS purchases (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            reference TEXT UNIQUE NOT NULL,
            vendor TEXT NOT NULL,
            purchase_date TEXT NOT NULL,
            total_cost REAL NOT NULL,
            notes TEXT
        );

        CREATE TABLE IF NOT EXISTS purchase_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            purchase_id INTEGER NOT NULL REFERENCES purchases(id),
            animal_id INTEGER NOT NULL REFERENCES animals(id),
            price REAL NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sales (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            reference TEXT UNIQUE NOT NULL,
            buyer TEXT NOT NULL,
            sale_date TEXT NOT NULL,
            total_amount REAL NOT NULL,
            notes TEXT
        );

        CREATE TABLE IF NOT EXISTS sale_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sale_id INTEGER NOT NULL REFERENCES sales(id),
            animal_id INTEGER NOT NULL REFERENCES animals(id),
            price REAL NOT NULL
        );

        CREATE TABLE IF NOT EXISTS exits (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            animal_id INTEGER NOT NULL REFERENCES animals(id),
            exit_type TEXT NOT NULL,
            reason TEXT,
            exit_date TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS health_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            animal_id INTEGER NOT NULL REFERENCES animals(id),
            event_type TEXT NOT NULL,
            condition TEXT NOT NULL,
            treatment TEXT,
            vet TEXT,
            event_date TEXT NOT NULL,
            notes TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_animals_category ON animals(category);
        CREATE INDEX IF NOT EXISTS idx_animals_status ON animals(status);
        CREATE INDEX IF NOT EXISTS idx_events_animal ON events(animal_id, event_date);
        CREATE INDEX IF NOT EXISTS idx_movements_animal ON movements(animal_id, movement_date);
        CREATE INDEX IF NOT EXISTS idx_health_events_date ON health_events(event_date);",
    )?;

    Ok(())
}

// ============================================================================
// ROW MAPPING
// ============================================================================

const ANIMAL_COLUMNS: &str = "id, tag_number, species, sex, date_of_birth, castrated, category,
    category_as_of, owner_name, location, status, origin, notes, created_at";

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_timestamp(raw: Option<String>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Read a required date column, surfacing malformed text as a conversion error
pub(crate) fn required_date(row: &Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn animal_from_row(row: &Row) -> rusqlite::Result<Animal> {
    let dob: Option<String> = row.get(4)?;
    let as_of: Option<String> = row.get(7)?;

    Ok(Animal {
        id: row.get(0)?,
        tag_number: row.get(1)?,
        species: row.get(2)?,
        sex: row.get(3)?,
        date_of_birth: dob.as_deref().and_then(parse_date),
        castrated: row.get(5)?,
        category: row.get(6)?,
        category_as_of: as_of.as_deref().and_then(parse_date),
        owner_name: row.get(8)?,
        location: row.get(9)?,
        status: row.get(10)?,
        origin: row.get(11)?,
        notes: row.get(12)?,
        created_at: parse_timestamp(row.get(13)?),
    })
}

fn event_from_row(row: &Row) -> rusqlite::Result<Event> {
    let timestamp_str: String = row.get(7)?;

    Ok(Event {
        event_id: row.get(0)?,
        animal_id: row.get(1)?,
        event_type: row.get(2)?,
        event_date: required_date(row, 3)?,
        related_id: row.get(4)?,
        notes: row.get(5)?,
        actor: row.get(6)?,
        timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
            })?
            .with_timezone(&Utc),
    })
}

// ============================================================================
// ANIMAL REGISTER
// ============================================================================

/// Insert an animal row. Category comes from the client when supplied,
/// otherwise from the classifier at `reference_date`.
pub(crate) fn insert_animal(
    conn: &Connection,
    animal: &NewAnimal,
    origin: &str,
    reference_date: NaiveDate,
) -> HerdResult<i64> {
    let category = match animal.category.as_deref().map(str::trim) {
        Some(given) if !given.is_empty() => given.to_string(),
        _ => determine_category(
            &animal.species,
            &animal.sex,
            animal.date_of_birth,
            animal.castrated,
            reference_date,
        ),
    };

    let result = conn.execute(
        "INSERT INTO animals (
            tag_number, species, sex, date_of_birth, castrated, category, category_as_of,
            owner_name, location, status, origin, notes, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            animal.tag_number.trim(),
            animal.species.trim().to_lowercase(),
            animal.sex.trim().to_lowercase(),
            animal.date_of_birth.map(format_date),
            animal.castrated,
            category,
            format_date(reference_date),
            animal.owner_name.trim(),
            animal.location,
            STATUS_ACTIVE,
            origin,
            animal.notes,
            Utc::now().to_rfc3339(),
        ],
    );

    match result {
        Ok(_) => Ok(conn.last_insert_rowid()),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            Err(HerdError::DuplicateTag(animal.tag_number.trim().to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Register a new animal: validate, classify, insert, then log a
/// `registered` event and an IN movement. All-or-nothing.
pub fn register_animal(
    conn: &Connection,
    animal: &NewAnimal,
    reference_date: NaiveDate,
    actor: &str,
) -> HerdResult<Animal> {
    RecordValidator::new().validate_animal(animal)?;

    let tx = conn.unchecked_transaction()?;
    let registered = register_with_origin(&tx, animal, "registration", reference_date, actor);
    let animal_id = match registered {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(tag = %animal.tag_number, error = %e, "registration rejected");
            return Err(e);
        }
    };
    tx.commit()?;

    tracing::info!(tag = %animal.tag_number, animal_id, "animal registered");
    get_animal(conn, animal_id)
}

fn register_with_origin(
    conn: &Connection,
    animal: &NewAnimal,
    origin: &str,
    reference_date: NaiveDate,
    actor: &str,
) -> HerdResult<i64> {
    let animal_id = insert_animal(conn, animal, origin, reference_date)?;

    insert_event(
        conn,
        &Event::new(
            "registered",
            animal_id,
            reference_date,
            "Animal registered in system",
            actor,
        ),
    )?;
    insert_movement(
        conn,
        animal_id,
        MovementType::In,
        origin,
        animal.location.as_deref().unwrap_or("farm"),
        reference_date,
        &format!("Registered livestock {}", animal.tag_number.trim()),
    )?;

    Ok(animal_id)
}

pub fn get_animal(conn: &Connection, animal_id: i64) -> HerdResult<Animal> {
    conn.query_row(
        &format!("SELECT {} FROM animals WHERE id = ?1", ANIMAL_COLUMNS),
        [animal_id],
        animal_from_row,
    )
    .optional()?
    .ok_or_else(|| HerdError::AnimalNotFound(format!("#{}", animal_id)))
}

pub fn get_animal_by_tag(conn: &Connection, tag_number: &str) -> HerdResult<Animal> {
    conn.query_row(
        &format!("SELECT {} FROM animals WHERE tag_number = ?1", ANIMAL_COLUMNS),
        [tag_number.trim()],
        animal_from_row,
    )
    .optional()?
    .ok_or_else(|| HerdError::AnimalNotFound(tag_number.trim().to_string()))
}

pub fn list_animals(conn: &Connection, filter: &AnimalFilter) -> HerdResult<Vec<Animal>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM animals
         WHERE (?1 IS NULL OR LOWER(category) = LOWER(?1))
           AND (?2 IS NULL OR LOWER(species) = LOWER(?2))
           AND (?3 IS NULL OR status = ?3)
         ORDER BY tag_number",
        ANIMAL_COLUMNS
    ))?;

    let animals = stmt
        .query_map(
            params![filter.category, filter.species, filter.status],
            animal_from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(count = animals.len(), "listed animals");
    Ok(animals)
}

/// Active intact males whose category is a bull label
pub fn list_sires(conn: &Connection) -> HerdResult<Vec<Animal>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM animals
         WHERE status = ?1 AND LOWER(sex) = 'male' AND LOWER(category) LIKE '%bull%'
         ORDER BY tag_number",
        ANIMAL_COLUMNS
    ))?;

    let sires = stmt
        .query_map([STATUS_ACTIVE], animal_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(sires)
}

/// Active females categorised as Cow or Heifer
pub fn list_dams(conn: &Connection) -> HerdResult<Vec<Animal>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM animals
         WHERE status = ?1 AND LOWER(sex) = 'female' AND category IN ('Cow', 'Heifer')
         ORDER BY tag_number",
        ANIMAL_COLUMNS
    ))?;

    let dams = stmt
        .query_map([STATUS_ACTIVE], animal_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(dams)
}

pub(crate) fn set_status(conn: &Connection, animal_id: i64, status: &str) -> HerdResult<()> {
    conn.execute(
        "UPDATE animals SET status = ?1 WHERE id = ?2",
        params![status, animal_id],
    )?;
    Ok(())
}

/// Recompute the category snapshot of every active animal at `reference_date`.
///
/// Rows whose label changed get a `category_refreshed` event. Animals whose
/// inputs are incomplete keep their stored label. Returns the number changed.
pub fn refresh_categories(
    conn: &Connection,
    reference_date: NaiveDate,
    actor: &str,
) -> HerdResult<usize> {
    let active = list_animals(
        conn,
        &AnimalFilter {
            status: Some(STATUS_ACTIVE.to_string()),
            ..Default::default()
        },
    )?;

    let tx = conn.unchecked_transaction()?;
    let as_of = format_date(reference_date);
    let mut changed = 0;

    for animal in &active {
        let fresh = animal.category_on(reference_date);
        if fresh.is_empty() {
            continue;
        }

        if fresh != animal.category {
            tx.execute(
                "UPDATE animals SET category = ?1, category_as_of = ?2 WHERE id = ?3",
                params![fresh, as_of, animal.id],
            )?;
            insert_event(
                &tx,
                &Event::new(
                    "category_refreshed",
                    animal.id,
                    reference_date,
                    &format!("{} -> {}", animal.category, fresh),
                    actor,
                ),
            )?;
            changed += 1;
        } else {
            tx.execute(
                "UPDATE animals SET category_as_of = ?1 WHERE id = ?2",
                params![as_of, animal.id],
            )?;
        }
    }

    tx.commit()?;
    tracing::info!(changed, checked = active.len(), as_of = %as_of, "categories refreshed");
    Ok(changed)
}

/// Active head count per species and category, classified at `reference_date`.
///
/// Stored categories are snapshots, so each animal is reclassified before
/// counting. The stored label is used only when the classifier has nothing
/// to say (missing date of birth, say).
pub fn herd_summary(
    conn: &Connection,
    reference_date: NaiveDate,
) -> HerdResult<Vec<HerdSummaryRow>> {
    let active = list_animals(
        conn,
        &AnimalFilter {
            status: Some(STATUS_ACTIVE.to_string()),
            ..Default::default()
        },
    )?;

    let mut counts: BTreeMap<(String, String), i64> = BTreeMap::new();
    for animal in active {
        let current = animal.category_on(reference_date);
        let category = if current.is_empty() {
            animal.category
        } else {
            current
        };
        *counts.entry((animal.species, category)).or_insert(0) += 1;
    }

    Ok(counts
        .into_iter()
        .map(|((species, category), count)| HerdSummaryRow {
            species,
            category,
            count,
        })
        .collect())
}

pub fn count_animals(conn: &Connection) -> HerdResult<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM animals", [], |row| row.get(0))?;
    Ok(count)
}

// ============================================================================
// EVENT & MOVEMENT LOGS
// ============================================================================

pub fn insert_event(conn: &Connection, event: &Event) -> HerdResult<()> {
    conn.execute(
        "INSERT INTO events (
            event_id, animal_id, event_type, event_date, related_id, notes, actor, timestamp
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            event.event_id,
            event.animal_id,
            event.event_type,
            format_date(event.event_date),
            event.related_id,
            event.notes,
            event.actor,
            event.timestamp.to_rfc3339(),
        ],
    )?;

    Ok(())
}

/// Events for one animal, newest first
pub fn get_events_for_animal(conn: &Connection, animal_id: i64) -> HerdResult<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, animal_id, event_type, event_date, related_id, notes, actor, timestamp
         FROM events
         WHERE animal_id = ?1
         ORDER BY event_date DESC, id DESC",
    )?;

    let events = stmt
        .query_map([animal_id], event_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

pub fn insert_movement(
    conn: &Connection,
    animal_id: i64,
    movement_type: MovementType,
    source: &str,
    destination: &str,
    movement_date: NaiveDate,
    notes: &str,
) -> HerdResult<i64> {
    conn.execute(
        "INSERT INTO movements (
            animal_id, movement_type, source, destination, movement_date, notes
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            animal_id,
            movement_type.as_str(),
            source,
            destination,
            format_date(movement_date),
            notes,
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

/// Movements for one animal, oldest first
pub fn get_movements_for_animal(conn: &Connection, animal_id: i64) -> HerdResult<Vec<Movement>> {
    let mut stmt = conn.prepare(
        "SELECT id, animal_id, movement_type, source, destination, movement_date, notes
         FROM movements
         WHERE animal_id = ?1
         ORDER BY movement_date, id",
    )?;

    let movements = stmt
        .query_map([animal_id], |row| {
            let kind: String = row.get(2)?;
            Ok(Movement {
                id: row.get(0)?,
                animal_id: row.get(1)?,
                movement_type: MovementType::parse(&kind).ok_or_else(|| {
                    rusqlite::Error::FromSqlConversionFailure(
                        2,
                        rusqlite::types::Type::Text,
                        format!("unknown movement type {}", kind).into(),
                    )
                })?,
                source: row.get(3)?,
                destination: row.get(4)?,
                movement_date: required_date(row, 5)?,
                notes: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(movements)
}

// ============================================================================
// CSV IMPORT
// ============================================================================

/// One CSV row. Kept as text so blank cells and odd flags don't abort the load.
#[derive(Debug, Deserialize)]
struct CsvAnimal {
    tag_number: String,
    species: String,
    sex: String,
    #[serde(default)]
    date_of_birth: String,
    #[serde(default)]
    castrated: String,
    owner_name: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    notes: String,
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "true" | "yes" | "y" | "1"
    )
}

fn non_empty(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl From<CsvAnimal> for NewAnimal {
    fn from(row: CsvAnimal) -> Self {
        NewAnimal {
            tag_number: row.tag_number,
            species: row.species,
            sex: row.sex,
            date_of_birth: parse_date(&row.date_of_birth),
            castrated: parse_flag(&row.castrated),
            category: None,
            owner_name: row.owner_name,
            location: non_empty(row.location),
            notes: non_empty(row.notes),
        }
    }
}

/// Load animals from a CSV file with header
/// `tag_number,species,sex,date_of_birth,castrated,owner_name,location,notes`
pub fn load_csv(csv_path: &Path) -> Result<Vec<NewAnimal>> {
    let mut rdr = csv::Reader::from_path(csv_path)
        .with_context(|| format!("Failed to open CSV file: {:?}", csv_path))?;

    let mut animals = Vec::new();

    for (line, result) in rdr.deserialize::<CsvAnimal>().enumerate() {
        let row = result.with_context(|| format!("Failed to deserialize animal on row {}", line + 1))?;
        animals.push(NewAnimal::from(row));
    }

    Ok(animals)
}

/// Result of a bulk import
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    pub inserted: usize,
    pub duplicates: usize,
    pub invalid: usize,
}

/// Register every animal, skipping duplicate tags and rows missing required fields
pub fn import_animals(
    conn: &Connection,
    animals: &[NewAnimal],
    reference_date: NaiveDate,
    actor: &str,
) -> HerdResult<ImportReport> {
    let validator = RecordValidator::new();
    let mut report = ImportReport::default();
    let tx = conn.unchecked_transaction()?;

    for animal in animals {
        if let Err(errors) = validator.validate_animal(animal) {
            tracing::warn!(tag = %animal.tag_number, errors = errors.len(), "skipping invalid row");
            report.invalid += 1;
            continue;
        }

        match register_with_origin(&tx, animal, "import", reference_date, actor) {
            Ok(_) => report.inserted += 1,
            Err(HerdError::DuplicateTag(tag)) => {
                tracing::debug!(tag = %tag, "skipping duplicate tag");
                report.duplicates += 1;
            }
            Err(e) => return Err(e),
        }
    }

    tx.commit()?;
    tracing::info!(
        inserted = report.inserted,
        duplicates = report.duplicates,
        invalid = report.invalid,
        "import finished"
    );
    Ok(report)
}
