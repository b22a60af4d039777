// 📒 Herd Ledgers - Births, purchases, sales, exits and health events
//
// Each operation touches several tables (animal, ledger row, event, movement)
// and runs inside a single SQLite transaction: either every row lands or none do.

use crate::db::{
    format_date, get_animal, get_animal_by_tag, insert_animal, insert_event,
    insert_movement, required_date, set_status, Event, MovementType, NewAnimal, STATUS_INACTIVE,
};
use crate::error::{HerdError, HerdResult};
use crate::schema::RecordValidator;
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

// ============================================================================
// BIRTHS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBirth {
    /// Tag for the newborn
    pub tag_number: String,
    pub sex: String,
    pub birth_date: NaiveDate,
    pub dam_tag: String,
    #[serde(default)]
    pub sire_tag: Option<String>,
    #[serde(default)]
    pub castrated: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Birth {
    pub id: i64,
    pub calf_id: i64,
    pub calf_tag: String,
    pub dam_id: i64,
    pub sire_id: Option<i64>,
    pub birth_date: NaiveDate,
    pub sex: String,
    pub category: String,
    pub notes: Option<String>,
}

/// Record a birth. The newborn inherits species, owner and location from the
/// dam and is classified at `reference_date`.
pub fn record_birth(
    conn: &Connection,
    birth: &NewBirth,
    reference_date: NaiveDate,
    actor: &str,
) -> HerdResult<Birth> {
    RecordValidator::new().validate_birth(birth)?;

    let tx = conn.unchecked_transaction()?;

    let dam = get_animal_by_tag(&tx, &birth.dam_tag)?;
    let sire_id = match birth.sire_tag.as_deref().map(str::trim) {
        Some(tag) if !tag.is_empty() => Some(get_animal_by_tag(&tx, tag)?.id),
        _ => None,
    };

    let calf = NewAnimal {
        tag_number: birth.tag_number.clone(),
        species: dam.species.clone(),
        sex: birth.sex.clone(),
        date_of_birth: Some(birth.birth_date),
        castrated: birth.castrated,
        category: None,
        owner_name: dam.owner_name.clone(),
        location: dam.location.clone(),
        notes: birth.notes.clone(),
    };
    let calf_id = insert_animal(&tx, &calf, "birth", reference_date)?;

    tx.execute(
        "INSERT INTO births (calf_id, dam_id, sire_id, birth_date, notes)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![calf_id, dam.id, sire_id, format_date(birth.birth_date), birth.notes],
    )?;
    let birth_id = tx.last_insert_rowid();

    let tag = birth.tag_number.trim();
    insert_event(
        &tx,
        &Event::new(
            "birth",
            calf_id,
            birth.birth_date,
            &format!("Birth recorded for {}", tag),
            actor,
        )
        .related_to(birth_id),
    )?;
    insert_movement(
        &tx,
        calf_id,
        MovementType::In,
        "birth",
        dam.location.as_deref().unwrap_or("farm"),
        birth.birth_date,
        "New animal born, added to herd",
    )?;

    tx.commit()?;
    tracing::info!(tag = %tag, dam = %dam.tag_number, birth_id, "birth recorded");

    let recorded = get_animal(conn, calf_id)?;
    Ok(Birth {
        id: birth_id,
        calf_id,
        calf_tag: recorded.tag_number,
        dam_id: dam.id,
        sire_id,
        birth_date: birth.birth_date,
        sex: recorded.sex,
        category: recorded.category,
        notes: birth.notes.clone(),
    })
}

/// Births, newest first
pub fn list_births(conn: &Connection) -> HerdResult<Vec<Birth>> {
    let mut stmt = conn.prepare(
        "SELECT b.id, b.calf_id, a.tag_number, b.dam_id, b.sire_id, b.birth_date,
                a.sex, a.category, b.notes
         FROM births b
         JOIN animals a ON a.id = b.calf_id
         ORDER BY b.birth_date DESC, b.id DESC",
    )?;

    let births = stmt
        .query_map([], |row| {
            Ok(Birth {
                id: row.get(0)?,
                calf_id: row.get(1)?,
                calf_tag: row.get(2)?,
                dam_id: row.get(3)?,
                sire_id: row.get(4)?,
                birth_date: required_date(row, 5)?,
                sex: row.get(6)?,
                category: row.get(7)?,
                notes: row.get(8)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(births)
}

// ============================================================================
// PURCHASES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseItemInput {
    #[serde(flatten)]
    pub animal: NewAnimal,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPurchase {
    pub vendor: String,
    pub purchase_date: NaiveDate,
    /// Defaults to the sum of item prices
    #[serde(default)]
    pub total_cost: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
    pub items: Vec<PurchaseItemInput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerLine {
    pub animal_id: i64,
    pub tag_number: String,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: i64,
    pub reference: String,
    pub vendor: String,
    pub purchase_date: NaiveDate,
    pub total_cost: f64,
    pub notes: Option<String>,
    pub items: Vec<LedgerLine>,
}

/// Next `PREFIX-NNNN` reference for a ledger table
fn next_reference(conn: &Connection, table: &str, prefix: &str) -> HerdResult<String> {
    let last: i64 = conn.query_row(
        &format!("SELECT COALESCE(MAX(id), 0) FROM {}", table),
        [],
        |row| row.get(0),
    )?;
    Ok(format!("{}-{:04}", prefix, last + 1))
}

/// Record a purchase: every purchased animal is registered with origin
/// `purchase`, an event and an IN movement from the vendor.
pub fn record_purchase(
    conn: &Connection,
    purchase: &NewPurchase,
    reference_date: NaiveDate,
    actor: &str,
) -> HerdResult<Purchase> {
    RecordValidator::new().validate_purchase(purchase)?;

    let tx = conn.unchecked_transaction()?;
    let reference = next_reference(&tx, "purchases", "PO")?;
    let total_cost = purchase
        .total_cost
        .unwrap_or_else(|| purchase.items.iter().map(|i| i.price).sum());

    tx.execute(
        "INSERT INTO purchases (reference, vendor, purchase_date, total_cost, notes)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            reference,
            purchase.vendor.trim(),
            format_date(purchase.purchase_date),
            total_cost,
            purchase.notes,
        ],
    )?;
    let purchase_id = tx.last_insert_rowid();

    let mut lines = Vec::with_capacity(purchase.items.len());
    for item in &purchase.items {
        let animal_id = insert_animal(&tx, &item.animal, "purchase", reference_date)?;

        tx.execute(
            "INSERT INTO purchase_items (purchase_id, animal_id, price) VALUES (?1, ?2, ?3)",
            params![purchase_id, animal_id, item.price],
        )?;
        insert_event(
            &tx,
            &Event::new(
                "purchase",
                animal_id,
                purchase.purchase_date,
                &format!("Purchased livestock (ref {})", reference),
                actor,
            )
            .related_to(purchase_id),
        )?;
        insert_movement(
            &tx,
            animal_id,
            MovementType::In,
            "vendor",
            item.animal.location.as_deref().unwrap_or("farm"),
            purchase.purchase_date,
            &format!("Livestock purchased under {}", reference),
        )?;

        lines.push(LedgerLine {
            animal_id,
            tag_number: item.animal.tag_number.trim().to_string(),
            price: item.price,
        });
    }

    tx.commit()?;
    tracing::info!(reference = %reference, animals = lines.len(), "purchase recorded");

    Ok(Purchase {
        id: purchase_id,
        reference,
        vendor: purchase.vendor.trim().to_string(),
        purchase_date: purchase.purchase_date,
        total_cost,
        notes: purchase.notes.clone(),
        items: lines,
    })
}

fn ledger_lines(conn: &Connection, items_table: &str, key: &str, id: i64) -> HerdResult<Vec<LedgerLine>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT i.animal_id, a.tag_number, i.price
         FROM {} i
         JOIN animals a ON a.id = i.animal_id
         WHERE i.{} = ?1
         ORDER BY i.id",
        items_table, key
    ))?;

    let lines = stmt
        .query_map([id], |row| {
            Ok(LedgerLine {
                animal_id: row.get(0)?,
                tag_number: row.get(1)?,
                price: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(lines)
}

pub fn list_purchases(conn: &Connection) -> HerdResult<Vec<Purchase>> {
    let mut stmt = conn.prepare(
        "SELECT id, reference, vendor, purchase_date, total_cost, notes
         FROM purchases
         ORDER BY purchase_date DESC, id DESC",
    )?;

    let mut purchases = stmt
        .query_map([], |row| {
            Ok(Purchase {
                id: row.get(0)?,
                reference: row.get(1)?,
                vendor: row.get(2)?,
                purchase_date: required_date(row, 3)?,
                total_cost: row.get(4)?,
                notes: row.get(5)?,
                items: Vec::new(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    for purchase in &mut purchases {
        purchase.items = ledger_lines(conn, "purchase_items", "purchase_id", purchase.id)?;
    }

    Ok(purchases)
}

// ============================================================================
// SALES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleItemInput {
    pub tag_number: String,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSale {
    pub buyer: String,
    pub sale_date: NaiveDate,
    /// Defaults to the sum of item prices
    #[serde(default)]
    pub total_amount: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
    pub items: Vec<SaleItemInput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    pub id: i64,
    pub reference: String,
    pub buyer: String,
    pub sale_date: NaiveDate,
    pub total_amount: f64,
    pub notes: Option<String>,
    pub items: Vec<LedgerLine>,
}

/// Record a sale. Every animal must exist and be active; each one is marked
/// inactive and gets a `sale` event and an OUT movement to the buyer.
pub fn record_sale(conn: &Connection, sale: &NewSale, actor: &str) -> HerdResult<Sale> {
    RecordValidator::new().validate_sale(sale)?;

    let tx = conn.unchecked_transaction()?;
    let reference = next_reference(&tx, "sales", "SO")?;
    let total_amount = sale
        .total_amount
        .unwrap_or_else(|| sale.items.iter().map(|i| i.price).sum());

    tx.execute(
        "INSERT INTO sales (reference, buyer, sale_date, total_amount, notes)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            reference,
            sale.buyer.trim(),
            format_date(sale.sale_date),
            total_amount,
            sale.notes,
        ],
    )?;
    let sale_id = tx.last_insert_rowid();

    let mut lines = Vec::with_capacity(sale.items.len());
    for item in &sale.items {
        let animal = get_animal_by_tag(&tx, &item.tag_number)?;
        if !animal.is_active() {
            tracing::warn!(tag = %animal.tag_number, "sale rejected, animal inactive");
            return Err(HerdError::AlreadyInactive(animal.tag_number));
        }

        tx.execute(
            "INSERT INTO sale_items (sale_id, animal_id, price) VALUES (?1, ?2, ?3)",
            params![sale_id, animal.id, item.price],
        )?;
        set_status(&tx, animal.id, STATUS_INACTIVE)?;
        insert_event(
            &tx,
            &Event::new(
                "sale",
                animal.id,
                sale.sale_date,
                &format!("Livestock sold under {}", reference),
                actor,
            )
            .related_to(sale_id),
        )?;
        insert_movement(
            &tx,
            animal.id,
            MovementType::Out,
            "farm",
            "buyer",
            sale.sale_date,
            &format!("Livestock sold under {}", reference),
        )?;

        lines.push(LedgerLine {
            animal_id: animal.id,
            tag_number: animal.tag_number,
            price: item.price,
        });
    }

    tx.commit()?;
    tracing::info!(reference = %reference, animals = lines.len(), "sale recorded");

    Ok(Sale {
        id: sale_id,
        reference,
        buyer: sale.buyer.trim().to_string(),
        sale_date: sale.sale_date,
        total_amount,
        notes: sale.notes.clone(),
        items: lines,
    })
}

pub fn list_sales(conn: &Connection) -> HerdResult<Vec<Sale>> {
    let mut stmt = conn.prepare(
        "SELECT id, reference, buyer, sale_date, total_amount, notes
         FROM sales
         ORDER BY sale_date DESC, id DESC",
    )?;

    let mut sales = stmt
        .query_map([], |row| {
            Ok(Sale {
                id: row.get(0)?,
                reference: row.get(1)?,
                buyer: row.get(2)?,
                sale_date: required_date(row, 3)?,
                total_amount: row.get(4)?,
                notes: row.get(5)?,
                items: Vec::new(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    for sale in &mut sales {
        sale.items = ledger_lines(conn, "sale_items", "sale_id", sale.id)?;
    }

    Ok(sales)
}

// ============================================================================
// EXITS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitType {
    Death,
    Slaughter,
}

impl ExitType {
    pub fn parse(raw: &str) -> Option<ExitType> {
        match raw.trim().to_lowercase().as_str() {
            "death" => Some(ExitType::Death),
            "slaughter" => Some(ExitType::Slaughter),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExitType::Death => "death",
            ExitType::Slaughter => "slaughter",
        }
    }

    fn destination(&self) -> &'static str {
        match self {
            ExitType::Death => "disposal",
            ExitType::Slaughter => "slaughter",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExit {
    pub tag_number: String,
    /// death or slaughter
    pub exit_type: String,
    #[serde(default)]
    pub reason: Option<String>,
    pub exit_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exit {
    pub id: i64,
    pub animal_id: i64,
    pub tag_number: String,
    pub exit_type: ExitType,
    pub reason: Option<String>,
    pub exit_date: NaiveDate,
}

/// Record a death or slaughter. The animal is marked inactive; a second exit
/// for the same animal is rejected.
pub fn record_exit(conn: &Connection, exit: &NewExit, actor: &str) -> HerdResult<Exit> {
    RecordValidator::new().validate_exit(exit)?;
    let exit_type = ExitType::parse(&exit.exit_type)
        .ok_or_else(|| HerdError::InvalidExitType(exit.exit_type.clone()))?;

    let tx = conn.unchecked_transaction()?;

    let animal = get_animal_by_tag(&tx, &exit.tag_number)?;
    if !animal.is_active() {
        tracing::warn!(tag = %animal.tag_number, "exit rejected, animal inactive");
        return Err(HerdError::AlreadyInactive(animal.tag_number));
    }

    tx.execute(
        "INSERT INTO exits (animal_id, exit_type, reason, exit_date) VALUES (?1, ?2, ?3, ?4)",
        params![animal.id, exit_type.as_str(), exit.reason, format_date(exit.exit_date)],
    )?;
    let exit_id = tx.last_insert_rowid();

    set_status(&tx, animal.id, STATUS_INACTIVE)?;
    insert_event(
        &tx,
        &Event::new(
            exit_type.as_str(),
            animal.id,
            exit.exit_date,
            &format!("Exit recorded: {}", exit.reason.as_deref().unwrap_or(exit_type.as_str())),
            actor,
        )
        .related_to(exit_id),
    )?;
    insert_movement(
        &tx,
        animal.id,
        MovementType::Out,
        "farm",
        exit_type.destination(),
        exit.exit_date,
        &format!("Livestock exited via {} (exit #{})", exit_type.as_str(), exit_id),
    )?;

    tx.commit()?;
    tracing::info!(tag = %animal.tag_number, exit_type = exit_type.as_str(), "exit recorded");

    Ok(Exit {
        id: exit_id,
        animal_id: animal.id,
        tag_number: animal.tag_number,
        exit_type,
        reason: exit.reason.clone(),
        exit_date: exit.exit_date,
    })
}

pub fn list_exits(conn: &Connection) -> HerdResult<Vec<Exit>> {
    let mut stmt = conn.prepare(
        "SELECT e.id, e.animal_id, a.tag_number, e.exit_type, e.reason, e.exit_date
         FROM exits e
         JOIN animals a ON a.id = e.animal_id
         ORDER BY e.exit_date DESC, e.id DESC",
    )?;

    let exits = stmt
        .query_map([], |row| {
            let kind: String = row.get(3)?;
            Ok(Exit {
                id: row.get(0)?,
                animal_id: row.get(1)?,
                tag_number: row.get(2)?,
                exit_type: ExitType::parse(&kind).ok_or_else(|| {
                    rusqlite::Error::FromSqlConversionFailure(
                        3,
                        rusqlite::types::Type::Text,
                        format!("unknown exit type {}", kind).into(),
                    )
                })?,
                reason: row.get(4)?,
                exit_date: required_date(row, 5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(exits)
}

// ============================================================================
// HEALTH EVENTS
// ============================================================================

const DEFAULT_HEALTH_EVENT_TYPE: &str = "treatment";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewHealthEvent {
    pub tag_number: String,
    /// treatment, vaccination, checkup... (default: treatment)
    #[serde(default)]
    pub event_type: Option<String>,
    /// Condition or disease observed
    pub condition: String,
    /// Treatment or medication given
    #[serde(default)]
    pub treatment: Option<String>,
    #[serde(default)]
    pub vet: Option<String>,
    pub event_date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthEvent {
    pub id: i64,
    pub animal_id: i64,
    pub tag_number: String,
    pub event_type: String,
    pub condition: String,
    pub treatment: Option<String>,
    pub vet: Option<String>,
    pub event_date: NaiveDate,
    pub notes: Option<String>,
}

/// Health report filter; every field is optional and dates are inclusive
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HealthEventFilter {
    pub tag_number: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

/// Record a health event against an active animal and mirror it into the
/// animal's event log as `health`.
pub fn record_health_event(
    conn: &Connection,
    event: &NewHealthEvent,
    actor: &str,
) -> HerdResult<HealthEvent> {
    RecordValidator::new().validate_health_event(event)?;

    let event_type = event
        .event_type
        .as_deref()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_HEALTH_EVENT_TYPE.to_string());
    let condition = event.condition.trim();

    let tx = conn.unchecked_transaction()?;

    let animal = get_animal_by_tag(&tx, &event.tag_number)?;
    if !animal.is_active() {
        tracing::warn!(tag = %animal.tag_number, "health event rejected, animal inactive");
        return Err(HerdError::AlreadyInactive(animal.tag_number));
    }

    tx.execute(
        "INSERT INTO health_events (
            animal_id, event_type, condition, treatment, vet, event_date, notes
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            animal.id,
            event_type,
            condition,
            event.treatment,
            event.vet,
            format_date(event.event_date),
            event.notes,
        ],
    )?;
    let health_id = tx.last_insert_rowid();

    let summary = match event.treatment.as_deref() {
        Some(treatment) if !treatment.trim().is_empty() => {
            format!("{}: {} ({})", event_type, condition, treatment.trim())
        }
        _ => format!("{}: {}", event_type, condition),
    };
    insert_event(
        &tx,
        &Event::new("health", animal.id, event.event_date, &summary, actor).related_to(health_id),
    )?;

    tx.commit()?;
    tracing::info!(tag = %animal.tag_number, event_type = %event_type, "health event recorded");

    Ok(HealthEvent {
        id: health_id,
        animal_id: animal.id,
        tag_number: animal.tag_number,
        event_type,
        condition: condition.to_string(),
        treatment: event.treatment.clone(),
        vet: event.vet.clone(),
        event_date: event.event_date,
        notes: event.notes.clone(),
    })
}

/// Health events, newest first
pub fn list_health_events(
    conn: &Connection,
    filter: &HealthEventFilter,
) -> HerdResult<Vec<HealthEvent>> {
    let mut stmt = conn.prepare(
        "SELECT h.id, h.animal_id, a.tag_number, h.event_type, h.condition,
                h.treatment, h.vet, h.event_date, h.notes
         FROM health_events h
         JOIN animals a ON a.id = h.animal_id
         WHERE (?1 IS NULL OR a.tag_number = ?1)
           AND (?2 IS NULL OR h.event_date >= ?2)
           AND (?3 IS NULL OR h.event_date <= ?3)
         ORDER BY h.event_date DESC, h.id DESC",
    )?;

    let events = stmt
        .query_map(
            params![
                filter.tag_number.as_deref().map(str::trim),
                filter.date_from.map(format_date),
                filter.date_to.map(format_date),
            ],
            |row| {
                Ok(HealthEvent {
                    id: row.get(0)?,
                    animal_id: row.get(1)?,
                    tag_number: row.get(2)?,
                    event_type: row.get(3)?,
                    condition: row.get(4)?,
                    treatment: row.get(5)?,
                    vet: row.get(6)?,
                    event_date: required_date(row, 7)?,
                    notes: row.get(8)?,
                })
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{date, new_animal, test_conn};
    use crate::db::{count_animals, get_events_for_animal, get_movements_for_animal, register_animal};

    fn seed_dam(conn: &Connection) -> i64 {
        register_animal(
            conn,
            &new_animal("DAM-1", "cow", "female", date(2020, 4, 1)),
            date(2025, 1, 1),
            "tester",
        )
        .unwrap()
        .id
    }

    fn birth(tag: &str, dam: &str) -> NewBirth {
        NewBirth {
            tag_number: tag.to_string(),
            sex: "male".to_string(),
            birth_date: date(2025, 2, 14),
            dam_tag: dam.to_string(),
            sire_tag: None,
            castrated: false,
            notes: Some("easy calving".to_string()),
        }
    }

    #[test]
    fn test_record_birth_inherits_from_dam() {
        let conn = test_conn();
        let dam_id = seed_dam(&conn);

        let recorded = record_birth(&conn, &birth("CALF-1", "DAM-1"), date(2025, 2, 20), "tester").unwrap();

        assert_eq!(recorded.dam_id, dam_id);
        assert_eq!(recorded.category, "Calf (Male)");

        let calf = get_animal(&conn, recorded.calf_id).unwrap();
        assert_eq!(calf.species, "cow");
        assert_eq!(calf.owner_name, "Test Farm");
        assert_eq!(calf.location.as_deref(), Some("North Paddock"));
        assert_eq!(calf.origin, "birth");

        let events = get_events_for_animal(&conn, calf.id).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "birth");
        assert_eq!(events[0].related_id, Some(recorded.id));

        let movements = get_movements_for_animal(&conn, calf.id).unwrap();
        assert_eq!(movements[0].source, "birth");

        let births = list_births(&conn).unwrap();
        assert_eq!(births, vec![recorded]);
    }

    #[test]
    fn test_record_birth_with_sire() {
        let conn = test_conn();
        seed_dam(&conn);
        let sire = register_animal(
            &conn,
            &new_animal("SIRE-1", "cow", "male", date(2019, 1, 1)),
            date(2025, 1, 1),
            "tester",
        )
        .unwrap();

        let mut input = birth("CALF-2", "DAM-1");
        input.sire_tag = Some("SIRE-1".to_string());

        let recorded = record_birth(&conn, &input, date(2025, 2, 20), "tester").unwrap();
        assert_eq!(recorded.sire_id, Some(sire.id));
    }

    #[test]
    fn test_record_birth_unknown_dam_leaves_nothing() {
        let conn = test_conn();
        seed_dam(&conn);

        let err = record_birth(&conn, &birth("CALF-3", "NOBODY"), date(2025, 2, 20), "tester").unwrap_err();
        assert!(matches!(err, HerdError::AnimalNotFound(_)));
        assert_eq!(count_animals(&conn).unwrap(), 1);
        assert!(list_births(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_record_birth_unknown_sire_rolls_back() {
        let conn = test_conn();
        seed_dam(&conn);

        let mut input = birth("CALF-4", "DAM-1");
        input.sire_tag = Some("GHOST".to_string());

        assert!(record_birth(&conn, &input, date(2025, 2, 20), "tester").is_err());
        assert_eq!(count_animals(&conn).unwrap(), 1);
    }

    fn purchase() -> NewPurchase {
        let mut ewe = new_animal("P-1", "sheep", "female", date(2022, 5, 1));
        ewe.location = None;
        NewPurchase {
            vendor: "Hill Market".to_string(),
            purchase_date: date(2025, 4, 2),
            total_cost: None,
            notes: None,
            items: vec![
                PurchaseItemInput { animal: ewe, price: 150.0 },
                PurchaseItemInput {
                    animal: new_animal("P-2", "sheep", "male", date(2025, 1, 1)),
                    price: 90.5,
                },
            ],
        }
    }

    #[test]
    fn test_record_purchase() {
        let conn = test_conn();

        let recorded = record_purchase(&conn, &purchase(), date(2025, 4, 2), "tester").unwrap();
        assert_eq!(recorded.reference, "PO-0001");
        assert_eq!(recorded.total_cost, 240.5);
        assert_eq!(recorded.items.len(), 2);

        let ewe = get_animal_by_tag(&conn, "P-1").unwrap();
        assert_eq!(ewe.category, "Ewe");
        assert_eq!(ewe.origin, "purchase");
        let lamb = get_animal_by_tag(&conn, "P-2").unwrap();
        assert_eq!(lamb.category, "Lamb");

        let movements = get_movements_for_animal(&conn, ewe.id).unwrap();
        assert_eq!(movements[0].source, "vendor");
        assert_eq!(movements[0].destination, "farm");

        let listed = list_purchases(&conn).unwrap();
        assert_eq!(listed, vec![recorded]);
    }

    #[test]
    fn test_purchase_duplicate_tag_rolls_back() {
        let conn = test_conn();
        register_animal(
            &conn,
            &new_animal("P-2", "sheep", "male", date(2024, 1, 1)),
            date(2025, 1, 1),
            "tester",
        )
        .unwrap();

        let err = record_purchase(&conn, &purchase(), date(2025, 4, 2), "tester").unwrap_err();
        assert!(matches!(err, HerdError::DuplicateTag(_)));
        assert_eq!(count_animals(&conn).unwrap(), 1);
        assert!(list_purchases(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_record_sale_marks_inactive() {
        let conn = test_conn();
        seed_dam(&conn);

        let sale = NewSale {
            buyer: "Green Pastures".to_string(),
            sale_date: date(2025, 5, 5),
            total_amount: Some(1200.0),
            notes: None,
            items: vec![SaleItemInput {
                tag_number: "DAM-1".to_string(),
                price: 1150.0,
            }],
        };

        let recorded = record_sale(&conn, &sale, "tester").unwrap();
        assert_eq!(recorded.reference, "SO-0001");
        assert_eq!(recorded.total_amount, 1200.0);

        let dam = get_animal_by_tag(&conn, "DAM-1").unwrap();
        assert!(!dam.is_active());

        let movements = get_movements_for_animal(&conn, dam.id).unwrap();
        assert_eq!(movements.last().unwrap().movement_type, MovementType::Out);
        assert_eq!(movements.last().unwrap().destination, "buyer");

        // selling again is rejected and records nothing
        let err = record_sale(&conn, &sale, "tester").unwrap_err();
        assert!(matches!(err, HerdError::AlreadyInactive(_)));
        assert_eq!(list_sales(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_record_exit() {
        let conn = test_conn();
        seed_dam(&conn);

        let exit = NewExit {
            tag_number: "DAM-1".to_string(),
            exit_type: "Slaughter".to_string(),
            reason: Some("culled".to_string()),
            exit_date: date(2025, 6, 1),
        };

        let recorded = record_exit(&conn, &exit, "tester").unwrap();
        assert_eq!(recorded.exit_type, ExitType::Slaughter);

        let dam = get_animal_by_tag(&conn, "DAM-1").unwrap();
        assert!(!dam.is_active());

        let events = get_events_for_animal(&conn, dam.id).unwrap();
        assert_eq!(events[0].event_type, "slaughter");
        assert_eq!(events[0].notes.as_deref(), Some("Exit recorded: culled"));

        let movements = get_movements_for_animal(&conn, dam.id).unwrap();
        assert_eq!(movements.last().unwrap().destination, "slaughter");

        let err = record_exit(&conn, &exit, "tester").unwrap_err();
        assert!(matches!(err, HerdError::AlreadyInactive(_)));
        assert_eq!(list_exits(&conn).unwrap(), vec![recorded]);
    }

    #[test]
    fn test_record_exit_invalid_type() {
        let conn = test_conn();
        seed_dam(&conn);

        let exit = NewExit {
            tag_number: "DAM-1".to_string(),
            exit_type: "escaped".to_string(),
            reason: None,
            exit_date: date(2025, 6, 1),
        };

        let err = record_exit(&conn, &exit, "tester").unwrap_err();
        assert!(matches!(err, HerdError::InvalidExitType(_)));
        assert!(get_animal_by_tag(&conn, "DAM-1").unwrap().is_active());
    }

    fn health(tag: &str, condition: &str, day: u32) -> NewHealthEvent {
        NewHealthEvent {
            tag_number: tag.to_string(),
            event_type: None,
            condition: condition.to_string(),
            treatment: Some("oxytetracycline".to_string()),
            vet: Some("Dr. Okafor".to_string()),
            event_date: date(2025, 5, day),
            notes: None,
        }
    }

    #[test]
    fn test_record_health_event() {
        let conn = test_conn();
        let dam_id = seed_dam(&conn);

        let recorded = record_health_event(&conn, &health("DAM-1", "  foot rot ", 3), "vet").unwrap();
        assert_eq!(recorded.animal_id, dam_id);
        assert_eq!(recorded.event_type, "treatment");
        assert_eq!(recorded.condition, "foot rot");

        let mut vaccination = health("DAM-1", "blackleg", 20);
        vaccination.event_type = Some("Vaccination".to_string());
        vaccination.treatment = None;
        let second = record_health_event(&conn, &vaccination, "vet").unwrap();
        assert_eq!(second.event_type, "vaccination");

        let events = get_events_for_animal(&conn, dam_id).unwrap();
        assert_eq!(events[0].event_type, "health");
        assert_eq!(events[0].notes.as_deref(), Some("vaccination: blackleg"));
        assert_eq!(events[0].related_id, Some(second.id));
        assert_eq!(events[1].notes.as_deref(), Some("treatment: foot rot (oxytetracycline)"));

        let all = list_health_events(&conn, &HealthEventFilter::default()).unwrap();
        assert_eq!(all, vec![second.clone(), recorded.clone()]);

        let early = list_health_events(
            &conn,
            &HealthEventFilter {
                date_to: Some(date(2025, 5, 10)),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(early, vec![recorded]);

        let other = list_health_events(
            &conn,
            &HealthEventFilter {
                tag_number: Some("NOBODY".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(other.is_empty());
    }

    #[test]
    fn test_health_event_rejections() {
        let conn = test_conn();
        seed_dam(&conn);

        let err = record_health_event(&conn, &health("DAM-1", "", 3), "vet").unwrap_err();
        assert!(matches!(err, HerdError::Validation(_)));

        let err = record_health_event(&conn, &health("GHOST", "mastitis", 3), "vet").unwrap_err();
        assert!(matches!(err, HerdError::AnimalNotFound(_)));

        let exit = NewExit {
            tag_number: "DAM-1".to_string(),
            exit_type: "death".to_string(),
            reason: None,
            exit_date: date(2025, 5, 1),
        };
        record_exit(&conn, &exit, "tester").unwrap();

        let err = record_health_event(&conn, &health("DAM-1", "mastitis", 3), "vet").unwrap_err();
        assert!(matches!(err, HerdError::AlreadyInactive(_)));
        assert!(list_health_events(&conn, &HealthEventFilter::default()).unwrap().is_empty());
    }
}
