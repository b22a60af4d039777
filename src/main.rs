use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use serde::Serialize;
use std::path::PathBuf;

use herdbook::classifier::{age_months, determine_category, parse_date};
use herdbook::config::{init_logging, Config};
use herdbook::db::{
    get_animal_by_tag, get_events_for_animal, get_movements_for_animal, herd_summary,
    import_animals, list_animals, load_csv, refresh_categories, register_animal, setup_database,
    Animal, AnimalFilter, NewAnimal,
};
use herdbook::records::{
    list_health_events, record_birth, record_exit, record_health_event, record_sale,
    HealthEventFilter, NewBirth, NewExit, NewHealthEvent, NewSale, SaleItemInput,
};

/// Herdbook - livestock register
#[derive(Parser, Debug)]
#[command(name = "herdbook", version, about, long_about = None)]
struct Cli {
    /// JSON config file (overrides HERDBOOK_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database path
    #[arg(short = 'D', long, global = true)]
    database: Option<PathBuf>,

    /// Reference date for categories (YYYY-MM-DD, default today)
    #[arg(long, global = true)]
    as_of: Option<NaiveDate>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute a category without touching the database
    Classify {
        #[arg(long)]
        species: String,
        #[arg(long)]
        sex: String,
        /// Date of birth (YYYY-MM-DD)
        #[arg(long, default_value = "")]
        dob: String,
        #[arg(long)]
        castrated: bool,
    },

    #[command(flatten)]
    Store(StoreCommand),
}

/// Commands that open the database
#[derive(Subcommand, Debug)]
enum StoreCommand {
    /// Create the database tables
    Init,

    /// Register an animal
    Register {
        #[arg(long)]
        tag: String,
        #[arg(long)]
        species: String,
        #[arg(long)]
        sex: String,
        #[arg(long)]
        dob: Option<NaiveDate>,
        #[arg(long)]
        castrated: bool,
        #[arg(long)]
        owner: String,
        #[arg(long)]
        location: Option<String>,
        /// Store this category instead of computing one
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },

    /// List animals
    List {
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        species: Option<String>,
        /// active or inactive
        #[arg(long)]
        status: Option<String>,
    },

    /// Show one animal with its events and movements
    Show { tag: String },

    /// Record a birth
    Birth {
        /// Tag for the newborn
        #[arg(long)]
        tag: String,
        #[arg(long)]
        sex: String,
        #[arg(long)]
        dam: String,
        #[arg(long)]
        sire: Option<String>,
        /// Birth date (default: reference date)
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        castrated: bool,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Sell a single animal
    Sell {
        #[arg(long)]
        tag: String,
        #[arg(long)]
        buyer: String,
        #[arg(long)]
        price: f64,
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Record a death or slaughter
    Exit {
        #[arg(long)]
        tag: String,
        /// death or slaughter
        #[arg(long = "type")]
        exit_type: String,
        #[arg(long)]
        reason: Option<String>,
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Record a health event (treatment, vaccination, checkup)
    Health {
        #[arg(long)]
        tag: String,
        /// Condition or disease
        #[arg(long)]
        condition: String,
        /// Treatment or medication given
        #[arg(long)]
        treatment: Option<String>,
        #[arg(long)]
        vet: Option<String>,
        /// Event type (default: treatment)
        #[arg(long = "type")]
        event_type: Option<String>,
        /// Event date (default: reference date)
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        notes: Option<String>,
    },

    /// List health events, newest first
    HealthReport {
        #[arg(long)]
        tag: Option<String>,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },

    /// Import animals from CSV
    Import { file: PathBuf },

    /// Recompute stored categories at the reference date
    Refresh,

    /// Active head count by species and category
    Summary,
}

#[derive(Serialize)]
struct AnimalDetail {
    animal: Animal,
    events: Vec<herdbook::db::Event>,
    movements: Vec<herdbook::db::Movement>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(database) = cli.database.clone() {
        config.database_path = database;
    }
    init_logging(config.log_format);

    let reference_date = cli
        .as_of
        .unwrap_or_else(|| chrono::Local::now().date_naive());

    match cli.command {
        Command::Classify {
            species,
            sex,
            dob,
            castrated,
        } => run_classify(&species, &sex, &dob, castrated, reference_date, cli.json),
        Command::Store(command) => {
            let conn = Connection::open(&config.database_path)
                .with_context(|| format!("Failed to open database {:?}", config.database_path))?;
            setup_database(&conn)?;

            run(&conn, command, cli.json, &config, reference_date)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_animal(animal: &Animal) {
    let category = if animal.category.is_empty() {
        "-"
    } else {
        animal.category.as_str()
    };
    let dob = animal
        .date_of_birth
        .map(|d| d.to_string())
        .unwrap_or_else(|| "-".to_string());

    println!(
        "{:<12} {:<6} {:<7} {:<11} {:<14} {:<9} {}",
        animal.tag_number, animal.species, animal.sex, dob, category, animal.status, animal.owner_name
    );
}

fn run_classify(
    species: &str,
    sex: &str,
    dob: &str,
    castrated: bool,
    reference_date: NaiveDate,
    json: bool,
) -> Result<()> {
    let category = determine_category(species, sex, parse_date(dob), castrated, reference_date);

    if json {
        return print_json(&serde_json::json!({
            "category": category,
            "age_months": parse_date(dob).map(|d| age_months(d, reference_date)),
            "reference_date": reference_date,
        }));
    }

    if category.is_empty() {
        println!("(undetermined: species, sex and date of birth are required)");
    } else {
        println!("{}", category);
    }
    Ok(())
}

fn run(
    conn: &Connection,
    command: StoreCommand,
    json: bool,
    config: &Config,
    reference_date: NaiveDate,
) -> Result<()> {
    let actor = config.actor.as_str();

    match command {
        StoreCommand::Init => {
            println!("✓ Database ready at {:?}", config.database_path);
        }

        StoreCommand::Register {
            tag,
            species,
            sex,
            dob,
            castrated,
            owner,
            location,
            category,
            notes,
        } => {
            let input = NewAnimal {
                tag_number: tag,
                species,
                sex,
                date_of_birth: dob,
                castrated,
                category,
                owner_name: owner,
                location,
                notes,
            };
            let animal = register_animal(conn, &input, reference_date, actor)?;

            if json {
                print_json(&animal)?;
            } else {
                println!("✓ Registered {} as {}", animal.tag_number, display_category(&animal));
            }
        }

        StoreCommand::List {
            category,
            species,
            status,
        } => {
            let filter = AnimalFilter {
                category,
                species,
                status,
            };
            let animals = list_animals(conn, &filter)?;

            if json {
                print_json(&animals)?;
            } else {
                for animal in &animals {
                    print_animal(animal);
                }
                println!("{} animal(s)", animals.len());
            }
        }

        StoreCommand::Show { tag } => {
            let animal = get_animal_by_tag(conn, &tag)?;
            let detail = AnimalDetail {
                events: get_events_for_animal(conn, animal.id)?,
                movements: get_movements_for_animal(conn, animal.id)?,
                animal,
            };

            if json {
                print_json(&detail)?;
            } else {
                print_animal(&detail.animal);
                let current = detail.animal.category_on(reference_date);
                if !current.is_empty() && current != detail.animal.category {
                    println!("  category on {}: {} (stored snapshot is stale)", reference_date, current);
                }
                println!("\nEvents:");
                for event in &detail.events {
                    println!(
                        "  {} {:<18} {}",
                        event.event_date,
                        event.event_type,
                        event.notes.as_deref().unwrap_or("")
                    );
                }
                println!("\nMovements:");
                for movement in &detail.movements {
                    println!(
                        "  {} {:<3} {} -> {}",
                        movement.movement_date,
                        movement.movement_type.as_str(),
                        movement.source,
                        movement.destination
                    );
                }
            }
        }

        StoreCommand::Birth {
            tag,
            sex,
            dam,
            sire,
            date,
            castrated,
            notes,
        } => {
            let birth = NewBirth {
                tag_number: tag,
                sex,
                birth_date: date.unwrap_or(reference_date),
                dam_tag: dam,
                sire_tag: sire,
                castrated,
                notes,
            };
            let recorded = record_birth(conn, &birth, reference_date, actor)?;

            if json {
                print_json(&recorded)?;
            } else {
                println!("✓ Birth #{} recorded: {} ({})", recorded.id, recorded.calf_tag, recorded.category);
            }
        }

        StoreCommand::Sell {
            tag,
            buyer,
            price,
            date,
        } => {
            let sale = NewSale {
                buyer,
                sale_date: date.unwrap_or(reference_date),
                total_amount: None,
                notes: None,
                items: vec![SaleItemInput {
                    tag_number: tag,
                    price,
                }],
            };
            let recorded = record_sale(conn, &sale, actor)?;

            if json {
                print_json(&recorded)?;
            } else {
                println!("✓ Sale {} recorded: {:.2} to {}", recorded.reference, recorded.total_amount, recorded.buyer);
            }
        }

        StoreCommand::Exit {
            tag,
            exit_type,
            reason,
            date,
        } => {
            let exit = NewExit {
                tag_number: tag,
                exit_type,
                reason,
                exit_date: date.unwrap_or(reference_date),
            };
            let recorded = record_exit(conn, &exit, actor)?;

            if json {
                print_json(&recorded)?;
            } else {
                println!("✓ {} recorded for {}", recorded.exit_type.as_str(), recorded.tag_number);
            }
        }

        StoreCommand::Health {
            tag,
            condition,
            treatment,
            vet,
            event_type,
            date,
            notes,
        } => {
            let event = NewHealthEvent {
                tag_number: tag,
                event_type,
                condition,
                treatment,
                vet,
                event_date: date.unwrap_or(reference_date),
                notes,
            };
            let recorded = record_health_event(conn, &event, actor)?;

            if json {
                print_json(&recorded)?;
            } else {
                println!(
                    "✓ Health event #{} recorded for {}: {} ({})",
                    recorded.id, recorded.tag_number, recorded.condition, recorded.event_type
                );
            }
        }

        StoreCommand::HealthReport { tag, from, to } => {
            let filter = HealthEventFilter {
                tag_number: tag,
                date_from: from,
                date_to: to,
            };
            let events = list_health_events(conn, &filter)?;

            if json {
                print_json(&events)?;
            } else {
                for event in &events {
                    println!(
                        "{} {:<12} {:<12} {:<20} {}",
                        event.event_date,
                        event.tag_number,
                        event.event_type,
                        event.condition,
                        event.treatment.as_deref().unwrap_or("-")
                    );
                }
                println!("{} health event(s)", events.len());
            }
        }

        StoreCommand::Import { file } => {
            let animals = load_csv(&file)?;
            let report = import_animals(conn, &animals, reference_date, actor)?;

            if json {
                print_json(&report)?;
            } else {
                println!("✓ Inserted: {} animals", report.inserted);
                println!("✓ Skipped duplicates: {}", report.duplicates);
                if report.invalid > 0 {
                    println!("⚠ Skipped invalid rows: {}", report.invalid);
                }
            }
        }

        StoreCommand::Refresh => {
            let changed = refresh_categories(conn, reference_date, actor)?;

            if json {
                print_json(&serde_json::json!({ "changed": changed, "as_of": reference_date }))?;
            } else {
                println!("✓ {} categories updated as of {}", changed, reference_date);
            }
        }

        StoreCommand::Summary => {
            let rows = herd_summary(conn, reference_date)?;

            if json {
                print_json(&rows)?;
            } else {
                for row in &rows {
                    let category = if row.category.is_empty() { "-" } else { row.category.as_str() };
                    println!("{:<8} {:<14} {:>5}", row.species, category, row.count);
                }
                let total: i64 = rows.iter().map(|r| r.count).sum();
                println!("{:<23} {:>5}", "total", total);
            }
        }
    }

    Ok(())
}

fn display_category(animal: &Animal) -> &str {
    if animal.category.is_empty() {
        "(undetermined)"
    } else {
        animal.category.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_classify_parses_without_store() {
        let cli = Cli::try_parse_from([
            "herdbook", "classify", "--species", "cow", "--sex", "male", "--dob", "2024-01-01",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Classify { .. }));
    }

    #[test]
    fn test_store_commands_parse() {
        let cli = Cli::try_parse_from(["herdbook", "--as-of", "2025-06-01", "summary"]).unwrap();
        assert!(matches!(cli.command, Command::Store(StoreCommand::Summary)));
        assert_eq!(cli.as_of, NaiveDate::from_ymd_opt(2025, 6, 1));

        let cli = Cli::try_parse_from([
            "herdbook", "health", "--tag", "E-7", "--condition", "foot rot", "--type", "treatment",
        ])
        .unwrap();
        match cli.command {
            Command::Store(StoreCommand::Health { tag, event_type, .. }) => {
                assert_eq!(tag, "E-7");
                assert_eq!(event_type.as_deref(), Some("treatment"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
