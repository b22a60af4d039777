// Herdbook - Core Library
// Livestock register: life-stage classification, SQLite store and herd ledgers.
// Exposes all modules for use in the CLI, API server, and tests.

pub mod classifier;
pub mod config;
pub mod db;
pub mod error;
pub mod records;
pub mod schema;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use classifier::{
    age_months, classify, determine_category, determine_category_str, LifeStage, Sex, Species,
};
pub use config::{init_logging, Config, LogFormat};
pub use db::{
    Animal, AnimalFilter, Event, HerdSummaryRow, ImportReport, Movement, MovementType, NewAnimal,
    get_animal, get_animal_by_tag, get_events_for_animal, get_movements_for_animal, herd_summary,
    import_animals, list_animals, list_dams, list_sires, load_csv, refresh_categories,
    register_animal, setup_database,
};
pub use error::{HerdError, HerdResult};
pub use records::{
    Birth, Exit, ExitType, HealthEvent, HealthEventFilter, LedgerLine, NewBirth, NewExit,
    NewHealthEvent, NewPurchase, NewSale, Purchase, PurchaseItemInput, Sale, SaleItemInput,
    list_health_events, record_birth, record_exit, record_health_event, record_purchase,
    record_sale,
};
pub use schema::{RecordValidator, ValidationError, ValidationResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
