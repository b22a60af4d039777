// Store and ledger errors
// The classifier never fails; everything that touches SQLite returns HerdError.

use crate::schema::ValidationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HerdError {
    #[error("validation failed: {}", format_validation(.0))]
    Validation(Vec<ValidationError>),

    #[error("tag number already registered: {0}")]
    DuplicateTag(String),

    #[error("animal not found: {0}")]
    AnimalNotFound(String),

    #[error("animal {0} is already inactive (sold, dead or slaughtered)")]
    AlreadyInactive(String),

    #[error("invalid exit type '{0}', expected 'death' or 'slaughter'")]
    InvalidExitType(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl HerdError {
    /// Short machine-readable code, used in API error envelopes
    pub fn code(&self) -> &'static str {
        match self {
            HerdError::Validation(_) => "validation",
            HerdError::DuplicateTag(_) => "duplicate_tag",
            HerdError::AnimalNotFound(_) => "not_found",
            HerdError::AlreadyInactive(_) => "inactive",
            HerdError::InvalidExitType(_) => "invalid_exit_type",
            HerdError::Database(_) => "database",
        }
    }
}

impl From<Vec<ValidationError>> for HerdError {
    fn from(errors: Vec<ValidationError>) -> Self {
        HerdError::Validation(errors)
    }
}

fn format_validation(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type HerdResult<T> = Result<T, HerdError>;
