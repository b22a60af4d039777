// 📐 Shape Layer - Required-field validation
// Checks that incoming records carry the fields a form marks as required.
// Nothing beyond presence is checked here; values are accepted as given.

use crate::db::NewAnimal;
use crate::records::{NewBirth, NewExit, NewHealthEvent, NewPurchase, NewSale};

// ============================================================================
// VALIDATION RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub context: String,
}

impl ValidationError {
    pub fn required(context: &str, field: &str) -> Self {
        ValidationError {
            field: field.to_string(),
            message: "Required field is empty".to_string(),
            context: context.to_string(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.context, self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), Vec<ValidationError>>;

fn finish(errors: Vec<ValidationError>) -> ValidationResult {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn require(errors: &mut Vec<ValidationError>, context: &str, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(ValidationError::required(context, field));
    }
}

// ============================================================================
// RECORD VALIDATOR
// ============================================================================

#[derive(Debug, Default)]
pub struct RecordValidator;

impl RecordValidator {
    pub fn new() -> Self {
        RecordValidator
    }

    pub fn validate_animal(&self, animal: &NewAnimal) -> ValidationResult {
        let mut errors = Vec::new();
        self.check_animal(&mut errors, "Animal", "", animal);
        finish(errors)
    }

    fn check_animal(
        &self,
        errors: &mut Vec<ValidationError>,
        context: &str,
        prefix: &str,
        animal: &NewAnimal,
    ) {
        let field = |name: &str| format!("{}{}", prefix, name);

        require(errors, context, &field("tag_number"), &animal.tag_number);
        require(errors, context, &field("species"), &animal.species);
        require(errors, context, &field("sex"), &animal.sex);
        require(errors, context, &field("owner_name"), &animal.owner_name);
    }

    pub fn validate_birth(&self, birth: &NewBirth) -> ValidationResult {
        let mut errors = Vec::new();

        require(&mut errors, "Birth", "tag_number", &birth.tag_number);
        require(&mut errors, "Birth", "sex", &birth.sex);
        require(&mut errors, "Birth", "dam_tag", &birth.dam_tag);

        finish(errors)
    }

    pub fn validate_purchase(&self, purchase: &NewPurchase) -> ValidationResult {
        let mut errors = Vec::new();

        require(&mut errors, "Purchase", "vendor", &purchase.vendor);
        if purchase.items.is_empty() {
            errors.push(ValidationError {
                field: "items".to_string(),
                message: "At least one animal is required".to_string(),
                context: "Purchase".to_string(),
            });
        }

        for (i, item) in purchase.items.iter().enumerate() {
            self.check_animal(&mut errors, "Purchase", &format!("items[{}].", i), &item.animal);
        }

        finish(errors)
    }

    pub fn validate_sale(&self, sale: &NewSale) -> ValidationResult {
        let mut errors = Vec::new();

        require(&mut errors, "Sale", "buyer", &sale.buyer);
        if sale.items.is_empty() {
            errors.push(ValidationError {
                field: "items".to_string(),
                message: "At least one animal is required".to_string(),
                context: "Sale".to_string(),
            });
        }

        for (i, item) in sale.items.iter().enumerate() {
            require(&mut errors, "Sale", &format!("items[{}].tag_number", i), &item.tag_number);
        }

        finish(errors)
    }

    pub fn validate_exit(&self, exit: &NewExit) -> ValidationResult {
        let mut errors = Vec::new();

        require(&mut errors, "Exit", "tag_number", &exit.tag_number);
        require(&mut errors, "Exit", "exit_type", &exit.exit_type);

        finish(errors)
    }

    pub fn validate_health_event(&self, event: &NewHealthEvent) -> ValidationResult {
        let mut errors = Vec::new();

        require(&mut errors, "HealthEvent", "tag_number", &event.tag_number);
        require(&mut errors, "HealthEvent", "condition", &event.condition);

        finish(errors)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{PurchaseItemInput, SaleItemInput};
    use chrono::NaiveDate;

    fn valid_animal() -> NewAnimal {
        NewAnimal {
            tag_number: "C-100".to_string(),
            species: "cow".to_string(),
            sex: "female".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(2023, 4, 1),
            castrated: false,
            category: None,
            owner_name: "Valley Farm".to_string(),
            location: None,
            notes: None,
        }
    }

    #[test]
    fn test_validate_animal_valid() {
        let validator = RecordValidator::new();
        assert!(validator.validate_animal(&valid_animal()).is_ok());
    }

    #[test]
    fn test_validate_animal_missing_dob_is_allowed() {
        let validator = RecordValidator::new();
        let mut animal = valid_animal();
        animal.date_of_birth = None;

        assert!(validator.validate_animal(&animal).is_ok());
    }

    #[test]
    fn test_validate_animal_collects_all_errors() {
        let validator = RecordValidator::new();
        let mut animal = valid_animal();
        animal.species = "  ".to_string();
        animal.sex = String::new();

        let errors = validator.validate_animal(&animal).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["species", "sex"]);
        assert_eq!(errors[0].to_string(), "[Animal] species: Required field is empty");
    }

    #[test]
    fn test_validate_birth_requires_dam() {
        let validator = RecordValidator::new();
        let birth = NewBirth {
            tag_number: "C-200".to_string(),
            sex: "male".to_string(),
            birth_date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            dam_tag: String::new(),
            sire_tag: None,
            castrated: false,
            notes: None,
        };

        let errors = validator.validate_birth(&birth).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "dam_tag");
    }

    #[test]
    fn test_validate_purchase_prefixes_item_fields() {
        let validator = RecordValidator::new();
        let mut animal = valid_animal();
        animal.tag_number = String::new();

        let purchase = NewPurchase {
            vendor: "Market".to_string(),
            purchase_date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            total_cost: None,
            notes: None,
            items: vec![
                PurchaseItemInput {
                    animal: valid_animal(),
                    price: 900.0,
                },
                PurchaseItemInput { animal, price: 850.0 },
            ],
        };

        let errors = validator.validate_purchase(&purchase).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "items[1].tag_number");
    }

    #[test]
    fn test_validate_sale_requires_items() {
        let validator = RecordValidator::new();
        let sale = NewSale {
            buyer: String::new(),
            sale_date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            total_amount: None,
            notes: None,
            items: Vec::<SaleItemInput>::new(),
        };

        let errors = validator.validate_sale(&sale).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["buyer", "items"]);
    }

    #[test]
    fn test_validate_exit() {
        let validator = RecordValidator::new();
        let exit = NewExit {
            tag_number: "C-1".to_string(),
            exit_type: String::new(),
            reason: None,
            exit_date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
        };

        let errors = validator.validate_exit(&exit).unwrap_err();
        assert_eq!(errors[0].field, "exit_type");
    }

    #[test]
    fn test_validate_health_event() {
        let validator = RecordValidator::new();
        let event = NewHealthEvent {
            tag_number: " ".to_string(),
            event_type: None,
            condition: String::new(),
            treatment: Some("oxytetracycline".to_string()),
            vet: None,
            event_date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            notes: None,
        };

        let errors = validator.validate_health_event(&event).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["tag_number", "condition"]);
        assert_eq!(errors[0].context, "HealthEvent");
    }
}
