// 🐄 Category Classifier - Life-stage labels from species, sex and age
// Pure decision table: no I/O, no clock, no state.
//
// The reference date is always supplied by the caller. A label computed today
// can differ from one computed next month for the same animal, so callers treat
// the result as a snapshot of the day it was computed.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Juvenile bracket upper bound (exclusive), shared by every species
const JUVENILE_MONTHS: i32 = 12;

/// Cows stay heifers until this age (exclusive)
const HEIFER_MONTHS: i32 = 24;

// ============================================================================
// INPUT TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Species {
    Cow,
    Sheep,
    Goat,
    /// Accepted by the register, classified as "Unknown"
    Other(String),
}

impl Species {
    /// Parse a species name. Returns None for empty input.
    /// Input is trimmed and case-folded, so "Cow" and " cow " both parse as Cow.
    pub fn parse(raw: &str) -> Option<Species> {
        let value = raw.trim();
        if value.is_empty() {
            return None;
        }

        Some(match value.to_lowercase().as_str() {
            "cow" => Species::Cow,
            "sheep" => Species::Sheep,
            "goat" => Species::Goat,
            _ => Species::Other(value.to_string()),
        })
    }

    pub fn as_str(&self) -> &str {
        match self {
            Species::Cow => "cow",
            Species::Sheep => "sheep",
            Species::Goat => "goat",
            Species::Other(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
    Other(String),
}

impl Sex {
    /// Parse a sex value. Returns None for empty input.
    /// Trimmed and case-folded like `Species::parse`.
    pub fn parse(raw: &str) -> Option<Sex> {
        let value = raw.trim();
        if value.is_empty() {
            return None;
        }

        Some(match value.to_lowercase().as_str() {
            "male" => Sex::Male,
            "female" => Sex::Female,
            _ => Sex::Other(value.to_string()),
        })
    }

    pub fn as_str(&self) -> &str {
        match self {
            Sex::Male => "male",
            Sex::Female => "female",
            Sex::Other(value) => value,
        }
    }

    pub fn is_male(&self) -> bool {
        matches!(self, Sex::Male)
    }
}

// ============================================================================
// LIFE STAGE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifeStage {
    CalfMale,
    CalfFemale,
    Heifer,
    Cow,
    Bull,
    Steer,
    Lamb,
    Ram,
    Wether,
    Ewe,
    Kid,
    Buck,
    Doe,
    Unknown,
}

impl LifeStage {
    /// Human-readable label, as stored on the animal record
    pub fn label(&self) -> &'static str {
        match self {
            LifeStage::CalfMale => "Calf (Male)",
            LifeStage::CalfFemale => "Calf (Female)",
            LifeStage::Heifer => "Heifer",
            LifeStage::Cow => "Cow",
            LifeStage::Bull => "Bull",
            LifeStage::Steer => "Steer",
            LifeStage::Lamb => "Lamb",
            LifeStage::Ram => "Ram",
            LifeStage::Wether => "Wether",
            LifeStage::Ewe => "Ewe",
            LifeStage::Kid => "Kid",
            LifeStage::Buck => "Buck",
            LifeStage::Doe => "Doe",
            LifeStage::Unknown => "Unknown",
        }
    }

    /// True for the juvenile labels (calf, lamb, kid)
    pub fn is_juvenile(&self) -> bool {
        matches!(
            self,
            LifeStage::CalfMale | LifeStage::CalfFemale | LifeStage::Lamb | LifeStage::Kid
        )
    }
}

impl std::fmt::Display for LifeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// CLASSIFICATION
// ============================================================================

/// Calendar-field month difference between `reference_date` and `date_of_birth`.
///
/// Day-of-month is ignored: 2024-01-31 → 2024-02-01 is one month.
/// A date of birth after the reference date gives a negative value.
pub fn age_months(date_of_birth: NaiveDate, reference_date: NaiveDate) -> i32 {
    (reference_date.year() - date_of_birth.year()) * 12
        + (reference_date.month() as i32 - date_of_birth.month() as i32)
}

/// Classify an animal into a life stage.
///
/// Returns None when species, sex or date of birth is missing, meaning the
/// category is not yet determinable and should be left blank.
pub fn classify(
    species: Option<&Species>,
    sex: Option<&Sex>,
    date_of_birth: Option<NaiveDate>,
    castrated: bool,
    reference_date: NaiveDate,
) -> Option<LifeStage> {
    let (species, sex, dob) = match (species, sex, date_of_birth) {
        (Some(species), Some(sex), Some(dob)) => (species, sex, dob),
        _ => return None,
    };

    let months = age_months(dob, reference_date);
    let juvenile = months < JUVENILE_MONTHS;

    let stage = match species {
        Species::Cow => {
            if juvenile {
                if sex.is_male() {
                    LifeStage::CalfMale
                } else {
                    LifeStage::CalfFemale
                }
            } else {
                match sex {
                    Sex::Male if castrated => LifeStage::Steer,
                    Sex::Male => LifeStage::Bull,
                    Sex::Female if months < HEIFER_MONTHS => LifeStage::Heifer,
                    Sex::Female => LifeStage::Cow,
                    // adult cattle of unrecognised sex have no label
                    Sex::Other(_) => LifeStage::Unknown,
                }
            }
        }
        Species::Sheep => {
            if juvenile {
                LifeStage::Lamb
            } else {
                adult_small_ruminant(sex, castrated, LifeStage::Ram, LifeStage::Ewe)
            }
        }
        Species::Goat => {
            if juvenile {
                LifeStage::Kid
            } else {
                adult_small_ruminant(sex, castrated, LifeStage::Buck, LifeStage::Doe)
            }
        }
        Species::Other(_) => LifeStage::Unknown,
    };

    Some(stage)
}

/// Sheep and goats share the adult shape: wether, intact male, else female
fn adult_small_ruminant(
    sex: &Sex,
    castrated: bool,
    intact_male: LifeStage,
    female: LifeStage,
) -> LifeStage {
    match sex {
        Sex::Male if castrated => LifeStage::Wether,
        Sex::Male => intact_male,
        _ => female,
    }
}

/// Compute the category label for raw form input.
///
/// Returns the empty string when species, sex or date of birth is missing.
pub fn determine_category(
    species: &str,
    sex: &str,
    date_of_birth: Option<NaiveDate>,
    castrated: bool,
    reference_date: NaiveDate,
) -> String {
    let species = Species::parse(species);
    let sex = Sex::parse(sex);

    classify(
        species.as_ref(),
        sex.as_ref(),
        date_of_birth,
        castrated,
        reference_date,
    )
    .map(|stage| stage.label().to_string())
    .unwrap_or_default()
}

/// Same as [`determine_category`] with the date of birth as `YYYY-MM-DD` text.
/// An unparseable date counts as missing.
pub fn determine_category_str(
    species: &str,
    sex: &str,
    date_of_birth: &str,
    castrated: bool,
    reference_date: NaiveDate,
) -> String {
    let dob = parse_date(date_of_birth);
    determine_category(species, sex, dob, castrated, reference_date)
}

/// Parse a `YYYY-MM-DD` date, returning None for empty or malformed input
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// First day of the month `months` before the reference month
    fn months_before(reference: NaiveDate, months: i32) -> NaiveDate {
        let total = reference.year() * 12 + reference.month0() as i32 - months;
        date(total.div_euclid(12), total.rem_euclid(12) as u32 + 1, 1)
    }

    fn category(species: &str, sex: &str, months: i32, castrated: bool) -> String {
        let reference = date(2025, 6, 15);
        let dob = months_before(reference, months);
        determine_category(species, sex, Some(dob), castrated, reference)
    }

    #[test]
    fn test_age_months_ignores_day_of_month() {
        assert_eq!(age_months(date(2024, 1, 31), date(2024, 2, 1)), 1);
        assert_eq!(age_months(date(2024, 3, 1), date(2024, 3, 31)), 0);
        assert_eq!(age_months(date(2024, 3, 31), date(2024, 3, 1)), 0);
        assert_eq!(age_months(date(2022, 11, 20), date(2025, 2, 3)), 27);
    }

    #[test]
    fn test_age_months_negative_for_future_birth() {
        assert_eq!(age_months(date(2025, 8, 1), date(2025, 6, 1)), -2);
    }

    #[test]
    fn test_missing_inputs_return_empty() {
        let reference = date(2025, 6, 15);
        let dob = Some(date(2024, 1, 1));

        assert_eq!(determine_category("", "male", dob, false, reference), "");
        assert_eq!(determine_category("cow", "", dob, false, reference), "");
        assert_eq!(determine_category("cow", "male", None, false, reference), "");
        assert_eq!(determine_category("  ", "male", dob, false, reference), "");
        assert_eq!(
            determine_category_str("cow", "male", "not-a-date", false, reference),
            ""
        );
        assert_eq!(determine_category_str("cow", "male", "", false, reference), "");
    }

    #[test]
    fn test_unknown_species() {
        assert_eq!(category("pig", "male", 30, false), "Unknown");
        assert_eq!(category("horse", "female", 2, false), "Unknown");
        assert_eq!(category("llama", "male", 12, true), "Unknown");
    }

    #[test]
    fn test_cow_scenarios() {
        assert_eq!(category("cow", "male", 6, false), "Calf (Male)");
        assert_eq!(category("cow", "female", 6, false), "Calf (Female)");
        assert_eq!(category("cow", "female", 18, false), "Heifer");
        assert_eq!(category("cow", "female", 30, false), "Cow");
        assert_eq!(category("cow", "male", 30, false), "Bull");
        assert_eq!(category("cow", "male", 30, true), "Steer");
    }

    #[test]
    fn test_cow_heifer_boundary() {
        assert_eq!(category("cow", "female", 23, false), "Heifer");
        assert_eq!(category("cow", "female", 24, false), "Cow");
    }

    #[test]
    fn test_sheep_scenarios() {
        assert_eq!(category("sheep", "male", 24, true), "Wether");
        assert_eq!(category("sheep", "male", 24, false), "Ram");
        assert_eq!(category("sheep", "female", 24, false), "Ewe");
        assert_eq!(category("sheep", "male", 3, true), "Lamb");
        assert_eq!(category("sheep", "female", 3, false), "Lamb");
    }

    #[test]
    fn test_goat_scenarios() {
        assert_eq!(category("goat", "female", 3, false), "Kid");
        assert_eq!(category("goat", "male", 3, false), "Kid");
        assert_eq!(category("goat", "male", 20, false), "Buck");
        assert_eq!(category("goat", "male", 20, true), "Wether");
        assert_eq!(category("goat", "female", 20, false), "Doe");
    }

    #[test]
    fn test_juvenile_boundary_at_twelve_months() {
        assert_eq!(category("cow", "male", 11, false), "Calf (Male)");
        assert_eq!(category("cow", "male", 12, false), "Bull");
        assert_eq!(category("cow", "female", 12, false), "Heifer");
        assert_eq!(category("sheep", "female", 11, false), "Lamb");
        assert_eq!(category("sheep", "female", 12, false), "Ewe");
        assert_eq!(category("goat", "female", 11, false), "Kid");
        assert_eq!(category("goat", "female", 12, false), "Doe");
    }

    #[test]
    fn test_future_birth_is_juvenile() {
        let reference = date(2025, 6, 15);
        let dob = Some(date(2026, 1, 1));

        assert_eq!(determine_category("cow", "female", dob, false, reference), "Calf (Female)");
        assert_eq!(determine_category("sheep", "male", dob, false, reference), "Lamb");
        assert_eq!(determine_category("goat", "male", dob, false, reference), "Kid");
    }

    #[test]
    fn test_determinism() {
        let reference = date(2025, 6, 15);
        let dob = Some(date(2023, 9, 2));

        let first = determine_category("cow", "female", dob, false, reference);
        let second = determine_category("cow", "female", dob, false, reference);
        assert_eq!(first, second);
        assert_eq!(first, "Heifer");
    }

    #[test]
    fn test_category_changes_with_reference_date() {
        let dob = Some(date(2024, 3, 10));

        assert_eq!(
            determine_category("cow", "male", dob, false, date(2025, 2, 28)),
            "Calf (Male)"
        );
        assert_eq!(
            determine_category("cow", "male", dob, false, date(2025, 3, 1)),
            "Bull"
        );
    }

    #[test]
    fn test_input_is_trimmed_and_case_insensitive() {
        assert_eq!(category(" Cow ", "Male", 30, false), "Bull");
        assert_eq!(category("SHEEP", "FEMALE", 30, false), "Ewe");
    }

    #[test]
    fn test_unrecognised_sex() {
        assert_eq!(category("cow", "unknown", 30, false), "Unknown");
        assert_eq!(category("cow", "unknown", 3, false), "Calf (Female)");
        assert_eq!(category("sheep", "unknown", 30, true), "Ewe");
        assert_eq!(category("goat", "unknown", 30, false), "Doe");
    }

    #[test]
    fn test_castration_ignored_for_females() {
        assert_eq!(category("cow", "female", 30, true), "Cow");
        assert_eq!(category("sheep", "female", 30, true), "Ewe");
    }

    #[test]
    fn test_classify_typed_inputs() {
        let reference = date(2025, 6, 15);
        let stage = classify(
            Some(&Species::Goat),
            Some(&Sex::Male),
            Some(date(2023, 1, 1)),
            false,
            reference,
        );
        assert_eq!(stage, Some(LifeStage::Buck));
        assert_eq!(classify(None, Some(&Sex::Male), None, false, reference), None);
        assert!(LifeStage::Kid.is_juvenile());
        assert!(!LifeStage::Doe.is_juvenile());
        assert_eq!(LifeStage::CalfMale.to_string(), "Calf (Male)");
    }

    #[test]
    fn test_species_and_sex_parse() {
        assert_eq!(Species::parse("goat"), Some(Species::Goat));
        assert_eq!(Species::parse(""), None);
        assert_eq!(Species::parse("Yak"), Some(Species::Other("Yak".to_string())));
        assert_eq!(Species::Other("Yak".to_string()).as_str(), "Yak");
        assert_eq!(Sex::parse("female"), Some(Sex::Female));
        assert_eq!(Sex::parse(" "), None);
    }
}
