//! Form validation
//!
//! Forms hold raw user input as strings. Validation runs before any store is
//! touched and either produces the typed row to insert or a
//! [`ValidationError`] with one message per offending field.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use crate::models::{FarmerUpdate, NewCrop, NewFarmland, SoilType};

static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();

fn email_regex() -> &'static Regex {
    EMAIL_REGEX.get_or_init(|| Regex::new(r"\S+@\S+\.\S+").unwrap())
}

/// Per-field validation failures, in form order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationError {
    errors: Vec<(&'static str, String)>,
}

impl ValidationError {
    fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push((field, message.into()));
    }

    /// Message for a field, if it failed
    pub fn field(&self, name: &str) -> Option<&str> {
        self.errors.iter().find(|(field, _)| *field == name).map(|(_, message)| message.as_str())
    }

    /// All failures as `(field, message)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.errors.iter().map(|(field, message)| (*field, message.as_str()))
    }

    /// Number of failing fields
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Whether no field failed
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    fn into_result<T>(self, value: impl FnOnce() -> T) -> Result<T, ValidationError> {
        if self.is_empty() {
            Ok(value())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> =
            self.errors.iter().map(|(field, message)| format!("{}: {}", field, message)).collect();
        write!(f, "Validation failed: {}", parts.join("; "))
    }
}

impl std::error::Error for ValidationError {}

fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

// =============================================================================
// Farmland
// =============================================================================

/// Raw input of the new-farmland form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmlandForm {
    /// Parcel name
    pub name: String,
    /// Free-text location
    pub location: String,
    /// Size in hectares as typed
    pub size: String,
    /// Soil type label
    pub soil_type: String,
}

impl FarmlandForm {
    /// Validate the form for the given owner
    pub fn validate(&self, farmer_id: &str) -> Result<NewFarmland, ValidationError> {
        let mut errors = ValidationError::default();

        if blank(&self.name) {
            errors.push("name", "Name is required");
        }
        if blank(&self.location) {
            errors.push("location", "Location is required");
        }

        let size = if blank(&self.size) {
            errors.push("size", "Size is required");
            None
        } else {
            match self.size.trim().parse::<f64>() {
                Ok(size) if size.is_finite() && size > 0.0 => Some(size),
                _ => {
                    errors.push("size", "Size must be a positive number");
                    None
                }
            }
        };

        let soil_type = if blank(&self.soil_type) {
            errors.push("soil_type", "Soil type is required");
            None
        } else {
            match self.soil_type.trim().parse::<SoilType>() {
                Ok(soil) => Some(soil),
                Err(_) => {
                    errors.push("soil_type", "Soil type is not recognised");
                    None
                }
            }
        };

        errors.into_result(|| NewFarmland {
            farmer_id: farmer_id.to_string(),
            name: self.name.trim().to_string(),
            location: self.location.trim().to_string(),
            size_hectares: size.unwrap_or_default(),
            soil_type: soil_type.unwrap_or(SoilType::Loamy),
        })
    }
}

// =============================================================================
// Crop
// =============================================================================

/// Raw input of the new-crop form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropForm {
    /// Crop name
    pub name: String,
    /// Variety label
    pub variety: String,
    /// Growth period in days as typed
    pub growth_period_days: String,
    /// Water requirement descriptor
    pub water_requirement: String,
    /// Ideal temperature descriptor
    pub ideal_temperature: String,
}

impl CropForm {
    /// Validate the form
    pub fn validate(&self) -> Result<NewCrop, ValidationError> {
        let mut errors = ValidationError::default();

        if blank(&self.name) {
            errors.push("name", "Name is required");
        }
        if blank(&self.variety) {
            errors.push("variety", "Variety is required");
        }

        let growth = if blank(&self.growth_period_days) {
            errors.push("growth_period_days", "Growth period is required");
            None
        } else {
            match self.growth_period_days.trim().parse::<u32>() {
                Ok(days) if days > 0 => Some(days),
                _ => {
                    errors.push("growth_period_days", "Growth period must be a positive whole number");
                    None
                }
            }
        };

        if blank(&self.water_requirement) {
            errors.push("water_requirement", "Water requirement is required");
        }
        if blank(&self.ideal_temperature) {
            errors.push("ideal_temperature", "Ideal temperature is required");
        }

        errors.into_result(|| NewCrop {
            name: self.name.trim().to_string(),
            variety: self.variety.trim().to_string(),
            growth_period_days: growth.unwrap_or_default(),
            water_requirement: self.water_requirement.trim().to_string(),
            ideal_temperature: self.ideal_temperature.trim().to_string(),
        })
    }
}

// =============================================================================
// Profile
// =============================================================================

/// Raw input of the profile form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileForm {
    /// Display name
    pub name: String,
    /// Email address
    pub email: String,
    /// Contact phone number
    pub contact_number: String,
    /// Postal address
    pub address: String,
}

impl ProfileForm {
    /// Validate the form
    pub fn validate(&self) -> Result<FarmerUpdate, ValidationError> {
        let mut errors = ValidationError::default();

        if blank(&self.name) {
            errors.push("name", "Name is required");
        }
        if blank(&self.email) {
            errors.push("email", "Email is required");
        } else if !email_regex().is_match(self.email.trim()) {
            errors.push("email", "Email is invalid");
        }
        if blank(&self.contact_number) {
            errors.push("contact_number", "Contact number is required");
        }
        if blank(&self.address) {
            errors.push("address", "Address is required");
        }

        errors.into_result(|| FarmerUpdate {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            contact_number: self.contact_number.trim().to_string(),
            address: self.address.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn farmland_form(size: &str) -> FarmlandForm {
        FarmlandForm {
            name: "North Field".to_string(),
            location: "Valley Road".to_string(),
            size: size.to_string(),
            soil_type: "Loamy".to_string(),
        }
    }

    #[test]
    fn test_valid_farmland() {
        let farmland = farmland_form(" 2.5 ").validate("f-1").unwrap();
        assert_eq!(farmland.farmer_id, "f-1");
        assert_eq!(farmland.size_hectares, 2.5);
        assert_eq!(farmland.soil_type, SoilType::Loamy);
    }

    #[test]
    fn test_farmland_size_rules() {
        let err = farmland_form("").validate("f-1").unwrap_err();
        assert_eq!(err.field("size"), Some("Size is required"));

        for bad in ["0", "-1", "abc", "NaN", "inf", "1e400"] {
            let err = farmland_form(bad).validate("f-1").unwrap_err();
            assert_eq!(err.field("size"), Some("Size must be a positive number"), "size {bad}");
        }
    }

    #[test]
    fn test_farmland_soil_type_membership() {
        let mut form = farmland_form("1");
        form.soil_type = "Gravel".to_string();
        assert!(form.validate("f-1").unwrap_err().field("soil_type").is_some());

        form.soil_type = String::new();
        assert_eq!(
            form.validate("f-1").unwrap_err().field("soil_type"),
            Some("Soil type is required")
        );
    }

    #[test]
    fn test_errors_are_in_form_order() {
        let err = FarmlandForm::default().validate("f-1").unwrap_err();
        let fields: Vec<&str> = err.iter().map(|(field, _)| field).collect();
        assert_eq!(fields, vec!["name", "location", "size", "soil_type"]);
        assert!(err.to_string().starts_with("Validation failed: name"));
    }

    #[test]
    fn test_crop_form() {
        let form = CropForm {
            name: "Maize".to_string(),
            variety: "Hybrid 614".to_string(),
            growth_period_days: "120".to_string(),
            water_requirement: "Medium".to_string(),
            ideal_temperature: "20-30C".to_string(),
        };
        assert_eq!(form.validate().unwrap().growth_period_days, 120);

        let mut bad = form.clone();
        bad.growth_period_days = "0".to_string();
        assert!(bad.validate().unwrap_err().field("growth_period_days").is_some());

        bad.growth_period_days = "12.5".to_string();
        assert!(bad.validate().unwrap_err().field("growth_period_days").is_some());
    }

    #[test]
    fn test_profile_form() {
        let form = ProfileForm {
            name: "Test User".to_string(),
            email: "test@example.com".to_string(),
            contact_number: "555-0100".to_string(),
            address: "1 Farm Lane".to_string(),
        };
        assert_eq!(form.validate().unwrap().email, "test@example.com");

        let mut bad = form.clone();
        bad.email = "not-an-email".to_string();
        assert_eq!(bad.validate().unwrap_err().field("email"), Some("Email is invalid"));

        bad.email = " ".to_string();
        assert_eq!(bad.validate().unwrap_err().field("email"), Some("Email is required"));
    }
}
