//! Farm record types
//!
//! Rows exchanged with the remote store serialize with the column names of
//! the `farmers`, `farmlands` and `crops` tables. The same types are stored
//! on-device by the local fallback store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use storage::Keyed;
use uuid::Uuid;

/// Contact number given to profiles created without user input
pub const PLACEHOLDER_CONTACT: &str = "000-000-0000";

/// Address given to profiles created without user input
pub const PLACEHOLDER_ADDRESS: &str = "No address provided";

fn fresh_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Identity
// =============================================================================

/// A signed-in user as returned by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Identity reference
    pub id: String,
    /// Email address
    pub email: String,
    /// Display name
    pub name: String,
}

impl UserIdentity {
    /// Create an identity
    pub fn new(id: impl Into<String>, email: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), email: email.into(), name: name.into() }
    }
}

// =============================================================================
// Farmer
// =============================================================================

/// A farmer profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Farmer {
    /// Profile id
    pub id: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Identity the profile belongs to
    pub user_id: String,
    /// Display name
    pub name: String,
    /// Contact phone number
    pub contact_number: String,
    /// Postal address
    pub address: String,
    /// Email address
    pub email: String,
}

impl Farmer {
    /// Overwrite the editable fields
    pub fn apply(&mut self, update: &FarmerUpdate) {
        self.name = update.name.clone();
        self.email = update.email.clone();
        self.contact_number = update.contact_number.clone();
        self.address = update.address.clone();
    }

    /// The insertable part of this profile
    pub fn to_new(&self) -> NewFarmer {
        NewFarmer {
            user_id: self.user_id.clone(),
            name: self.name.clone(),
            contact_number: self.contact_number.clone(),
            address: self.address.clone(),
            email: self.email.clone(),
        }
    }
}

impl Keyed for Farmer {
    fn key(&self) -> &str {
        &self.id
    }
}

/// Columns of a farmer row to insert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFarmer {
    /// Identity the profile belongs to
    pub user_id: String,
    /// Display name
    pub name: String,
    /// Contact phone number
    pub contact_number: String,
    /// Postal address
    pub address: String,
    /// Email address
    pub email: String,
}

impl NewFarmer {
    /// A profile for `identity` with placeholder contact fields
    pub fn placeholder(identity: &UserIdentity) -> Self {
        Self {
            user_id: identity.id.clone(),
            name: identity.name.clone(),
            contact_number: PLACEHOLDER_CONTACT.to_string(),
            address: PLACEHOLDER_ADDRESS.to_string(),
            email: identity.email.clone(),
        }
    }

    /// Materialize the row locally with a fresh id and timestamp
    pub fn into_local(self) -> Farmer {
        Farmer {
            id: fresh_id(),
            created_at: Utc::now(),
            user_id: self.user_id,
            name: self.name,
            contact_number: self.contact_number,
            address: self.address,
            email: self.email,
        }
    }
}

/// Editable profile fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmerUpdate {
    /// Display name
    pub name: String,
    /// Email address
    pub email: String,
    /// Contact phone number
    pub contact_number: String,
    /// Postal address
    pub address: String,
}

// =============================================================================
// Farmland
// =============================================================================

/// Soil classification of a farmland parcel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SoilType {
    /// Clay
    #[serde(rename = "Clay")]
    Clay,
    /// Sandy
    #[serde(rename = "Sandy")]
    Sandy,
    /// Silty
    #[serde(rename = "Silty")]
    Silty,
    /// Peaty
    #[serde(rename = "Peaty")]
    Peaty,
    /// Chalky
    #[serde(rename = "Chalky")]
    Chalky,
    /// Loamy
    #[serde(rename = "Loamy")]
    Loamy,
    /// Clay loam
    #[serde(rename = "Clay Loam")]
    ClayLoam,
    /// Sandy clay
    #[serde(rename = "Sandy Clay")]
    SandyClay,
    /// Silty clay
    #[serde(rename = "Silty Clay")]
    SiltyClay,
    /// Sandy loam
    #[serde(rename = "Sandy Loam")]
    SandyLoam,
}

impl SoilType {
    /// Every soil type, in form order
    pub const ALL: [SoilType; 10] = [
        SoilType::Clay,
        SoilType::Sandy,
        SoilType::Silty,
        SoilType::Peaty,
        SoilType::Chalky,
        SoilType::Loamy,
        SoilType::ClayLoam,
        SoilType::SandyClay,
        SoilType::SiltyClay,
        SoilType::SandyLoam,
    ];

    /// Display label, also the stored value
    pub fn label(&self) -> &'static str {
        match self {
            SoilType::Clay => "Clay",
            SoilType::Sandy => "Sandy",
            SoilType::Silty => "Silty",
            SoilType::Peaty => "Peaty",
            SoilType::Chalky => "Chalky",
            SoilType::Loamy => "Loamy",
            SoilType::ClayLoam => "Clay Loam",
            SoilType::SandyClay => "Sandy Clay",
            SoilType::SiltyClay => "Silty Clay",
            SoilType::SandyLoam => "Sandy Loam",
        }
    }
}

impl fmt::Display for SoilType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SoilType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SoilType::ALL
            .iter()
            .copied()
            .find(|soil| soil.label() == s)
            .ok_or_else(|| format!("Unknown soil type: {}", s))
    }
}

/// A farmland parcel owned by one farmer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Farmland {
    /// Parcel id
    pub id: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Owning farmer profile id
    pub farmer_id: String,
    /// Parcel name
    pub name: String,
    /// Free-text location
    pub location: String,
    /// Size in hectares, always positive
    pub size_hectares: f64,
    /// Soil type
    pub soil_type: SoilType,
}

impl Farmland {
    /// The insertable part of this parcel
    pub fn to_new(&self) -> NewFarmland {
        NewFarmland {
            farmer_id: self.farmer_id.clone(),
            name: self.name.clone(),
            location: self.location.clone(),
            size_hectares: self.size_hectares,
            soil_type: self.soil_type,
        }
    }
}

impl Keyed for Farmland {
    fn key(&self) -> &str {
        &self.id
    }
}

/// Columns of a farmland row to insert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFarmland {
    /// Owning farmer profile id
    pub farmer_id: String,
    /// Parcel name
    pub name: String,
    /// Free-text location
    pub location: String,
    /// Size in hectares
    pub size_hectares: f64,
    /// Soil type
    pub soil_type: SoilType,
}

impl NewFarmland {
    /// Materialize the row locally with a fresh id and timestamp
    pub fn into_local(self) -> Farmland {
        Farmland {
            id: fresh_id(),
            created_at: Utc::now(),
            farmer_id: self.farmer_id,
            name: self.name,
            location: self.location,
            size_hectares: self.size_hectares,
            soil_type: self.soil_type,
        }
    }
}

// =============================================================================
// Crop
// =============================================================================

/// A crop variety in the shared catalogue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crop {
    /// Crop id
    pub id: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Crop name
    pub name: String,
    /// Variety label
    pub variety: String,
    /// Days from planting to harvest
    pub growth_period_days: u32,
    /// Water requirement descriptor
    pub water_requirement: String,
    /// Ideal temperature descriptor
    pub ideal_temperature: String,
}

impl Crop {
    /// The insertable part of this crop
    pub fn to_new(&self) -> NewCrop {
        NewCrop {
            name: self.name.clone(),
            variety: self.variety.clone(),
            growth_period_days: self.growth_period_days,
            water_requirement: self.water_requirement.clone(),
            ideal_temperature: self.ideal_temperature.clone(),
        }
    }
}

impl Keyed for Crop {
    fn key(&self) -> &str {
        &self.id
    }
}

/// Columns of a crop row to insert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCrop {
    /// Crop name
    pub name: String,
    /// Variety label
    pub variety: String,
    /// Days from planting to harvest
    pub growth_period_days: u32,
    /// Water requirement descriptor
    pub water_requirement: String,
    /// Ideal temperature descriptor
    pub ideal_temperature: String,
}

impl NewCrop {
    /// Materialize the row locally with a fresh id and timestamp
    pub fn into_local(self) -> Crop {
        Crop {
            id: fresh_id(),
            created_at: Utc::now(),
            name: self.name,
            variety: self.variety,
            growth_period_days: self.growth_period_days,
            water_requirement: self.water_requirement,
            ideal_temperature: self.ideal_temperature,
        }
    }
}

// =============================================================================
// Provenance
// =============================================================================

/// Which replica a record was read from or written to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreSource {
    /// The hosted remote store
    Remote,
    /// On-device storage
    Local,
}

impl fmt::Display for StoreSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreSource::Remote => write!(f, "remote"),
            StoreSource::Local => write!(f, "local"),
        }
    }
}

/// A value tagged with the replica it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sourced<T> {
    /// Replica that answered
    pub source: StoreSource,
    /// The value
    pub data: T,
}

impl<T> Sourced<T> {
    /// A value read from the remote store
    pub fn remote(data: T) -> Self {
        Self { source: StoreSource::Remote, data }
    }

    /// A value read from on-device storage
    pub fn local(data: T) -> Self {
        Self { source: StoreSource::Local, data }
    }

    /// Whether the value came from on-device storage
    pub fn is_local(&self) -> bool {
        self.source == StoreSource::Local
    }

    /// Transform the value, keeping its source
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Sourced<U> {
        Sourced { source: self.source, data: f(self.data) }
    }
}

impl Sourced<Vec<Farmland>> {
    /// References for deleting each listed parcel from the replica it came from
    pub fn refs(&self) -> Vec<RecordRef> {
        self.data.iter().map(|item| RecordRef::new(&item.id, self.source)).collect()
    }
}

impl Sourced<Vec<Crop>> {
    /// References for deleting each listed crop from the replica it came from
    pub fn refs(&self) -> Vec<RecordRef> {
        self.data.iter().map(|item| RecordRef::new(&item.id, self.source)).collect()
    }
}

/// Address of a record in a specific replica
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordRef {
    /// Record id
    pub id: String,
    /// Replica holding the record
    pub source: StoreSource,
}

impl RecordRef {
    /// Create a record reference
    pub fn new(id: impl Into<String>, source: StoreSource) -> Self {
        Self { id: id.into(), source }
    }
}

// =============================================================================
// Dashboard
// =============================================================================

/// Headline numbers for a farmer's dashboard
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    /// Number of farmland parcels
    #[serde(default)]
    pub farmland_count: u64,
    /// Combined farmland size in hectares
    #[serde(default)]
    pub total_hectares: f64,
    /// Number of crop varieties
    #[serde(default)]
    pub crop_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soil_type_labels_round_trip() {
        for soil in SoilType::ALL {
            assert_eq!(soil.label().parse::<SoilType>().unwrap(), soil);
        }
        assert!("Gravel".parse::<SoilType>().is_err());
        assert!("clay".parse::<SoilType>().is_err());
    }

    #[test]
    fn test_soil_type_serializes_as_label() {
        let json = serde_json::to_string(&SoilType::SandyLoam).unwrap();
        assert_eq!(json, "\"Sandy Loam\"");
    }

    #[test]
    fn test_placeholder_farmer() {
        let identity = UserIdentity::new("123456", "test@example.com", "Test User");
        let farmer = NewFarmer::placeholder(&identity);

        assert_eq!(farmer.user_id, "123456");
        assert_eq!(farmer.contact_number, PLACEHOLDER_CONTACT);
        assert_eq!(farmer.address, PLACEHOLDER_ADDRESS);

        let a = farmer.clone().into_local();
        let b = farmer.into_local();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_farmland_row_decodes_service_timestamps() {
        let row = serde_json::json!({
            "id": "l-1",
            "created_at": "2024-03-01T10:15:00.123456+00:00",
            "farmer_id": "f-1",
            "name": "North Field",
            "location": "Valley Road",
            "size_hectares": 2.5,
            "soil_type": "Clay Loam"
        });

        let farmland: Farmland = serde_json::from_value(row).unwrap();
        assert_eq!(farmland.soil_type, SoilType::ClayLoam);
        assert_eq!(farmland.size_hectares, 2.5);
    }

    #[test]
    fn test_sourced_refs_carry_source() {
        let crop = NewCrop {
            name: "Maize".to_string(),
            variety: "Hybrid".to_string(),
            growth_period_days: 120,
            water_requirement: "Medium".to_string(),
            ideal_temperature: "25C".to_string(),
        }
        .into_local();

        let listed = Sourced::local(vec![crop.clone()]);
        assert_eq!(listed.refs(), vec![RecordRef::new(crop.id, StoreSource::Local)]);
    }

    #[test]
    fn test_dashboard_summary_tolerates_missing_fields() {
        let summary: DashboardSummary =
            serde_json::from_value(serde_json::json!({"farmland_count": 3})).unwrap();
        assert_eq!(summary.farmland_count, 3);
        assert_eq!(summary.crop_count, 0);
    }
}
