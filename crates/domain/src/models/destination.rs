//! Destination domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::Coordinate;
use uuid::Uuid;
use validator::Validate;

/// A place the user wants to be woken up for.
///
/// Immutable once attached to an alarm; editing a destination means
/// creating a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    pub id: String,

    #[validate(
        length(min = 1, max = 100, message = "Name must be 1-100 characters"),
        custom(function = "shared::validation::validate_not_blank")
    )]
    pub name: String,

    #[validate(nested)]
    pub coordinate: Coordinate,

    #[validate(length(max = 200, message = "Address must be at most 200 characters"))]
    pub address: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Destination {
    /// Creates a destination with a fresh id, trimming the name and address.
    ///
    /// A blank address is stored as `None`. The result is not validated.
    pub fn new(name: &str, coordinate: Coordinate, address: Option<&str>) -> Self {
        let address = address
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string);

        Self {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            coordinate,
            address,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord() -> Coordinate {
        Coordinate::new(28.6139, 77.2090)
    }

    #[test]
    fn test_new_trims_name_and_address() {
        let d = Destination::new("  Rajiv Chowk  ", coord(), Some("  Block A  "));
        assert_eq!(d.name, "Rajiv Chowk");
        assert_eq!(d.address.as_deref(), Some("Block A"));
        assert!(!d.id.is_empty());
    }

    #[test]
    fn test_new_blank_address_is_none() {
        let d = Destination::new("Home", coord(), Some("   "));
        assert!(d.address.is_none());
    }

    #[test]
    fn test_unique_ids() {
        let a = Destination::new("A", coord(), None);
        let b = Destination::new("A", coord(), None);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_validate_ok() {
        assert!(Destination::new("Home", coord(), None).validate().is_ok());
    }

    #[test]
    fn test_validate_name_bounds() {
        assert!(Destination::new("   ", coord(), None).validate().is_err());
        assert!(Destination::new(&"x".repeat(100), coord(), None)
            .validate()
            .is_ok());
        assert!(Destination::new(&"x".repeat(101), coord(), None)
            .validate()
            .is_err());
    }

    #[test]
    fn test_validate_address_length() {
        let long = "a".repeat(201);
        assert!(Destination::new("Home", coord(), Some(&long))
            .validate()
            .is_err());
    }

    #[test]
    fn test_validate_rejects_bad_coordinate() {
        let d = Destination::new("Nowhere", Coordinate::new(120.0, 0.0), None);
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_serialization_uses_iso_timestamps() {
        let d = Destination::new("Home", coord(), None);
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["name"], "Home");
        assert_eq!(json["coordinate"]["latitude"], 28.6139);
        let created = json["createdAt"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(created).is_ok());
    }
}
