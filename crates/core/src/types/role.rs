//! Account roles.

use serde::{Deserialize, Serialize};

/// Error returned when a role string is not one of the four known roles.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid role: {0} (expected doctor, patient, pharmacist or admin)")]
pub struct RoleParseError(pub String);

/// The role attached to every account.
///
/// Each role has exactly one landing view and its own set of permitted
/// backend endpoints; the backend enforces the latter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Uploads and searches prescriptions.
    Doctor,
    /// Views own prescriptions and sends them to the pharmacy.
    Patient,
    /// Works the fulfillment queue and confirms pickups.
    Pharmacist,
    /// Manages inventory and reads analytics.
    Admin,
}

impl Role {
    /// All roles, in display order.
    pub const ALL: [Self; 4] = [Self::Doctor, Self::Patient, Self::Pharmacist, Self::Admin];

    /// Wire name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Doctor => "doctor",
            Self::Patient => "patient",
            Self::Pharmacist => "pharmacist",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "doctor" => Ok(Self::Doctor),
            "patient" => Ok(Self::Patient),
            "pharmacist" => Ok(Self::Pharmacist),
            "admin" => Ok(Self::Admin),
            _ => Err(RoleParseError(s.to_owned())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_is_case_insensitive() {
        assert_eq!("Pharmacist".parse::<Role>().unwrap(), Role::Pharmacist);
        assert_eq!(" admin ".parse::<Role>().unwrap(), Role::Admin);
    }

    #[test]
    fn test_from_str_rejects_unknown() {
        let err = "nurse".parse::<Role>().unwrap_err();
        assert_eq!(err, RoleParseError("nurse".to_owned()));
    }

    #[test]
    fn test_display_matches_wire_format() {
        for role in Role::ALL {
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{role}\""));
        }
    }
}
