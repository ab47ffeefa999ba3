//! Prescription fulfillment status.

use serde::{Deserialize, Serialize};

/// Error returned when a status string is not a known fulfillment status.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid status: {0} (expected pending, preparing or picked_up)")]
pub struct StatusParseError(pub String);

/// Where a prescription is in the pharmacy flow.
///
/// The backend omits the field on freshly uploaded prescriptions, which is
/// why `Pending` is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentStatus {
    /// Sent to the pharmacy, not yet picked up for packing.
    #[default]
    Pending,
    /// A pharmacist is packing it.
    Preparing,
    /// Handed over to the patient after OTP verification.
    PickedUp,
}

impl FulfillmentStatus {
    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Preparing => "preparing",
            Self::PickedUp => "picked_up",
        }
    }

    /// No event is accepted once a prescription reaches this status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::PickedUp)
    }
}

impl std::fmt::Display for FulfillmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FulfillmentStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "pending" => Ok(Self::Pending),
            "preparing" => Ok(Self::Preparing),
            "picked_up" => Ok(Self::PickedUp),
            _ => Err(StatusParseError(s.to_owned())),
        }
    }
}
