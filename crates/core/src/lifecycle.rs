//! Prescription lifecycle rules.
//!
//! Two small state machines live here:
//!
//! - fulfillment: `pending → preparing → picked_up`, driven by the pharmacist;
//! - upload: a doctor's draft either becomes a prescription or is held on a
//!   low-stock warning until the doctor revises it or overrides the warning.
//!
//! The backend stays authoritative. These rules let the client refuse
//! requests it already knows are invalid and keep displayed state consistent.

use crate::types::FulfillmentStatus;

/// A pharmacist action on a queued prescription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FulfillmentEvent {
    /// `POST /pharmacy/mark-preparing/{id}`.
    MarkPreparing,
    /// `POST /pharmacy/confirm-pickup/{id}` with the correct OTP.
    ConfirmPickup,
}

impl std::fmt::Display for FulfillmentEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MarkPreparing => f.write_str("mark preparing"),
            Self::ConfirmPickup => f.write_str("confirm pickup"),
        }
    }
}

/// A rejected lifecycle step.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    /// Only pending prescriptions can be marked preparing.
    #[error("cannot mark preparing: prescription is {0}")]
    NotPending(FulfillmentStatus),
    /// Pickup requires the prescription to be preparing.
    #[error("cannot confirm pickup: prescription is {0}")]
    NotReady(FulfillmentStatus),
    /// The prescription has already been handed over.
    #[error("prescription has already been picked up")]
    AlreadyPickedUp,
    /// A revise/override decision was made without a low-stock warning.
    #[error("no low-stock warning to resolve")]
    NoLowStockHold,
}

impl FulfillmentStatus {
    /// Apply `event`, returning the next status.
    ///
    /// # Errors
    ///
    /// Returns a [`TransitionError`] when the event is not allowed from the
    /// current status. `picked_up` accepts no events.
    pub const fn apply(self, event: FulfillmentEvent) -> Result<Self, TransitionError> {
        match (self, event) {
            (Self::PickedUp, _) => Err(TransitionError::AlreadyPickedUp),
            (Self::Pending, FulfillmentEvent::MarkPreparing) => Ok(Self::Preparing),
            (Self::Preparing, FulfillmentEvent::ConfirmPickup) => Ok(Self::PickedUp),
            (status, FulfillmentEvent::MarkPreparing) => Err(TransitionError::NotPending(status)),
            (status, FulfillmentEvent::ConfirmPickup) => Err(TransitionError::NotReady(status)),
        }
    }
}

/// The doctor's choice when an upload is held on low stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadDecision {
    /// Go back to the draft; nothing is created.
    Revise,
    /// Resubmit through the override endpoint, creating the prescription anyway.
    Override,
}

/// Where a doctor's upload currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UploadStage {
    /// Being edited; not yet sent, or sent back after a revise.
    #[default]
    Draft,
    /// The backend refused the upload with a low-stock report.
    LowStockWarning,
    /// The backend created the prescription.
    Created,
}

impl UploadStage {
    /// Stage after the backend answered a submission of a draft.
    #[must_use]
    pub const fn submitted(low_stock: bool) -> Self {
        if low_stock {
            Self::LowStockWarning
        } else {
            Self::Created
        }
    }

    /// Resolve a low-stock warning.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::NoLowStockHold`] unless the upload is
    /// currently held on a low-stock warning.
    pub const fn decide(self, decision: UploadDecision) -> Result<Self, TransitionError> {
        match (self, decision) {
            (Self::LowStockWarning, UploadDecision::Revise) => Ok(Self::Draft),
            (Self::LowStockWarning, UploadDecision::Override) => Ok(Self::Created),
            _ => Err(TransitionError::NoLowStockHold),
        }
    }

    /// Whether a prescription exists on the backend at this stage.
    #[must_use]
    pub const fn is_created(self) -> bool {
        matches!(self, Self::Created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use FulfillmentEvent::{ConfirmPickup, MarkPreparing};
    use FulfillmentStatus::{Pending, PickedUp, Preparing};

    #[test]
    fn test_happy_path() {
        assert_eq!(Pending.apply(MarkPreparing), Ok(Preparing));
        assert_eq!(Preparing.apply(ConfirmPickup), Ok(PickedUp));
    }

    #[test]
    fn test_pickup_requires_preparing() {
        assert_eq!(
            Pending.apply(ConfirmPickup),
            Err(TransitionError::NotReady(Pending))
        );
    }

    #[test]
    fn test_mark_preparing_only_from_pending() {
        assert_eq!(
            Preparing.apply(MarkPreparing),
            Err(TransitionError::NotPending(Preparing))
        );
    }

    #[test]
    fn test_picked_up_is_final() {
        for event in [MarkPreparing, ConfirmPickup] {
            assert_eq!(PickedUp.apply(event), Err(TransitionError::AlreadyPickedUp));
        }
    }

    #[test]
    fn test_low_stock_only_creates_on_override() {
        let held = UploadStage::submitted(true);
        assert!(!held.is_created());
        assert_eq!(held.decide(UploadDecision::Revise), Ok(UploadStage::Draft));
        assert_eq!(held.decide(UploadDecision::Override), Ok(UploadStage::Created));
    }

    #[test]
    fn test_decision_without_hold_is_rejected() {
        assert!(UploadStage::submitted(false).is_created());
        assert_eq!(
            UploadStage::Draft.decide(UploadDecision::Override),
            Err(TransitionError::NoLowStockHold)
        );
        assert_eq!(
            UploadStage::Created.decide(UploadDecision::Revise),
            Err(TransitionError::NoLowStockHold)
        );
    }
}
